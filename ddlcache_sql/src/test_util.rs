//! Test utilities

/// Asserts that the result of a nom parser is an [`crate::internal::Error::Syntax`] and a
/// [`nom::Err::Failure`] carrying `$MSG`.
#[macro_export]
macro_rules! assert_expect_error {
    ($RESULT:expr, $MSG:expr) => {
        match $RESULT.unwrap_err() {
            nom::Err::Failure($crate::internal::Error::Syntax {
                input: _,
                message: got,
            }) => {
                assert_eq!(got.to_string(), $MSG)
            }
            e => panic!("Expected Failure(Syntax(_, msg), got {:?}", e),
        }
    };
}
