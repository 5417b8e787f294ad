//! Internal result and error types used to build the statement parsers

use nom::Parser;
use nom::error::{ErrorKind as NomErrorKind, ParseError as NomParseError};

/// Errors that can carry a fixed message, as produced by [`expect`].
pub(crate) trait ParseError<'a>: NomParseError<&'a str> + Sized {
    fn from_message(input: &'a str, message: &'static str) -> Self;
}

/// `Syntax` errors are reported to the user; `Nom` errors only drive backtracking.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Error<I> {
    Syntax { input: I, message: &'static str },
    Nom(I, NomErrorKind),
}

impl<'a> ParseError<'a> for Error<&'a str> {
    fn from_message(input: &'a str, message: &'static str) -> Self {
        Self::Syntax { input, message }
    }
}

/// Commit to `f`: once the preceding input matched, a failure of `f` becomes a
/// [`nom::Err::Failure`] carrying `message` instead of letting the caller backtrack.
pub(crate) fn expect<'a, E: ParseError<'a>, F, O>(
    message: &'static str,
    mut f: F,
) -> impl FnMut(&'a str) -> ParseResult<&'a str, O, E>
where
    F: Parser<&'a str, O, E>,
{
    move |i| match f.parse(i) {
        Ok(o) => Ok(o),
        Err(nom::Err::Incomplete(i)) => Err(nom::Err::Incomplete(i)),
        Err(nom::Err::Error(_)) => Err(nom::Err::Failure(E::from_message(i, message))),
        Err(nom::Err::Failure(e)) => Err(nom::Err::Failure(e)),
    }
}

impl<I> NomParseError<I> for Error<I> {
    fn from_error_kind(input: I, kind: NomErrorKind) -> Self {
        Self::Nom(input, kind)
    }

    fn append(_: I, _: NomErrorKind, other: Self) -> Self {
        other
    }
}

pub(crate) type ParseResult<I, T, E = Error<I>> = nom::IResult<I, T, E>;
