use crate::identifier::{Identifier, identifier};
use crate::internal::ParseResult;
use crate::keywords::keyword;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{opt, value};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, terminated, tuple};

/// Optional whitespace
pub(crate) fn ws0(i: &str) -> ParseResult<&str, &str> {
    multispace0(i)
}

/// Required whitespace
pub(crate) fn ws1(i: &str) -> ParseResult<&str, &str> {
    multispace1(i)
}

pub(crate) fn statement_terminator(i: &str) -> ParseResult<&str, ()> {
    value((), char(';'))(i)
}

/// Parse `,` surrounded by optional whitespace.
pub(crate) fn comma(i: &str) -> ParseResult<&str, char> {
    preceded(ws0, char(','))(i)
}

/// `IF NOT EXISTS`
pub(crate) fn if_not_exists(i: &str) -> ParseResult<&str, bool> {
    let (i, found) = opt(tuple((
        preceded(ws0, keyword("IF")),
        preceded(ws0, keyword("NOT")),
        preceded(ws0, keyword("EXISTS")),
    )))(i)?;
    Ok((i, found.is_some()))
}

/// `IF EXISTS`
pub(crate) fn if_exists(i: &str) -> ParseResult<&str, bool> {
    let (i, found) = opt(tuple((
        preceded(ws0, keyword("IF")),
        preceded(ws0, keyword("EXISTS")),
    )))(i)?;
    Ok((i, found.is_some()))
}

/// A parenthesised list of column names, as used by index definitions. A prefix length such
/// as `c1(10)` is accepted and discarded.
pub(crate) fn column_list(i: &str) -> ParseResult<&str, Vec<Identifier>> {
    preceded(
        ws0,
        delimited(
            char('('),
            separated_list1(
                comma,
                terminated(
                    identifier,
                    opt(preceded(
                        ws0,
                        delimited(char('('), take_while1(|c: char| c.is_ascii_digit()), char(')')),
                    )),
                ),
            ),
            preceded(ws0, char(')')),
        ),
    )(i)
}

/// Consume the remainder of the current statement, up to but excluding a `;` that is not
/// nested in parentheses or quotes. The result is trimmed.
pub(crate) fn rest_of_statement(i: &str) -> ParseResult<&str, &str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut end = i.len();
    for (pos, c) in i.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                end = pos;
                break;
            }
            _ => {}
        }
    }
    Ok((&i[end..], i[..end].trim()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_column_list() {
        let (_, got) = column_list(" ( c1, c2(10) )").unwrap();
        assert_eq!(got, vec![Identifier::from("c1"), Identifier::from("c2")]);
        column_list("()").unwrap_err();
    }

    #[test]
    fn test_rest_of_statement() {
        let (rem, got) = rest_of_statement(" values (';'), (2);select 1").unwrap();
        assert_eq!(got, "values (';'), (2)");
        assert_eq!(rem, ";select 1");

        let (rem, got) = rest_of_statement("partition p0 values in (1,2)").unwrap();
        assert_eq!(got, "partition p0 values in (1,2)");
        assert_eq!(rem, "");
    }

    #[test]
    fn test_if_exists() {
        assert_eq!(if_exists(" if exists t").unwrap(), (" t", true));
        assert_eq!(if_exists(" t").unwrap(), (" t", false));
        assert_eq!(if_not_exists(" IF NOT EXISTS t").unwrap(), (" t", true));
    }
}
