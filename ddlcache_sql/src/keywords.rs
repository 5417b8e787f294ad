//! Keywords and reserved words.

use crate::internal::ParseResult;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::satisfy;
use nom::combinator::not;
use nom::sequence::terminated;

/// Words that may not be used as unquoted identifiers.
const RESERVED: &[&str] = &[
    "ADD", "ALTER", "AS", "BY", "CREATE", "DEFAULT", "DELETE", "DROP", "EXISTS", "FROM", "GLOBAL",
    "IF", "INDEX", "INSERT", "INTO", "KEY", "NOT", "NULL", "ON", "PARTITION", "PRIMARY", "RENAME",
    "SELECT", "SET", "TABLE", "TEMPORARY", "TO", "UNIQUE", "USE", "VALUES", "VIEW", "WHERE",
];

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Match `kw` case-insensitively, as a whole word.
pub(crate) fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> ParseResult<&'a str, &'a str> {
    move |i| terminated(tag_no_case(kw), not(satisfy(is_identifier_char)))(i)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keyword() {
        let (rem, got) = keyword("CACHE")("cache;").unwrap();
        assert_eq!(got, "cache");
        assert_eq!(rem, ";");

        // must match a whole word
        keyword("CACHE")("cached").unwrap_err();
        keyword("CACHE")("ca").unwrap_err();
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("table"));
        assert!(!is_reserved("cache"));
        assert!(!is_reserved("value"));
    }
}
