//! # Identifiers
//!
//! * unquoted identifiers start with an ASCII letter or `_` and continue with ASCII letters,
//!   digits, `_` or `$`; they may not be a reserved word
//! * backtick quoted identifiers may contain anything but a backtick, including reserved words
//! * identifiers may be preceded by whitespace

use crate::common::ws0;
use crate::internal::ParseResult;
use crate::keywords::{is_identifier_char, is_reserved};
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, satisfy};
use nom::combinator::{map, opt, recognize, verify};
use nom::sequence::{delimited, pair, preceded};
use std::fmt::{self, Display, Formatter};

fn unquoted_identifier(i: &str) -> ParseResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(is_identifier_char),
        )),
        |s: &str| !is_reserved(s),
    )(i)
}

fn quoted_identifier(i: &str) -> ParseResult<&str, &str> {
    delimited(char('`'), take_while1(|c| c != '`'), char('`'))(i)
}

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Identifier(pub(crate) String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn requires_quotes(&self) -> bool {
        nom::sequence::terminated(unquoted_identifier, nom::combinator::eof)(&self.0).is_err()
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.requires_quotes() {
            write!(f, "`{}`", self.0)
        } else {
            f.write_str(&self.0)
        }
    }
}

pub(crate) fn identifier(i: &str) -> ParseResult<&str, Identifier> {
    preceded(
        ws0,
        alt((
            map(unquoted_identifier, Into::into),
            map(quoted_identifier, Into::into),
        )),
    )(i)
}

/// A table name, optionally qualified by its database: `[db.]name`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct QualifiedName {
    pub database: Option<Identifier>,
    pub name: Identifier,
}

impl QualifiedName {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            database: None,
            name: name.into(),
        }
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        match s.split_once('.') {
            Some((db, name)) => Self {
                database: Some(db.into()),
                name: name.into(),
            },
            None => Self::new(s),
        }
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(db) = &self.database {
            write!(f, "{db}.")?;
        }
        write!(f, "{}", self.name)
    }
}

pub(crate) fn qualified_name(i: &str) -> ParseResult<&str, QualifiedName> {
    map(
        pair(identifier, opt(preceded(preceded(ws0, char('.')), identifier))),
        |(first, second)| match second {
            Some(name) => QualifiedName {
                database: Some(first),
                name,
            },
            None => QualifiedName {
                database: None,
                name: first,
            },
        },
    )(i)
}
