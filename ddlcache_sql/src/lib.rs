//! # Parse the subset of SQL needed to drive the schema catalog
//!
//! Covers the DDL statements that change a table's definition or cache status
//! (`CREATE`, `DROP`, `ALTER TABLE ... CACHE|NOCACHE`) and the handful of session and
//! DML statements used around them.

pub use crate::alter::*;
pub use crate::create::*;
pub use crate::identifier::*;
pub use crate::statement::*;

use crate::common::statement_terminator;
use crate::internal::Error as InternalError;
use crate::statement::statement;
use nom::Offset;
use nom::combinator::eof;
use std::fmt::{Display, Formatter};

#[cfg(test)]
mod test_util;

mod alter;
mod common;
mod create;
mod drop;
mod identifier;
mod internal;
mod keywords;
mod statement;

/// A error returned when parsing SQL using [`parse_statements`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
    pos: usize,
}

impl ParseError {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the input where the error was detected.
    pub fn pos(&self) -> usize {
        self.pos
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at pos {}", self.message, self.pos)
    }
}

impl std::error::Error for ParseError {}

/// The outcome of parsing a batch of statements.
pub type ParseResult = Result<Vec<Statement>, ParseError>;

fn skip_whitespace(i: &str) -> &str {
    i.trim_start()
}

impl ParseError {
    fn at(input: &str, rest: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pos: input.offset(rest),
        }
    }
}

/// Parse a batch of statements separated by `;`. Empty statements are skipped.
pub fn parse_statements(input: &str) -> ParseResult {
    let mut statements = Vec::new();
    let mut rest = skip_whitespace(input);

    while eof::<_, nom::error::Error<_>>(rest).is_err() {
        if let Ok((after, _)) = statement_terminator(rest) {
            rest = skip_whitespace(after);
            continue;
        }

        let (after, parsed) = statement(rest).map_err(|e| match e {
            nom::Err::Failure(InternalError::Syntax { input: at, message }) => {
                ParseError::at(input, at, message)
            }
            _ => ParseError::at(input, rest, "invalid SQL statement"),
        })?;
        let after = skip_whitespace(after);
        if !(after.is_empty() || after.starts_with(';')) {
            return Err(ParseError::at(input, after, "invalid SQL statement, expected ';'"));
        }
        statements.push(parsed);
        rest = after;
    }
    Ok(statements)
}

/// Parse the input, which must contain exactly one statement.
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    let mut statements = parse_statements(input)?;
    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => Err(ParseError {
            message: "empty statement".into(),
            pos: input.len(),
        }),
        _ => Err(ParseError {
            message: "expected a single statement".into(),
            pos: 0,
        }),
    }
}
