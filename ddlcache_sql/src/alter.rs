//! Types and parsers for the `ALTER TABLE` statement.

use crate::common::{comma, ws0, ws1};
use crate::create::{IndexDef, index_def};
use crate::identifier::{Identifier, QualifiedName, identifier, qualified_name};
use crate::internal::{ParseResult, expect};
use crate::keywords::keyword;
use nom::branch::alt;
use nom::combinator::{map, value};
use nom::multi::separated_list1;
use nom::sequence::{pair, preceded, tuple};

/// A single clause of an `ALTER TABLE` statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AlterTableSpec {
    Cache,
    NoCache,
    AddIndex(IndexDef),
    DropIndex(Identifier),
    DropPrimaryKey,
    RenameIndex { from: Identifier, to: Identifier },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlterTableStatement {
    pub table: QualifiedName,
    pub specs: Vec<AlterTableSpec>,
}

impl AlterTableStatement {
    /// Returns `true` if every clause only changes the cache status.
    pub fn is_cache_only(&self) -> bool {
        self.specs
            .iter()
            .all(|s| matches!(s, AlterTableSpec::Cache | AlterTableSpec::NoCache))
    }
}

/// Parse an `ALTER TABLE` statement, following the `ALTER` keyword.
pub(crate) fn alter_table_statement(i: &str) -> ParseResult<&str, AlterTableStatement> {
    let (i, _) = expect(
        "invalid ALTER statement, expected TABLE",
        preceded(ws1, keyword("TABLE")),
    )(i)?;
    let (i, table) = expect(
        "invalid ALTER TABLE statement, expected table name",
        qualified_name,
    )(i)?;
    let (i, specs) = expect(
        "invalid ALTER TABLE statement, expected CACHE, NOCACHE, ADD, DROP or RENAME",
        separated_list1(comma, preceded(ws0, alter_spec)),
    )(i)?;
    Ok((i, AlterTableStatement { table, specs }))
}

fn alter_spec(i: &str) -> ParseResult<&str, AlterTableSpec> {
    alt((
        value(AlterTableSpec::Cache, keyword("CACHE")),
        value(AlterTableSpec::NoCache, keyword("NOCACHE")),
        map(
            preceded(keyword("ADD"), expect("invalid ADD clause, expected index definition", index_def)),
            AlterTableSpec::AddIndex,
        ),
        preceded(
            keyword("DROP"),
            expect(
                "invalid DROP clause, expected INDEX, KEY or PRIMARY KEY",
                alt((
                    value(
                        AlterTableSpec::DropPrimaryKey,
                        tuple((ws1, keyword("PRIMARY"), ws1, keyword("KEY"))),
                    ),
                    map(
                        preceded(
                            pair(ws1, alt((keyword("INDEX"), keyword("KEY")))),
                            identifier,
                        ),
                        AlterTableSpec::DropIndex,
                    ),
                )),
            ),
        ),
        preceded(keyword("RENAME"), rename_index),
    ))(i)
}

fn rename_index(i: &str) -> ParseResult<&str, AlterTableSpec> {
    let (i, _) = expect(
        "invalid RENAME clause, expected INDEX or KEY",
        preceded(ws1, alt((keyword("INDEX"), keyword("KEY")))),
    )(i)?;
    let (i, from) = expect("invalid RENAME clause, expected index name", identifier)(i)?;
    let (i, _) = expect(
        "invalid RENAME clause, expected TO",
        preceded(ws1, keyword("TO")),
    )(i)?;
    let (i, to) = expect("invalid RENAME clause, expected index name", identifier)(i)?;
    Ok((i, AlterTableSpec::RenameIndex { from, to }))
}
