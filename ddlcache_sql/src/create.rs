//! Types and parsers for the `CREATE` family of statements.

use crate::common::{column_list, comma, if_not_exists, rest_of_statement, ws0, ws1};
use crate::identifier::{Identifier, QualifiedName, identifier, qualified_name};
use crate::internal::{ParseResult, expect};
use crate::keywords::{is_identifier_char, keyword};
use crate::statement::Statement;
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{map, opt, recognize, value};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Temporary {
    /// `CREATE TEMPORARY TABLE`, visible only to the creating session.
    Local,
    /// `CREATE GLOBAL TEMPORARY TABLE`, shared definition with per-transaction data.
    Global,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OnCommit {
    DeleteRows,
    PreserveRows,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexKind {
    Primary,
    Unique,
    Plain,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexDef {
    pub name: Option<Identifier>,
    pub columns: Vec<Identifier>,
    pub kind: IndexKind,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnDef {
    pub name: Identifier,
    pub data_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub auto_increment: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PartitionStrategy {
    Hash,
    Range,
    List,
}

impl Display for PartitionStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hash => "HASH",
            Self::Range => "RANGE",
            Self::List => "LIST",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PartitionBy {
    pub strategy: PartitionStrategy,
    /// Everything following the strategy keyword, verbatim.
    pub definition: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateTableStatement {
    pub name: QualifiedName,
    pub temporary: Option<Temporary>,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub partition: Option<PartitionBy>,
    pub on_commit: Option<OnCommit>,
}

/// Parse a `CREATE` statement, following the `CREATE` keyword.
pub(crate) fn create_statement(i: &str) -> ParseResult<&str, Statement> {
    preceded(
        ws1,
        expect(
            "invalid CREATE statement, expected DATABASE, TABLE, TEMPORARY, GLOBAL, VIEW or INDEX",
            alt((
                create_database,
                map(create_table, Statement::CreateTable),
                create_view,
                create_index,
            )),
        ),
    )(i)
}

fn create_database(i: &str) -> ParseResult<&str, Statement> {
    let (i, _) = alt((keyword("DATABASE"), keyword("SCHEMA")))(i)?;
    let (i, if_not_exists) = if_not_exists(i)?;
    let (i, name) = expect("invalid CREATE DATABASE statement, expected name", identifier)(i)?;
    Ok((
        i,
        Statement::CreateDatabase {
            name,
            if_not_exists,
        },
    ))
}

fn create_table(i: &str) -> ParseResult<&str, CreateTableStatement> {
    let (i, temporary) = opt(alt((
        value(
            Temporary::Global,
            pair(keyword("GLOBAL"), preceded(ws1, keyword("TEMPORARY"))),
        ),
        value(Temporary::Local, keyword("TEMPORARY")),
    )))(i)?;
    let (i, _) = preceded(ws0, keyword("TABLE"))(i)?;
    let (i, if_not_exists) = if_not_exists(i)?;
    let (i, name) = expect(
        "invalid CREATE TABLE statement, expected table name",
        qualified_name,
    )(i)?;
    let (i, elements) = expect(
        "invalid CREATE TABLE statement, expected column definitions",
        preceded(
            ws0,
            delimited(
                char('('),
                separated_list1(comma, table_element),
                preceded(ws0, char(')')),
            ),
        ),
    )(i)?;
    let (i, partition) = opt(partition_by)(i)?;
    let (i, on_commit) = opt(on_commit)(i)?;

    let mut columns = Vec::new();
    let mut indexes = Vec::new();
    for element in elements {
        match element {
            TableElement::Column(column, inline) => {
                indexes.extend(inline.into_iter().map(|kind| IndexDef {
                    name: None,
                    columns: vec![column.name.clone()],
                    kind,
                }));
                columns.push(column);
            }
            TableElement::Index(index) => indexes.push(index),
        }
    }

    Ok((
        i,
        CreateTableStatement {
            name,
            temporary,
            if_not_exists,
            columns,
            indexes,
            partition,
            on_commit,
        },
    ))
}

enum TableElement {
    /// A column and any indexes declared inline with it.
    Column(ColumnDef, Vec<IndexKind>),
    Index(IndexDef),
}

fn table_element(i: &str) -> ParseResult<&str, TableElement> {
    alt((
        map(table_constraint, TableElement::Index),
        map(column_def, |(column, inline)| {
            TableElement::Column(column, inline)
        }),
    ))(i)
}

/// `[CONSTRAINT [name]] PRIMARY KEY (cols)`, `UNIQUE [KEY|INDEX] [name] (cols)` or
/// `{KEY|INDEX} [name] (cols)`
fn table_constraint(i: &str) -> ParseResult<&str, IndexDef> {
    let (i, _) = opt(preceded(
        preceded(ws0, keyword("CONSTRAINT")),
        opt(identifier),
    ))(i)?;
    let (i, kind) = preceded(
        ws0,
        alt((
            value(
                IndexKind::Primary,
                pair(keyword("PRIMARY"), preceded(ws1, keyword("KEY"))),
            ),
            value(
                IndexKind::Unique,
                pair(
                    keyword("UNIQUE"),
                    opt(preceded(ws1, alt((keyword("KEY"), keyword("INDEX"))))),
                ),
            ),
            value(IndexKind::Plain, alt((keyword("KEY"), keyword("INDEX")))),
        )),
    )(i)?;
    let (i, name) = match kind {
        IndexKind::Primary => (i, None),
        _ => opt(identifier)(i)?,
    };
    let (i, columns) = expect(
        "invalid index definition, expected column list",
        column_list,
    )(i)?;
    Ok((
        i,
        IndexDef {
            name,
            columns,
            kind,
        },
    ))
}

/// Parse an index definition as it appears in `ALTER TABLE ... ADD`.
pub(crate) fn index_def(i: &str) -> ParseResult<&str, IndexDef> {
    table_constraint(i)
}

fn data_type(i: &str) -> ParseResult<&str, String> {
    map(
        recognize(tuple((
            take_while1(is_identifier_char),
            opt(preceded(
                ws0,
                delimited(
                    char('('),
                    take_while(|c: char| c.is_ascii_digit() || c == ',' || c == ' '),
                    char(')'),
                ),
            )),
        ))),
        |s: &str| s.to_ascii_lowercase(),
    )(i)
}

#[derive(Clone, Debug)]
enum ColumnOption {
    NotNull,
    Null,
    AutoIncrement,
    Unsigned,
    Default(String),
    Comment,
    Index(IndexKind),
}

fn literal(i: &str) -> ParseResult<&str, &str> {
    alt((
        recognize(delimited(char('\''), take_while(|c| c != '\''), char('\''))),
        recognize(pair(opt(char('-')), pair(digit1, opt(pair(char('.'), digit1))))),
        keyword("NULL"),
        take_while1(is_identifier_char),
    ))(i)
}

fn column_option(i: &str) -> ParseResult<&str, ColumnOption> {
    preceded(
        ws1,
        alt((
            value(
                ColumnOption::NotNull,
                pair(keyword("NOT"), preceded(ws1, keyword("NULL"))),
            ),
            value(ColumnOption::Null, keyword("NULL")),
            value(ColumnOption::AutoIncrement, keyword("AUTO_INCREMENT")),
            value(
                ColumnOption::Unsigned,
                alt((keyword("UNSIGNED"), keyword("ZEROFILL"))),
            ),
            map(
                preceded(pair(keyword("DEFAULT"), ws1), literal),
                |v: &str| ColumnOption::Default(v.to_string()),
            ),
            value(
                ColumnOption::Comment,
                pair(keyword("COMMENT"), preceded(ws1, literal)),
            ),
            value(
                ColumnOption::Index(IndexKind::Primary),
                pair(
                    opt(terminated(keyword("PRIMARY"), ws1)),
                    keyword("KEY"),
                ),
            ),
            value(
                ColumnOption::Index(IndexKind::Unique),
                pair(keyword("UNIQUE"), opt(preceded(ws1, keyword("KEY")))),
            ),
        )),
    )(i)
}

fn column_def(i: &str) -> ParseResult<&str, (ColumnDef, Vec<IndexKind>)> {
    let (i, name) = identifier(i)?;
    let (i, data_type) = expect(
        "invalid column definition, expected data type",
        preceded(ws1, data_type),
    )(i)?;
    let (i, options) = many0(column_option)(i)?;

    let mut column = ColumnDef {
        name,
        data_type,
        ..Default::default()
    };
    let mut inline = Vec::new();
    for option in options {
        match option {
            ColumnOption::NotNull => column.not_null = true,
            ColumnOption::Null => column.not_null = false,
            ColumnOption::AutoIncrement => column.auto_increment = true,
            ColumnOption::Unsigned | ColumnOption::Comment => {}
            ColumnOption::Default(v) => column.default = Some(v),
            ColumnOption::Index(kind) => {
                if kind == IndexKind::Primary {
                    column.not_null = true;
                }
                inline.push(kind);
            }
        }
    }
    Ok((i, (column, inline)))
}

fn partition_by(i: &str) -> ParseResult<&str, PartitionBy> {
    let (i, _) = tuple((ws0, keyword("PARTITION"), ws1, keyword("BY"), ws1))(i)?;
    let (i, strategy) = expect(
        "invalid PARTITION BY clause, expected HASH, KEY, RANGE or LIST",
        alt((
            value(
                PartitionStrategy::Hash,
                pair(opt(terminated(keyword("LINEAR"), ws1)), alt((keyword("HASH"), keyword("KEY")))),
            ),
            value(PartitionStrategy::Range, keyword("RANGE")),
            value(PartitionStrategy::List, keyword("LIST")),
        )),
    )(i)?;
    let (i, definition) = rest_of_partition(i)?;
    Ok((
        i,
        PartitionBy {
            strategy,
            definition: definition.to_string(),
        },
    ))
}

/// The partition definition runs until the end of the statement or an `ON COMMIT` clause.
fn rest_of_partition(i: &str) -> ParseResult<&str, &str> {
    let (rem, _) = rest_of_statement(i)?;
    let stmt = &i[..i.len() - rem.len()];
    let end = stmt
        .to_ascii_lowercase()
        .find(" on commit")
        .unwrap_or(stmt.len());
    Ok((&i[end..], stmt[..end].trim()))
}

fn on_commit(i: &str) -> ParseResult<&str, OnCommit> {
    let (i, _) = tuple((ws0, keyword("ON"), ws1, keyword("COMMIT"), ws1))(i)?;
    let (i, on_commit) = expect(
        "invalid ON COMMIT clause, expected DELETE ROWS or PRESERVE ROWS",
        alt((
            value(OnCommit::DeleteRows, keyword("DELETE")),
            value(OnCommit::PreserveRows, keyword("PRESERVE")),
        )),
    )(i)?;
    let (i, _) = expect(
        "invalid ON COMMIT clause, expected ROWS",
        preceded(ws1, keyword("ROWS")),
    )(i)?;
    Ok((i, on_commit))
}

fn create_view(i: &str) -> ParseResult<&str, Statement> {
    let (i, _) = keyword("VIEW")(i)?;
    let (i, name) = expect(
        "invalid CREATE VIEW statement, expected view name",
        qualified_name,
    )(i)?;
    let (i, _) = expect(
        "invalid CREATE VIEW statement, expected AS",
        preceded(ws1, keyword("AS")),
    )(i)?;
    let (i, definition) = rest_of_statement(i)?;
    Ok((
        i,
        Statement::CreateView {
            name,
            definition: definition.to_string(),
        },
    ))
}

fn create_index(i: &str) -> ParseResult<&str, Statement> {
    let (i, unique) = opt(terminated(keyword("UNIQUE"), ws1))(i)?;
    let (i, _) = keyword("INDEX")(i)?;
    let (i, name) = expect(
        "invalid CREATE INDEX statement, expected index name",
        identifier,
    )(i)?;
    let (i, _) = expect(
        "invalid CREATE INDEX statement, expected ON",
        preceded(ws1, keyword("ON")),
    )(i)?;
    let (i, table) = expect(
        "invalid CREATE INDEX statement, expected table name",
        qualified_name,
    )(i)?;
    let (i, columns) = expect(
        "invalid CREATE INDEX statement, expected column list",
        column_list,
    )(i)?;
    Ok((
        i,
        Statement::CreateIndex {
            name,
            table,
            columns,
            unique: unique.is_some(),
        },
    ))
}
