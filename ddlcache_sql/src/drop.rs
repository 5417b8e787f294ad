use crate::common::{comma, if_exists, ws0, ws1};
use crate::identifier::{identifier, qualified_name};
use crate::internal::{ParseResult, expect};
use crate::keywords::keyword;
use crate::statement::Statement;
use nom::branch::alt;
use nom::combinator::opt;
use nom::multi::separated_list1;
use nom::sequence::{preceded, terminated};

/// Parse a `DROP TABLE` or `DROP INDEX` statement, following the `DROP` keyword.
pub(crate) fn drop_statement(i: &str) -> ParseResult<&str, Statement> {
    preceded(
        ws1,
        expect(
            "invalid DROP statement, expected TABLE, TEMPORARY or INDEX",
            alt((drop_table, drop_index)),
        ),
    )(i)
}

fn drop_table(i: &str) -> ParseResult<&str, Statement> {
    let (i, temporary) = opt(terminated(keyword("TEMPORARY"), ws1))(i)?;
    let (i, _) = keyword("TABLE")(i)?;
    let (i, if_exists) = if_exists(i)?;
    let (i, names) = expect(
        "invalid DROP TABLE statement, expected table name",
        separated_list1(comma, qualified_name),
    )(i)?;
    Ok((
        i,
        Statement::DropTable {
            temporary: temporary.is_some(),
            if_exists,
            names,
        },
    ))
}

fn drop_index(i: &str) -> ParseResult<&str, Statement> {
    let (i, _) = keyword("INDEX")(i)?;
    let (i, name) = expect("invalid DROP INDEX statement, expected index name", identifier)(i)?;
    let (i, _) = expect(
        "invalid DROP INDEX statement, expected ON",
        preceded(ws0, keyword("ON")),
    )(i)?;
    let (i, table) = expect(
        "invalid DROP INDEX statement, expected table name",
        qualified_name,
    )(i)?;
    Ok((i, Statement::DropIndex { name, table }))
}
