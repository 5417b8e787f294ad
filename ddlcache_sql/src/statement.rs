use crate::alter::{AlterTableStatement, alter_table_statement};
use crate::common::{rest_of_statement, ws0, ws1};
use crate::create::{CreateTableStatement, create_statement};
use crate::drop::drop_statement;
use crate::identifier::{Identifier, QualifiedName, identifier, qualified_name};
use crate::internal::{Error, ParseError, ParseResult, expect};
use crate::keywords::keyword;
use nom::branch::alt;
use nom::combinator::{map, opt, value};
use nom::sequence::{pair, preceded, tuple};

/// A single SQL statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
    CreateDatabase {
        name: Identifier,
        if_not_exists: bool,
    },
    CreateTable(CreateTableStatement),
    CreateView {
        name: QualifiedName,
        definition: String,
    },
    CreateIndex {
        name: Identifier,
        table: QualifiedName,
        columns: Vec<Identifier>,
        unique: bool,
    },
    DropTable {
        temporary: bool,
        if_exists: bool,
        names: Vec<QualifiedName>,
    },
    DropIndex {
        name: Identifier,
        table: QualifiedName,
    },
    AlterTable(AlterTableStatement),
    Use(Identifier),
    Begin,
    Commit,
    Rollback,
    /// A `SET` statement; the assignment is kept verbatim.
    Set(String),
    Insert {
        table: QualifiedName,
        /// The `VALUES ...` or `SET ...` clause, verbatim.
        values: String,
    },
    Select {
        /// The first table named in the `FROM` clause, if any.
        table: Option<QualifiedName>,
        text: String,
    },
}

impl Statement {
    /// Returns `true` for statements that change the schema.
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Self::CreateDatabase { .. }
                | Self::CreateTable(_)
                | Self::CreateView { .. }
                | Self::CreateIndex { .. }
                | Self::DropTable { .. }
                | Self::DropIndex { .. }
                | Self::AlterTable(_)
        )
    }
}

/// Parse a single SQL statement.
pub(crate) fn statement(i: &str) -> ParseResult<&str, Statement> {
    preceded(
        ws0,
        alt((
            preceded(keyword("CREATE"), create_statement),
            preceded(keyword("DROP"), drop_statement),
            map(
                preceded(keyword("ALTER"), alter_table_statement),
                Statement::AlterTable,
            ),
            use_statement,
            transaction_statement,
            set_statement,
            insert_statement,
            select_statement,
        )),
    )(i)
}

fn use_statement(i: &str) -> ParseResult<&str, Statement> {
    let (i, _) = keyword("USE")(i)?;
    let (i, name) = expect("invalid USE statement, expected database name", identifier)(i)?;
    Ok((i, Statement::Use(name)))
}

fn transaction_statement(i: &str) -> ParseResult<&str, Statement> {
    alt((
        value(Statement::Begin, keyword("BEGIN")),
        value(
            Statement::Begin,
            tuple((keyword("START"), ws1, keyword("TRANSACTION"))),
        ),
        value(Statement::Commit, keyword("COMMIT")),
        value(Statement::Rollback, keyword("ROLLBACK")),
    ))(i)
}

fn set_statement(i: &str) -> ParseResult<&str, Statement> {
    let (i, _) = keyword("SET")(i)?;
    let (i, assignment) = rest_of_statement(i)?;
    Ok((i, Statement::Set(assignment.to_string())))
}

fn insert_statement(i: &str) -> ParseResult<&str, Statement> {
    let (i, _) = pair(keyword("INSERT"), opt(preceded(ws1, keyword("INTO"))))(i)?;
    let (i, table) = expect(
        "invalid INSERT statement, expected table name",
        qualified_name,
    )(i)?;
    let (i, values) = rest_of_statement(i)?;
    if values.is_empty() {
        return Err(nom::Err::Failure(Error::from_message(
            i,
            "invalid INSERT statement, expected VALUES or SET",
        )));
    }
    Ok((
        i,
        Statement::Insert {
            table,
            values: values.to_string(),
        },
    ))
}

fn select_statement(i: &str) -> ParseResult<&str, Statement> {
    keyword("SELECT")(i)?;
    let (rem, text) = rest_of_statement(i)?;
    let table = text
        .to_ascii_lowercase()
        .find(" from ")
        .and_then(|pos| qualified_name(&text[pos + " from".len()..]).ok())
        .map(|(_, name)| name);
    Ok((
        rem,
        Statement::Select {
            table,
            text: text.to_string(),
        },
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alter::AlterTableSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_statement() {
        let (_, got) = statement("use test").unwrap();
        assert_eq!(got, Statement::Use("test".into()));
        assert!(!got.is_ddl());

        let (_, got) = statement("alter table t cache").unwrap();
        assert_eq!(
            got,
            Statement::AlterTable(AlterTableStatement {
                table: QualifiedName::new("t"),
                specs: vec![AlterTableSpec::Cache],
            })
        );
        assert!(got.is_ddl());

        let (_, got) = statement("START TRANSACTION").unwrap();
        assert_eq!(got, Statement::Begin);

        let (rem, got) = statement("set @@session.tidb_enable_list_partition = ON; begin").unwrap();
        assert_eq!(
            got,
            Statement::Set("@@session.tidb_enable_list_partition = ON".into())
        );
        assert_eq!(rem, "; begin");
    }

    #[test]
    fn test_insert() {
        let (_, got) = statement("insert into t1 set a=1").unwrap();
        assert_eq!(
            got,
            Statement::Insert {
                table: QualifiedName::new("t1"),
                values: "set a=1".into(),
            }
        );

        let (_, got) = statement("insert into test.t values (1), (2)").unwrap();
        assert_eq!(
            got,
            Statement::Insert {
                table: QualifiedName::from("test.t"),
                values: "values (1), (2)".into(),
            }
        );

        statement("insert into t").unwrap_err();
    }

    #[test]
    fn test_select() {
        let (_, got) = statement("select * from cache_view_t where a = 1").unwrap();
        assert_eq!(
            got,
            Statement::Select {
                table: Some(QualifiedName::new("cache_view_t")),
                text: "select * from cache_view_t where a = 1".into(),
            }
        );

        let (_, got) = statement("select 1").unwrap();
        assert_eq!(
            got,
            Statement::Select {
                table: None,
                text: "select 1".into(),
            }
        );
    }
}
