//! Statement execution for a single client connection.

use std::sync::Arc;

use ddlcache_catalog::{
    CatalogError, CatalogSnapshot, SchemaVersion,
    guard::{StructuralChange, check_structural_change},
    table::{
        IndexKind, IndexOp, IndexSpec, PRIMARY_KEY_NAME, PartitionStrategy, TableKind, TableMeta,
        TableRef, TableSpec,
    },
    validate::{CacheAction, validate_alter_cache},
};
use ddlcache_jobs::JobRequest;
use ddlcache_sql::{
    self as sql, AlterTableSpec, AlterTableStatement, CreateTableStatement, Identifier,
    QualifiedName, Statement, Temporary,
};
use ddlcache_txn::{CommitInfo, Transaction};
use hashbrown::HashMap;
use tracing::{debug, info};

use crate::{
    domain::Domain,
    error::{Result, SessionError},
};

/// What a successfully executed statement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOutcome {
    Ok,
    /// A DDL job finished and produced this schema version
    SchemaChanged(SchemaVersion),
    /// Rows were buffered in the open transaction, which now holds `rows` writes
    Buffered { rows: usize },
    Committed(CommitInfo),
    RolledBack { rows: usize },
}

/// Temporary tables are keyed by lower-cased `(database, table)`.
type TempKey = (String, String);

fn temp_key(db_name: &str, table_name: &str) -> TempKey {
    (db_name.to_ascii_lowercase(), table_name.to_ascii_lowercase())
}

/// A client session.
///
/// A session resolves names against its node's catalog replica, overlaid with the local
/// temporary tables it created. Any DDL statement first commits the open transaction, if
/// there is one, and subsequent statements run in autocommit mode until the next `BEGIN`.
#[derive(Debug)]
pub struct Session {
    domain: Arc<Domain>,
    current_db: Option<Arc<str>>,
    txn: Option<Transaction>,
    temp_tables: HashMap<TempKey, Arc<TableMeta>>,
}

enum DropTarget {
    Temporary(TempKey),
    Catalog(TableRef),
}

impl Session {
    pub(crate) fn new(domain: Arc<Domain>) -> Self {
        Self {
            domain,
            current_db: None,
            txn: None,
            temp_tables: HashMap::new(),
        }
    }

    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current_db.as_deref()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.txn.as_ref()
    }

    /// Look up a local temporary table created by this session.
    pub fn temporary_table(&self, db_name: &str, table_name: &str) -> Option<Arc<TableMeta>> {
        self.temp_tables
            .get(&temp_key(db_name, table_name))
            .map(Arc::clone)
    }

    /// Parse and execute a single statement.
    pub async fn execute(&mut self, sql: &str) -> Result<StatementOutcome> {
        let statement = sql::parse_statement(sql)?;
        self.execute_statement(statement).await
    }

    /// Parse `sql` as a `;` separated batch and execute it, stopping at the first error.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<Vec<StatementOutcome>> {
        let statements = sql::parse_statements(sql)?;
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            outcomes.push(self.execute_statement(statement).await?);
        }
        Ok(outcomes)
    }

    pub async fn execute_statement(&mut self, statement: Statement) -> Result<StatementOutcome> {
        if statement.is_ddl() {
            self.commit_implicitly().await?;
        }
        match statement {
            Statement::CreateDatabase {
                name,
                if_not_exists,
            } => self.create_database(name.as_str(), if_not_exists).await,
            Statement::CreateTable(create) => self.create_table(create).await,
            Statement::CreateView { name, definition } => {
                self.create_view(&name, &definition).await
            }
            Statement::CreateIndex {
                name,
                table,
                columns,
                unique,
            } => {
                let kind = if unique {
                    IndexKind::Unique
                } else {
                    IndexKind::Plain
                };
                let spec = IndexSpec::new(
                    Some(name.as_str()),
                    columns.iter().map(Identifier::as_str),
                    kind,
                );
                self.alter_indexes(&table, vec![IndexOp::Add(spec)], StructuralChange::CreateIndex)
                    .await
            }
            Statement::DropTable {
                temporary,
                if_exists,
                names,
            } => self.drop_tables(temporary, if_exists, &names).await,
            Statement::DropIndex { name, table } => {
                let op = IndexOp::Drop {
                    name: name.as_str().into(),
                };
                self.alter_indexes(&table, vec![op], StructuralChange::DropIndex)
                    .await
            }
            Statement::AlterTable(alter) => self.alter_table(alter).await,
            Statement::Use(name) => self.use_database(name.as_str()),
            Statement::Set(assignment) => {
                debug!(%assignment, "session variable ignored");
                Ok(StatementOutcome::Ok)
            }
            Statement::Begin => {
                self.commit_implicitly().await?;
                let txn = Transaction::begin(self.domain.next_txn_id(), self.schema());
                self.txn = Some(txn);
                Ok(StatementOutcome::Ok)
            }
            Statement::Commit => match self.txn.take() {
                Some(txn) => Ok(StatementOutcome::Committed(self.commit(txn).await?)),
                None => Ok(StatementOutcome::Ok),
            },
            Statement::Rollback => Ok(match self.txn.take() {
                Some(txn) => StatementOutcome::RolledBack {
                    rows: txn.rollback(),
                },
                None => StatementOutcome::Ok,
            }),
            Statement::Insert { table, values } => self.insert(&table, values).await,
            Statement::Select { table, .. } => {
                if let Some(name) = table {
                    let table = self.resolve_for_dml(&name)?;
                    if let Some(txn) = self.txn.as_mut() {
                        txn.record_read(table.id);
                    }
                }
                Ok(StatementOutcome::Ok)
            }
        }
    }

    /// The catalog as this session's node currently sees it.
    fn schema(&self) -> Arc<CatalogSnapshot> {
        self.domain.node().snapshot()
    }

    async fn commit(&self, txn: Transaction) -> Result<CommitInfo> {
        Ok(txn
            .commit(self.domain.fencer(), self.domain.sink().as_ref())
            .await?)
    }

    async fn commit_implicitly(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            debug!(txn_id = %txn.id(), "implicit commit");
            self.commit(txn).await?;
        }
        Ok(())
    }

    async fn run_job(&self, request: JobRequest) -> Result<StatementOutcome> {
        let version = self.domain.executor().execute(request).await?;
        Ok(StatementOutcome::SchemaChanged(version))
    }

    fn use_database(&mut self, name: &str) -> Result<StatementOutcome> {
        let db = self
            .schema()
            .db_schema(name)
            .ok_or_else(|| CatalogError::DatabaseNotFound(name.into()))?;
        self.current_db = Some(Arc::clone(&db.name));
        Ok(StatementOutcome::Ok)
    }

    fn db_name(&self, name: &QualifiedName) -> Result<Arc<str>> {
        match &name.database {
            Some(db) => Ok(db.as_str().into()),
            None => self
                .current_db
                .as_ref()
                .map(Arc::clone)
                .ok_or(SessionError::NoDatabaseSelected),
        }
    }

    /// Resolve against this session's temporary tables, then `snapshot`.
    fn lookup(
        &self,
        snapshot: &CatalogSnapshot,
        db_name: &str,
        table_name: &str,
    ) -> Option<Arc<TableMeta>> {
        self.temporary_table(db_name, table_name)
            .or_else(|| snapshot.table_by_name(db_name, table_name))
    }

    fn resolve_table(&self, name: &QualifiedName) -> Result<Arc<TableMeta>> {
        let db_name = self.db_name(name)?;
        self.lookup(&self.schema(), &db_name, name.name.as_str())
            .ok_or_else(|| CatalogError::no_such_table(db_name, name.name.as_str()).into())
    }

    /// DML inside a transaction resolves against the catalog the transaction began with.
    fn resolve_for_dml(&self, name: &QualifiedName) -> Result<Arc<TableMeta>> {
        let db_name = self.db_name(name)?;
        let snapshot = match &self.txn {
            Some(txn) => Arc::clone(txn.catalog()),
            None => self.schema(),
        };
        let table = self
            .lookup(&snapshot, &db_name, name.name.as_str())
            .ok_or_else(|| CatalogError::no_such_table(db_name, name.name.as_str()))?;
        if table.kind == TableKind::View {
            return Err(CatalogError::WrongObjectType {
                db_name: Arc::clone(&table.db_name),
                table_name: Arc::clone(&table.name),
                expected: "BASE TABLE",
            }
            .into());
        }
        Ok(table)
    }

    async fn create_database(&self, name: &str, if_not_exists: bool) -> Result<StatementOutcome> {
        if if_not_exists && self.schema().db_schema(name).is_some() {
            return Ok(StatementOutcome::Ok);
        }
        self.run_job(JobRequest::CreateDatabase { name: name.into() })
            .await
    }

    async fn create_table(&mut self, create: CreateTableStatement) -> Result<StatementOutcome> {
        let db_name = self.db_name(&create.name)?;
        let table_name = create.name.name.as_str();
        let schema = self.schema();
        let spec = table_spec(&create);

        if create.temporary != Some(Temporary::Local) {
            if create.if_not_exists && schema.table_by_name(&db_name, table_name).is_some() {
                return Ok(StatementOutcome::Ok);
            }
            return self.run_job(JobRequest::CreateTable { db_name, spec }).await;
        }

        // local temporary tables stay in the session and never reach the executor
        let key = temp_key(&db_name, table_name);
        if self.temp_tables.contains_key(&key) {
            if create.if_not_exists {
                return Ok(StatementOutcome::Ok);
            }
            return Err(CatalogError::TableAlreadyExists(table_name.into()).into());
        }
        let db = schema
            .db_schema(&db_name)
            .ok_or_else(|| CatalogError::DatabaseNotFound(Arc::clone(&db_name)))?;
        let table = TableMeta::new(
            self.domain.catalog().allocate_table_id(),
            db.id,
            Arc::clone(&db.name),
            spec,
            schema.version(),
        )?;
        info!(table_id = %table.id, db_name = %db.name, table_name, "created local temporary table");
        self.temp_tables.insert(key, Arc::new(table));
        Ok(StatementOutcome::Ok)
    }

    async fn create_view(
        &self,
        name: &QualifiedName,
        definition: &str,
    ) -> Result<StatementOutcome> {
        let db_name = self.db_name(name)?;
        let mut spec = TableSpec::ordinary(name.name.as_str()).with_kind(TableKind::View);
        spec.view_definition = Some(definition.into());
        self.run_job(JobRequest::CreateTable { db_name, spec })
            .await
    }

    /// Every named table is resolved before anything is dropped, so a missing table fails the
    /// statement without dropping the others.
    async fn drop_tables(
        &mut self,
        temporary: bool,
        if_exists: bool,
        names: &[QualifiedName],
    ) -> Result<StatementOutcome> {
        let schema = self.schema();
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let db_name = self.db_name(name)?;
            let key = temp_key(&db_name, name.name.as_str());
            if self.temp_tables.contains_key(&key) {
                targets.push(DropTarget::Temporary(key));
                continue;
            }
            match schema.table_by_name(&db_name, name.name.as_str()) {
                Some(table) if !temporary || table.kind.is_temporary() => {
                    targets.push(DropTarget::Catalog(TableRef::of(&table)))
                }
                _ if if_exists => debug!(%name, "drop table skipped: no such table"),
                _ => {
                    return Err(CatalogError::no_such_table(db_name, name.name.as_str()).into());
                }
            }
        }

        let mut outcome = StatementOutcome::Ok;
        for target in targets {
            match target {
                DropTarget::Temporary(key) => {
                    self.temp_tables.remove(&key);
                }
                DropTarget::Catalog(table) => {
                    outcome = self.run_job(JobRequest::DropTable { table }).await?;
                }
            }
        }
        Ok(outcome)
    }

    async fn alter_table(&mut self, alter: AlterTableStatement) -> Result<StatementOutcome> {
        let AlterTableStatement { table, specs } = alter;

        match specs.as_slice() {
            [AlterTableSpec::Cache] => return self.alter_cache(&table, CacheAction::Enable).await,
            [AlterTableSpec::NoCache] => {
                return self.alter_cache(&table, CacheAction::Disable).await;
            }
            _ => {}
        }
        // a cache change is only ever the sole clause of its statement
        if specs
            .iter()
            .any(|s| matches!(s, AlterTableSpec::Cache | AlterTableSpec::NoCache))
        {
            return Err(CatalogError::UnsupportedDdlOperation(
                "multi schema change for alter table cache",
            )
            .into());
        }

        let change = match specs.as_slice() {
            [AlterTableSpec::AddIndex(_)] => StructuralChange::AddIndex,
            [AlterTableSpec::DropIndex(_) | AlterTableSpec::DropPrimaryKey] => {
                StructuralChange::DropIndex
            }
            [AlterTableSpec::RenameIndex { .. }] => StructuralChange::RenameIndex,
            _ => StructuralChange::AlterIndexes,
        };
        let ops = specs.iter().filter_map(index_op).collect();
        self.alter_indexes(&table, ops, change).await
    }

    async fn alter_cache(
        &mut self,
        name: &QualifiedName,
        action: CacheAction,
    ) -> Result<StatementOutcome> {
        let db_name = self.db_name(name)?;
        let table_name = name.name.as_str();
        match self.lookup(&self.schema(), &db_name, table_name) {
            Some(table) if table.kind == TableKind::LocalTemporary => {
                validate_alter_cache(&db_name, table_name, Some(&table), action)?;
                Ok(StatementOutcome::Ok)
            }
            Some(table) => {
                self.run_job(JobRequest::AlterCache {
                    table: TableRef::of(&table),
                    action,
                })
                .await
            }
            None => {
                debug!(%db_name, table_name, %action, "alter cache rejected: no such table");
                Err(CatalogError::no_such_table(db_name, table_name).into())
            }
        }
    }

    async fn alter_indexes(
        &mut self,
        name: &QualifiedName,
        ops: Vec<IndexOp>,
        change: StructuralChange,
    ) -> Result<StatementOutcome> {
        let table = self.resolve_table(name)?;
        if table.kind == TableKind::LocalTemporary {
            check_structural_change(&table, change)?;
            let altered = table.with_index_ops(&ops)?;
            self.temp_tables
                .insert(temp_key(&table.db_name, &table.name), Arc::new(altered));
            return Ok(StatementOutcome::Ok);
        }
        self.run_job(JobRequest::AlterIndexes {
            table: TableRef::of(&table),
            ops,
            change,
        })
        .await
    }

    async fn insert(&mut self, name: &QualifiedName, values: String) -> Result<StatementOutcome> {
        let table = self.resolve_for_dml(name)?;
        if let Some(txn) = self.txn.as_mut() {
            txn.insert(table.id, values);
            return Ok(StatementOutcome::Buffered {
                rows: txn.pending_writes().len(),
            });
        }
        let mut txn = Transaction::begin(self.domain.next_txn_id(), self.schema());
        txn.insert(table.id, values);
        Ok(StatementOutcome::Committed(self.commit(txn).await?))
    }
}

fn table_spec(create: &CreateTableStatement) -> TableSpec {
    let kind = match (create.temporary, &create.partition) {
        (Some(Temporary::Local), _) => TableKind::LocalTemporary,
        (Some(Temporary::Global), _) => TableKind::GlobalTemporary,
        (None, Some(partition)) => TableKind::Partitioned(match partition.strategy {
            sql::PartitionStrategy::Hash => PartitionStrategy::Hash,
            sql::PartitionStrategy::Range => PartitionStrategy::Range,
            sql::PartitionStrategy::List => PartitionStrategy::List,
        }),
        (None, None) => TableKind::Ordinary,
    };
    let spec = create.columns.iter().fold(
        TableSpec::ordinary(create.name.name.as_str()).with_kind(kind),
        |spec, column| spec.with_column(column.name.as_str(), column.data_type.as_str()),
    );
    create
        .indexes
        .iter()
        .fold(spec, |spec, index| spec.with_index(index_spec(index)))
}

fn index_spec(index: &sql::IndexDef) -> IndexSpec {
    let kind = match index.kind {
        sql::IndexKind::Primary => IndexKind::Primary,
        sql::IndexKind::Unique => IndexKind::Unique,
        sql::IndexKind::Plain => IndexKind::Plain,
    };
    IndexSpec::new(
        index.name.as_ref().map(Identifier::as_str),
        index.columns.iter().map(Identifier::as_str),
        kind,
    )
}

fn index_op(spec: &AlterTableSpec) -> Option<IndexOp> {
    match spec {
        AlterTableSpec::AddIndex(index) => Some(IndexOp::Add(index_spec(index))),
        AlterTableSpec::DropIndex(name) => Some(IndexOp::Drop {
            name: name.as_str().into(),
        }),
        AlterTableSpec::DropPrimaryKey => Some(IndexOp::Drop {
            name: PRIMARY_KEY_NAME.into(),
        }),
        AlterTableSpec::RenameIndex { from, to } => Some(IndexOp::Rename {
            from: from.as_str().into(),
            to: to.as_str().into(),
        }),
        AlterTableSpec::Cache | AlterTableSpec::NoCache => None,
    }
}
