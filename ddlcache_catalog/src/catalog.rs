//! The versioned table metadata store.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use ddlcache_id::{TableId, TableIdAllocator};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    CatalogError, Result,
    channel::{SchemaNotifier, SchemaUpdate, SchemaUpdateReceiver},
    guard::{StructuralChange, check_structural_change},
    log::{CatalogLog, CatalogOp, ChangeRange, SchemaChange, SchemaChangeLog},
    snapshot::CatalogSnapshot,
    store::{CatalogStore, PersistCatalogResult},
    table::{IndexOp, TableKind, TableMeta, TableRef, TableSpec},
    validate::{CacheAction, validate_alter_cache},
    version::{SchemaVersion, SchemaVersionManager},
};

/// Default duration within which every node must have observed a new schema version
pub const DEFAULT_SCHEMA_LEASE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogArgs {
    pub schema_lease: Duration,
    /// How many schema changes are retained for fencing transactions
    pub max_schema_changes: usize,
}

impl Default for CatalogArgs {
    fn default() -> Self {
        Self {
            schema_lease: DEFAULT_SCHEMA_LEASE,
            max_schema_changes: SchemaChangeLog::DEFAULT_CAPACITY,
        }
    }
}

/// What a successful DDL commit produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub version: SchemaVersion,
    pub change: SchemaChange,
}

/// The cluster catalog.
///
/// Every mutation goes through [`commit`][Catalog::commit], which runs under a single write
/// permit: build the catalog op from the latest snapshot, persist it as the next version, then
/// publish the new snapshot, the schema change and the version together. Readers never take the
/// permit; they clone the current `Arc<CatalogSnapshot>` and work against that.
#[derive(Debug)]
pub struct Catalog {
    store: CatalogStore,
    versions: SchemaVersionManager,
    state: RwLock<Arc<CatalogSnapshot>>,
    changes: RwLock<SchemaChangeLog>,
    table_ids: TableIdAllocator,
    notifier: Arc<tokio::sync::RwLock<SchemaNotifier>>,
    write_permit: tokio::sync::Mutex<()>,
    args: CatalogArgs,
}

impl Catalog {
    /// An empty catalog writing to `store`. Use [`load`][Self::load] to resume from an existing
    /// store.
    pub fn new(store: CatalogStore, args: CatalogArgs) -> Self {
        Self {
            store,
            versions: SchemaVersionManager::default(),
            state: RwLock::new(Arc::new(CatalogSnapshot::default())),
            changes: RwLock::new(SchemaChangeLog::new(args.max_schema_changes)),
            table_ids: TableIdAllocator::default(),
            notifier: Default::default(),
            write_permit: tokio::sync::Mutex::new(()),
            args,
        }
    }

    pub fn new_in_memory() -> Self {
        Self::new(CatalogStore::in_memory(), CatalogArgs::default())
    }

    /// Rebuild the catalog by replaying every log persisted in `store`.
    pub async fn load(store: CatalogStore, args: CatalogArgs) -> Result<Self> {
        let catalog = Self::new(store, args);
        let version = catalog.update_from_store().await?;
        info!(%version, "loaded catalog from store");
        Ok(catalog)
    }

    pub fn args(&self) -> CatalogArgs {
        self.args
    }

    pub fn schema_lease(&self) -> Duration {
        self.args.schema_lease
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.versions.current()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.state.read())
    }

    pub fn table_by_name(&self, db_name: &str, table_name: &str) -> Option<Arc<TableMeta>> {
        self.snapshot().table_by_name(db_name, table_name)
    }

    pub fn table_by_id(&self, id: TableId) -> Option<Arc<TableMeta>> {
        self.snapshot().table_by_id(id)
    }

    /// Schema changes with a version in `(after, up_to]`
    pub fn changes_between(&self, after: SchemaVersion, up_to: SchemaVersion) -> ChangeRange {
        self.changes.read().between(after, up_to)
    }

    /// Reserve a table id without publishing a table, for session-private tables
    pub fn allocate_table_id(&self) -> TableId {
        self.table_ids.allocate()
    }

    pub async fn subscribe(&self, name: impl Into<Arc<str>> + Send) -> SchemaUpdateReceiver {
        self.notifier.write().await.subscribe(name.into())
    }

    pub async fn create_database(&self, name: &str) -> Result<CommitOutcome> {
        info!(name, "create database");
        self.commit(|snapshot| {
            if snapshot.db_schema(name).is_some() {
                return Err(CatalogError::DatabaseAlreadyExists(name.into()));
            }
            Ok(CatalogOp::CreateDatabase {
                db_id: snapshot.next_db_id(),
                db_name: name.into(),
            })
        })
        .await
    }

    pub async fn create_table(&self, db_name: &str, spec: TableSpec) -> Result<CommitOutcome> {
        info!(db_name, table_name = %spec.name, kind = spec.kind.as_str(), "create table");
        self.commit(|snapshot| {
            if spec.kind == TableKind::LocalTemporary {
                return Err(CatalogError::unexpected(
                    "local temporary tables are owned by their session",
                ));
            }
            let db = snapshot
                .db_schema(db_name)
                .ok_or_else(|| CatalogError::DatabaseNotFound(db_name.into()))?;
            if db.table_by_name(&spec.name).is_some() {
                return Err(CatalogError::TableAlreadyExists(Arc::clone(&spec.name)));
            }
            let table = TableMeta::new(
                self.table_ids.allocate(),
                db.id,
                Arc::clone(&db.name),
                spec,
                snapshot.version().next(),
            )?;
            Ok(CatalogOp::CreateTable { table })
        })
        .await
    }

    pub async fn create_view(
        &self,
        db_name: &str,
        view_name: &str,
        definition: &str,
    ) -> Result<CommitOutcome> {
        let mut spec = TableSpec::ordinary(view_name).with_kind(TableKind::View);
        spec.view_definition = Some(definition.into());
        self.create_table(db_name, spec).await
    }

    pub async fn drop_table(&self, table: &TableRef) -> Result<CommitOutcome> {
        info!(%table, table_id = %table.table_id, "drop table");
        self.commit(|snapshot| {
            let meta = resolve(snapshot, table)?;
            Ok(CatalogOp::DropTable {
                db_id: meta.db_id,
                table_id: meta.id,
                table_name: Arc::clone(&meta.name),
            })
        })
        .await
    }

    /// Set the cache status of `table`. The admission checks run again against the snapshot the
    /// change is built from, so a table altered since the request was validated is re-judged.
    pub async fn set_cache_status(
        &self,
        table: &TableRef,
        action: CacheAction,
    ) -> Result<CommitOutcome> {
        info!(%table, table_id = %table.table_id, %action, "alter table cache status");
        self.commit(|snapshot| {
            let meta = snapshot.table_by_id(table.table_id);
            validate_alter_cache(&table.db_name, &table.table_name, meta.as_deref(), action)?;
            let meta = resolve(snapshot, table)?;
            Ok(CatalogOp::SetCacheStatus {
                db_id: meta.db_id,
                table_id: meta.id,
                status: action.target_status(),
            })
        })
        .await
    }

    /// Apply all of `ops` to `table` as one schema change, or none of them.
    pub async fn alter_indexes(
        &self,
        table: &TableRef,
        ops: Vec<IndexOp>,
        change: StructuralChange,
    ) -> Result<CommitOutcome> {
        info!(%table, table_id = %table.table_id, operation = change.operation(), "alter indexes");
        self.commit(|snapshot| {
            let meta = resolve(snapshot, table)?;
            check_structural_change(&meta, change)?;
            meta.with_index_ops(&ops)?;
            Ok(CatalogOp::AlterIndexes {
                db_id: meta.db_id,
                table_id: meta.id,
                ops,
            })
        })
        .await
    }

    /// Catch up with logs that other writers have persisted to the store.
    pub async fn update_from_store(&self) -> Result<SchemaVersion> {
        let permit = self.write_permit.lock().await;
        let updates = self.load_and_update_from_store().await?;
        drop(permit);
        for update in updates {
            self.broadcast_update(update).await;
        }
        Ok(self.current_version())
    }

    async fn commit<F>(&self, build: F) -> Result<CommitOutcome>
    where
        F: FnOnce(&CatalogSnapshot) -> Result<CatalogOp> + Send,
    {
        let permit = self.write_permit.lock().await;
        let snapshot = self.snapshot();
        let op = build(&snapshot)?;
        let log = CatalogLog {
            version: self.versions.upcoming(),
            time_ns: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            op,
        };
        let next = snapshot.apply(&log)?;
        match self
            .store
            .persist_log(&log)
            .await
            .inspect_err(|error| debug!(?error, "failed on persist of next catalog log"))?
        {
            PersistCatalogResult::Success => {}
            PersistCatalogResult::AlreadyExists => {
                let updates = self.load_and_update_from_store().await?;
                drop(permit);
                for update in updates {
                    self.broadcast_update(update).await;
                }
                warn!(attempted = %log.version, "catalog version claimed by another writer");
                return Err(CatalogError::WriteConflict {
                    attempted: log.version,
                });
            }
        }
        let update = self.publish(&log, next);
        drop(permit);

        let outcome = CommitOutcome {
            version: update.version,
            change: update.change,
        };
        info!(version = %outcome.version, action = ?outcome.change.action, "committed schema change");
        self.broadcast_update(update).await;
        Ok(outcome)
    }

    /// Make `next` visible. Must be called with the write permit held.
    fn publish(&self, log: &CatalogLog, next: CatalogSnapshot) -> Arc<SchemaUpdate> {
        let change = log.schema_change();
        if let CatalogOp::CreateTable { table } = &log.op {
            self.table_ids.observe(table.id);
        }
        let table = change.table_id.and_then(|id| next.table_by_id(id));
        self.changes.write().push(change);
        *self.state.write() = Arc::new(next);
        self.versions.bump(log.version);
        Arc::new(SchemaUpdate {
            version: log.version,
            change,
            table,
        })
    }

    /// Must be called with the write permit held.
    async fn load_and_update_from_store(&self) -> Result<Vec<Arc<SchemaUpdate>>> {
        let logs = self
            .store
            .load_logs_after(self.current_version())
            .await
            .inspect_err(|error| debug!(?error, "failed to fetch catalog logs"))?;
        let mut updates = Vec::with_capacity(logs.len());
        for log in logs {
            let next = self.snapshot().apply(&log)?;
            debug!(version = %log.version, "applied catalog log from store");
            updates.push(self.publish(&log, next));
        }
        Ok(updates)
    }

    async fn broadcast_update(&self, update: Arc<SchemaUpdate>) {
        let version = update.version;
        let notifier = self.notifier.read().await;
        if notifier.is_empty() {
            return;
        }
        if let Err(error) = notifier.notify(update, self.args.schema_lease).await {
            warn!(%error, %version, "schema update not acknowledged by every node");
        }
    }
}

fn resolve(snapshot: &CatalogSnapshot, table: &TableRef) -> Result<Arc<TableMeta>> {
    snapshot.table_by_id(table.table_id).ok_or_else(|| {
        CatalogError::no_such_table(Arc::clone(&table.db_name), Arc::clone(&table.table_name))
    })
}
