//! Immutable, versioned views of the catalog.
//!
//! A [`CatalogSnapshot`] is never mutated in place: [`CatalogSnapshot::apply`] produces the
//! snapshot for the next version, and the catalog swaps the shared pointer. Readers that hold
//! an `Arc<CatalogSnapshot>` therefore see one consistent version for as long as they keep it.

use std::{collections::BTreeMap, sync::Arc};

use ddlcache_id::{DbId, TableId};
use hashbrown::HashMap;

use crate::{
    CatalogError, Result,
    log::{CatalogLog, CatalogOp},
    table::{CacheStatus, TableMeta},
    validate::{CacheAction, validate_alter_cache},
    version::SchemaVersion,
};

/// Lookup key for case-insensitive names
fn name_key(name: &str) -> Arc<str> {
    Arc::from(name.to_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub id: DbId,
    pub name: Arc<str>,
    tables: BTreeMap<TableId, Arc<TableMeta>>,
    table_names: HashMap<Arc<str>, TableId>,
}

impl DatabaseSchema {
    pub fn new(id: DbId, name: Arc<str>) -> Self {
        Self {
            id,
            name,
            tables: BTreeMap::new(),
            table_names: HashMap::new(),
        }
    }

    pub fn table_by_name(&self, name: &str) -> Option<Arc<TableMeta>> {
        self.table_names
            .get(name.to_ascii_lowercase().as_str())
            .and_then(|id| self.tables.get(id))
            .cloned()
    }

    pub fn table_by_id(&self, id: TableId) -> Option<Arc<TableMeta>> {
        self.tables.get(&id).cloned()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableMeta>> {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn insert_table(&mut self, table: TableMeta) -> Result<()> {
        let key = name_key(&table.name);
        if self.table_names.contains_key(&key) {
            return Err(CatalogError::TableAlreadyExists(Arc::clone(&table.name)));
        }
        self.table_names.insert(key, table.id);
        self.tables.insert(table.id, Arc::new(table));
        Ok(())
    }

    fn replace_table(&mut self, table: TableMeta) {
        self.tables.insert(table.id, Arc::new(table));
    }

    fn remove_table(&mut self, id: TableId) -> Option<Arc<TableMeta>> {
        let table = self.tables.remove(&id)?;
        self.table_names.remove(name_key(&table.name).as_ref());
        Some(table)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    version: SchemaVersion,
    databases: BTreeMap<DbId, Arc<DatabaseSchema>>,
    db_names: HashMap<Arc<str>, DbId>,
    table_dbs: HashMap<TableId, DbId>,
    next_db_id: DbId,
}

impl CatalogSnapshot {
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn next_db_id(&self) -> DbId {
        self.next_db_id
    }

    pub fn db_schema(&self, name: &str) -> Option<Arc<DatabaseSchema>> {
        self.db_names
            .get(name.to_ascii_lowercase().as_str())
            .and_then(|id| self.databases.get(id))
            .cloned()
    }

    pub fn db_schema_by_id(&self, id: DbId) -> Option<Arc<DatabaseSchema>> {
        self.databases.get(&id).cloned()
    }

    pub fn databases(&self) -> impl Iterator<Item = &Arc<DatabaseSchema>> {
        self.databases.values()
    }

    pub fn table_by_name(&self, db_name: &str, table_name: &str) -> Option<Arc<TableMeta>> {
        self.db_schema(db_name)?.table_by_name(table_name)
    }

    pub fn table_by_id(&self, id: TableId) -> Option<Arc<TableMeta>> {
        let db_id = self.table_dbs.get(&id)?;
        self.databases.get(db_id)?.table_by_id(id)
    }

    /// Like [`table_by_id`][Self::table_by_id], but a missing table is an error
    pub fn expect_table(&self, id: TableId) -> Result<Arc<TableMeta>> {
        self.table_by_id(id)
            .ok_or_else(|| CatalogError::unexpected(format!("table {id} is not in the catalog")))
    }

    /// Produce the snapshot that results from applying `log` on top of this one.
    ///
    /// `self` is left untouched. The log's version must directly follow this snapshot's.
    pub fn apply(&self, log: &CatalogLog) -> Result<Self> {
        if log.version != self.version.next() {
            return Err(CatalogError::unexpected(format!(
                "cannot apply catalog log {} on top of version {}",
                log.version, self.version
            )));
        }
        let mut next = self.clone();
        next.version = log.version;
        match &log.op {
            CatalogOp::CreateDatabase { db_id, db_name } => {
                let key = name_key(db_name);
                if next.db_names.contains_key(&key) {
                    return Err(CatalogError::DatabaseAlreadyExists(Arc::clone(db_name)));
                }
                next.db_names.insert(key, *db_id);
                next.databases.insert(
                    *db_id,
                    Arc::new(DatabaseSchema::new(*db_id, Arc::clone(db_name))),
                );
                next.next_db_id = next.next_db_id.max(db_id.next());
            }
            CatalogOp::CreateTable { table } => {
                if table.kind == crate::table::TableKind::LocalTemporary {
                    return Err(CatalogError::unexpected(format!(
                        "local temporary table {} cannot be published",
                        table.name
                    )));
                }
                let mut table = table.clone();
                table.schema_version = log.version;
                let db = next.db_mut(table.db_id)?;
                let (id, db_id) = (table.id, table.db_id);
                db.insert_table(table)?;
                next.table_dbs.insert(id, db_id);
            }
            CatalogOp::DropTable {
                db_id,
                table_id,
                table_name,
            } => {
                let db = next.db_mut(*db_id)?;
                if db.remove_table(*table_id).is_none() {
                    return Err(CatalogError::no_such_table(
                        Arc::clone(&db.name),
                        Arc::clone(table_name),
                    ));
                }
                next.table_dbs.remove(table_id);
            }
            CatalogOp::SetCacheStatus {
                db_id,
                table_id,
                status,
            } => {
                let mut table = next.table_for_update(*db_id, *table_id)?;
                if *status == CacheStatus::Enabled {
                    validate_alter_cache(
                        &table.db_name,
                        &table.name,
                        Some(&table),
                        CacheAction::Enable,
                    )?;
                }
                table.cache_status = *status;
                table.schema_version = log.version;
                next.db_mut(*db_id)?.replace_table(table);
            }
            CatalogOp::AlterIndexes {
                db_id,
                table_id,
                ops,
            } => {
                let current = next.table_for_update(*db_id, *table_id)?;
                let mut table = current.with_index_ops(ops)?;
                table.schema_version = log.version;
                next.db_mut(*db_id)?.replace_table(table);
            }
        }
        Ok(next)
    }

    fn db_mut(&mut self, db_id: DbId) -> Result<&mut DatabaseSchema> {
        self.databases
            .get_mut(&db_id)
            .map(Arc::make_mut)
            .ok_or_else(|| CatalogError::unexpected(format!("database {db_id} is not in the catalog")))
    }

    fn table_for_update(&self, db_id: DbId, table_id: TableId) -> Result<TableMeta> {
        self.databases
            .get(&db_id)
            .and_then(|db| db.table_by_id(table_id))
            .map(|table| table.as_ref().clone())
            .ok_or_else(|| {
                CatalogError::unexpected(format!(
                    "table {table_id} is not in database {db_id}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::table::{PartitionStrategy, TableKind, TableSpec};

    fn log(version: u64, op: CatalogOp) -> CatalogLog {
        CatalogLog {
            version: SchemaVersion::new(version),
            time_ns: 0,
            op,
        }
    }

    fn table(id: u32, name: &str, kind: TableKind) -> TableMeta {
        TableMeta::new(
            TableId::from(id),
            DbId::from(0),
            "test".into(),
            TableSpec::ordinary(name).with_kind(kind).with_column("a", "int"),
            SchemaVersion::default(),
        )
        .unwrap()
    }

    fn with_test_db() -> CatalogSnapshot {
        CatalogSnapshot::default()
            .apply(&log(
                1,
                CatalogOp::CreateDatabase {
                    db_id: DbId::from(0),
                    db_name: "test".into(),
                },
            ))
            .unwrap()
    }

    #[test]
    fn apply_leaves_previous_snapshot_untouched() {
        let v1 = with_test_db();
        let v2 = v1
            .apply(&log(
                2,
                CatalogOp::CreateTable {
                    table: table(7, "T1", TableKind::Ordinary),
                },
            ))
            .unwrap();
        let v3 = v2
            .apply(&log(
                3,
                CatalogOp::SetCacheStatus {
                    db_id: DbId::from(0),
                    table_id: TableId::from(7),
                    status: CacheStatus::Enabled,
                },
            ))
            .unwrap();

        assert!(v1.table_by_name("test", "t1").is_none());
        let before = v2.table_by_name("TEST", "t1").unwrap();
        assert_eq!(before.cache_status, CacheStatus::Disabled);
        assert_eq!(before.schema_version, SchemaVersion::new(2));

        let after = v3.table_by_id(TableId::from(7)).unwrap();
        assert_eq!(after.cache_status, CacheStatus::Enabled);
        assert_eq!(after.schema_version, SchemaVersion::new(3));
        assert_eq!(v3.version(), SchemaVersion::new(3));
    }

    #[test]
    fn enabling_cache_on_partitioned_table_is_refused() {
        let snapshot = with_test_db()
            .apply(&log(
                2,
                CatalogOp::CreateTable {
                    table: table(1, "p", TableKind::Partitioned(PartitionStrategy::Range)),
                },
            ))
            .unwrap();
        let err = snapshot
            .apply(&log(
                3,
                CatalogOp::SetCacheStatus {
                    db_id: DbId::from(0),
                    table_id: TableId::from(1),
                    status: CacheStatus::Enabled,
                },
            ))
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedOperationOnCacheTable(_)));
    }

    #[test]
    fn out_of_order_log_is_rejected() {
        let err = with_test_db()
            .apply(&log(
                5,
                CatalogOp::CreateDatabase {
                    db_id: DbId::from(1),
                    db_name: "other".into(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unexpected(_)));
    }

    #[test]
    fn drop_table_frees_the_name() {
        let snapshot = with_test_db()
            .apply(&log(
                2,
                CatalogOp::CreateTable {
                    table: table(1, "t", TableKind::Ordinary),
                },
            ))
            .unwrap()
            .apply(&log(
                3,
                CatalogOp::DropTable {
                    db_id: DbId::from(0),
                    table_id: TableId::from(1),
                    table_name: "t".into(),
                },
            ))
            .unwrap();
        assert!(snapshot.table_by_name("test", "t").is_none());
        assert!(snapshot.table_by_id(TableId::from(1)).is_none());
        snapshot
            .apply(&log(
                4,
                CatalogOp::CreateTable {
                    table: table(2, "t", TableKind::Ordinary),
                },
            ))
            .unwrap();
    }
}
