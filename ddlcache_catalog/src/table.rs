//! Catalog entries for tables and their indexes.

use std::sync::Arc;

use ddlcache_id::{DbId, IndexId, TableId};
use serde::{Deserialize, Serialize};

use crate::{CatalogError, Result, version::SchemaVersion};

/// Name used for the primary key index, which is never user-named.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionStrategy {
    Hash,
    Range,
    List,
}

/// The kind of a table is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Ordinary,
    View,
    Partitioned(PartitionStrategy),
    /// Session-private; never published to the cluster catalog
    LocalTemporary,
    /// Catalog-visible cluster-wide, rows are private to each transaction
    GlobalTemporary,
}

impl TableKind {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::LocalTemporary | Self::GlobalTemporary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::View => "view",
            Self::Partitioned(PartitionStrategy::Hash) => "hash partitioned",
            Self::Partitioned(PartitionStrategy::Range) => "range partitioned",
            Self::Partitioned(PartitionStrategy::List) => "list partitioned",
            Self::LocalTemporary => "local temporary",
            Self::GlobalTemporary => "global temporary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheStatus {
    #[default]
    Disabled,
    Enabled,
}

impl CacheStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: Arc<str>,
    pub data_type: Arc<str>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<Arc<str>>, data_type: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    Primary,
    Unique,
    Plain,
}

/// A requested index, before the catalog assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: Option<Arc<str>>,
    pub columns: Vec<Arc<str>>,
    pub kind: IndexKind,
}

impl IndexSpec {
    pub fn new(
        name: Option<impl Into<Arc<str>>>,
        columns: impl IntoIterator<Item = impl Into<Arc<str>>>,
        kind: IndexKind,
    ) -> Self {
        Self {
            name: name.map(Into::into),
            columns: columns.into_iter().map(Into::into).collect(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub id: IndexId,
    pub name: Arc<str>,
    pub columns: Vec<Arc<str>>,
    pub kind: IndexKind,
}

/// One clause of an index alteration. A statement may carry several, which are applied
/// together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOp {
    Add(IndexSpec),
    Drop { name: Arc<str> },
    Rename { from: Arc<str>, to: Arc<str> },
}

/// Definition of a table requested by `CREATE TABLE` or `CREATE VIEW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: Arc<str>,
    pub kind: TableKind,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexSpec>,
    pub view_definition: Option<Arc<str>>,
}

impl TableSpec {
    pub fn ordinary(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Ordinary,
            columns: vec![],
            indexes: vec![],
            view_definition: None,
        }
    }

    pub fn with_kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_column(
        mut self,
        name: impl Into<Arc<str>>,
        data_type: impl Into<Arc<str>>,
    ) -> Self {
        self.columns.push(ColumnDefinition::new(name, data_type));
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A table as named by a statement, together with the id it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub db_name: Arc<str>,
    pub table_name: Arc<str>,
    pub table_id: TableId,
}

impl TableRef {
    pub fn of(table: &TableMeta) -> Self {
        Self {
            db_name: Arc::clone(&table.db_name),
            table_name: Arc::clone(&table.name),
            table_id: table.id,
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db_name, self.table_name)
    }
}

/// The catalog entry for a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: TableId,
    pub db_id: DbId,
    pub db_name: Arc<str>,
    pub name: Arc<str>,
    pub kind: TableKind,
    pub cache_status: CacheStatus,
    /// Version at which the current definition became effective
    pub schema_version: SchemaVersion,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
    pub view_definition: Option<Arc<str>>,
    next_index_id: IndexId,
}

impl TableMeta {
    pub fn new(
        id: TableId,
        db_id: DbId,
        db_name: Arc<str>,
        spec: TableSpec,
        schema_version: SchemaVersion,
    ) -> Result<Self> {
        let mut table = Self {
            id,
            db_id,
            db_name,
            name: spec.name,
            kind: spec.kind,
            cache_status: CacheStatus::Disabled,
            schema_version,
            columns: spec.columns,
            indexes: vec![],
            view_definition: spec.view_definition,
            next_index_id: IndexId::default(),
        };
        for index in spec.indexes {
            table.add_index(index)?;
        }
        Ok(table)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes
            .iter()
            .find(|idx| idx.name.eq_ignore_ascii_case(name))
    }

    pub fn index_names(&self) -> Vec<Arc<str>> {
        self.indexes.iter().map(|idx| Arc::clone(&idx.name)).collect()
    }

    pub fn is_cached(&self) -> bool {
        self.cache_status.is_enabled()
    }

    /// Produce a copy of this table with `ops` applied in order.
    ///
    /// Either every op applies or an error is returned and `self` is untouched.
    pub fn with_index_ops(&self, ops: &[IndexOp]) -> Result<Self> {
        let mut table = self.clone();
        for op in ops {
            match op {
                IndexOp::Add(spec) => table.add_index(spec.clone())?,
                IndexOp::Drop { name } => {
                    let Some(pos) = table
                        .indexes
                        .iter()
                        .position(|idx| idx.name.eq_ignore_ascii_case(name))
                    else {
                        return Err(table.index_not_found(name));
                    };
                    table.indexes.remove(pos);
                }
                IndexOp::Rename { from, to } => {
                    if !from.eq_ignore_ascii_case(to) && table.index(to).is_some() {
                        return Err(CatalogError::IndexAlreadyExists(Arc::clone(to)));
                    }
                    let Some(pos) = table
                        .indexes
                        .iter()
                        .position(|idx| idx.name.eq_ignore_ascii_case(from))
                    else {
                        return Err(table.index_not_found(from));
                    };
                    table.indexes[pos].name = Arc::clone(to);
                }
            }
        }
        Ok(table)
    }

    fn add_index(&mut self, spec: IndexSpec) -> Result<()> {
        let name = match (spec.kind, spec.name) {
            (IndexKind::Primary, _) => Arc::from(PRIMARY_KEY_NAME),
            (_, Some(name)) => name,
            (_, None) => self.generated_index_name(&spec.columns),
        };
        if self.index(&name).is_some() {
            return Err(CatalogError::IndexAlreadyExists(name));
        }
        let id = self.next_index_id;
        self.next_index_id = id.next();
        self.indexes.push(IndexDefinition {
            id,
            name,
            columns: spec.columns,
            kind: spec.kind,
        });
        Ok(())
    }

    /// Unnamed indexes take the name of their first column, suffixed on collision
    fn generated_index_name(&self, columns: &[Arc<str>]) -> Arc<str> {
        let base = columns.first().map(|c| c.as_ref()).unwrap_or("idx");
        if self.index(base).is_none() {
            return Arc::from(base);
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| self.index(candidate).is_none())
            .map(Arc::from)
            .unwrap_or_else(|| Arc::from(base))
    }

    fn index_not_found(&self, name: &Arc<str>) -> CatalogError {
        CatalogError::IndexNotFound {
            index_name: Arc::clone(name),
            table_name: Arc::clone(&self.name),
        }
    }
}
