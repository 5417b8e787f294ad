//! Structural DDL on cached tables.
//!
//! A table with cache enabled has its index set frozen: every structural statement against it
//! is refused as a whole, however many clauses it carries.

use std::sync::Arc;

use tracing::debug;

use crate::{CatalogError, Result, table::TableKind, table::TableMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StructuralChange {
    CreateIndex,
    AddIndex,
    DropIndex,
    RenameIndex,
    /// A statement that combines several index clauses
    AlterIndexes,
}

impl StructuralChange {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateIndex => "create index",
            Self::AddIndex => "add index",
            Self::DropIndex => "drop index",
            Self::RenameIndex => "rename index",
            Self::AlterIndexes => "alter table",
        }
    }
}

pub fn check_structural_change(table: &TableMeta, change: StructuralChange) -> Result<()> {
    if table.kind == TableKind::View {
        return Err(CatalogError::WrongObjectType {
            db_name: Arc::clone(&table.db_name),
            table_name: Arc::clone(&table.name),
            expected: "BASE TABLE",
        });
    }
    if table.is_cached() {
        debug!(
            table_id = %table.id,
            operation = change.operation(),
            "structural change rejected on cached table"
        );
        return Err(CatalogError::UnsupportedOperationOnCacheTable(
            change.operation(),
        ));
    }
    Ok(())
}
