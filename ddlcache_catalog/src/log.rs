//! The catalog log: one record per schema version, and the in-memory schema change log that
//! transactions are fenced against.

use std::{collections::VecDeque, sync::Arc};

use ddlcache_id::{DbId, TableId};
use serde::{Deserialize, Serialize};

use crate::{
    table::{CacheStatus, IndexOp, TableMeta},
    version::SchemaVersion,
};

/// A single catalog mutation. Each successful DDL job persists exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogOp {
    CreateDatabase {
        db_id: DbId,
        db_name: Arc<str>,
    },
    CreateTable {
        table: TableMeta,
    },
    DropTable {
        db_id: DbId,
        table_id: TableId,
        table_name: Arc<str>,
    },
    SetCacheStatus {
        db_id: DbId,
        table_id: TableId,
        status: CacheStatus,
    },
    AlterIndexes {
        db_id: DbId,
        table_id: TableId,
        ops: Vec<IndexOp>,
    },
}

impl CatalogOp {
    /// The table whose definition this op changes, if any
    pub fn table_id(&self) -> Option<TableId> {
        match self {
            Self::CreateDatabase { .. } => None,
            Self::CreateTable { table } => Some(table.id),
            Self::DropTable { table_id, .. }
            | Self::SetCacheStatus { table_id, .. }
            | Self::AlterIndexes { table_id, .. } => Some(*table_id),
        }
    }

    pub fn action(&self) -> SchemaChangeAction {
        match self {
            Self::CreateDatabase { .. } => SchemaChangeAction::CreateDatabase,
            Self::CreateTable { .. } => SchemaChangeAction::CreateTable,
            Self::DropTable { .. } => SchemaChangeAction::DropTable,
            Self::SetCacheStatus {
                status: CacheStatus::Enabled,
                ..
            } => SchemaChangeAction::EnableCache,
            Self::SetCacheStatus {
                status: CacheStatus::Disabled,
                ..
            } => SchemaChangeAction::DisableCache,
            Self::AlterIndexes { .. } => SchemaChangeAction::AlterIndexes,
        }
    }
}

/// A [`CatalogOp`] stamped with the version it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLog {
    pub version: SchemaVersion,
    pub time_ns: i64,
    pub op: CatalogOp,
}

impl CatalogLog {
    pub fn schema_change(&self) -> SchemaChange {
        SchemaChange {
            version: self.version,
            table_id: self.op.table_id(),
            action: self.op.action(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaChangeAction {
    CreateDatabase,
    CreateTable,
    DropTable,
    EnableCache,
    DisableCache,
    AlterIndexes,
}

/// The fencing view of a catalog version: which table it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaChange {
    pub version: SchemaVersion,
    pub table_id: Option<TableId>,
    pub action: SchemaChangeAction,
}

/// Result of a range query over the [`SchemaChangeLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRange {
    /// Every change in the requested range, in version order
    Complete(Vec<SchemaChange>),
    /// Part of the requested range has already been evicted
    Truncated { oldest_retained: Option<SchemaVersion> },
}

/// Append-only, bounded log of [`SchemaChange`]s indexed by version.
#[derive(Debug)]
pub struct SchemaChangeLog {
    changes: VecDeque<SchemaChange>,
    capacity: usize,
}

impl SchemaChangeLog {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            changes: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, change: SchemaChange) {
        if let Some(last) = self.changes.back() {
            assert_eq!(
                last.version.next(),
                change.version,
                "schema change appended out of order"
            );
        }
        if self.changes.len() == self.capacity {
            self.changes.pop_front();
        }
        self.changes.push_back(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// All changes with a version in `(after, up_to]`.
    pub fn between(&self, after: SchemaVersion, up_to: SchemaVersion) -> ChangeRange {
        if up_to <= after {
            return ChangeRange::Complete(vec![]);
        }
        let oldest_retained = self.changes.front().map(|c| c.version);
        match oldest_retained {
            Some(oldest) if oldest <= after.next() => {}
            _ => return ChangeRange::Truncated { oldest_retained },
        }
        let start = self.changes.partition_point(|c| c.version <= after);
        let changes = self
            .changes
            .iter()
            .skip(start)
            .take_while(|c| c.version <= up_to)
            .copied()
            .collect();
        ChangeRange::Complete(changes)
    }
}

impl Default for SchemaChangeLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn change(version: u64, table: u32) -> SchemaChange {
        SchemaChange {
            version: SchemaVersion::new(version),
            table_id: Some(TableId::from(table)),
            action: SchemaChangeAction::EnableCache,
        }
    }

    #[test]
    fn range_is_exclusive_of_start() {
        let mut log = SchemaChangeLog::new(16);
        for v in 1..=5 {
            log.push(change(v, v as u32 * 10));
        }
        let ChangeRange::Complete(changes) =
            log.between(SchemaVersion::new(2), SchemaVersion::new(4))
        else {
            panic!("expected complete range");
        };
        assert_eq!(
            changes.iter().map(|c| c.version.get()).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert_eq!(
            log.between(SchemaVersion::new(5), SchemaVersion::new(5)),
            ChangeRange::Complete(vec![])
        );
    }

    #[test]
    fn evicted_range_is_reported_as_truncated() {
        let mut log = SchemaChangeLog::new(3);
        for v in 1..=6 {
            log.push(change(v, 1));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.between(SchemaVersion::new(1), SchemaVersion::new(6)),
            ChangeRange::Truncated {
                oldest_retained: Some(SchemaVersion::new(4))
            }
        );
        // the retained window is still queryable
        assert!(matches!(
            log.between(SchemaVersion::new(3), SchemaVersion::new(6)),
            ChangeRange::Complete(c) if c.len() == 3
        ));
    }

    #[test]
    #[should_panic(expected = "schema change appended out of order")]
    fn gaps_are_rejected() {
        let mut log = SchemaChangeLog::default();
        log.push(change(1, 1));
        log.push(change(3, 1));
    }

    proptest! {
        #[test]
        fn range_matches_linear_scan(
            total in 1u64..64,
            capacity in 1usize..64,
            after in 0u64..64,
            len in 0u64..64,
        ) {
            let mut log = SchemaChangeLog::new(capacity);
            for v in 1..=total {
                log.push(change(v, (v % 7) as u32));
            }
            let up_to = (after + len).min(total);
            match log.between(SchemaVersion::new(after), SchemaVersion::new(up_to)) {
                ChangeRange::Complete(changes) => {
                    let expected: Vec<u64> = (after + 1..=up_to).collect();
                    prop_assert_eq!(
                        changes.iter().map(|c| c.version.get()).collect::<Vec<_>>(),
                        expected
                    );
                }
                ChangeRange::Truncated { oldest_retained } => {
                    let oldest = oldest_retained.map(|v| v.get()).unwrap_or(u64::MAX);
                    prop_assert!(up_to > after);
                    prop_assert!(oldest > after + 1);
                }
            }
        }
    }
}
