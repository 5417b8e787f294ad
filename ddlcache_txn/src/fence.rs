//! Commit-time schema fencing for optimistic transactions.
//!
//! A transaction records the schema version it started at and every table it touched. At
//! commit, the changes in `(start, current]` are scanned: if any of them hit a touched table
//! the transaction aborts, otherwise it commits regardless of how far the version has moved.

use std::{collections::BTreeSet, sync::Arc};

use ddlcache_catalog::{Catalog, SchemaVersion, log::ChangeRange};
use ddlcache_id::{TableId, TxnId};
use tracing::debug;

use crate::error::{Result, TxnError};

/// What a transaction has observed so far, for fencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSnapshot {
    pub txn_id: TxnId,
    pub start_version: SchemaVersion,
    related_tables: BTreeSet<TableId>,
}

impl TransactionSnapshot {
    pub fn new(txn_id: TxnId, start_version: SchemaVersion) -> Self {
        Self {
            txn_id,
            start_version,
            related_tables: BTreeSet::new(),
        }
    }

    /// Record that the transaction read or wrote `table_id`
    pub fn touch(&mut self, table_id: TableId) {
        self.related_tables.insert(table_id);
    }

    pub fn touches(&self, table_id: TableId) -> bool {
        self.related_tables.contains(&table_id)
    }

    pub fn related_tables(&self) -> impl Iterator<Item = TableId> + '_ {
        self.related_tables.iter().copied()
    }
}

/// Decide whether `txn` may commit given the schema changes made since it started.
pub fn check_schema_changes(
    txn: &TransactionSnapshot,
    current: SchemaVersion,
    changes: ChangeRange,
) -> Result<()> {
    let changes = match changes {
        ChangeRange::Complete(changes) => changes,
        ChangeRange::Truncated { oldest_retained } => {
            debug!(
                txn_id = %txn.txn_id,
                start = %txn.start_version,
                ?oldest_retained,
                "schema changes since transaction start are no longer retained"
            );
            return Err(TxnError::InfoSchemaChanged {
                start: txn.start_version,
                current,
                tables: vec![],
            });
        }
    };
    let mut conflicts: Vec<TableId> = changes
        .iter()
        .filter_map(|change| change.table_id)
        .filter(|table_id| txn.touches(*table_id))
        .collect();
    if conflicts.is_empty() {
        return Ok(());
    }
    conflicts.sort();
    conflicts.dedup();
    debug!(
        txn_id = %txn.txn_id,
        start = %txn.start_version,
        %current,
        ?conflicts,
        "transaction fenced by schema change"
    );
    Err(TxnError::InfoSchemaChanged {
        start: txn.start_version,
        current,
        tables: conflicts,
    })
}

#[derive(Debug, Clone)]
pub struct SchemaFencer {
    catalog: Arc<Catalog>,
}

impl SchemaFencer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Check `txn` against the latest schema version, returning the version it was admitted at.
    pub fn check(&self, txn: &TransactionSnapshot) -> Result<SchemaVersion> {
        let current = self.catalog.current_version();
        if current <= txn.start_version {
            return Ok(current);
        }
        check_schema_changes(
            txn,
            current,
            self.catalog.changes_between(txn.start_version, current),
        )?;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use ddlcache_catalog::{
        ErrorKind,
        log::{SchemaChange, SchemaChangeAction},
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn change(version: u64, table: Option<u32>) -> SchemaChange {
        SchemaChange {
            version: SchemaVersion::new(version),
            table_id: table.map(TableId::from),
            action: SchemaChangeAction::EnableCache,
        }
    }

    fn txn_touching(start: u64, tables: &[u32]) -> TransactionSnapshot {
        let mut txn = TransactionSnapshot::new(TxnId::from(1), SchemaVersion::new(start));
        for t in tables {
            txn.touch(TableId::from(*t));
        }
        txn
    }

    #[test]
    fn disjoint_changes_do_not_abort() {
        let txn = txn_touching(3, &[1]);
        let changes = ChangeRange::Complete(vec![change(4, Some(2)), change(5, None)]);
        check_schema_changes(&txn, SchemaVersion::new(5), changes).unwrap();
    }

    #[test]
    fn overlapping_change_aborts() {
        let txn = txn_touching(3, &[1, 2]);
        let changes = ChangeRange::Complete(vec![
            change(4, Some(2)),
            change(5, Some(9)),
            change(6, Some(2)),
        ]);
        let err = check_schema_changes(&txn, SchemaVersion::new(6), changes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfoSchemaChanged);
        let TxnError::InfoSchemaChanged { tables, .. } = err else {
            panic!("unexpected error");
        };
        assert_eq!(tables, vec![TableId::from(2)]);
    }

    #[test]
    fn truncated_history_aborts() {
        let txn = txn_touching(1, &[]);
        let err = check_schema_changes(
            &txn,
            SchemaVersion::new(100),
            ChangeRange::Truncated {
                oldest_retained: Some(SchemaVersion::new(50)),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfoSchemaChanged);
    }

    proptest! {
        #[test]
        fn aborts_exactly_on_overlap(
            touched in proptest::collection::btree_set(0u32..8, 0..4),
            changed in proptest::collection::vec(proptest::option::of(0u32..8), 0..8),
        ) {
            let txn = txn_touching(10, &touched.iter().copied().collect::<Vec<_>>());
            let changes: Vec<_> = changed
                .iter()
                .enumerate()
                .map(|(i, t)| change(11 + i as u64, *t))
                .collect();
            let current = SchemaVersion::new(10 + changes.len() as u64);
            let overlaps = changed.iter().flatten().any(|t| touched.contains(t));
            let result = check_schema_changes(&txn, current, ChangeRange::Complete(changes));
            prop_assert_eq!(result.is_err(), overlaps);
        }
    }
}
