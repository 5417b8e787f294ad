use std::sync::Arc;

use ddlcache_catalog::{CatalogSnapshot, SchemaVersion};
use ddlcache_id::{TableId, TxnId};
use tracing::{debug, info};

use crate::{
    error::{Result, TxnError},
    fence::{SchemaFencer, TransactionSnapshot},
    sink::{RowSink, RowWrite},
};

/// An optimistic transaction.
///
/// The transaction resolves tables against the catalog snapshot it began with and buffers its
/// writes. Nothing reaches the [`RowSink`] until [`commit`][Transaction::commit] has passed the
/// schema fence.
#[derive(Debug)]
pub struct Transaction {
    fence: TransactionSnapshot,
    catalog: Arc<CatalogSnapshot>,
    writes: Vec<RowWrite>,
}

/// A committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub txn_id: TxnId,
    /// Schema version the commit was checked against
    pub schema_version: SchemaVersion,
    pub rows: usize,
}

impl Transaction {
    pub fn begin(txn_id: TxnId, catalog: Arc<CatalogSnapshot>) -> Self {
        debug!(%txn_id, start_version = %catalog.version(), "begin transaction");
        Self {
            fence: TransactionSnapshot::new(txn_id, catalog.version()),
            catalog,
            writes: vec![],
        }
    }

    pub fn id(&self) -> TxnId {
        self.fence.txn_id
    }

    pub fn start_version(&self) -> SchemaVersion {
        self.fence.start_version
    }

    /// The catalog as of the start of the transaction
    pub fn catalog(&self) -> &Arc<CatalogSnapshot> {
        &self.catalog
    }

    pub fn snapshot(&self) -> &TransactionSnapshot {
        &self.fence
    }

    pub fn record_read(&mut self, table_id: TableId) {
        self.fence.touch(table_id);
    }

    pub fn insert(&mut self, table_id: TableId, payload: impl Into<Arc<str>>) {
        self.fence.touch(table_id);
        self.writes.push(RowWrite {
            table_id,
            payload: payload.into(),
        });
    }

    pub fn pending_writes(&self) -> &[RowWrite] {
        &self.writes
    }

    /// Fence the transaction and, if admitted, hand its writes to `sink`.
    ///
    /// On [`TxnError::InfoSchemaChanged`] every buffered write is discarded.
    pub async fn commit(self, fencer: &SchemaFencer, sink: &dyn RowSink) -> Result<CommitInfo> {
        let txn_id = self.id();
        let schema_version = fencer.check(&self.fence)?;
        let rows = self.writes.len();
        if rows > 0 {
            sink.write_rows(txn_id, self.writes)
                .await
                .map_err(|source| TxnError::Sink { txn_id, source })?;
        }
        info!(%txn_id, %schema_version, rows, "transaction committed");
        Ok(CommitInfo {
            txn_id,
            schema_version,
            rows,
        })
    }

    /// Discard the transaction, returning how many buffered writes were dropped.
    pub fn rollback(self) -> usize {
        debug!(txn_id = %self.id(), rows = self.writes.len(), "rollback transaction");
        self.writes.len()
    }
}
