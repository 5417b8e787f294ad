use std::sync::Arc;

use async_trait::async_trait;
use ddlcache_id::{TableId, TxnId};
use parking_lot::Mutex;

use crate::error::RowSinkError;

/// A buffered row, handed to the [`RowSink`] once its transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWrite {
    pub table_id: TableId,
    pub payload: Arc<str>,
}

/// Where committed rows go. Implemented by the storage layer.
#[async_trait]
pub trait RowSink: std::fmt::Debug + Send + Sync + 'static {
    async fn write_rows(&self, txn_id: TxnId, rows: Vec<RowWrite>) -> Result<(), RowSinkError>;
}

/// Keeps committed rows in memory.
#[derive(Debug, Default)]
pub struct MemoryRowSink {
    rows: Mutex<Vec<(TxnId, RowWrite)>>,
}

impl MemoryRowSink {
    pub fn rows_for(&self, table_id: TableId) -> Vec<Arc<str>> {
        self.rows
            .lock()
            .iter()
            .filter(|(_, row)| row.table_id == table_id)
            .map(|(_, row)| Arc::clone(&row.payload))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl RowSink for MemoryRowSink {
    async fn write_rows(&self, txn_id: TxnId, rows: Vec<RowWrite>) -> Result<(), RowSinkError> {
        self.rows
            .lock()
            .extend(rows.into_iter().map(|row| (txn_id, row)));
        Ok(())
    }
}
