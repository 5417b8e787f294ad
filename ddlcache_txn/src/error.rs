use ddlcache_catalog::{ErrorKind, SchemaVersion};
use ddlcache_id::{TableId, TxnId};

#[derive(Debug, thiserror::Error)]
#[error("error writing rows: {0:?}")]
pub struct RowSinkError(#[from] anyhow::Error);

#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error(
        "Information schema is changed during the execution of the statement \
        (schema version {start} -> {current}, changed tables {tables:?})"
    )]
    InfoSchemaChanged {
        start: SchemaVersion,
        current: SchemaVersion,
        /// Touched tables that changed; empty when the change history no longer reaches back
        /// to the start version
        tables: Vec<TableId>,
    },

    #[error("transaction {txn_id} failed to write rows")]
    Sink {
        txn_id: TxnId,
        #[source]
        source: RowSinkError,
    },
}

impl TxnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InfoSchemaChanged { .. } => ErrorKind::InfoSchemaChanged,
            Self::Sink { .. } => ErrorKind::Internal,
        }
    }
}

pub type Result<T, E = TxnError> = std::result::Result<T, E>;
