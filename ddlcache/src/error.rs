use ddlcache_catalog::{CatalogError, ErrorKind};
use ddlcache_jobs::JobError;
use ddlcache_sql::ParseError;
use ddlcache_txn::TxnError;

/// An error returned to the client of a [`Session`](crate::Session).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("You have an error in your SQL syntax: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Txn(#[from] TxnError),

    #[error("No database selected")]
    NoDatabaseSelected,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Catalog(e) => e.kind(),
            Self::Job(e) => e.kind(),
            Self::Txn(e) => e.kind(),
            Self::NoDatabaseSelected => ErrorKind::NoDatabaseSelected,
        }
    }

    /// The MySQL-compatible error number for this error.
    pub fn code(&self) -> u16 {
        self.kind().code()
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
