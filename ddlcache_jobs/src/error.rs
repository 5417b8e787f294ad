use std::time::Duration;

use ddlcache_catalog::{CatalogError, ErrorKind};
use ddlcache_id::JobId;

use crate::job::JobState;

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    /// The request failed admission checks and no job was created
    #[error(transparent)]
    Rejected(CatalogError),

    #[error(transparent)]
    Failed(CatalogError),

    #[error("DDL job {0} was cancelled")]
    Cancelled(JobId),

    #[error("DDL wait timeout: job {job_id} did not finish within {timeout:?}")]
    WaitTimeout { job_id: JobId, timeout: Duration },

    #[error("DDL job {0} not found")]
    NotFound(JobId),

    #[error("DDL job {job_id} is {state} and can no longer be cancelled")]
    NotCancellable { job_id: JobId, state: JobState },

    #[error("DDL executor is shut down")]
    ShutDown,
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(e) | Self::Failed(e) => e.kind(),
            Self::Cancelled(_) => ErrorKind::JobCancelled,
            Self::WaitTimeout { .. } => ErrorKind::DdlWaitTimeout,
            Self::NotFound(_) | Self::NotCancellable { .. } | Self::ShutDown => ErrorKind::Internal,
        }
    }

    /// The catalog error behind a rejected or failed job
    pub fn catalog_error(&self) -> Option<&CatalogError> {
        match self {
            Self::Rejected(e) | Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = JobError> = std::result::Result<T, E>;
