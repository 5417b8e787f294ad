//! Persistence of [`CatalogLog`] records to an object store.
//!
//! Every schema version is written to its own object, keyed by the zero-padded version so that
//! listing the prefix yields the logs in order. Writes use [`PutMode::Create`]: a second writer
//! racing for the same version loses with [`PersistCatalogResult::AlreadyExists`].

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload, memory::InMemory, path::Path};
use tracing::{debug, info};

use crate::{log::CatalogLog, version::SchemaVersion};

#[derive(Debug, thiserror::Error)]
pub enum CatalogStoreError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("failed to (de)serialize catalog log: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("catalog log at {path} holds version {found}, expected {expected}")]
    VersionMismatch {
        path: String,
        expected: SchemaVersion,
        found: SchemaVersion,
    },
}

type Result<T, E = CatalogStoreError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistCatalogResult {
    Success,
    AlreadyExists,
}

/// File extension for catalog log files
pub const CATALOG_LOG_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct CatalogStore {
    prefix: Arc<str>,
    store: Arc<dyn ObjectStore>,
}

impl CatalogStore {
    pub fn new(prefix: impl Into<Arc<str>>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new("catalog", Arc::new(InMemory::new()))
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    fn log_path(&self, version: SchemaVersion) -> Path {
        Path::from(format!(
            "{prefix}/{version:020}.{CATALOG_LOG_FILE_EXTENSION}",
            prefix = self.prefix,
            version = version.get(),
        ))
    }

    /// Write `log` unless another writer already claimed its version.
    pub async fn persist_log(&self, log: &CatalogLog) -> Result<PersistCatalogResult> {
        let path = self.log_path(log.version);
        let bytes = serde_json::to_vec(log)?;
        match self
            .store
            .put_opts(
                &path,
                PutPayload::from(bytes),
                PutOptions::from(PutMode::Create),
            )
            .await
        {
            Ok(_) => {
                debug!(%path, version = %log.version, "persisted catalog log");
                Ok(PersistCatalogResult::Success)
            }
            Err(object_store::Error::AlreadyExists { .. }) => {
                info!(%path, version = %log.version, "catalog log already exists");
                Ok(PersistCatalogResult::AlreadyExists)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Load the log written for `version`, or `None` if nothing has claimed it yet
    pub async fn load_log(&self, version: SchemaVersion) -> Result<Option<CatalogLog>> {
        let path = self.log_path(version);
        let bytes = match self.store.get(&path).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let log: CatalogLog = serde_json::from_slice(&bytes)?;
        if log.version != version {
            return Err(CatalogStoreError::VersionMismatch {
                path: path.to_string(),
                expected: version,
                found: log.version,
            });
        }
        Ok(Some(log))
    }

    /// Load every log after `after`, in version order, stopping at the first missing version.
    pub async fn load_logs_after(&self, after: SchemaVersion) -> Result<Vec<CatalogLog>> {
        let mut logs = vec![];
        let mut next = after.next();
        while let Some(log) = self.load_log(next).await? {
            logs.push(log);
            next = next.next();
        }
        Ok(logs)
    }

    /// Count of log files under the prefix, including any past a gap.
    pub async fn count_logs(&self) -> Result<usize> {
        let prefix = Path::from(self.prefix.as_ref());
        let metas: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;
        Ok(metas
            .iter()
            .filter(|meta| {
                meta.location
                    .extension()
                    .is_some_and(|ext| ext == CATALOG_LOG_FILE_EXTENSION)
            })
            .count())
    }
}
