//! CLI config for the catalog: where its log lives and how schema changes propagate.

use ddlcache_catalog::{CatalogArgs, store::CatalogStore};
use object_store::{local::LocalFileSystem, memory::InMemory};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum ParseError {
    #[error("Unable to create catalog directory {path:?}: {source}")]
    CreatingCatalogDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to create local store {path:?}: {source}")]
    CreateLocalFileSystem {
        path: PathBuf,
        source: object_store::Error,
    },

    #[error("Specified {store:?} for the catalog store, required configuration missing for {missing}")]
    MissingCatalogStoreConfig {
        store: CatalogStoreType,
        missing: String,
    },
}

/// Where the catalog log is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CatalogStoreType {
    /// In-memory; the catalog is lost when the process exits.
    #[default]
    Memory,

    /// Local filesystem, under `--data-dir`.
    File,
}

/// CLI config for the catalog.
#[derive(Debug, Clone, clap::Parser)]
pub struct CatalogConfig {
    /// Which object store to keep the catalog log in.
    #[clap(
        value_enum,
        long = "catalog-store",
        env = "DDLCACHE_CATALOG_STORE",
        default_value_t = CatalogStoreType::default(),
        action
    )]
    pub store: CatalogStoreType,

    /// Directory for the catalog log when `--catalog-store file` is used.
    #[clap(long = "data-dir", env = "DDLCACHE_DATA_DIR", action)]
    pub data_dir: Option<PathBuf>,

    /// Prefix under which catalog log files are written.
    #[clap(
        long = "catalog-prefix",
        env = "DDLCACHE_CATALOG_PREFIX",
        default_value = "catalog",
        action
    )]
    pub prefix: String,

    /// Upper bound on how long any node may serve a stale schema.
    ///
    /// A schema change is not reported complete until every subscribed node has acknowledged
    /// it or this much time has passed.
    #[clap(
        long = "schema-lease",
        env = "DDLCACHE_SCHEMA_LEASE",
        default_value = "1s",
        value_parser = humantime::parse_duration,
    )]
    pub schema_lease: Duration,

    /// Number of recent schema changes kept for transaction fencing.
    ///
    /// A transaction that started further back than this is aborted at commit.
    #[clap(
        long = "max-schema-diffs",
        env = "DDLCACHE_MAX_SCHEMA_DIFFS",
        default_value = "1024",
        action
    )]
    pub max_schema_changes: usize,
}

impl CatalogConfig {
    /// Build the [`CatalogStore`] this config describes.
    pub fn make_store(&self) -> Result<CatalogStore, ParseError> {
        match self.store {
            CatalogStoreType::Memory => {
                info!(prefix = %self.prefix, "catalog kept in memory");
                Ok(CatalogStore::new(self.prefix.as_str(), Arc::new(InMemory::new())))
            }
            CatalogStoreType::File => {
                let Some(path) = &self.data_dir else {
                    return Err(ParseError::MissingCatalogStoreConfig {
                        store: self.store,
                        missing: "data-dir".to_string(),
                    });
                };
                std::fs::create_dir_all(path).map_err(|source| {
                    ParseError::CreatingCatalogDirectory {
                        path: path.clone(),
                        source,
                    }
                })?;
                let fs = LocalFileSystem::new_with_prefix(path).map_err(|source| {
                    ParseError::CreateLocalFileSystem {
                        path: path.clone(),
                        source,
                    }
                })?;
                info!(path = %path.display(), prefix = %self.prefix, "catalog kept on local filesystem");
                Ok(CatalogStore::new(self.prefix.as_str(), Arc::new(fs)))
            }
        }
    }

    /// The catalog tuning this config describes.
    pub fn catalog_args(&self) -> CatalogArgs {
        CatalogArgs {
            schema_lease: self.schema_lease,
            max_schema_changes: self.max_schema_changes,
        }
    }
}
