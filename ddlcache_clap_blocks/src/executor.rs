//! CLI config for the DDL job executor.

use ddlcache_jobs::ExecutorArgs;
use std::{num::NonZeroUsize, time::Duration};

/// CLI config for the DDL job executor.
#[derive(Debug, Clone, clap::Parser)]
#[allow(missing_copy_implementations)]
pub struct ExecutorConfig {
    /// Number of worker tasks running queued DDL jobs.
    ///
    /// Jobs against different tables run concurrently; jobs against the same table always run
    /// one at a time in submission order.
    #[clap(long = "ddl-workers", env = "DDLCACHE_DDL_WORKERS", default_value = "4", action)]
    pub workers: NonZeroUsize,

    /// How long a session waits for its DDL job to finish before giving up.
    ///
    /// The job itself keeps running; only the wait is abandoned.
    #[clap(
        long = "ddl-wait-timeout",
        env = "DDLCACHE_DDL_WAIT_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration,
    )]
    pub wait_timeout: Duration,

    /// Number of finished jobs kept around for inspection.
    #[clap(
        long = "ddl-job-history-size",
        env = "DDLCACHE_DDL_JOB_HISTORY_SIZE",
        default_value = "1024",
        action
    )]
    pub history_size: usize,
}

impl From<&ExecutorConfig> for ExecutorArgs {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            workers: config.workers.get(),
            wait_timeout: config.wait_timeout,
            history_size: config.history_size,
        }
    }
}
