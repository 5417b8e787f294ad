use std::{sync::Arc, time::Duration};

use ddlcache_catalog::{
    Catalog, CatalogError, SchemaVersion, guard::check_structural_change,
    validate::validate_alter_cache,
};
use ddlcache_id::JobId;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info};

use crate::{
    Result,
    error::JobError,
    job::{DdlJob, JobRequest},
    queue::{DEFAULT_JOB_HISTORY_SIZE, JobQueue, JobTicket},
};

#[derive(Debug, Clone, Copy)]
pub struct ExecutorArgs {
    pub workers: usize,
    pub wait_timeout: Duration,
    pub history_size: usize,
}

impl Default for ExecutorArgs {
    fn default() -> Self {
        Self {
            workers: 4,
            wait_timeout: Duration::from_secs(30),
            history_size: DEFAULT_JOB_HISTORY_SIZE,
        }
    }
}

/// Runs DDL jobs against the [`Catalog`] on a fixed pool of worker tasks.
#[derive(Debug)]
pub struct DdlExecutor {
    catalog: Arc<Catalog>,
    queue: Arc<JobQueue>,
    args: ExecutorArgs,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl DdlExecutor {
    /// Create an executor. No job runs until [`start`][Self::start] is called.
    pub fn new(catalog: Arc<Catalog>, args: ExecutorArgs) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            queue: Arc::new(JobQueue::new(args.history_size)),
            args,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn start(&self) {
        info!(workers = self.args.workers, "starting DDL workers");
        for worker in 0..self.args.workers.max(1) {
            let catalog = Arc::clone(&self.catalog);
            let queue = Arc::clone(&self.queue);
            let shutdown = self.shutdown.clone();
            self.tasks
                .spawn(async move { run_worker(worker, catalog, queue, shutdown).await });
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Check `request` against the current catalog and enqueue it.
    ///
    /// A request that fails the checks is returned as [`JobError::Rejected`] and never becomes
    /// a job.
    pub fn submit(&self, request: JobRequest) -> Result<JobId> {
        self.submit_watched(request).map(|ticket| ticket.id())
    }

    /// Like [`submit`][Self::submit], returning a ticket that can wait for the outcome.
    pub fn submit_watched(&self, request: JobRequest) -> Result<JobTicket> {
        admit(&self.catalog, &request).map_err(JobError::Rejected)?;
        self.queue.submit_watched(request)
    }

    /// Wait for job `id` to finish, bounded by the configured wait timeout.
    pub async fn await_job(&self, id: JobId) -> Result<SchemaVersion> {
        self.queue.await_job(id, self.args.wait_timeout).await
    }

    /// Submit `request` and wait for it.
    pub async fn execute(&self, request: JobRequest) -> Result<SchemaVersion> {
        self.submit_watched(request)?
            .wait(self.args.wait_timeout)
            .await
    }

    pub fn cancel(&self, id: JobId) -> Result<()> {
        self.queue.cancel(id)
    }

    pub fn job(&self, id: JobId) -> Option<DdlJob> {
        self.queue.job(id)
    }

    /// Stop picking up jobs and wait for running jobs to finish.
    pub async fn shutdown(&self) {
        info!("shutting down DDL executor");
        self.queue.close();
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

/// Admission checks for requests against existing tables, run before a job is created.
fn admit(catalog: &Catalog, request: &JobRequest) -> Result<(), CatalogError> {
    let snapshot = catalog.snapshot();
    match request {
        JobRequest::AlterCache { table, action } => {
            let meta = snapshot.table_by_id(table.table_id);
            validate_alter_cache(&table.db_name, &table.table_name, meta.as_deref(), *action)
        }
        JobRequest::AlterIndexes { table, ops, change } => {
            let meta = snapshot.table_by_id(table.table_id).ok_or_else(|| {
                CatalogError::no_such_table(
                    Arc::clone(&table.db_name),
                    Arc::clone(&table.table_name),
                )
            })?;
            check_structural_change(&meta, *change)?;
            meta.with_index_ops(ops).map(|_| ())
        }
        JobRequest::DropTable { table } => snapshot
            .table_by_id(table.table_id)
            .map(|_| ())
            .ok_or_else(|| {
                CatalogError::no_such_table(
                    Arc::clone(&table.db_name),
                    Arc::clone(&table.table_name),
                )
            }),
        JobRequest::CreateDatabase { .. } | JobRequest::CreateTable { .. } => Ok(()),
    }
}

async fn run_worker(
    worker: usize,
    catalog: Arc<Catalog>,
    queue: Arc<JobQueue>,
    shutdown: CancellationToken,
) {
    debug!(worker, "DDL worker started");
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = queue.next_job() => job,
        };
        let Some(job) = job else { break };
        // a picked job always runs to completion, shutdown or not
        let outcome = run_job(&catalog, job.request).await;
        queue.finish(job.id, outcome);
    }
    debug!(worker, "DDL worker stopped");
}

async fn run_job(catalog: &Catalog, request: JobRequest) -> Result<SchemaVersion, CatalogError> {
    let outcome = match request {
        JobRequest::CreateDatabase { name } => catalog.create_database(&name).await?,
        JobRequest::CreateTable { db_name, spec } => catalog.create_table(&db_name, spec).await?,
        JobRequest::DropTable { table } => catalog.drop_table(&table).await?,
        JobRequest::AlterCache { table, action } => {
            catalog.set_cache_status(&table, action).await?
        }
        JobRequest::AlterIndexes { table, ops, change } => {
            catalog.alter_indexes(&table, ops, change).await?
        }
    };
    Ok(outcome.version)
}

#[cfg(test)]
mod tests {
    use ddlcache_catalog::{
        ErrorKind,
        guard::StructuralChange,
        table::{CacheStatus, IndexOp, TableKind, TableRef, TableSpec},
        validate::CacheAction,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::job::JobState;

    async fn executor_with_tables(tables: &[(&str, TableKind)]) -> Arc<DdlExecutor> {
        let catalog = Arc::new(Catalog::new_in_memory());
        let executor = DdlExecutor::new(catalog, ExecutorArgs::default());
        executor.start();
        executor
            .execute(JobRequest::CreateDatabase {
                name: "test".into(),
            })
            .await
            .unwrap();
        for (name, kind) in tables {
            executor
                .execute(JobRequest::CreateTable {
                    db_name: "test".into(),
                    spec: TableSpec::ordinary(*name).with_kind(*kind),
                })
                .await
                .unwrap();
        }
        executor
    }

    fn table_ref(executor: &DdlExecutor, name: &str) -> TableRef {
        TableRef::of(&executor.catalog().table_by_name("test", name).unwrap())
    }

    #[test_log::test(tokio::test)]
    async fn cache_job_bumps_version_and_records_result() {
        let executor = executor_with_tables(&[("t1", TableKind::Ordinary)]).await;
        let before = executor.catalog().current_version();
        let id = executor
            .submit(JobRequest::AlterCache {
                table: table_ref(&executor, "t1"),
                action: CacheAction::Enable,
            })
            .unwrap();
        let version = executor.await_job(id).await.unwrap();
        assert_eq!(version, before.next());

        let job = executor.job(id).unwrap();
        assert_eq!(job.state(), JobState::Done);
        assert_eq!(job.result_version(), Some(version));
        assert_eq!(
            executor
                .catalog()
                .table_by_name("test", "t1")
                .unwrap()
                .cache_status,
            CacheStatus::Enabled
        );
        executor.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn rejected_requests_create_no_job() {
        let executor = executor_with_tables(&[("v", TableKind::View)]).await;
        let version = executor.catalog().current_version();
        let err = executor
            .submit(JobRequest::AlterCache {
                table: table_ref(&executor, "v"),
                action: CacheAction::Enable,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongObjectType);
        assert!(matches!(err, JobError::Rejected(_)));
        assert_eq!(executor.queue().pending_len(), 0);
        assert_eq!(executor.catalog().current_version(), version);
        executor.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn concurrent_alters_on_one_table_serialize() {
        let executor = executor_with_tables(&[("t1", TableKind::Ordinary)]).await;
        let table = table_ref(&executor, "t1");
        let before = executor.catalog().current_version();

        let actions = [
            CacheAction::Enable,
            CacheAction::Disable,
            CacheAction::Enable,
            CacheAction::Enable,
        ];
        let ids: Vec<_> = actions
            .iter()
            .map(|action| {
                executor
                    .submit(JobRequest::AlterCache {
                        table: table.clone(),
                        action: *action,
                    })
                    .unwrap()
            })
            .collect();
        let mut versions = vec![];
        for id in &ids {
            versions.push(executor.await_job(*id).await.unwrap());
        }
        // per-table FIFO: results are assigned in submission order
        let expected: Vec<_> = (1..=4).map(|n| SchemaVersion::new(before.get() + n)).collect();
        assert_eq!(versions, expected);
        assert!(
            executor
                .catalog()
                .table_by_name("test", "t1")
                .unwrap()
                .is_cached()
        );
        executor.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn failed_job_surfaces_error_unchanged() {
        let executor = executor_with_tables(&[("t1", TableKind::Ordinary)]).await;
        let err = executor
            .execute(JobRequest::CreateTable {
                db_name: "test".into(),
                spec: TableSpec::ordinary("T1"),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::Failed(CatalogError::TableAlreadyExists(_))
        ));
        assert_eq!(err.to_string(), "Table 'T1' already exists");
        executor.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn index_changes_on_cached_table_are_rejected() {
        let executor = executor_with_tables(&[("t1", TableKind::Ordinary)]).await;
        let table = table_ref(&executor, "t1");
        executor
            .execute(JobRequest::AlterCache {
                table: table.clone(),
                action: CacheAction::Enable,
            })
            .await
            .unwrap();
        let err = executor
            .submit(JobRequest::AlterIndexes {
                table,
                ops: vec![IndexOp::Drop { name: "a".into() }],
                change: StructuralChange::DropIndex,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperationOnCacheTable);
        executor.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn queued_job_can_be_cancelled_before_workers_start() {
        let catalog = Arc::new(Catalog::new_in_memory());
        let executor = DdlExecutor::new(Arc::clone(&catalog), ExecutorArgs::default());
        let id = executor
            .submit(JobRequest::CreateDatabase {
                name: "test".into(),
            })
            .unwrap();
        executor.cancel(id).unwrap();
        executor.start();
        let err = executor.await_job(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JobCancelled);
        assert!(catalog.snapshot().db_schema("test").is_none());
        executor.shutdown().await;
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn outcome_is_reported_when_history_is_empty() {
        let catalog = Arc::new(Catalog::new_in_memory());
        let executor = DdlExecutor::new(
            Arc::clone(&catalog),
            ExecutorArgs {
                history_size: 0,
                ..Default::default()
            },
        );
        executor.start();

        let mut versions = Vec::with_capacity(300);
        for n in 0..300 {
            let version = executor
                .execute(JobRequest::CreateDatabase {
                    name: format!("db{n}").into(),
                })
                .await
                .unwrap_or_else(|e| panic!("job {n}: {e} ({:?})", e.kind()));
            versions.push(version);
        }
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert!(catalog.snapshot().db_schema("db299").is_some());
        executor.shutdown().await;
    }
}
