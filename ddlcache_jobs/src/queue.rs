//! The DDL job queue.
//!
//! Jobs are picked up in global submission order, skipping any job whose [`JobScope`] already
//! has a job running. This gives FIFO execution per table while jobs for different tables run
//! side by side.

use std::{collections::VecDeque, time::Duration};

use chrono::Utc;
use ddlcache_catalog::{CatalogError, SchemaVersion};
use ddlcache_id::JobId;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tracing::{debug, info};

use crate::{
    Result,
    error::JobError,
    job::{DdlJob, JobRequest, JobScope, JobState, JobStatus},
};

/// Default number of finished jobs kept for [`JobQueue::job`] lookups
pub const DEFAULT_JOB_HISTORY_SIZE: usize = 1024;

#[derive(Debug)]
struct JobEntry {
    job: DdlJob,
    status_tx: watch::Sender<JobStatus>,
}

impl JobEntry {
    fn set_status(&mut self, status: JobStatus) {
        self.job.status = status.clone();
        self.status_tx.send_replace(status);
    }
}

#[derive(Debug)]
struct QueueState {
    next_job_id: JobId,
    pending: VecDeque<JobId>,
    running: HashSet<JobScope>,
    jobs: HashMap<JobId, JobEntry>,
    /// Finished jobs, oldest first
    history: VecDeque<JobId>,
    history_size: usize,
    closed: bool,
}

impl QueueState {
    fn retire(&mut self, id: JobId) {
        self.history.push_back(id);
        while self.history.len() > self.history_size {
            if let Some(evicted) = self.history.pop_front() {
                self.jobs.remove(&evicted);
            }
        }
    }
}

/// A submitted job together with a subscription to its status.
#[derive(Debug)]
pub struct JobTicket {
    id: JobId,
    status: watch::Receiver<JobStatus>,
}

impl JobTicket {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Wait for the job to reach a terminal state, for at most `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<SchemaVersion> {
        let id = self.id;
        // the status is terminal before the job can be evicted, so a closed channel still
        // yields the outcome
        let status = tokio::time::timeout(timeout, self.status.wait_for(JobStatus::is_terminal))
            .await
            .map_err(|_| {
                debug!(job_id = %id, ?timeout, "timed out waiting for DDL job");
                JobError::WaitTimeout {
                    job_id: id,
                    timeout,
                }
            })?
            .map_err(|_| JobError::NotFound(id))?
            .clone();
        match status {
            JobStatus::Done(version) => Ok(version),
            JobStatus::Failed(error) => Err(JobError::Failed(error)),
            JobStatus::Cancelled => Err(JobError::Cancelled(id)),
            JobStatus::Queued | JobStatus::Running => Err(JobError::NotFound(id)),
        }
    }
}

#[derive(Debug)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new(history_size: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                next_job_id: JobId::new(1),
                pending: VecDeque::new(),
                running: HashSet::new(),
                jobs: HashMap::new(),
                history: VecDeque::new(),
                history_size,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue `request` and return its id without waiting for it to run.
    pub fn submit(&self, request: JobRequest) -> Result<JobId> {
        self.submit_watched(request).map(|ticket| ticket.id)
    }

    /// Enqueue `request` and return a [`JobTicket`] already subscribed to its status, so the
    /// outcome is observable however quickly the job finishes and leaves the history.
    pub fn submit_watched(&self, request: JobRequest) -> Result<JobTicket> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(JobError::ShutDown);
        }
        let id = state.next_job_id;
        state.next_job_id = id.next();
        let job = DdlJob::new(id, request);
        info!(job_id = %id, action = %job.action(), table_id = ?job.table_id(), "DDL job queued");
        let (status_tx, status) = watch::channel(JobStatus::Queued);
        state.jobs.insert(id, JobEntry { job, status_tx });
        state.pending.push_back(id);
        drop(state);
        self.notify.notify_one();
        Ok(JobTicket { id, status })
    }

    /// Wait for the next runnable job and mark it running.
    ///
    /// Returns `None` once the queue has been closed.
    pub async fn next_job(&self) -> Option<DdlJob> {
        loop {
            if let Some(next) = self.try_next_job() {
                return next;
            }
            self.notify.notified().await;
        }
    }

    /// `Some(None)` when closed, `None` when nothing is runnable right now
    fn try_next_job(&self) -> Option<Option<DdlJob>> {
        let mut state = self.state.lock();
        if state.closed {
            return Some(None);
        }
        let QueueState {
            pending,
            running,
            jobs,
            ..
        } = &mut *state;
        let pos = pending.iter().position(|id| {
            jobs.get(id)
                .is_some_and(|entry| !running.contains(&entry.job.request.scope()))
        })?;
        let id = pending.remove(pos)?;
        let entry = jobs.get_mut(&id)?;
        running.insert(entry.job.request.scope());
        entry.job.started_at = Some(Utc::now());
        entry.set_status(JobStatus::Running);
        info!(job_id = %id, action = %entry.job.action(), "DDL job running");
        Some(Some(entry.job.clone()))
    }

    /// Record the outcome of a running job.
    pub fn finish(&self, id: JobId, outcome: Result<SchemaVersion, CatalogError>) {
        let mut state = self.state.lock();
        let Some(entry) = state.jobs.get_mut(&id) else {
            return;
        };
        let scope = entry.job.request.scope();
        entry.job.finished_at = Some(Utc::now());
        match outcome {
            Ok(version) => {
                info!(job_id = %id, %version, "DDL job done");
                entry.set_status(JobStatus::Done(version));
            }
            Err(error) => {
                info!(job_id = %id, %error, "DDL job failed");
                entry.set_status(JobStatus::Failed(error));
            }
        }
        state.running.remove(&scope);
        state.retire(id);
        drop(state);
        // a job waiting on this scope may now be runnable
        self.notify.notify_one();
    }

    /// Cancel a job that has not started running.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        let job_state = entry.job.state();
        if job_state != JobState::Queued {
            return Err(JobError::NotCancellable {
                job_id: id,
                state: job_state,
            });
        }
        entry.job.finished_at = Some(Utc::now());
        entry.set_status(JobStatus::Cancelled);
        state.pending.retain(|pending| *pending != id);
        state.retire(id);
        info!(job_id = %id, "DDL job cancelled");
        Ok(())
    }

    pub fn job(&self, id: JobId) -> Option<DdlJob> {
        self.state.lock().jobs.get(&id).map(|entry| entry.job.clone())
    }

    /// Number of jobs that have been submitted but not picked up
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Wait for job `id` to reach a terminal state, for at most `timeout`.
    ///
    /// Hitting the timeout does not affect the job itself. A job that already left the history
    /// is [`JobError::NotFound`]; hold on to the [`JobTicket`] from
    /// [`submit_watched`][Self::submit_watched] to avoid that.
    pub async fn await_job(&self, id: JobId, timeout: Duration) -> Result<SchemaVersion> {
        let status = {
            let state = self.state.lock();
            state
                .jobs
                .get(&id)
                .ok_or(JobError::NotFound(id))?
                .status_tx
                .subscribe()
        };
        JobTicket { id, status }.wait(timeout).await
    }

    /// Stop handing out jobs. Jobs still queued are cancelled; running jobs may still finish.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        let pending: Vec<_> = state.pending.drain(..).collect();
        for id in pending {
            if let Some(entry) = state.jobs.get_mut(&id) {
                entry.job.finished_at = Some(Utc::now());
                entry.set_status(JobStatus::Cancelled);
            }
            state.retire(id);
        }
        drop(state);
        self.notify.notify_waiters();
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_HISTORY_SIZE)
    }
}
