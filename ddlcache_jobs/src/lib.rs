//! Asynchronous DDL jobs: a queue that runs at most one job per table at a time, and the
//! executor that applies jobs to the catalog.

pub mod error;
pub mod executor;
pub mod job;
pub mod queue;

pub use error::{JobError, Result};
pub use executor::{DdlExecutor, ExecutorArgs};
pub use job::{DdlJob, JobAction, JobRequest, JobScope, JobState, JobStatus};
pub use queue::{JobQueue, JobTicket};
