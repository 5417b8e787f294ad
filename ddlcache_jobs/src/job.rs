use std::sync::Arc;

use chrono::{DateTime, Utc};
use ddlcache_catalog::{
    CatalogError, SchemaVersion,
    guard::StructuralChange,
    table::{IndexOp, TableRef, TableSpec},
    validate::CacheAction,
};
use ddlcache_id::{JobId, TableId};

/// What a job may not run concurrently with: at most one job per scope is running at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobScope {
    Table(TableId),
    /// An object that does not exist yet, keyed by its lower-cased qualified name
    Name(Arc<str>),
}

impl JobScope {
    pub fn name(qualified: &str) -> Self {
        Self::Name(Arc::from(qualified.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone)]
pub enum JobRequest {
    CreateDatabase {
        name: Arc<str>,
    },
    CreateTable {
        db_name: Arc<str>,
        spec: TableSpec,
    },
    DropTable {
        table: TableRef,
    },
    AlterCache {
        table: TableRef,
        action: CacheAction,
    },
    AlterIndexes {
        table: TableRef,
        ops: Vec<IndexOp>,
        change: StructuralChange,
    },
}

impl JobRequest {
    pub fn scope(&self) -> JobScope {
        match self {
            Self::CreateDatabase { name } => JobScope::name(name),
            Self::CreateTable { db_name, spec } => JobScope::name(&format!("{db_name}.{}", spec.name)),
            Self::DropTable { table }
            | Self::AlterCache { table, .. }
            | Self::AlterIndexes { table, .. } => JobScope::Table(table.table_id),
        }
    }

    pub fn table_id(&self) -> Option<TableId> {
        match self.scope() {
            JobScope::Table(id) => Some(id),
            JobScope::Name(_) => None,
        }
    }

    pub fn action(&self) -> JobAction {
        match self {
            Self::CreateDatabase { .. } => JobAction::CreateDatabase,
            Self::CreateTable { .. } => JobAction::CreateTable,
            Self::DropTable { .. } => JobAction::DropTable,
            Self::AlterCache {
                action: CacheAction::Enable,
                ..
            } => JobAction::EnableCache,
            Self::AlterCache {
                action: CacheAction::Disable,
                ..
            } => JobAction::DisableCache,
            Self::AlterIndexes { .. } => JobAction::AlterIndexes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobAction {
    CreateDatabase,
    CreateTable,
    DropTable,
    EnableCache,
    DisableCache,
    AlterIndexes,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "create database",
            Self::CreateTable => "create table",
            Self::DropTable => "drop table",
            Self::EnableCache => "enable cache",
            Self::DisableCache => "disable cache",
            Self::AlterIndexes => "alter indexes",
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum JobStatus {
    Queued,
    Running,
    Done(SchemaVersion),
    Cancelled,
    Failed(CatalogError),
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self {
            Self::Queued => JobState::Queued,
            Self::Running => JobState::Running,
            Self::Done(_) => JobState::Done,
            Self::Cancelled => JobState::Cancelled,
            Self::Failed(_) => JobState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Running,
    Done,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A unit of asynchronous schema work, as recorded by the [`JobQueue`](crate::JobQueue).
#[derive(Debug, Clone)]
pub struct DdlJob {
    pub id: JobId,
    pub request: JobRequest,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DdlJob {
    pub(crate) fn new(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            request,
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.status.state()
    }

    pub fn table_id(&self) -> Option<TableId> {
        self.request.table_id()
    }

    pub fn action(&self) -> JobAction {
        self.request.action()
    }

    /// The schema version produced by this job, once it is done
    pub fn result_version(&self) -> Option<SchemaVersion> {
        match self.status {
            JobStatus::Done(version) => Some(version),
            _ => None,
        }
    }
}
