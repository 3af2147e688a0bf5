//! Batch job bookkeeping.
//!
//! Only one job of each kind may run at a time. A second submission of the
//! same kind while one is pending or running is rejected, so overlapping
//! recalculations cannot race on the result tables.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{LagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Recalculation,
    DailyUpdate,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Recalculation => "recalculation",
            JobKind::DailyUpdate => "daily_update",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// In-process registry of batch jobs
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    jobs: Arc<DashMap<Uuid, BatchJob>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job, rejecting it if one of the same kind is active
    pub fn submit(&self, kind: JobKind) -> Result<Uuid> {
        let conflict = self
            .jobs
            .iter()
            .any(|e| e.kind == kind && e.status.is_active());
        if conflict {
            return Err(LagError::JobAlreadyRunning(kind.to_string()));
        }

        let id = Uuid::new_v4();
        self.jobs.insert(
            id,
            BatchJob {
                id,
                kind,
                status: JobStatus::Pending,
                message: None,
                submitted_at: Utc::now(),
                started_at: None,
                completed_at: None,
            },
        );
        Ok(id)
    }

    pub fn mark_running(&self, id: Uuid) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        }
    }

    pub fn mark_completed(&self, id: Uuid, message: impl Into<String>) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = JobStatus::Completed;
            job.message = Some(message.into());
            job.completed_at = Some(Utc::now());
        }
    }

    pub fn mark_failed(&self, id: Uuid, message: impl Into<String>) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.message = Some(message.into());
            job.completed_at = Some(Utc::now());
        }
    }

    pub fn get(&self, id: Uuid) -> Option<BatchJob> {
        self.jobs.get(&id).map(|j| j.clone())
    }
}
