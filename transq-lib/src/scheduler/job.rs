//! Job records

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TranscodeParams;
use crate::error::{ErrorKind, TranscodeError};

/// Handle of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell jobs apart in logs
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Lifecycle state of a job
///
/// `Prepare` → `Ing` → `Succ` | `Fail`; `Fail` can be reset to `Prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Queued, waiting for a free slot
    Prepare,
    /// Running
    Ing,
    Succ,
    Fail,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succ | JobStatus::Fail)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Prepare => "PREPARE",
            JobStatus::Ing => "ING",
            JobStatus::Succ => "SUCC",
            JobStatus::Fail => "FAIL",
        })
    }
}

/// Error descriptor attached to a failed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled")
    }
}

impl From<&TranscodeError> for JobError {
    fn from(e: &TranscodeError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// What to transcode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: TranscodeParams,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, params: TranscodeParams) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            params,
        }
    }
}

/// Point-in-time copy of a job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<JobError>,
    /// Number of times the job was started
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub total: usize,
    pub prepare: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl QueueSummary {
    pub(crate) fn count(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Prepare => self.prepare += 1,
            JobStatus::Ing => self.running += 1,
            JobStatus::Succ => self.succeeded += 1,
            JobStatus::Fail => self.failed += 1,
        }
    }

    /// No job queued or running
    pub fn is_idle(&self) -> bool {
        self.prepare == 0 && self.running == 0
    }
}

impl fmt::Display for QueueSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} jobs: {} queued, {} running, {} done, {} failed",
            self.total, self.prepare, self.running, self.succeeded, self.failed
        )
    }
}
