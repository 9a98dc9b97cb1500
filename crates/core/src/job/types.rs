//! Core job and entity types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::period::{range_key, Period};
use super::wire::{Credentials, WireStatus};

/// Which side of the fiscal operation a task retrieves documents for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Entry,
    Exit,
}

impl OperationMode {
    /// Wire code used by both the queue contract and the portal form.
    pub fn wire_code(&self) -> &'static str {
        match self {
            OperationMode::Entry => "1",
            OperationMode::Exit => "0",
        }
    }
}

/// Lifecycle of one entity task. Terminal states are everything except
/// `Pending` and `Attempting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Pending,
    Attempting,
    Success,
    NoResults,
    PermissionDenied,
    Error,
}

impl EntityStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntityStatus::Pending | EntityStatus::Attempting)
    }

    /// Terminal states that count as "done" for checkpoint purposes.
    /// Errored entities are re-attempted on resume.
    pub fn is_checkpointable(&self) -> bool {
        matches!(
            self,
            EntityStatus::Success | EntityStatus::NoResults | EntityStatus::PermissionDenied
        )
    }
}

/// Overall job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Success,
    Error,
    Invalid,
}

impl JobStatus {
    pub fn wire(&self) -> WireStatus {
        match self {
            JobStatus::Processing => WireStatus::Processing,
            JobStatus::Success => WireStatus::Finished,
            JobStatus::Error => WireStatus::Error,
            JobStatus::Invalid => WireStatus::Invalid,
        }
    }
}

/// One unit of retriable work: a single entity in a single operation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTask {
    /// Tax-registration identifier (IE).
    pub ie: String,
    pub mode: OperationMode,
    pub status: EntityStatus,
    /// Attempts consumed so far. Never exceeds the configured maximum;
    /// admission-gate waits do not count.
    pub attempts: u32,
    /// Last classified error message, if any.
    pub last_error: Option<String>,
    /// Destination directories of persisted artifacts.
    pub artifacts: Vec<PathBuf>,
    /// Documents downloaded for this entity, accumulated across periods.
    pub notes_downloaded: u64,
}

impl EntityTask {
    pub fn new(ie: impl Into<String>, mode: OperationMode) -> Self {
        Self {
            ie: ie.into(),
            mode,
            status: EntityStatus::Pending,
            attempts: 0,
            last_error: None,
            artifacts: Vec::new(),
            notes_downloaded: 0,
        }
    }
}

/// A decoded, expanded job. Immutable after intake except for `status`
/// and the per-task state owned by the retry machinery.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Company identifier from the transport headers.
    pub company_id: String,
    /// Correlation token echoed on outbound status messages.
    pub token: String,
    pub credentials: Credentials,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Ordered ≤30-day slices of `[start, end]`.
    pub periods: Vec<Period>,
    pub tasks: Vec<EntityTask>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Key identifying the job's whole date range (`ddmmYYYY_ddmmYYYY`).
    pub fn period_key(&self) -> String {
        range_key(self.start, self.end)
    }

    /// Artifact root for this job: `xml_dir/company/accountant/period_key`.
    pub fn artifact_root(&self, xml_dir: &std::path::Path) -> PathBuf {
        xml_dir
            .join(&self.company_id)
            .join(&self.credentials.cpf)
            .join(self.period_key())
    }
}
