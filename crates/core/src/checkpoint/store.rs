//! Checkpoint storage trait and types.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Error type for checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Identifies one job's checkpoint record: same company, accountant and
/// date range means same record, across runs and across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub company_id: String,
    pub accountant_id: String,
    /// Whole-range period key (`ddmmYYYY_ddmmYYYY`).
    pub period_key: String,
}

impl CheckpointKey {
    pub fn new(
        company_id: impl Into<String>,
        accountant_id: impl Into<String>,
        period_key: impl Into<String>,
    ) -> Self {
        Self {
            company_id: company_id.into(),
            accountant_id: accountant_id.into(),
            period_key: period_key.into(),
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.company_id, self.accountant_id, self.period_key
        )
    }
}

/// Trait for checkpoint storage backends.
///
/// `append` must be durable before it returns, idempotent, and safe under
/// concurrent appends from jobs sharing a key. Consulted only at job
/// start, never mid-entity.
pub trait CheckpointStore: Send + Sync {
    /// Entity ids already completed under this key.
    fn load(&self, key: &CheckpointKey) -> Result<HashSet<String>, CheckpointError>;

    /// Record an entity as completed. Re-appending is a no-op.
    fn append(&self, key: &CheckpointKey, entity_id: &str) -> Result<(), CheckpointError>;
}
