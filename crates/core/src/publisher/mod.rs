//! Outbound status publication.
//!
//! The orchestrator emits a `PROCESSING` message when a job starts, one
//! progress message per entity, and exactly one terminal message when the
//! job finishes. The transport behind the trait is the server's concern.

use async_trait::async_trait;
use thiserror::Error;

use crate::job::StatusMessage;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("status publish failed: {0}")]
    Transport(String),
}

/// Sink for outbound job status messages.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, message: &StatusMessage) -> Result<(), PublishError>;
}

/// Publisher that serializes each status message into the log stream.
/// Used when no outbound transport is configured.
pub struct LogPublisher;

#[async_trait]
impl StatusPublisher for LogPublisher {
    async fn publish(&self, message: &StatusMessage) -> Result<(), PublishError> {
        let body = serde_json::to_string(message)
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        tracing::info!("Status update: {}", body);
        Ok(())
    }
}
