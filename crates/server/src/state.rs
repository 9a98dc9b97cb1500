use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use harvester_core::job::Job;
use harvester_core::publisher::{PublishError, StatusPublisher};
use harvester_core::{Config, StatusMessage};

/// Shared application state
pub struct AppState {
    config: Config,
    jobs_tx: mpsc::Sender<Job>,
    registry: Arc<JobRegistry>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, jobs_tx: mpsc::Sender<Job>, registry: Arc<JobRegistry>) -> Self {
        Self {
            config,
            jobs_tx,
            registry,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn jobs_tx(&self) -> &mpsc::Sender<Job> {
        &self.jobs_tx
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Latest published status per job, served by `GET /jobs/{id}`.
#[derive(Default)]
pub struct JobRegistry {
    statuses: RwLock<HashMap<String, StatusMessage>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self, job_id: &str) -> Option<StatusMessage> {
        self.statuses.read().await.get(job_id).cloned()
    }

    async fn record(&self, message: &StatusMessage) {
        self.statuses
            .write()
            .await
            .insert(message.id.clone(), message.clone());
    }
}

/// Publisher that records each status in the registry and mirrors it to
/// the log stream.
pub struct RegistryPublisher {
    registry: Arc<JobRegistry>,
}

impl RegistryPublisher {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StatusPublisher for RegistryPublisher {
    async fn publish(&self, message: &StatusMessage) -> Result<(), PublishError> {
        self.registry.record(message).await;
        let body =
            serde_json::to_string(message).map_err(|e| PublishError::Transport(e.to_string()))?;
        info!("Status update: {}", body);
        Ok(())
    }
}
