pub mod admission;
pub mod checkpoint;
pub mod config;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod portal;
pub mod publisher;
pub mod report;
pub mod runner;
pub mod testing;

pub use admission::{spawn_monitor_loop, AdmissionController, SystemAdmission};
pub use checkpoint::{CheckpointError, CheckpointKey, CheckpointStore, SqliteCheckpointStore};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use job::{decode_job, IntakeError, Job, JobStatus, MessageHeaders, StatusMessage, WireStatus};
pub use orchestrator::JobOrchestrator;
pub use portal::{PortalDriver, PortalError, PortalSession, SearchOutcome};
pub use publisher::{LogPublisher, PublishError, StatusPublisher};
pub use report::{AlertSink, Report, WebhookAlertSink};
pub use runner::{EntityRun, EntityRunner};
