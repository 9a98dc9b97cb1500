//! Job orchestrator.
//!
//! Owns the whole lifecycle of a decoded job: the initial `PROCESSING`
//! status, the checkpoint skip pass, sequential entity dispatch through
//! the retry state machine, checkpoint appends, and the single terminal
//! status with its final report.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::admission::AdmissionController;
use crate::checkpoint::{CheckpointKey, CheckpointStore};
use crate::config::Config;
use crate::job::{EntityTask, Job, JobStatus, StatusMessage};
use crate::metrics;
use crate::portal::{PortalDriver, PortalError};
use crate::publisher::StatusPublisher;
use crate::report::{AlertSink, Report};
use crate::runner::{EntityRun, EntityRunner};

pub struct JobOrchestrator {
    config: Config,
    driver: Arc<dyn PortalDriver>,
    admission: Arc<dyn AdmissionController>,
    checkpoints: Arc<dyn CheckpointStore>,
    publisher: Arc<dyn StatusPublisher>,
    alerts: Option<Arc<dyn AlertSink>>,
    cancel: Arc<AtomicBool>,
}

impl JobOrchestrator {
    pub fn new(
        config: Config,
        driver: Arc<dyn PortalDriver>,
        admission: Arc<dyn AdmissionController>,
        checkpoints: Arc<dyn CheckpointStore>,
        publisher: Arc<dyn StatusPublisher>,
        alerts: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            config,
            driver,
            admission,
            checkpoints,
            publisher,
            alerts,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with every in-flight runner; setting it drains the
    /// orchestrator at the next attempt or period boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn request_shutdown(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Process one job to its terminal status. Always returns the job;
    /// a shutdown mid-job leaves it in `Processing` with no terminal
    /// status published.
    pub async fn process(&self, mut job: Job) -> Job {
        info!(
            "Job {} started: {} entities, period {}",
            job.id,
            job.tasks.len(),
            job.period_key()
        );
        self.publish(StatusMessage::new(
            &job.id,
            JobStatus::Processing.wire(),
            "Processamento iniciado",
        ))
        .await;

        let done = self.load_checkpointed(&job);
        let runner = self.runner_for(&job);
        let key = checkpoint_key(&job);
        let job_id = job.id.clone();

        let total = job.tasks.len();
        let mut aborted = false;
        let mut partial_paths: Vec<String> = Vec::new();

        for (index, task) in job.tasks.iter_mut().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                warn!("Job {} interrupted by shutdown", job_id);
                return job;
            }

            if done.contains(&checkpoint_id(task)) {
                info!(
                    "Job {}: IE {} already completed for this period, skipping",
                    job_id, task.ie
                );
                continue;
            }

            info!("Processando {}/{} - IE {}", index + 1, total, task.ie);

            match runner.run(task).await {
                EntityRun::Completed => {
                    for dir in &task.artifacts {
                        partial_paths.push(dir.display().to_string());
                    }
                    // progress update with the artifact paths gathered so far
                    self.publish(
                        StatusMessage::new(
                            &job_id,
                            JobStatus::Processing.wire(),
                            format!("Processando {}/{} - IE {}", index + 1, total, task.ie),
                        )
                        .with_paths(&partial_paths),
                    )
                    .await;
                    if task.status.is_checkpointable() {
                        self.append_checkpoint(&job_id, &key, task);
                    }
                }
                EntityRun::AbortJob => {
                    aborted = true;
                    break;
                }
                EntityRun::Cancelled => {
                    warn!("Job {} interrupted by shutdown", job_id);
                    return job;
                }
            }
        }

        if aborted {
            job.status = JobStatus::Invalid;
            error!("Job {} aborted: credentials rejected by the portal", job.id);
            self.finalize(&job, PortalError::InvalidCredentials.to_string())
                .await;
            return job;
        }

        let report = Report::from_job(&job);
        job.status = if report.has_errors() {
            JobStatus::Error
        } else {
            JobStatus::Success
        };
        self.finalize(&job, report.render()).await;
        job
    }

    fn runner_for(&self, job: &Job) -> EntityRunner {
        EntityRunner::new(
            self.config.orchestrator.clone(),
            Arc::clone(&self.driver),
            Arc::clone(&self.admission),
            job.credentials.clone(),
            job.periods.clone(),
            self.config.paths.download_dir.clone(),
            job.artifact_root(&self.config.paths.xml_dir),
            self.config.admission.backoff_ms,
            Arc::clone(&self.cancel),
        )
    }

    /// Entities already completed for this job's scope in a previous run.
    /// An unreadable checkpoint degrades to reprocessing everything.
    fn load_checkpointed(&self, job: &Job) -> HashSet<String> {
        let key = checkpoint_key(job);
        match self.checkpoints.load(&key) {
            Ok(done) => {
                if !done.is_empty() {
                    info!(
                        "Job {}: {} entities already completed in a previous run",
                        job.id,
                        done.len()
                    );
                }
                done
            }
            Err(e) => {
                warn!("Job {}: checkpoint unreadable, reprocessing all: {}", job.id, e);
                HashSet::new()
            }
        }
    }

    /// A failed append costs at most one redundant reprocess on resume;
    /// the entity's status stands.
    fn append_checkpoint(&self, job_id: &str, key: &CheckpointKey, task: &EntityTask) {
        if let Err(e) = self.checkpoints.append(key, &checkpoint_id(task)) {
            warn!(
                "Job {}: failed to checkpoint IE {}: {}",
                job_id, task.ie, e
            );
        }
    }

    /// Publish the terminal status, collect artifact paths, emit metrics
    /// and fire the operator alert.
    async fn finalize(&self, job: &Job, obs: String) {
        let paths: Vec<String> = job
            .tasks
            .iter()
            .flat_map(|task| task.artifacts.iter())
            .map(|path| path.display().to_string())
            .collect();

        let label = match job.status {
            JobStatus::Success => "success",
            JobStatus::Invalid => "invalid",
            _ => "error",
        };
        metrics::JOBS_TOTAL.with_label_values(&[label]).inc();
        info!("Job {} finished: {:?}", job.id, job.status);

        if let Some(ref alerts) = self.alerts {
            alerts
                .send(&format!("Job {} ({:?})\n{}", job.id, job.status, obs))
                .await;
        }

        self.publish(StatusMessage::new(&job.id, job.status.wire(), obs).with_paths(&paths))
            .await;
    }

    async fn publish(&self, message: StatusMessage) {
        if let Err(e) = self.publisher.publish(&message).await {
            error!("Failed to publish status for job {}: {}", message.id, e);
        }
    }
}

fn checkpoint_key(job: &Job) -> CheckpointKey {
    CheckpointKey {
        company_id: job.company_id.clone(),
        accountant_id: job.credentials.cpf.clone(),
        period_key: job.period_key(),
    }
}

/// Checkpoint identity of a task. Both operation modes of one IE complete
/// independently.
fn checkpoint_id(task: &EntityTask) -> String {
    format!("{}:{}", task.ie, task.mode.wire_code())
}
