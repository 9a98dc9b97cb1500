//! Entity retry state machine.
//!
//! Drives a single entity task to a terminal status:
//! - Admission: attempts wait (not consumed) while the host is saturated
//! - Attempt: fresh portal session, login, one search per period, download
//! - Classification: raw failures map to operator-facing causes and a
//!   retry policy
//!
//! One runner per job; the orchestrator feeds it tasks sequentially.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::config::OrchestratorConfig;
use crate::job::{Credentials, EntityStatus, EntityTask, Period};
use crate::metrics;
use crate::portal::{
    classify, session_closed, session_opened, PortalDriver, PortalError, PortalSession,
    SearchOutcome,
};

/// How one entity run ended, from the orchestrator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRun {
    /// The task reached a terminal status (success, no-results,
    /// permission-denied or error).
    Completed,
    /// The portal rejected the job's credentials. The whole job must stop.
    AbortJob,
    /// Shutdown was requested mid-run; the task is left non-terminal.
    Cancelled,
}

/// Outcome of a single attempt.
enum AttemptOutcome {
    Terminal(EntityStatus),
    Abort,
    Cancelled,
    Retry(String),
}

/// Outcome of a paged download pass.
enum PagedDownload {
    Files(Vec<PathBuf>),
    /// A recovery search no longer showed results; the outcome decides
    /// the entity's terminal status.
    Ended(SearchOutcome),
}

/// Runs entity tasks for one job.
pub struct EntityRunner {
    config: OrchestratorConfig,
    driver: Arc<dyn PortalDriver>,
    admission: Arc<dyn AdmissionController>,
    credentials: Credentials,
    periods: Vec<Period>,
    download_dir: PathBuf,
    /// Per-job artifact root (`xml_dir/company/accountant/period_key`).
    artifact_root: PathBuf,
    /// Wait between admission polls (milliseconds).
    admission_backoff_ms: u64,
    cancel: Arc<AtomicBool>,
}

impl EntityRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        driver: Arc<dyn PortalDriver>,
        admission: Arc<dyn AdmissionController>,
        credentials: Credentials,
        periods: Vec<Period>,
        download_dir: PathBuf,
        artifact_root: PathBuf,
        admission_backoff_ms: u64,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            driver,
            admission,
            credentials,
            periods,
            download_dir,
            artifact_root,
            admission_backoff_ms,
            cancel,
        }
    }

    /// Drive one task to a terminal status or a job abort.
    pub async fn run(&self, task: &mut EntityTask) -> EntityRun {
        task.status = EntityStatus::Attempting;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return EntityRun::Cancelled;
            }

            if task.attempts >= self.config.max_attempts {
                task.status = EntityStatus::Error;
                if task.last_error.is_none() {
                    task.last_error = Some("Erro desconhecido ao executar o robô.".to_string());
                }
                warn!(
                    "Entity {} exhausted {} attempts: {}",
                    task.ie,
                    task.attempts,
                    task.last_error.as_deref().unwrap_or_default()
                );
                self.record_terminal(task);
                return EntityRun::Completed;
            }

            // Admission gate. Waiting here does not consume an attempt.
            if !self.admission.has_capacity() {
                metrics::ADMISSION_WAITS.inc();
                debug!(
                    "Entity {} deferred by admission gate, retrying in {}ms",
                    task.ie, self.admission_backoff_ms
                );
                tokio::time::sleep(Duration::from_millis(self.admission_backoff_ms)).await;
                continue;
            }

            task.attempts += 1;
            info!(
                "Entity {} attempt {}/{}",
                task.ie, task.attempts, self.config.max_attempts
            );

            let outcome = match self.driver.open_session(&self.download_dir).await {
                Ok(mut session) => {
                    session_opened();
                    let outcome = self.attempt(session.as_mut(), task).await;
                    session.close().await;
                    session_closed();
                    outcome
                }
                Err(PortalError::InvalidCredentials) => AttemptOutcome::Abort,
                Err(PortalError::Failure(raw)) => AttemptOutcome::Retry(raw),
            };

            match outcome {
                AttemptOutcome::Terminal(status) => {
                    task.status = status;
                    self.record_terminal(task);
                    return EntityRun::Completed;
                }
                AttemptOutcome::Abort => return EntityRun::AbortJob,
                AttemptOutcome::Cancelled => return EntityRun::Cancelled,
                AttemptOutcome::Retry(raw) => {
                    let classified = classify(&raw);
                    task.last_error = Some(classified.message.clone());
                    if !classified.retryable {
                        warn!(
                            "Entity {} hit a non-retryable failure: {}",
                            task.ie, classified.message
                        );
                        task.status = EntityStatus::Error;
                        self.record_terminal(task);
                        return EntityRun::Completed;
                    }
                    warn!(
                        "Entity {} attempt {} failed ({:?}): {}",
                        task.ie, task.attempts, classified.kind, classified.message
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.attempt_cooldown_ms))
                        .await;
                }
            }
        }
    }

    /// One attempt over a fresh session: login, then one search and
    /// download per period.
    async fn attempt(
        &self,
        session: &mut dyn PortalSession,
        task: &mut EntityTask,
    ) -> AttemptOutcome {
        match session
            .login(&self.credentials.cpf, &self.credentials.senha)
            .await
        {
            Ok(()) => {}
            Err(PortalError::InvalidCredentials) => return AttemptOutcome::Abort,
            Err(PortalError::Failure(raw)) => return AttemptOutcome::Retry(raw),
        }

        for period in &self.periods {
            if self.cancel.load(Ordering::Relaxed) {
                return AttemptOutcome::Cancelled;
            }

            let outcome = match self.search_with_refill(session, period, task).await {
                Ok(outcome) => outcome,
                Err(PortalError::InvalidCredentials) => return AttemptOutcome::Abort,
                Err(PortalError::Failure(raw)) => return AttemptOutcome::Retry(raw),
            };

            match outcome {
                // Terminal for the entity; remaining periods are skipped.
                SearchOutcome::NoResults => {
                    info!("Entity {} period {}: no results", task.ie, period);
                    return AttemptOutcome::Terminal(EntityStatus::NoResults);
                }
                SearchOutcome::PermissionDenied => {
                    info!("Entity {} period {}: permission denied", task.ie, period);
                    return AttemptOutcome::Terminal(EntityStatus::PermissionDenied);
                }
                SearchOutcome::Results { count, pages } => {
                    let files = if count > self.config.paged_threshold {
                        match self.download_paged(session, period, task, pages).await {
                            Ok(PagedDownload::Files(files)) => Ok(files),
                            Ok(PagedDownload::Ended(SearchOutcome::PermissionDenied)) => {
                                info!("Entity {} period {}: permission denied", task.ie, period);
                                return AttemptOutcome::Terminal(EntityStatus::PermissionDenied);
                            }
                            Ok(PagedDownload::Ended(_)) => {
                                info!(
                                    "Entity {} period {}: results gone after refresh",
                                    task.ie, period
                                );
                                return AttemptOutcome::Terminal(EntityStatus::NoResults);
                            }
                            Err(e) => Err(e),
                        }
                    } else {
                        session.bulk_download().await
                    };
                    let files = match files {
                        Ok(files) => files,
                        Err(PortalError::InvalidCredentials) => return AttemptOutcome::Abort,
                        Err(PortalError::Failure(raw)) => return AttemptOutcome::Retry(raw),
                    };

                    let downloaded = files.len() as u64;
                    if let Err(PortalError::Failure(raw)) = self.persist_artifacts(task, &files) {
                        return AttemptOutcome::Retry(raw);
                    }
                    task.notes_downloaded += downloaded;
                    metrics::DOCUMENTS_DOWNLOADED.inc_by(downloaded);
                    info!(
                        "Entity {} period {}: {} documents ({} files)",
                        task.ie, period, count, downloaded
                    );
                }
                // search_with_refill never yields an unresolved alert
                SearchOutcome::ValidationAlert { message } => {
                    return AttemptOutcome::Retry(message);
                }
            }
        }

        AttemptOutcome::Terminal(EntityStatus::Success)
    }

    /// Submit the search, re-filling the form a bounded number of times
    /// when the portal flags a required date field.
    async fn search_with_refill(
        &self,
        session: &mut dyn PortalSession,
        period: &Period,
        task: &EntityTask,
    ) -> Result<SearchOutcome, PortalError> {
        let mut corrections = 0;
        loop {
            let outcome = session.search(period, &task.ie, task.mode).await?;
            match outcome {
                SearchOutcome::ValidationAlert { message } => {
                    if corrections >= self.config.max_fill_corrections {
                        return Err(PortalError::Failure(format!(
                            "Alerta de validação persistente após {} correções: {}",
                            corrections, message
                        )));
                    }
                    corrections += 1;
                    debug!(
                        "Entity {} period {}: validation alert, re-filling ({}/{}): {}",
                        task.ie, period, corrections, self.config.max_fill_corrections, message
                    );
                }
                other => return Ok(other),
            }
        }
    }

    /// Paged download for oversized result sets, one page window at a
    /// time. A transient window failure triggers a refresh and a fresh
    /// search before the window is retried; a recovery search that no
    /// longer shows results ends the pass.
    async fn download_paged(
        &self,
        session: &mut dyn PortalSession,
        period: &Period,
        task: &EntityTask,
        pages: u32,
    ) -> Result<PagedDownload, PortalError> {
        let mut files = Vec::new();

        for (first_page, last_page) in page_windows(pages, self.config.page_window) {
            let mut sub_retries = 0;
            loop {
                match session.paged_download(first_page, last_page).await {
                    Ok(mut window_files) => {
                        files.append(&mut window_files);
                        break;
                    }
                    Err(PortalError::InvalidCredentials) => {
                        return Err(PortalError::InvalidCredentials)
                    }
                    Err(PortalError::Failure(raw)) => {
                        let classified = classify(&raw);
                        if !classified.retryable || sub_retries >= self.config.max_download_retries
                        {
                            return Err(PortalError::Failure(raw));
                        }
                        sub_retries += 1;
                        warn!(
                            "Entity {} pages {}-{}: download failed, refreshing ({}/{}): {}",
                            task.ie,
                            first_page,
                            last_page,
                            sub_retries,
                            self.config.max_download_retries,
                            classified.message
                        );
                        session.refresh().await?;
                        match self.search_with_refill(session, period, task).await? {
                            SearchOutcome::Results { .. } => {}
                            outcome => return Ok(PagedDownload::Ended(outcome)),
                        }
                    }
                }
            }
        }

        Ok(PagedDownload::Files(files))
    }

    /// Move downloaded files into the entity's artifact directory.
    fn persist_artifacts(
        &self,
        task: &mut EntityTask,
        files: &[PathBuf],
    ) -> Result<(), PortalError> {
        if files.is_empty() {
            return Ok(());
        }

        let dest_dir = self.artifact_root.join(&task.ie);
        std::fs::create_dir_all(&dest_dir)
            .map_err(|e| PortalError::Failure(format!("Erro ao mover arquivo: {}", e)))?;

        for file in files {
            let name = file
                .file_name()
                .ok_or_else(|| PortalError::Failure("Erro ao mover arquivo: nome vazio".into()))?;
            let dest = dest_dir.join(name);
            move_file(file, &dest)
                .map_err(|e| PortalError::Failure(format!("Erro ao mover arquivo: {}", e)))?;
        }

        if !task.artifacts.contains(&dest_dir) {
            task.artifacts.push(dest_dir);
        }
        Ok(())
    }

    fn record_terminal(&self, task: &EntityTask) {
        metrics::ENTITY_ATTEMPTS.observe(task.attempts as f64);
        metrics::ENTITY_OUTCOMES
            .with_label_values(&[outcome_label(task.status)])
            .inc();
    }
}

fn outcome_label(status: EntityStatus) -> &'static str {
    match status {
        EntityStatus::Success => "success",
        EntityStatus::NoResults => "no_results",
        EntityStatus::PermissionDenied => "permission_denied",
        _ => "error",
    }
}

/// Inclusive page windows of at most `window` pages covering `1..=pages`.
fn page_windows(pages: u32, window: u32) -> Vec<(u32, u32)> {
    if pages == 0 || window == 0 {
        return Vec::new();
    }
    let mut windows = Vec::new();
    let mut first = 1;
    while first <= pages {
        let last = (first + window - 1).min(pages);
        windows.push((first, last));
        first = last + 1;
    }
    windows
}

/// Rename with a copy-and-remove fallback for cross-device moves.
fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dest)?;
            std::fs::remove_file(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_windows_exact_multiple() {
        assert_eq!(page_windows(1000, 500), vec![(1, 500), (501, 1000)]);
    }

    #[test]
    fn test_page_windows_partial_tail() {
        assert_eq!(
            page_windows(1024, 500),
            vec![(1, 500), (501, 1000), (1001, 1024)]
        );
    }

    #[test]
    fn test_page_windows_single_window() {
        assert_eq!(page_windows(7, 500), vec![(1, 7)]);
    }

    #[test]
    fn test_page_windows_degenerate() {
        assert!(page_windows(0, 500).is_empty());
        assert!(page_windows(10, 0).is_empty());
    }

    #[test]
    fn test_move_file_across_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.xml");
        let dest_dir = tmp.path().join("organized");
        std::fs::create_dir_all(&dest_dir).unwrap();
        std::fs::write(&src, b"<xml/>").unwrap();

        let dest = dest_dir.join("a.xml");
        move_file(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"<xml/>");
    }
}
