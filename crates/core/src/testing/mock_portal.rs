//! Scripted portal driver for tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::job::{OperationMode, Period};
use crate::portal::{PortalDriver, PortalError, PortalSession, SearchOutcome};

/// Scriptable failure, mirroring the two shapes of [`PortalError`].
#[derive(Debug, Clone)]
pub enum MockFailure {
    InvalidCredentials,
    Failure(String),
}

impl MockFailure {
    pub fn failure(message: impl Into<String>) -> Self {
        MockFailure::Failure(message.into())
    }

    fn to_error(&self) -> PortalError {
        match self {
            MockFailure::InvalidCredentials => PortalError::InvalidCredentials,
            MockFailure::Failure(message) => PortalError::Failure(message.clone()),
        }
    }
}

/// Script for one session. Unscripted calls fall back to benign defaults
/// (login succeeds, searches find nothing, downloads return no files).
#[derive(Debug, Default)]
pub struct SessionScript {
    pub login_error: Option<MockFailure>,
    pub searches: VecDeque<Result<SearchOutcome, MockFailure>>,
    /// File names the session drops into its download directory.
    pub bulk_downloads: VecDeque<Result<Vec<String>, MockFailure>>,
    pub paged_downloads: VecDeque<Result<Vec<String>, MockFailure>>,
    pub refresh_failures: VecDeque<MockFailure>,
}

impl SessionScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_login(failure: MockFailure) -> Self {
        Self {
            login_error: Some(failure),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, outcome: SearchOutcome) -> Self {
        self.searches.push_back(Ok(outcome));
        self
    }

    pub fn with_search_failure(mut self, failure: MockFailure) -> Self {
        self.searches.push_back(Err(failure));
        self
    }

    pub fn with_bulk_download(mut self, files: &[&str]) -> Self {
        self.bulk_downloads
            .push_back(Ok(files.iter().map(|f| f.to_string()).collect()));
        self
    }

    pub fn with_bulk_failure(mut self, failure: MockFailure) -> Self {
        self.bulk_downloads.push_back(Err(failure));
        self
    }

    pub fn with_paged_download(mut self, files: &[&str]) -> Self {
        self.paged_downloads
            .push_back(Ok(files.iter().map(|f| f.to_string()).collect()));
        self
    }

    pub fn with_paged_failure(mut self, failure: MockFailure) -> Self {
        self.paged_downloads.push_back(Err(failure));
        self
    }
}

/// Portal driver handing out scripted sessions in push order. When the
/// script queue runs dry, sessions use the benign defaults.
#[derive(Default)]
pub struct MockPortalDriver {
    scripts: Mutex<VecDeque<SessionScript>>,
    open_failures: Mutex<VecDeque<MockFailure>>,
    calls: Arc<Mutex<Vec<String>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockPortalDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_session(&self, script: SessionScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_open_failure(&self, failure: MockFailure) {
        self.open_failures.lock().unwrap().push_back(failure);
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Flat call log across all sessions, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortalDriver for MockPortalDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open_session(
        &self,
        download_dir: &Path,
    ) -> Result<Box<dyn PortalSession>, PortalError> {
        if let Some(failure) = self.open_failures.lock().unwrap().pop_front() {
            self.calls.lock().unwrap().push("open_failed".to_string());
            return Err(failure.to_error());
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push("open".to_string());

        Ok(Box::new(MockPortalSession {
            script,
            download_dir: download_dir.to_path_buf(),
            calls: Arc::clone(&self.calls),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MockPortalSession {
    script: SessionScript,
    download_dir: PathBuf,
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl MockPortalSession {
    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn materialize(&self, names: Vec<String>) -> Result<Vec<PathBuf>, PortalError> {
        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| PortalError::Failure(e.to_string()))?;
        let mut paths = Vec::with_capacity(names.len());
        for name in names {
            let path = self.download_dir.join(&name);
            std::fs::write(&path, b"<nfe/>").map_err(|e| PortalError::Failure(e.to_string()))?;
            paths.push(path);
        }
        Ok(paths)
    }
}

#[async_trait]
impl PortalSession for MockPortalSession {
    async fn login(&mut self, _cpf: &str, _senha: &str) -> Result<(), PortalError> {
        self.log("login".to_string());
        match self.script.login_error.take() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn search(
        &mut self,
        period: &Period,
        entity_id: &str,
        mode: OperationMode,
    ) -> Result<SearchOutcome, PortalError> {
        self.log(format!("search {} {} {}", entity_id, mode.wire_code(), period));
        match self.script.searches.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(SearchOutcome::NoResults),
        }
    }

    async fn bulk_download(&mut self) -> Result<Vec<PathBuf>, PortalError> {
        self.log("bulk_download".to_string());
        match self.script.bulk_downloads.pop_front() {
            Some(Ok(names)) => self.materialize(names),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(Vec::new()),
        }
    }

    async fn paged_download(
        &mut self,
        first_page: u32,
        last_page: u32,
    ) -> Result<Vec<PathBuf>, PortalError> {
        self.log(format!("paged_download {}-{}", first_page, last_page));
        match self.script.paged_downloads.pop_front() {
            Some(Ok(names)) => self.materialize(names),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(Vec::new()),
        }
    }

    async fn refresh(&mut self) -> Result<(), PortalError> {
        self.log("refresh".to_string());
        match self.script.refresh_failures.pop_front() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn close(self: Box<Self>) {
        self.log("close".to_string());
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
