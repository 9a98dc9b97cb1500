//! Portal driver backends available to this binary.
//!
//! Real page-driving backends live outside this repository and are wired
//! in by the deployment. The simulated backend keeps the service runnable
//! end to end for smoke tests: every login succeeds and every search
//! finds nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use harvester_core::config::{PortalBackend, PortalConfig};
use harvester_core::job::{OperationMode, Period};
use harvester_core::portal::{PortalDriver, PortalError, PortalSession, SearchOutcome};

pub fn create_driver(config: &PortalConfig) -> Arc<dyn PortalDriver> {
    match config.backend {
        PortalBackend::Simulated => {
            info!("Using simulated portal driver; no portal traffic will occur");
            Arc::new(SimulatedDriver)
        }
    }
}

struct SimulatedDriver;

#[async_trait]
impl PortalDriver for SimulatedDriver {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn open_session(
        &self,
        _download_dir: &Path,
    ) -> Result<Box<dyn PortalSession>, PortalError> {
        Ok(Box::new(SimulatedSession))
    }
}

struct SimulatedSession;

#[async_trait]
impl PortalSession for SimulatedSession {
    async fn login(&mut self, _cpf: &str, _senha: &str) -> Result<(), PortalError> {
        Ok(())
    }

    async fn search(
        &mut self,
        _period: &Period,
        _entity_id: &str,
        _mode: OperationMode,
    ) -> Result<SearchOutcome, PortalError> {
        Ok(SearchOutcome::NoResults)
    }

    async fn bulk_download(&mut self) -> Result<Vec<PathBuf>, PortalError> {
        Ok(Vec::new())
    }

    async fn paged_download(
        &mut self,
        _first_page: u32,
        _last_page: u32,
    ) -> Result<Vec<PathBuf>, PortalError> {
        Ok(Vec::new())
    }

    async fn refresh(&mut self) -> Result<(), PortalError> {
        Ok(())
    }

    async fn close(self: Box<Self>) {}
}
