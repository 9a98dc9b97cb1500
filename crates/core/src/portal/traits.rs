//! Trait definitions for the portal driver capability.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::job::{OperationMode, Period};

use super::error::PortalError;
use super::types::SearchOutcome;

/// Factory for portal sessions.
///
/// A session is heavyweight (one browser process in the real driver) and
/// must never be shared between entities; the retry state machine opens a
/// fresh one per attempt.
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Returns the name of this driver implementation.
    fn name(&self) -> &str;

    /// Open a new session whose downloads land in `download_dir`.
    async fn open_session(
        &self,
        download_dir: &Path,
    ) -> Result<Box<dyn PortalSession>, PortalError>;
}

/// One live portal session.
///
/// `close` must be called exactly once per opened session, on every exit
/// path; callers own that guarantee.
#[async_trait]
pub trait PortalSession: Send {
    /// Authenticate with the accountant's credentials.
    ///
    /// A rejected login fails with [`PortalError::InvalidCredentials`].
    async fn login(&mut self, cpf: &str, senha: &str) -> Result<(), PortalError>;

    /// Fill and submit the search form for one period and entity.
    async fn search(
        &mut self,
        period: &Period,
        entity_id: &str,
        mode: OperationMode,
    ) -> Result<SearchOutcome, PortalError>;

    /// Download everything the current search matched in one request.
    /// Returns the files dropped into the session's download directory.
    async fn bulk_download(&mut self) -> Result<Vec<PathBuf>, PortalError>;

    /// Download one window of result pages (`first_page..=last_page`).
    async fn paged_download(
        &mut self,
        first_page: u32,
        last_page: u32,
    ) -> Result<Vec<PathBuf>, PortalError>;

    /// Reload the portal page, recovering from transient in-portal
    /// download faults. The caller re-submits the search afterwards.
    async fn refresh(&mut self) -> Result<(), PortalError>;

    /// Tear the session down. Infallible by contract; drivers swallow and
    /// log their own teardown failures.
    async fn close(self: Box<Self>);
}
