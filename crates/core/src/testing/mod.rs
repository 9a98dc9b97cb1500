//! Test doubles for the crate's collaborator traits.
//!
//! Used by unit and integration tests; not part of the public API
//! contract.

mod memory_checkpoint;
mod mock_admission;
mod mock_portal;
mod recording;

pub use memory_checkpoint::MemoryCheckpointStore;
pub use mock_admission::MockAdmission;
pub use mock_portal::{MockFailure, MockPortalDriver, SessionScript};
pub use recording::{RecordingAlertSink, RecordingStatusPublisher};
