//! Job data model, wire contract and intake decoding.

mod intake;
mod period;
mod types;
mod wire;

pub use intake::{decode_job, IntakeError};
pub use period::{range_key, Period};
pub use types::{EntityStatus, EntityTask, Job, JobStatus, OperationMode};
pub use wire::{Credentials, InboundEntity, InboundJobMessage, MessageHeaders, StatusMessage, WireStatus};
