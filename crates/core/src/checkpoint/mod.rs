//! Durable per-job entity checkpoints.
//!
//! The only state that survives a process restart: which entities of a
//! job key have already completed, so a resumed job skips them.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteCheckpointStore;
pub use store::{CheckpointError, CheckpointKey, CheckpointStore};
