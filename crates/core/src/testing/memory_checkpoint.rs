//! In-memory checkpoint store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::checkpoint::{CheckpointError, CheckpointKey, CheckpointStore};

/// Checkpoint store backed by a map, with a switch to simulate database
/// failures.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<String, HashSet<String>>>,
    failing: AtomicBool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CheckpointError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CheckpointError::Database("simulated failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<HashSet<String>, CheckpointError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default())
    }

    fn append(&self, key: &CheckpointKey, entity_id: &str) -> Result<(), CheckpointError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(entity_id.to_string());
        Ok(())
    }
}
