//! Scriptable admission controller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::admission::AdmissionController;

/// Admission controller answering from a scripted queue, then a fixed
/// default. Records how many times it was polled.
pub struct MockAdmission {
    responses: Mutex<VecDeque<bool>>,
    default: bool,
    polls: AtomicUsize,
}

impl MockAdmission {
    /// Always admits.
    pub fn open() -> Self {
        Self::with_default(true)
    }

    /// Never admits.
    pub fn closed() -> Self {
        Self::with_default(false)
    }

    fn with_default(default: bool) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default,
            polls: AtomicUsize::new(0),
        }
    }

    /// Queue one scripted answer ahead of the default.
    pub fn push_response(&self, admit: bool) {
        self.responses.lock().unwrap().push_back(admit);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl AdmissionController for MockAdmission {
    fn has_capacity(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default)
    }
}
