//! Recording doubles for outbound surfaces.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::job::StatusMessage;
use crate::publisher::{PublishError, StatusPublisher};
use crate::report::AlertSink;

/// Publisher that keeps every status message it is given.
#[derive(Default)]
pub struct RecordingStatusPublisher {
    messages: Mutex<Vec<StatusMessage>>,
}

impl RecordingStatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<StatusMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusPublisher for RecordingStatusPublisher {
    async fn publish(&self, message: &StatusMessage) -> Result<(), PublishError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Alert sink that keeps every alert text.
#[derive(Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<String>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn send(&self, text: &str) {
        self.alerts.lock().unwrap().push(text.to_string());
    }
}
