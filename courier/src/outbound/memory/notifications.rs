//! Notifier that keeps every notification in memory.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use super::poisoned;
use crate::domain::ports::{AdminNotification, AdminNotifier, AdminNotifierError};

/// Records notifications and mirrors them to `tracing` at warn level.
#[derive(Debug, Default)]
pub struct RecordingAdminNotifier {
    delivered: Mutex<Vec<AdminNotification>>,
}

impl RecordingAdminNotifier {
    /// Empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification delivered so far, oldest first.
    pub fn delivered(&self) -> Vec<AdminNotification> {
        self.delivered
            .lock()
            .map(|delivered| delivered.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AdminNotifier for RecordingAdminNotifier {
    async fn notify(&self, notification: &AdminNotification) -> Result<(), AdminNotifierError> {
        warn!(
            kind = notification.kind.as_str(),
            order_id = notification.order_id.as_ref().map(|order| order.as_str()),
            message = %notification.message,
            "admin notification"
        );
        self.delivered
            .lock()
            .map_err(|_| AdminNotifierError::delivery(poisoned("notification log")))?
            .push(notification.clone());
        Ok(())
    }
}
