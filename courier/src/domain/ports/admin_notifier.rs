//! Port for alerting administrators about courier problems.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::OrderId;

/// Category of an administrator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The vendor has no consignment notes to hand out.
    #[serde(rename = "cn_stock_unavailable")]
    ConsignmentStockUnavailable,
    /// Allocation failed for another reason.
    #[serde(rename = "cn_allocation_failed")]
    ConsignmentAllocationFailed,
    /// A courier credential was activated.
    #[serde(rename = "integration_setup")]
    IntegrationSetup,
}

impl NotificationKind {
    /// Stable snake-case label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConsignmentStockUnavailable => "cn_stock_unavailable",
            Self::ConsignmentAllocationFailed => "cn_allocation_failed",
            Self::IntegrationSetup => "integration_setup",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNotification {
    /// Unique id.
    pub id: Uuid,
    /// Category.
    pub kind: NotificationKind,
    /// Human-readable message.
    pub message: String,
    /// Order concerned, if any.
    pub order_id: Option<OrderId>,
    /// When the notification was raised.
    pub created_at: DateTime<Utc>,
}

impl AdminNotification {
    /// Build a notification with a fresh id.
    pub fn new(
        kind: NotificationKind,
        message: impl Into<String>,
        order_id: Option<OrderId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            order_id,
            created_at,
        }
    }
}

/// Errors raised while delivering a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminNotifierError {
    /// Delivery channel failed.
    #[error("admin notification delivery failed: {message}")]
    Delivery { message: String },
}

impl AdminNotifierError {
    /// Helper for delivery failures.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

/// Delivery channel for administrator notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    /// Deliver `notification`.
    async fn notify(&self, notification: &AdminNotification) -> Result<(), AdminNotifierError>;
}

/// Fixture notifier that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureAdminNotifier;

#[async_trait]
impl AdminNotifier for FixtureAdminNotifier {
    async fn notify(&self, _notification: &AdminNotification) -> Result<(), AdminNotifierError> {
        Ok(())
    }
}
