// src/services/collaborators.rs
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::BillingError;
use crate::models::TopUpTicket;

/// Session-facing event pushed to the notification collaborator.
/// Delivery mechanics (audio prompt, socket push) are out of scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingEvent {
    LowBalance,
    CriticalBalance,
    Terminated,
    PaymentAdded,
}

impl BillingEvent {
    pub fn as_str(&self) -> &str {
        match self {
            BillingEvent::LowBalance => "low_balance",
            BillingEvent::CriticalBalance => "critical_balance",
            BillingEvent::Terminated => "terminated",
            BillingEvent::PaymentAdded => "payment_added",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, session_id: Uuid, event: BillingEvent, human_message: String);
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentBridge: Send + Sync {
    /// Ask the payment collaborator to start an out-of-band top-up for
    /// a paused session. The collaborator later calls back into
    /// `BalanceMonitor::resume_after_payment` with the credited amount.
    async fn request_top_up(
        &self,
        session_id: Uuid,
        suggested_amount: Decimal,
    ) -> Result<TopUpTicket, BillingError>;
}

/// Default sink that renders events to the log stream. Useful until a
/// real delivery transport is wired in, and in tests.
pub struct LoggingNotifier;

#[async_trait]
impl NotificationSink for LoggingNotifier {
    async fn notify(&self, session_id: Uuid, event: BillingEvent, human_message: String) {
        let payload = serde_json::json!({
            "session_id": session_id,
            "event": event.as_str(),
            "message": human_message,
        });
        info!(%session_id, event = event.as_str(), "🔔 Notification: {}", payload);
    }
}
