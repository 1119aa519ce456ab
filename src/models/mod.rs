// src/models/mod.rs
pub mod account;
pub mod charge;
pub mod rate;
pub mod session;

pub use account::{AccountId, AccountLedger, OperatorTier};
pub use charge::{ChargeRecord, CreditEntry, InteractionKind};
pub use rate::{tier_default_rate, Rate, RateCategory};
pub use session::{
    EndReason, MonitoredSession, SessionStatus, SessionSummary, WarningEvent, WarningKind,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==================== API DTOs ====================

/// One discrete (one-shot) charge attempt: a message, a content
/// purchase, or a room entry fee.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscreteChargeRequest {
    /// Customer paying for the interaction.
    pub payer_id: AccountId,
    /// Operator on the other side of the interaction.
    pub payee_id: AccountId,
    pub category: RateCategory,
    /// Idempotency reference for this attempt (message id, purchase id).
    pub reference: String,
    /// Paid attachments make the interaction ineligible for free credits.
    #[serde(default)]
    pub attachments_present: bool,
    /// True when this is an operator replying to the customer. Replies
    /// never charge; they grant the customer a free credit instead.
    #[serde(default)]
    pub operator_reply: bool,
    /// Room the entry fee is for, when the category is `Room`.
    #[serde(default)]
    pub room_session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscreteChargeOutcome {
    pub charged: Decimal,
    pub remaining_balance: Decimal,
    pub used_free_credit: bool,
    pub granted_free_credit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
}

/// State transition produced by a billing tick's threshold evaluation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionTransition {
    WarnedLow,
    WarnedCritical,
    Terminated(EndReason),
}

/// Outcome of one billing tick.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    Charged {
        amount: Decimal,
        balance: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        transition: Option<SessionTransition>,
    },
    /// Replayed tick sequence number; logged and ignored.
    DuplicateIgnored,
    /// Session is paused for payment; no charge accrues.
    SkippedPaused,
}

/// Response handed back by the payment collaborator when a mid-session
/// top-up is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpTicket {
    pub accepted: bool,
    pub session_handle: String,
}
