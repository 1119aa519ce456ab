// src/models/charge.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountId, RateCategory};

/// What a charge was for. Each variant carries the fields that category
/// requires, so a committed record can always be traced back to the
/// interaction that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionKind {
    CallTick {
        session_id: Uuid,
        tick_seq: u64,
        seconds_billed: i64,
    },
    Message {
        message_ref: String,
    },
    ContentPurchase {
        content_ref: String,
    },
    RoomTick {
        session_id: Uuid,
        tick_seq: u64,
        seconds_billed: i64,
    },
}

impl InteractionKind {
    pub fn category(&self) -> RateCategory {
        match self {
            InteractionKind::CallTick { .. } => RateCategory::Call,
            InteractionKind::Message { .. } => RateCategory::Message,
            InteractionKind::ContentPurchase { .. } => RateCategory::Content,
            InteractionKind::RoomTick { .. } => RateCategory::Room,
        }
    }
}

/// Immutable ledger entry for one committed charge. Never mutated or
/// deleted; refunds are separate compensating records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRecord {
    pub id: Uuid,
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    pub kind: InteractionKind,
    pub gross: Decimal,
    pub payee_share: Decimal,
    pub platform_share: Decimal,
    /// Caller-supplied idempotency reference for this charge attempt.
    pub reference: String,
    pub committed_at: DateTime<Utc>,
}

/// Balance credit applied outside the charge path (top-ups).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: Uuid,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub reference: String,
    pub credited_at: DateTime<Utc>,
}
