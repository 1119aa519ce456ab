// src/models/session.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountId, RateCategory};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    WarnedLow,
    WarnedCritical,
    PausedForPayment,
    Terminated,
}

impl SessionStatus {
    /// Ticks only accrue charges in these states.
    pub fn is_billable(&self) -> bool {
        matches!(
            self,
            SessionStatus::Active | SessionStatus::WarnedLow | SessionStatus::WarnedCritical
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::WarnedLow => "warned_low",
            SessionStatus::WarnedCritical => "warned_critical",
            SessionStatus::PausedForPayment => "paused_for_payment",
            SessionStatus::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Normal,
    InsufficientFunds,
    Cancelled,
}

impl EndReason {
    pub fn as_str(&self) -> &str {
        match self {
            EndReason::Normal => "normal",
            EndReason::InsufficientFunds => "insufficient_funds",
            EndReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Low,
    Critical,
}

/// One threshold warning that already fired for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningEvent {
    pub kind: WarningKind,
    pub balance: Decimal,
    pub fired_at: DateTime<Utc>,
}

/// One call or room occupancy under continuous billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredSession {
    pub id: Uuid,
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    pub category: RateCategory,
    pub rate_per_minute: Decimal,
    pub started_at: DateTime<Utc>,
    pub initial_balance: Decimal,
    /// Advisory copy, refreshed from every ledger commit response.
    /// The ledger re-checks at commit time; this is never authoritative.
    pub current_balance: Decimal,
    pub total_charged: Decimal,
    pub last_tick_at: DateTime<Utc>,
    /// Next expected tick sequence number. Replays below this are ignored.
    pub next_tick_seq: u64,
    pub tick_interval_secs: u64,
    pub status: SessionStatus,
    pub warnings: Vec<WarningEvent>,
    pub low_warning_fired: bool,
    pub critical_warning_fired: bool,
    pub pause_reason: Option<String>,
    /// Mid-session top-ups applied so far. Keeps the balance identity
    /// current = initial - charged + topped_up checkable at any time.
    pub total_topped_up: Decimal,
    pub topup_count: u64,
}

impl MonitoredSession {
    pub fn new(
        payer_id: AccountId,
        payee_id: AccountId,
        category: RateCategory,
        rate_per_minute: Decimal,
        initial_balance: Decimal,
        tick_interval_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payer_id,
            payee_id,
            category,
            rate_per_minute,
            started_at: now,
            initial_balance,
            current_balance: initial_balance,
            total_charged: Decimal::ZERO,
            last_tick_at: now,
            next_tick_seq: 1,
            tick_interval_secs,
            status: SessionStatus::Active,
            warnings: Vec::new(),
            low_warning_fired: false,
            critical_warning_fired: false,
            pause_reason: None,
            total_topped_up: Decimal::ZERO,
            topup_count: 0,
        }
    }

    pub fn record_warning(&mut self, kind: WarningKind, now: DateTime<Utc>) {
        self.warnings.push(WarningEvent {
            kind,
            balance: self.current_balance,
            fired_at: now,
        });
        match kind {
            WarningKind::Low => self.low_warning_fired = true,
            WarningKind::Critical => self.critical_warning_fired = true,
        }
    }

    /// Re-arm warning flags whose threshold the balance now clears,
    /// so they can fire again on the next drop below it.
    pub fn rearm_warnings(&mut self, low_threshold: Decimal, critical_threshold: Decimal) {
        if self.current_balance > low_threshold {
            self.low_warning_fired = false;
        }
        if self.current_balance > critical_threshold {
            self.critical_warning_fired = false;
        }
    }

    pub fn elapsed_since_last_tick(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_tick_at).num_seconds().max(0)
    }
}

/// Result of closing or terminating a monitored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    pub category: RateCategory,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: Decimal,
    pub total_charged: Decimal,
    pub final_balance: Decimal,
    pub end_reason: EndReason,
}
