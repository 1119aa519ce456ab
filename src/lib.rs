// src/lib.rs
//! Metered billing and balance-monitoring core for the Chatline
//! pay-per-use marketplace.
//!
//! Customers hold a prepaid balance debited in real time as they consume
//! voice calls, chat messages, content purchases, and private-room
//! occupancy; operators earn a commission split of every charge. The
//! crate exposes four components:
//!
//! - [`services::RateCatalog`]: operator rates, tier defaults, ceilings
//! - [`ledger::LedgerRecorder`]: atomic, idempotent charge commits over
//!   an append-only ledger with a materialized balance projection
//! - [`services::MeteredInteractionBiller`]: one-shot charges and the
//!   free-credit acquisition mechanic
//! - [`services::BalanceMonitor`]: the continuous-billing state machine
//!   for active calls and rooms
//!
//! Notification delivery and payment processing stay behind the
//! [`services::NotificationSink`] and [`services::PaymentBridge`] traits.

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;

pub use config::BillingConfig;
pub use error::BillingError;
pub use ledger::{LedgerRecorder, LedgerStore};
pub use models::{
    ChargeRecord, DiscreteChargeOutcome, DiscreteChargeRequest, EndReason, InteractionKind,
    MonitoredSession, RateCategory, SessionStatus, SessionSummary, SessionTransition,
    TickOutcome, TopUpTicket,
};
pub use services::{
    BalanceMonitor, BillingEvent, LoggingNotifier, MeteredInteractionBiller, NotificationSink,
    PaymentBridge, RateCatalog,
};

/// Install the process-wide log subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
