// src/services/mod.rs
pub mod balance_monitor;
pub mod collaborators;
pub mod discrete_biller;
pub mod rate_catalog;

pub use balance_monitor::BalanceMonitor;
pub use collaborators::{BillingEvent, LoggingNotifier, NotificationSink, PaymentBridge};
pub use discrete_biller::MeteredInteractionBiller;
pub use rate_catalog::RateCatalog;
