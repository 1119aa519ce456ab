// src/ledger/mod.rs
pub mod recorder;
pub mod store;

pub use recorder::LedgerRecorder;
pub use store::{ChargeCommand, CommitResult, LedgerStore};
