// src/ledger/recorder.rs
use crate::error::BillingError;
use crate::ledger::store::{ChargeCommand, CommitResult, LedgerStore};
use crate::models::{AccountId, ChargeRecord, CreditEntry, InteractionKind};
use crate::services::RateCatalog;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Idempotent charge commit with the revenue split computed at commit
/// time. The only component allowed to move money; balance monitor and
/// discrete biller both come through here.
pub struct LedgerRecorder {
    store: Arc<LedgerStore>,
    catalog: Arc<RateCatalog>,
}

impl LedgerRecorder {
    pub fn new(store: Arc<LedgerStore>, catalog: Arc<RateCatalog>) -> Self {
        Self { store, catalog }
    }

    /// All-or-nothing commit. Fails with `InsufficientBalance` when the
    /// payer cannot cover the full gross amount at commit time.
    pub fn commit(
        &self,
        payer_id: AccountId,
        payee_id: AccountId,
        gross: Decimal,
        kind: InteractionKind,
        reference: &str,
    ) -> Result<CommitResult, BillingError> {
        self.commit_inner(payer_id, payee_id, gross, kind, reference, false)
    }

    /// Metered-tick commit: the charge is capped at the payer's
    /// remaining balance, so exhaustion yields one final record that
    /// drains the balance to exactly zero. Zero-amount records are
    /// valid final flush ticks.
    pub fn commit_capped(
        &self,
        payer_id: AccountId,
        payee_id: AccountId,
        gross: Decimal,
        kind: InteractionKind,
        reference: &str,
    ) -> Result<CommitResult, BillingError> {
        self.commit_inner(payer_id, payee_id, gross, kind, reference, true)
    }

    fn commit_inner(
        &self,
        payer_id: AccountId,
        payee_id: AccountId,
        gross: Decimal,
        kind: InteractionKind,
        reference: &str,
        cap_to_balance: bool,
    ) -> Result<CommitResult, BillingError> {
        let commission_rate = self.catalog.commission_rate(payee_id);

        let result = self.store.commit_charge(ChargeCommand {
            payer_id,
            payee_id,
            gross,
            commission_rate,
            kind,
            reference: reference.to_string(),
            cap_to_balance,
        })?;

        info!(
            record_id = %result.record.id,
            payer = payer_id,
            payee = payee_id,
            gross = %result.record.gross,
            payee_share = %result.record.payee_share,
            platform_share = %result.record.platform_share,
            category = result.record.kind.category().as_str(),
            "✅ Charge recorded"
        );

        Ok(result)
    }

    /// Top-up path, idempotent per reference.
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        reference: &str,
    ) -> Result<(CreditEntry, Decimal), BillingError> {
        self.store.credit(account_id, amount, reference)
    }

    pub fn balance(&self, account_id: AccountId) -> Result<Decimal, BillingError> {
        self.store.balance(account_id)
    }

    pub fn pending_earnings(&self, account_id: AccountId) -> Result<Decimal, BillingError> {
        self.store.pending_earnings(account_id)
    }

    pub fn records(&self) -> Vec<ChargeRecord> {
        self.store.records()
    }
}
