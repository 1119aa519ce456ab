// src/ledger/store.rs
use crate::error::BillingError;
use crate::models::{AccountId, AccountLedger, ChargeRecord, CreditEntry, InteractionKind};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One charge to apply against the store.
#[derive(Debug, Clone)]
pub struct ChargeCommand {
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    pub gross: Decimal,
    /// Fraction of gross credited to the payee's pending earnings,
    /// captured by the caller at commit time.
    pub commission_rate: Decimal,
    pub kind: InteractionKind,
    pub reference: String,
    /// Metered ticks cap the charge at the remaining balance instead of
    /// failing; discrete charges are all-or-nothing.
    pub cap_to_balance: bool,
}

#[derive(Debug, Clone)]
pub struct CommitResult {
    pub record: ChargeRecord,
    pub new_payer_balance: Decimal,
}

struct StoreInner {
    accounts: HashMap<AccountId, AccountLedger>,
    records: Vec<ChargeRecord>,
    credits: Vec<CreditEntry>,
    /// Idempotency index: reference -> committed entry id.
    committed_refs: HashMap<String, Uuid>,
}

/// Append-only charge log plus a materialized balance projection,
/// mutated under one lock so a commit's debit, earnings credit, and
/// record append land together or not at all.
pub struct LedgerStore {
    inner: Mutex<StoreInner>,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                accounts: HashMap::new(),
                records: Vec::new(),
                credits: Vec::new(),
                committed_refs: HashMap::new(),
            }),
        }
    }

    pub fn open_account(&self, account_id: AccountId, opening_balance: Decimal) {
        let mut inner = self.inner.lock();
        inner
            .accounts
            .entry(account_id)
            .or_insert_with(|| AccountLedger::new(account_id, opening_balance));
    }

    /// Apply one charge atomically. Re-checks the payer balance under
    /// the lock; this is the authoritative admission decision.
    pub fn commit_charge(&self, cmd: ChargeCommand) -> Result<CommitResult, BillingError> {
        if cmd.gross < Decimal::ZERO {
            return Err(BillingError::InvalidRequest(format!(
                "negative gross amount {}",
                cmd.gross
            )));
        }

        let mut inner = self.inner.lock();

        if let Some(existing) = inner.committed_refs.get(&cmd.reference) {
            warn!(
                reference = %cmd.reference,
                record_id = %existing,
                "Duplicate charge reference, refusing to double-charge"
            );
            return Err(BillingError::DuplicateTick(cmd.reference));
        }

        let available = inner
            .accounts
            .get(&cmd.payer_id)
            .ok_or(BillingError::AccountNotFound(cmd.payer_id))?
            .balance;

        if !inner.accounts.contains_key(&cmd.payee_id) {
            return Err(BillingError::AccountNotFound(cmd.payee_id));
        }

        let gross = if cmd.cap_to_balance {
            cmd.gross.min(available).max(Decimal::ZERO)
        } else {
            if available < cmd.gross {
                return Err(BillingError::InsufficientBalance {
                    required: cmd.gross,
                    available,
                });
            }
            cmd.gross
        };

        let payee_share = (gross * cmd.commission_rate).round_dp(2);
        let platform_share = gross - payee_share;

        let record = ChargeRecord {
            id: Uuid::now_v7(),
            payer_id: cmd.payer_id,
            payee_id: cmd.payee_id,
            kind: cmd.kind,
            gross,
            payee_share,
            platform_share,
            reference: cmd.reference.clone(),
            committed_at: Utc::now(),
        };

        let new_balance = available - gross;
        inner
            .accounts
            .get_mut(&cmd.payer_id)
            .ok_or(BillingError::AccountNotFound(cmd.payer_id))?
            .balance = new_balance;
        inner
            .accounts
            .get_mut(&cmd.payee_id)
            .ok_or(BillingError::AccountNotFound(cmd.payee_id))?
            .pending_earnings += payee_share;
        inner.committed_refs.insert(cmd.reference, record.id);
        inner.records.push(record.clone());

        debug!(
            payer = cmd.payer_id,
            payee = cmd.payee_id,
            gross = %gross,
            previous_balance = %available,
            new_balance = %new_balance,
            "Charge committed"
        );

        Ok(CommitResult {
            record,
            new_payer_balance: new_balance,
        })
    }

    /// Credit a balance outside the charge path (top-up). Idempotent
    /// per reference so a retried payment callback cannot double-credit.
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        reference: &str,
    ) -> Result<(CreditEntry, Decimal), BillingError> {
        if amount < Decimal::ZERO {
            return Err(BillingError::InvalidRequest(format!(
                "negative credit amount {}",
                amount
            )));
        }

        let mut inner = self.inner.lock();

        if inner.committed_refs.contains_key(reference) {
            warn!(reference, "Duplicate credit reference, ignoring");
            return Err(BillingError::DuplicateTick(reference.to_string()));
        }

        let ledger = inner
            .accounts
            .get_mut(&account_id)
            .ok_or(BillingError::AccountNotFound(account_id))?;
        ledger.balance += amount;
        let new_balance = ledger.balance;

        let entry = CreditEntry {
            id: Uuid::now_v7(),
            account_id,
            amount,
            reference: reference.to_string(),
            credited_at: Utc::now(),
        };
        let entry_id = entry.id;
        inner.committed_refs.insert(reference.to_string(), entry_id);
        inner.credits.push(entry.clone());

        info!(
            account = account_id,
            amount = %amount,
            new_balance = %new_balance,
            "Balance credited"
        );

        Ok((entry, new_balance))
    }

    pub fn balance(&self, account_id: AccountId) -> Result<Decimal, BillingError> {
        self.ledger(account_id).map(|l| l.balance)
    }

    pub fn pending_earnings(&self, account_id: AccountId) -> Result<Decimal, BillingError> {
        self.ledger(account_id).map(|l| l.pending_earnings)
    }

    pub fn ledger(&self, account_id: AccountId) -> Result<AccountLedger, BillingError> {
        self.inner
            .lock()
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or(BillingError::AccountNotFound(account_id))
    }

    pub fn records(&self) -> Vec<ChargeRecord> {
        self.inner.lock().records.clone()
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn store_with_accounts(payer_balance: Decimal) -> LedgerStore {
        let store = LedgerStore::new();
        store.open_account(1, payer_balance);
        store.open_account(2, Decimal::ZERO);
        store
    }

    fn message_cmd(gross: Decimal, reference: &str) -> ChargeCommand {
        ChargeCommand {
            payer_id: 1,
            payee_id: 2,
            gross,
            commission_rate: dec!(0.65),
            kind: InteractionKind::Message {
                message_ref: reference.to_string(),
            },
            reference: reference.to_string(),
            cap_to_balance: false,
        }
    }

    #[test]
    fn commit_splits_at_captured_commission() {
        let store = store_with_accounts(dec!(10.00));
        let result = store.commit_charge(message_cmd(dec!(3.00), "m-1")).unwrap();

        assert_eq!(result.record.payee_share, dec!(1.95));
        assert_eq!(result.record.platform_share, dec!(1.05));
        assert_eq!(
            result.record.payee_share + result.record.platform_share,
            result.record.gross
        );
        assert_eq!(result.new_payer_balance, dec!(7.00));
        assert_eq!(store.pending_earnings(2).unwrap(), dec!(1.95));
    }

    #[test]
    fn strict_commit_rejects_insufficient_balance() {
        let store = store_with_accounts(dec!(0.30));
        let err = store
            .commit_charge(message_cmd(dec!(0.50), "m-1"))
            .unwrap_err();

        assert!(matches!(err, BillingError::InsufficientBalance { .. }));
        assert_eq!(store.balance(1).unwrap(), dec!(0.30));
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn capped_commit_drains_balance_to_exactly_zero() {
        let store = store_with_accounts(dec!(2.00));
        let mut cmd = message_cmd(dec!(3.00), "t-1");
        cmd.cap_to_balance = true;

        let result = store.commit_charge(cmd).unwrap();
        assert_eq!(result.record.gross, dec!(2.00));
        assert_eq!(result.new_payer_balance, Decimal::ZERO);
    }

    #[test]
    fn replayed_reference_is_rejected_without_side_effects() {
        let store = store_with_accounts(dec!(10.00));
        store.commit_charge(message_cmd(dec!(1.00), "m-1")).unwrap();
        let err = store
            .commit_charge(message_cmd(dec!(1.00), "m-1"))
            .unwrap_err();

        assert!(matches!(err, BillingError::DuplicateTick(_)));
        assert_eq!(store.balance(1).unwrap(), dec!(9.00));
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn credit_is_idempotent_per_reference() {
        let store = store_with_accounts(dec!(1.00));
        store.credit(1, dec!(5.00), "topup-1").unwrap();
        assert!(store.credit(1, dec!(5.00), "topup-1").is_err());
        assert_eq!(store.balance(1).unwrap(), dec!(6.00));
    }

    proptest! {
        /// Conservation: total payer decrement equals the sum of gross
        /// amounts, and total payee increment equals the sum of shares.
        #[test]
        fn charges_conserve_money(amounts in prop::collection::vec(1u32..=50_000, 1..40)) {
            let opening = dec!(1_000_000.00);
            let store = store_with_accounts(opening);

            let mut total_gross = Decimal::ZERO;
            let mut total_share = Decimal::ZERO;
            for (i, cents) in amounts.iter().enumerate() {
                let gross = Decimal::new(*cents as i64, 2);
                let result = store
                    .commit_charge(message_cmd(gross, &format!("m-{i}")))
                    .unwrap();
                total_gross += result.record.gross;
                total_share += result.record.payee_share;
                prop_assert_eq!(
                    result.record.payee_share + result.record.platform_share,
                    result.record.gross
                );
            }

            prop_assert_eq!(opening - store.balance(1).unwrap(), total_gross);
            prop_assert_eq!(store.pending_earnings(2).unwrap(), total_share);
        }
    }
}
