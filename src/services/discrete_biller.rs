// src/services/discrete_biller.rs
use crate::error::BillingError;
use crate::ledger::LedgerRecorder;
use crate::models::{
    AccountId, DiscreteChargeOutcome, DiscreteChargeRequest, InteractionKind, RateCategory,
};
use crate::services::RateCatalog;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One earned free-credit unit, redeemable against a future discrete
/// charge of the same category. Single-use, consumed FIFO, no expiry.
#[derive(Debug, Clone)]
struct FreeCredit {
    granted_at: DateTime<Utc>,
    granted_by_reference: String,
}

type CreditKey = (AccountId, AccountId, RateCategory);

/// Stateless one-shot charges: a message, a content purchase, a room
/// entry fee. All-or-nothing, unlike metered ticks: a failed charge
/// must not deliver the interaction.
pub struct MeteredInteractionBiller {
    recorder: Arc<LedgerRecorder>,
    catalog: Arc<RateCatalog>,
    free_credits: Mutex<HashMap<CreditKey, VecDeque<FreeCredit>>>,
}

impl MeteredInteractionBiller {
    pub fn new(recorder: Arc<LedgerRecorder>, catalog: Arc<RateCatalog>) -> Self {
        Self {
            recorder,
            catalog,
            free_credits: Mutex::new(HashMap::new()),
        }
    }

    pub fn charge_discrete(
        &self,
        req: &DiscreteChargeRequest,
    ) -> Result<DiscreteChargeOutcome, BillingError> {
        if req.category == RateCategory::Call {
            return Err(BillingError::InvalidRequest(
                "call charges are metered, open a monitored session instead".to_string(),
            ));
        }
        if !self.catalog.is_operator(req.payee_id) {
            return Err(BillingError::RateNotFound(req.payee_id));
        }

        // Operator replies never charge. They grant the customer one
        // free credit of the same category instead, redeemable against
        // a future charge toward this operator.
        if req.operator_reply {
            self.grant_credit(req.payer_id, req.payee_id, req.category, &req.reference);
            return Ok(DiscreteChargeOutcome {
                charged: Decimal::ZERO,
                remaining_balance: self.recorder.balance(req.payer_id)?,
                used_free_credit: false,
                granted_free_credit: true,
                record_id: None,
            });
        }

        let rate = self.catalog.resolve(req.payee_id, req.category)?;

        // Attachments carry paid content and are never credit-eligible.
        if !req.attachments_present
            && self.consume_credit(req.payer_id, req.payee_id, req.category)
        {
            info!(
                payer = req.payer_id,
                payee = req.payee_id,
                category = req.category.as_str(),
                reference = %req.reference,
                "Free credit consumed, no charge"
            );
            return Ok(DiscreteChargeOutcome {
                charged: Decimal::ZERO,
                remaining_balance: self.recorder.balance(req.payer_id)?,
                used_free_credit: true,
                granted_free_credit: false,
                record_id: None,
            });
        }

        let kind = match req.category {
            RateCategory::Message => InteractionKind::Message {
                message_ref: req.reference.clone(),
            },
            RateCategory::Content => InteractionKind::ContentPurchase {
                content_ref: req.reference.clone(),
            },
            // Room entry fee: seq 0 marks the one-shot entry charge,
            // metered room ticks start at 1.
            RateCategory::Room => InteractionKind::RoomTick {
                session_id: req.room_session_id.unwrap_or_else(Uuid::nil),
                tick_seq: 0,
                seconds_billed: 0,
            },
            RateCategory::Call => unreachable!(),
        };

        let result = self
            .recorder
            .commit(req.payer_id, req.payee_id, rate.amount, kind, &req.reference)
            .map_err(|e| {
                if let BillingError::InsufficientBalance { required, available } = &e {
                    warn!(
                        payer = req.payer_id,
                        required = %required,
                        available = %available,
                        shortfall = %(required - available),
                        "❌ Discrete charge rejected"
                    );
                }
                e
            })?;

        Ok(DiscreteChargeOutcome {
            charged: result.record.gross,
            remaining_balance: result.new_payer_balance,
            used_free_credit: false,
            granted_free_credit: false,
            record_id: Some(result.record.id),
        })
    }

    /// Remaining free credits for a payer/payee/category triple.
    pub fn credit_balance(
        &self,
        payer_id: AccountId,
        payee_id: AccountId,
        category: RateCategory,
    ) -> usize {
        self.free_credits
            .lock()
            .get(&(payer_id, payee_id, category))
            .map(|q| q.len())
            .unwrap_or(0)
    }

    fn grant_credit(
        &self,
        customer_id: AccountId,
        operator_id: AccountId,
        category: RateCategory,
        reference: &str,
    ) {
        let mut credits = self.free_credits.lock();
        let queue = credits
            .entry((customer_id, operator_id, category))
            .or_default();
        queue.push_back(FreeCredit {
            granted_at: Utc::now(),
            granted_by_reference: reference.to_string(),
        });
        info!(
            customer = customer_id,
            operator = operator_id,
            category = category.as_str(),
            outstanding = queue.len(),
            "Free credit granted"
        );
    }

    fn consume_credit(
        &self,
        customer_id: AccountId,
        operator_id: AccountId,
        category: RateCategory,
    ) -> bool {
        let mut credits = self.free_credits.lock();
        match credits.get_mut(&(customer_id, operator_id, category)) {
            Some(queue) => match queue.pop_front() {
                Some(credit) => {
                    info!(
                        customer = customer_id,
                        operator = operator_id,
                        granted_by = %credit.granted_by_reference,
                        granted_at = %credit.granted_at,
                        remaining = queue.len(),
                        "Oldest free credit redeemed"
                    );
                    true
                }
                None => false,
            },
            None => false,
        }
    }
}
