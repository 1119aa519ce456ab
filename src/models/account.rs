// src/models/account.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AccountId = i64;

/// Operator tier. Drives default rates and the commission split.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperatorTier {
    Standard,
    Premium,
    Vip,
    Elite,
}

impl OperatorTier {
    /// Fraction of a gross charge the operator keeps; the remainder
    /// is the platform share.
    pub fn commission_rate(&self) -> Decimal {
        match self {
            OperatorTier::Standard => Decimal::new(60, 2),
            OperatorTier::Premium => Decimal::new(65, 2),
            OperatorTier::Vip => Decimal::new(70, 2),
            OperatorTier::Elite => Decimal::new(75, 2),
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "premium" => OperatorTier::Premium,
            "vip" => OperatorTier::Vip,
            "elite" => OperatorTier::Elite,
            _ => OperatorTier::Standard,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OperatorTier::Standard => "standard",
            OperatorTier::Premium => "premium",
            OperatorTier::Vip => "vip",
            OperatorTier::Elite => "elite",
        }
    }
}

/// Materialized balance projection for one account. Spendable prepaid
/// funds and pending operator earnings are tracked separately; only the
/// ledger store mutates either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account_id: AccountId,
    pub balance: Decimal,
    pub pending_earnings: Decimal,
}

impl AccountLedger {
    pub fn new(account_id: AccountId, opening_balance: Decimal) -> Self {
        Self {
            account_id,
            balance: opening_balance,
            pending_earnings: Decimal::ZERO,
        }
    }

    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
