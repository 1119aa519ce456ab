// src/models/rate.rs
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::OperatorTier;

/// Billing category of a metered or discrete interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RateCategory {
    /// Per-minute voice call rate.
    Call,
    /// Per-message chat rate.
    Message,
    /// Per-item content purchase rate.
    Content,
    /// Per-minute private room rate.
    Room,
}

impl RateCategory {
    /// Safety ceiling for this category. These are abuse guards,
    /// not business defaults.
    pub fn ceiling(&self) -> Decimal {
        match self {
            RateCategory::Call => Decimal::from(500),
            RateCategory::Message => Decimal::from(50),
            RateCategory::Content => Decimal::from(100),
            RateCategory::Room => Decimal::from(500),
        }
    }

    /// Continuous categories are billed per elapsed minute by the
    /// balance monitor; the rest are one-shot discrete charges.
    pub fn is_metered(&self) -> bool {
        matches!(self, RateCategory::Call | RateCategory::Room)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RateCategory::Call => "call",
            RateCategory::Message => "message",
            RateCategory::Content => "content",
            RateCategory::Room => "room",
        }
    }
}

impl std::fmt::Display for RateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operator rate entry as resolved by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    pub operator_id: i64,
    pub category: RateCategory,
    /// Minor-unit decimal; per minute for call/room, per item otherwise.
    pub amount: Decimal,
    /// False when the amount came from the operator's tier defaults.
    pub custom: bool,
}

/// Tier default rates, used when an operator has not set a custom rate.
static TIER_DEFAULT_RATES: Lazy<HashMap<(OperatorTier, RateCategory), Decimal>> =
    Lazy::new(|| {
        let mut m = HashMap::new();
        let entries = [
            (OperatorTier::Standard, RateCategory::Call, Decimal::new(199, 2)),
            (OperatorTier::Standard, RateCategory::Message, Decimal::new(50, 2)),
            (OperatorTier::Standard, RateCategory::Content, Decimal::new(500, 2)),
            (OperatorTier::Standard, RateCategory::Room, Decimal::new(299, 2)),
            (OperatorTier::Premium, RateCategory::Call, Decimal::new(299, 2)),
            (OperatorTier::Premium, RateCategory::Message, Decimal::new(75, 2)),
            (OperatorTier::Premium, RateCategory::Content, Decimal::new(1000, 2)),
            (OperatorTier::Premium, RateCategory::Room, Decimal::new(399, 2)),
            (OperatorTier::Vip, RateCategory::Call, Decimal::new(499, 2)),
            (OperatorTier::Vip, RateCategory::Message, Decimal::new(100, 2)),
            (OperatorTier::Vip, RateCategory::Content, Decimal::new(1500, 2)),
            (OperatorTier::Vip, RateCategory::Room, Decimal::new(599, 2)),
            (OperatorTier::Elite, RateCategory::Call, Decimal::new(999, 2)),
            (OperatorTier::Elite, RateCategory::Message, Decimal::new(150, 2)),
            (OperatorTier::Elite, RateCategory::Content, Decimal::new(2500, 2)),
            (OperatorTier::Elite, RateCategory::Room, Decimal::new(999, 2)),
        ];
        for (tier, category, amount) in entries {
            m.insert((tier, category), amount);
        }
        m
    });

pub fn tier_default_rate(tier: OperatorTier, category: RateCategory) -> Decimal {
    TIER_DEFAULT_RATES
        .get(&(tier, category))
        .copied()
        .unwrap_or(Decimal::ZERO)
}
