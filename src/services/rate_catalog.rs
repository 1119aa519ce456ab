// src/services/rate_catalog.rs
use crate::error::BillingError;
use crate::models::{tier_default_rate, AccountId, OperatorTier, Rate, RateCategory};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
struct OperatorProfile {
    tier: OperatorTier,
    custom_rates: HashMap<RateCategory, Decimal>,
}

/// Per-operator rate lookup and validation. Pure configuration: the
/// billing core only reads it, operators and admins write it.
pub struct RateCatalog {
    operators: RwLock<HashMap<AccountId, OperatorProfile>>,
    default_commission_rate: Decimal,
}

impl RateCatalog {
    pub fn new(default_commission_rate: Decimal) -> Self {
        Self {
            operators: RwLock::new(HashMap::new()),
            default_commission_rate,
        }
    }

    pub fn register_operator(&self, operator_id: AccountId, tier: OperatorTier) {
        let mut operators = self.operators.write();
        operators
            .entry(operator_id)
            .or_insert_with(|| OperatorProfile {
                tier,
                custom_rates: HashMap::new(),
            });
        info!(operator = operator_id, tier = tier.as_str(), "Operator registered");
    }

    /// Ceiling and sign checks. Rejected rates never reach billing.
    pub fn validate(&self, category: RateCategory, rate: Decimal) -> Result<(), BillingError> {
        if rate < Decimal::ZERO {
            return Err(BillingError::NegativeRate { category, rate });
        }
        let ceiling = category.ceiling();
        if rate > ceiling {
            return Err(BillingError::RateExceedsLimit {
                category,
                rate,
                ceiling,
            });
        }
        Ok(())
    }

    pub fn set_rate(
        &self,
        operator_id: AccountId,
        category: RateCategory,
        rate: Decimal,
    ) -> Result<(), BillingError> {
        self.validate(category, rate)?;

        let mut operators = self.operators.write();
        let profile = operators
            .get_mut(&operator_id)
            .ok_or(BillingError::RateNotFound(operator_id))?;
        profile.custom_rates.insert(category, rate);

        info!(
            operator = operator_id,
            category = category.as_str(),
            rate = %rate,
            "Custom rate set"
        );
        Ok(())
    }

    /// Custom rate if the operator set one, else the tier default.
    pub fn resolve(
        &self,
        operator_id: AccountId,
        category: RateCategory,
    ) -> Result<Rate, BillingError> {
        let operators = self.operators.read();
        let profile = operators
            .get(&operator_id)
            .ok_or(BillingError::RateNotFound(operator_id))?;

        match profile.custom_rates.get(&category) {
            Some(amount) => Ok(Rate {
                operator_id,
                category,
                amount: *amount,
                custom: true,
            }),
            None => Ok(Rate {
                operator_id,
                category,
                amount: tier_default_rate(profile.tier, category),
                custom: false,
            }),
        }
    }

    /// Commission fraction effective for this payee right now. Captured
    /// into each ChargeRecord at commit time, never re-derived later.
    pub fn commission_rate(&self, operator_id: AccountId) -> Decimal {
        self.operators
            .read()
            .get(&operator_id)
            .map(|p| p.tier.commission_rate())
            .unwrap_or(self.default_commission_rate)
    }

    pub fn is_operator(&self, account_id: AccountId) -> bool {
        self.operators.read().contains_key(&account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn catalog() -> RateCatalog {
        RateCatalog::new(dec!(0.65))
    }

    #[test]
    fn rejects_rates_above_category_ceiling() {
        let cat = catalog();
        assert!(matches!(
            cat.validate(RateCategory::Call, dec!(500.01)),
            Err(BillingError::RateExceedsLimit { .. })
        ));
        assert!(matches!(
            cat.validate(RateCategory::Message, dec!(51)),
            Err(BillingError::RateExceedsLimit { .. })
        ));
        assert!(cat.validate(RateCategory::Content, dec!(100)).is_ok());
    }

    #[test]
    fn rejects_negative_rates() {
        let cat = catalog();
        assert!(matches!(
            cat.validate(RateCategory::Room, dec!(-0.01)),
            Err(BillingError::NegativeRate { .. })
        ));
    }

    #[test]
    fn resolves_tier_default_when_no_custom_rate() {
        let cat = catalog();
        cat.register_operator(7, OperatorTier::Vip);

        let rate = cat.resolve(7, RateCategory::Call).unwrap();
        assert!(!rate.custom);
        assert_eq!(rate.amount, dec!(4.99));
    }

    #[test]
    fn custom_rate_overrides_tier_default() {
        let cat = catalog();
        cat.register_operator(7, OperatorTier::Standard);
        cat.set_rate(7, RateCategory::Message, dec!(0.80)).unwrap();

        let rate = cat.resolve(7, RateCategory::Message).unwrap();
        assert!(rate.custom);
        assert_eq!(rate.amount, dec!(0.80));
    }

    #[test]
    fn commission_follows_tier() {
        let cat = catalog();
        cat.register_operator(1, OperatorTier::Standard);
        cat.register_operator(2, OperatorTier::Elite);

        assert_eq!(cat.commission_rate(1), dec!(0.60));
        assert_eq!(cat.commission_rate(2), dec!(0.75));
        // Unknown payee falls back to the configured default.
        assert_eq!(cat.commission_rate(99), dec!(0.65));
    }

    #[test]
    fn unknown_operator_has_no_rate() {
        let cat = catalog();
        assert!(matches!(
            cat.resolve(42, RateCategory::Call),
            Err(BillingError::RateNotFound(42))
        ));
    }
}
