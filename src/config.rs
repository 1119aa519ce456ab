// src/config.rs
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub environment: String,
    /// Seconds between billing ticks for a monitored session.
    pub tick_interval_secs: u64,
    /// Balance at or below which the one-shot low warning fires.
    pub low_balance_threshold: Decimal,
    /// Balance at or below which the one-shot critical warning fires.
    pub critical_balance_threshold: Decimal,
    /// Operator share of a gross charge when no tier override applies.
    pub default_commission_rate: Decimal,
    /// Maximum concurrent monitored sessions per payer.
    pub max_concurrent_sessions: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            tick_interval_secs: 60,
            low_balance_threshold: Decimal::new(200, 2),
            critical_balance_threshold: Decimal::new(50, 2),
            default_commission_rate: Decimal::new(65, 2),
            max_concurrent_sessions: 5,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        Ok(BillingConfig {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| defaults.environment.clone()),
            tick_interval_secs: env::var("BILLING_TICK_INTERVAL_SECS")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.tick_interval_secs))?,
            low_balance_threshold: Self::parse_decimal(
                "LOW_BALANCE_THRESHOLD",
                defaults.low_balance_threshold,
            )?,
            critical_balance_threshold: Self::parse_decimal(
                "CRITICAL_BALANCE_THRESHOLD",
                defaults.critical_balance_threshold,
            )?,
            default_commission_rate: Self::parse_decimal(
                "DEFAULT_COMMISSION_RATE",
                defaults.default_commission_rate,
            )?,
            max_concurrent_sessions: env::var("MAX_CONCURRENT_SESSIONS")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.max_concurrent_sessions))?,
        })
    }

    fn parse_decimal(
        var: &str,
        default: Decimal,
    ) -> Result<Decimal, Box<dyn std::error::Error>> {
        match env::var(var) {
            Ok(raw) => Ok(Decimal::from_str(raw.trim())?),
            Err(_) => Ok(default),
        }
    }
}
