use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::limits::MAX_STAY_DAYS;
use crate::payment::ProcessorConfig;

/// Behaviour switches for the booking engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Refuse `confirm_booking` until a deposit is recorded.
    pub require_deposit_before_confirm: bool,
    /// Days after check-in before an unarrived confirmed booking becomes a no-show.
    pub no_show_grace_days: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            require_deposit_before_confirm: false,
            no_show_grace_days: 1,
        }
    }
}

/// Process configuration, read from `SIAMSTAY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineSettings,
    pub metrics_port: Option<u16>,
    pub sweep_interval: Duration,
    pub processors: Vec<ProcessorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            metrics_port: None,
            sweep_interval: Duration::from_secs(3600),
            processors: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<i64>().ok());

        let require_deposit_before_confirm = lookup("SIAMSTAY_REQUIRE_DEPOSIT")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.engine.require_deposit_before_confirm);
        let no_show_grace_days = parsed("SIAMSTAY_NO_SHOW_GRACE_DAYS")
            .filter(|d| (0..=MAX_STAY_DAYS).contains(d))
            .unwrap_or(defaults.engine.no_show_grace_days);
        let metrics_port = lookup("SIAMSTAY_METRICS_PORT").and_then(|s| s.trim().parse().ok());
        let sweep_interval = parsed("SIAMSTAY_SWEEP_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map_or(defaults.sweep_interval, |s| Duration::from_secs(s as u64));

        let mut processors = Vec::new();
        if let Some(api_key) = lookup("SIAMSTAY_STRIPE_API_KEY") {
            processors.push(ProcessorConfig::Stripe { api_key });
        }
        if let Some(merchant_id) = lookup("SIAMSTAY_PROMPTPAY_MERCHANT_ID") {
            processors.push(ProcessorConfig::PromptPay { merchant_id });
        }
        if let Some(api_key) = lookup("SIAMSTAY_BINANCE_API_KEY") {
            processors.push(ProcessorConfig::BinancePay { api_key });
        }

        Self {
            engine: EngineSettings {
                require_deposit_before_confirm,
                no_show_grace_days,
            },
            metrics_port,
            sweep_interval,
            processors,
        }
    }
}
