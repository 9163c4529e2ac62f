use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
///
/// Every field has a default matching the legal/operational constants, so
/// `EngineConfig::default()` is a working setup and hosts only override
/// what they need (e.g. from a TOML/JSON file via serde).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation: ValidationConfig,
    pub detection: DetectionConfig,
    pub threshold: ThresholdConfig,
    pub dispatch: DispatchConfig,
}

/// Registry call, cache and reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Attempts per synchronous validation.
    pub retry_attempts: u32,
    /// Delay unit between attempts; attempt `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
    /// Upper bound on a single registry call.
    pub timeout_ms: u64,
    /// How long a VALID verdict is served from the store.
    pub cache_ttl_hours: i64,
    /// First reconciliation delay after retries are exhausted.
    pub unavailable_retry_minutes: i64,
    /// Backoff applied by the sweep on repeated unavailability.
    pub sweep_backoff_minutes: i64,
    /// Sweep attempts before an UNAVAILABLE record becomes ERROR.
    pub max_sweep_retries: u32,
    /// Period of the background sweep.
    pub sweep_interval_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
            timeout_ms: 30_000,
            cache_ttl_hours: 24,
            unavailable_retry_minutes: 15,
            sweep_backoff_minutes: 30,
            max_sweep_retries: 3,
            sweep_interval_secs: 900,
        }
    }
}

impl ValidationConfig {
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Error detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Allowed gap between applied and expected rate, in percentage points.
    pub tolerance: Decimal,
    /// Error count above which the range alert is raised as ERROR instead of WARNING.
    pub error_severity_count: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.5),
            error_severity_count: 5,
        }
    }
}

/// OSS registration threshold settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Annual cross-border EU sales limit (EUR).
    pub threshold: Decimal,
    /// Percentage of the threshold that triggers a warning.
    pub warning_percent: Decimal,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: dec!(10_000),
            warning_percent: dec!(80),
        }
    }
}

/// Alert/reminder dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Days before the filing deadline on which reminders go out.
    pub reminder_days: Vec<i64>,
    pub interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            reminder_days: vec![14, 7, 3, 1],
            interval_secs: 300,
        }
    }
}
