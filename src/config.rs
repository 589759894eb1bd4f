//! Engine configuration with validation and defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub rules: RulesConfig,
    pub locks: LockConfig,
    pub verify: VerifyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            locks: LockConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

/// House rules applied across all variants
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Fraction subtracted from the fair payout, e.g. 0.01 for 1%
    pub house_edge: f64,
    /// Global cap on `multiplier * bet_amount`; crossing it auto-closes the game
    pub max_payout: f64,
    pub min_bet: f64,
    pub max_bet: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            house_edge: 0.01,
            max_payout: 10_000.0,
            min_bet: 0.01,
            max_bet: 1_000.0,
        }
    }
}

/// Per-user lock behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long an acquired lock may be held before it is considered stale.
    /// Acquisition failure is never retried by the engine; it surfaces to
    /// the caller as a slow-down condition.
    pub ttl_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { ttl_ms: 500 }
    }
}

/// Verification replayer behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Fixed delay between the two active-game checks at the start of a
    /// verification request. A heuristic settle window, not a guarantee.
    pub settle_delay_ms: u64,
    /// How long terminal snapshots stay verifiable.
    pub history_retention_hours: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 250,
            history_retention_hours: 72,
        }
    }
}

impl EngineConfig {
    /// Configuration for tests: no settle delay, short locks.
    pub fn testing() -> Self {
        Self {
            rules: RulesConfig::default(),
            locks: LockConfig { ttl_ms: 200 },
            verify: VerifyConfig {
                settle_delay_ms: 0,
                history_retention_hours: 1,
            },
        }
    }

    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..1.0).contains(&self.rules.house_edge) {
            return Err(ConfigValidationError::InvalidValue(
                "house_edge must be in [0, 1)".to_string(),
            ));
        }

        if self.rules.max_payout <= 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_payout must be > 0".to_string(),
            ));
        }

        if self.rules.min_bet <= 0.0 || self.rules.max_bet < self.rules.min_bet {
            return Err(ConfigValidationError::LogicalInconsistency(
                "bet bounds must satisfy 0 < min_bet <= max_bet".to_string(),
            ));
        }

        if self.locks.ttl_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "lock ttl_ms must be > 0".to_string(),
            ));
        }

        if self.verify.history_retention_hours == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "history_retention_hours must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.locks.ttl_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.verify.settle_delay_ms)
    }

    pub fn history_retention(&self) -> Duration {
        Duration::from_secs(self.verify.history_retention_hours * 3600)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Configuration logical inconsistency: {0}")]
    LogicalInconsistency(String),
}
