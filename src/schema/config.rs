//! Configuration types for the simulation engine and its scoring policy.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_ticks`.
pub const MAX_TICKS_LIMIT: u32 = 10_000;

fn default_max_ticks() -> u32 {
    100
}
fn default_mana_per_generation() -> i64 {
    60
}
fn default_mana_cap() -> i64 {
    50_000
}

/// Engine configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum generations simulated per run.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u32,
    /// Mana awarded per trigger cell per elapsed generation.
    #[serde(default = "default_mana_per_generation")]
    pub mana_per_generation: i64,
    /// Absolute mana cap.
    #[serde(default = "default_mana_cap")]
    pub mana_cap: i64,
    /// Reward shaping applied to successful runs.
    #[serde(default)]
    pub scoring: ScoringPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            mana_per_generation: default_mana_per_generation(),
            mana_cap: default_mana_cap(),
            scoring: ScoringPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ticks == 0 || self.max_ticks > MAX_TICKS_LIMIT {
            return Err(ConfigError::InvalidMaxTicks(self.max_ticks));
        }
        if self.mana_per_generation <= 0 {
            return Err(ConfigError::InvalidManaPerGeneration(
                self.mana_per_generation,
            ));
        }
        if self.mana_cap <= 0 {
            return Err(ConfigError::InvalidManaCap(self.mana_cap));
        }
        Ok(())
    }
}

/// Fitness shaping for runs that reach the trigger region.
///
/// Every policy is a pure function of the capped mana, the initial block count
/// and the trigger tick (see `compute::scoring`). All of them are strictly
/// decreasing in the initial block count at equal mana.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum ScoringPolicy {
    /// Mana minus a small per-block penalty.
    Linear,
    /// Squared mana, emphasising progress near the cap.
    Quadratic,
    /// Cubed mana.
    Cubic,
    /// Quadratic below the cap, a large flat bonus once the cap is reached
    /// that then rewards fewer blocks and an earlier trigger.
    #[default]
    StepwiseBonus,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_ticks must be in 1..={MAX_TICKS_LIMIT}, got {0}")]
    InvalidMaxTicks(u32),
    #[error("mana_per_generation must be positive, got {0}")]
    InvalidManaPerGeneration(i64),
    #[error("mana_cap must be positive, got {0}")]
    InvalidManaCap(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_ticks() {
        let config = EngineConfig {
            max_ticks: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxTicks(0))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_ticks": 60, "scoring": {"type": "Cubic"}}"#).unwrap();
        assert_eq!(config.max_ticks, 60);
        assert_eq!(config.mana_cap, 50_000);
        assert_eq!(config.scoring, ScoringPolicy::Cubic);
    }
}
