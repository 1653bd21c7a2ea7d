//! Simulation constants.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulatorError};

/// When an interceptor leaves its center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchPolicy {
    /// Launch with the attack, aimed at the simultaneous-arrival point
    #[default]
    Immediate,
    /// Aim at a standoff point before the target and hold the launch so
    /// both arrive together
    Delayed,
}

impl FromStr for LaunchPolicy {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "delayed" => Ok(Self::Delayed),
            other => Err(SimulatorError::Config(format!("unknown launch policy '{other}'"))),
        }
    }
}

/// Interceptor physics and resolution rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptConfig {
    pub interceptor_speed_mps: f64,
    pub launch_policy: LaunchPolicy,
    /// Proximity below which an interceptor kills the missile
    pub collision_threshold_m: f64,
    /// Own-flight fraction before the proximity rule is armed
    pub min_interceptor_fraction: f64,
    /// Distance before the target used by [`LaunchPolicy::Delayed`]
    pub intercept_standoff_m: f64,
    pub cancel_siblings_on_intercept: bool,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            interceptor_speed_mps: 45_000.0,
            launch_policy: LaunchPolicy::Immediate,
            collision_threshold_m: 25_000.0,
            min_interceptor_fraction: 0.05,
            intercept_standoff_m: 100_000.0,
            cancel_siblings_on_intercept: true,
        }
    }
}

/// Full simulator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Fixed for the whole process so client animation pacing stays consistent
    pub attack_speed_mps: f64,
    /// Optional cap on attack travel time
    pub max_attack_travel_ms: Option<f64>,
    pub tick_interval: Duration,
    pub generation_interval: Duration,
    /// Silence between the end of a replay and its restart
    pub replay_pause: Duration,
    /// Centers defending each attack; zero disables interceptors
    pub interceptors_per_attack: usize,
    /// RNG seed for reproducible synthetic runs
    pub seed: Option<u64>,
    pub intercept: InterceptConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            attack_speed_mps: 30_000.0,
            max_attack_travel_ms: None,
            tick_interval: Duration::from_millis(50),
            generation_interval: Duration::from_millis(800),
            replay_pause: Duration::from_secs(10),
            interceptors_per_attack: 1,
            seed: None,
            intercept: InterceptConfig::default(),
        }
    }
}

impl SimConfig {
    /// Check that the constants describe a runnable simulation.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SimulatorError::Config(format!("{name} must be positive, got {value}")))
            }
        }

        fn negative_or_nan(value: f64) -> bool {
            value.is_nan() || value < 0.0
        }

        positive("attack_speed_mps", self.attack_speed_mps)?;
        positive("interceptor_speed_mps", self.intercept.interceptor_speed_mps)?;
        if let Some(cap) = self.max_attack_travel_ms {
            positive("max_attack_travel_ms", cap)?;
        }
        if self.tick_interval.is_zero() {
            return Err(SimulatorError::Config("tick_interval must be non-zero".into()));
        }
        if self.generation_interval.is_zero() {
            return Err(SimulatorError::Config("generation_interval must be non-zero".into()));
        }
        if negative_or_nan(self.intercept.collision_threshold_m) {
            return Err(SimulatorError::Config(
                "collision_threshold_m must not be negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.intercept.min_interceptor_fraction) {
            return Err(SimulatorError::Config(
                "min_interceptor_fraction must be within [0, 1]".into(),
            ));
        }
        if negative_or_nan(self.intercept.intercept_standoff_m) {
            return Err(SimulatorError::Config(
                "intercept_standoff_m must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.attack_speed_mps = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.intercept.collision_threshold_m = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.intercept.min_interceptor_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_launch_policy_parse() {
        assert_eq!("Delayed".parse::<LaunchPolicy>().unwrap(), LaunchPolicy::Delayed);
        assert_eq!("immediate".parse::<LaunchPolicy>().unwrap(), LaunchPolicy::Immediate);
        assert!("later".parse::<LaunchPolicy>().is_err());
    }
}
