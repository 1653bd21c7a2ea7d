//! # Server Configuration
//!
//! Environment-based configuration for the threat map server.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use threatmap_simulator::{CHANNEL_CAPACITY, LaunchPolicy, SimConfig};

use crate::error::{ApiError, ApiResult};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub server_addr: SocketAddr,

    /// Logging level
    pub log_level: String,

    /// Scenario file; built-in pools when unset
    pub scenario_path: Option<PathBuf>,

    /// Broadcast buffer per connected client
    pub event_channel_capacity: usize,

    /// Simulation constants
    pub simulation: SimConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let defaults = SimConfig::default();
        let mut simulation = SimConfig {
            attack_speed_mps: parse_or(&lookup, "ATTACK_SPEED_MPS", defaults.attack_speed_mps)?,
            max_attack_travel_ms: parse_opt(&lookup, "MAX_ATTACK_TRAVEL_MS")?,
            tick_interval: Duration::from_millis(parse_or(&lookup, "TICK_MS", 50)?),
            generation_interval: Duration::from_millis(parse_or(&lookup, "GENERATION_MS", 800)?),
            replay_pause: Duration::from_millis(parse_or(&lookup, "REPLAY_PAUSE_MS", 10_000)?),
            interceptors_per_attack: parse_or(
                &lookup,
                "INTERCEPTORS_PER_ATTACK",
                defaults.interceptors_per_attack,
            )?,
            ..defaults
        };
        simulation.intercept.interceptor_speed_mps = parse_or(
            &lookup,
            "INTERCEPTOR_SPEED_MPS",
            simulation.intercept.interceptor_speed_mps,
        )?;
        simulation.intercept.collision_threshold_m = parse_or(
            &lookup,
            "COLLISION_THRESHOLD_M",
            simulation.intercept.collision_threshold_m,
        )?;
        simulation.intercept.launch_policy =
            parse_or(&lookup, "LAUNCH_POLICY", LaunchPolicy::default())?;
        simulation.intercept.cancel_siblings_on_intercept = parse_or(
            &lookup,
            "CANCEL_SIBLINGS",
            simulation.intercept.cancel_siblings_on_intercept,
        )?;

        Ok(Self {
            server_addr: parse_or(&lookup, "SERVER_ADDR", SocketAddr::from(([0, 0, 0, 0], 4000)))?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            scenario_path: lookup("SCENARIO_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            event_channel_capacity: parse_or(&lookup, "EVENT_CHANNEL_CAPACITY", CHANNEL_CAPACITY)?,
            simulation,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> ApiResult<T> {
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

/// Blank values count as unset
fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> ApiResult<Option<T>> {
    match lookup(key).filter(|raw| !raw.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::Config(format!("invalid {key}: '{raw}'"))),
    }
}
