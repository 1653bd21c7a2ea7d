//! Simulator error types

use thiserror::Error;

/// Simulator errors.
///
/// Only raised while building a simulation. Per-tick conditions are
/// logged and contained, never returned.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No attack sources: location pool and replay history are both empty")]
    NoSources,

    #[error("No defense centers configured")]
    NoCenters,

    #[error("Invalid location: {0}")]
    Domain(#[from] threatmap_domain::DomainError),

    #[error("Failed to read scenario: {0}")]
    ScenarioIo(#[from] std::io::Error),

    #[error("Failed to parse scenario: {0}")]
    ScenarioFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
