//! # Threat Map Simulator
//!
//! Real-time kinematic core behind the cyber threat map: attacks fly from
//! a source to a defense center, interceptors launch against them, and
//! every step is published as a [`SimEvent`](threatmap_domain::SimEvent).
//!
//! ## Features
//!
//! - Synthetic attack sampling or ordered historical replay
//! - Closed-form intercept points with immediate or delayed launch
//! - Proximity-first interception rules with arrival tie-break
//! - Generational registry driven by a single clock

#![forbid(unsafe_code)]

pub mod arena;
pub mod attack;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod interceptor;
pub mod registry;
pub mod scenario;
pub mod sink;

pub use attack::{AttackPhase, AttackSimulation};
pub use config::{InterceptConfig, LaunchPolicy, SimConfig};
pub use engine::{EngineStats, SimulationEngine};
pub use error::{Result, SimulatorError};
pub use generator::{EventGenerator, ReplaySource, SyntheticSource, ThreatSource};
pub use interceptor::{InterceptorSimulation, plan_intercept};
pub use registry::{SimulationRegistry, TickReport};
pub use scenario::Scenario;
pub use sink::{BroadcastSink, CHANNEL_CAPACITY, EventSink, LogSink, RecordingSink};
