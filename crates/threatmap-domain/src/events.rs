//! Events published by the simulator.
//!
//! Every renderer-facing message is one [`SimEvent`] variant. On the wire
//! an event looks like `{"event": "attack-update", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AttackDescriptor, LatLng, Location, SimId};

/// Envelope for all published events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SimEvent {
    AttackEvent(AttackDescriptor),
    AttackUpdate(AttackUpdate),
    AttackFinal(AttackFinal),
    DefenseLaunch(DefenseLaunch),
    DefenseUpdate(DefenseUpdate),
    InterceptResult(InterceptResult),
    CenterInfo(CenterInfo),
    ServerStatus(ServerStatus),
}

impl SimEvent {
    /// Wire name of the event
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AttackEvent(_) => "attack-event",
            Self::AttackUpdate(_) => "attack-update",
            Self::AttackFinal(_) => "attack-final",
            Self::DefenseLaunch(_) => "defense-launch",
            Self::DefenseUpdate(_) => "defense-update",
            Self::InterceptResult(_) => "intercept-result",
            Self::CenterInfo(_) => "center-info",
            Self::ServerStatus(_) => "server-status",
        }
    }

    /// Attack this event belongs to, if any
    pub const fn attack_id(&self) -> Option<Uuid> {
        match self {
            Self::AttackEvent(e) => Some(e.id),
            Self::AttackUpdate(e) => Some(e.id),
            Self::AttackFinal(e) => Some(e.id),
            Self::DefenseLaunch(e) => Some(e.attack_id),
            Self::DefenseUpdate(e) => Some(e.attack_id),
            Self::InterceptResult(e) => Some(e.attack_id),
            Self::CenterInfo(_) | Self::ServerStatus(_) => None,
        }
    }
}

/// Periodic attack position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackUpdate {
    pub id: Uuid,
    pub fraction: f64,
    pub position: LatLng,
    pub elapsed_ms: f64,
    pub attack_travel_time_ms: f64,
}

/// Terminal attack outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackResult {
    Hit,
}

/// Attack reached its target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackFinal {
    pub id: Uuid,
    pub result: AttackResult,
    pub position: LatLng,
}

/// Interceptor scheduled against an attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseLaunch {
    pub sim_id: SimId,
    pub attack_id: Uuid,
    pub center: Location,
    /// Aim point of the interceptor
    pub threat: LatLng,
    pub interceptor_time_ms: f64,
    pub attack_time_to_intercept_ms: f64,
    pub launch_time: DateTime<Utc>,
    #[serde(rename = "delay")]
    pub delay_ms: f64,
}

/// Periodic interceptor position alongside the live missile position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseUpdate {
    pub sim_id: SimId,
    pub attack_id: Uuid,
    pub fraction_intercept: f64,
    pub interceptor_position: LatLng,
    pub missile_fraction: f64,
    pub missile_position: LatLng,
}

/// Rule that ended an interceptor's flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Interceptor came within the collision threshold of the missile
    Proximity,
    /// Interceptor reached its aim point while the missile was in flight
    InterceptorArrived,
    /// Missile reached its target first
    MissileArrived,
    /// Both arrived in the same tick and the interceptor arrived no later
    TieIntercepted,
    /// Both arrived in the same tick and the missile arrived first
    TieMissed,
    /// Another interceptor defeated the attack
    SiblingIntercepted,
}

impl Resolution {
    pub const fn intercepted(self) -> bool {
        matches!(
            self,
            Self::Proximity | Self::InterceptorArrived | Self::TieIntercepted
        )
    }
}

/// Final interceptor outcome, published exactly once per interceptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptResult {
    pub sim_id: SimId,
    pub attack_id: Uuid,
    pub intercepted: bool,
    pub resolution: Resolution,
    pub intercept_position: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_distance_m: Option<f64>,
    pub interceptor_elapsed_ms: f64,
    pub missile_elapsed_ms: f64,
}

/// Defense layout sent to each new consumer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CenterInfo {
    pub centers: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub barriers: Vec<Location>,
}

/// Connection greeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub ok: bool,
    pub message: String,
}
