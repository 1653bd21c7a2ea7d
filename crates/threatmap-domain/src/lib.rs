//! # Cyber Threat Map - Domain Model
//!
//! Value objects, attack descriptors and wire events shared by the
//! simulator core and the transport layer. These types are the single
//! source of truth for everything a renderer receives.

#![forbid(unsafe_code)]

pub mod events;
pub mod geo;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub use events::*;
pub use geo::{EARTH_RADIUS_M, distance_meters, interpolate};

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Bare geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to another point in meters
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_meters(*self, *other)
    }
}

/// Named point used for attack sources and defense centers.
///
/// `ip`, `city` and `country` are only present for locations resolved
/// from historical records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    #[serde(rename = "lng", alias = "longitude")]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            ip: None,
            city: None,
            country: None,
        }
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    #[must_use]
    pub const fn point(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Great-circle distance to another location in meters
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_meters(self.point(), other.point())
    }

    /// Reject coordinates outside the valid degree ranges.
    pub fn validate(&self) -> Result<(), DomainError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(DomainError::InvalidCoordinates {
                lat: self.latitude,
                lon: self.longitude,
            })
        }
    }
}

impl From<&Location> for LatLng {
    fn from(location: &Location) -> Self {
        location.point()
    }
}

// =============================================================================
// ENUMS
// =============================================================================

/// Threat level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Relative selection weight for synthetic generation
    pub const fn weight(self) -> u32 {
        match self {
            Self::Low => 50,
            Self::Medium => 30,
            Self::High => 15,
            Self::Critical => 5,
        }
    }

    /// Display color as a CSS hex string
    pub const fn color(self) -> &'static str {
        match self {
            Self::Low => "#00C853",
            Self::Medium => "#FFEB3B",
            Self::High => "#FF9800",
            Self::Critical => "#D50000",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownThreatLevel(s.to_string()))
    }
}

// =============================================================================
// ATTACKS
// =============================================================================

/// One generated or replayed attack.
///
/// Serializes directly as the `attack-event` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackDescriptor {
    pub id: Uuid,
    pub attack_type: String,
    pub source: Location,
    pub target: Location,
    pub threat_level: ThreatLevel,
    pub color: String,
    /// Great-circle distance source -> target in meters
    #[serde(rename = "totalDistance")]
    pub total_distance_m: f64,
    pub attack_travel_time_ms: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl AttackDescriptor {
    /// Average ground speed implied by distance and travel time.
    ///
    /// Differs from the configured attack speed only when travel time was capped.
    #[must_use]
    pub fn effective_speed_mps(&self) -> Option<f64> {
        (self.attack_travel_time_ms > 0.0)
            .then(|| self.total_distance_m / (self.attack_travel_time_ms / 1000.0))
    }
}

/// Endpoint of a historical attack record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEndpoint {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

/// Pre-loaded attack record for replay mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAttack {
    pub id: String,
    pub attack_type: String,
    pub source: HistoricalEndpoint,
    pub target: HistoricalEndpoint,
    /// Free-form level label; unknown labels replay as `High`
    pub threat_level: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable interceptor identifier.
///
/// The generation half makes a key for a retired slot unusable once the
/// slot is recycled. Serialized as `"<index>v<generation>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId {
    index: u32,
    generation: u32,
}

impl SimId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl FromStr for SimId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidSimId(s.to_string());
        let (index, generation) = s.split_once('v').ok_or_else(invalid)?;
        Ok(Self {
            index: index.parse().map_err(|_| invalid())?,
            generation: generation.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for SimId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SimId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Unknown threat level: {0}")]
    UnknownThreatLevel(String),

    #[error("Invalid simulation id: {0}")]
    InvalidSimId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_level_parse() {
        assert_eq!("critical".parse::<ThreatLevel>().unwrap(), ThreatLevel::Critical);
        assert_eq!(" Medium ".parse::<ThreatLevel>().unwrap(), ThreatLevel::Medium);
        assert!("Severe".parse::<ThreatLevel>().is_err());
    }

    #[test]
    fn test_threat_weights_and_colors() {
        let total: u32 = ThreatLevel::ALL.iter().map(|l| l.weight()).sum();
        assert_eq!(total, 100);
        assert_eq!(ThreatLevel::High.color(), "#FF9800");
    }

    #[test]
    fn test_location_validate() {
        assert!(Location::new("Jakarta", -6.2088, 106.8456).validate().is_ok());
        assert!(Location::new("Nowhere", 91.0, 0.0).validate().is_err());
        assert!(Location::new("Nowhere", 0.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_location_wire_format() {
        let json = serde_json::to_value(Location::new("Server Tokyo", 35.6762, 139.6503)).unwrap();
        assert_eq!(json["id"], "Server Tokyo");
        assert_eq!(json["lat"], 35.6762);
        assert_eq!(json["lng"], 139.6503);
        assert!(json.get("ip").is_none());

        let parsed: Location =
            serde_json::from_str(r#"{"id":"x","latitude":1.0,"longitude":2.0}"#).unwrap();
        assert_eq!(parsed.point(), LatLng::new(1.0, 2.0));
    }

    #[test]
    fn test_sim_id_round_trip() {
        let id = SimId::new(7, 3);
        assert_eq!(id.to_string(), "7v3");
        assert_eq!("7v3".parse::<SimId>().unwrap(), id);
        assert!("7-3".parse::<SimId>().is_err());
        assert_eq!(serde_json::to_value(id).unwrap(), "7v3");
    }

    #[test]
    fn test_effective_speed() {
        let descriptor = AttackDescriptor {
            id: Uuid::new_v4(),
            attack_type: "DDoS".into(),
            source: Location::new("a", 0.0, 0.0),
            target: Location::new("b", 0.0, 1.0),
            threat_level: ThreatLevel::Low,
            color: ThreatLevel::Low.color().into(),
            total_distance_m: 10_000.0,
            attack_travel_time_ms: 2_000.0,
            timestamp: Utc::now(),
            historical_id: None,
            signature: None,
            category: None,
        };
        assert_eq!(descriptor.effective_speed_mps(), Some(5_000.0));
    }
}
