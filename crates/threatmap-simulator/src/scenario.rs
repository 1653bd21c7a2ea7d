//! Location pools and optional replay history.

use std::path::Path;

use serde::{Deserialize, Serialize};
use threatmap_domain::{HistoricalAttack, Location};
use tracing::{info, warn};

use crate::error::Result;

/// Everything the generator draws from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Attack origins for synthetic generation
    #[serde(default)]
    pub sources: Vec<Location>,
    /// Defense centers, also the attack targets
    #[serde(default)]
    pub centers: Vec<Location>,
    /// Static map overlays passed through to clients
    #[serde(default)]
    pub barriers: Vec<Location>,
    /// When non-empty, attacks are replayed from here instead of sampled
    #[serde(default)]
    pub history: Vec<HistoricalAttack>,
}

impl Scenario {
    /// Built-in pools used when no scenario file is given.
    pub fn defaults() -> Self {
        Self {
            sources: vec![
                Location::new("Jakarta", -6.2088, 106.8456),
                Location::new("Singapore", 1.3521, 103.8198),
                Location::new("Tokyo", 35.6762, 139.6503),
                Location::new("Seoul", 37.5665, 126.978),
                Location::new("Sydney", -33.8688, 151.2093),
                Location::new("Paris", 48.8566, 2.3522),
                Location::new("New York", 40.7128, -74.006),
            ],
            centers: vec![
                Location::new("Server Jakarta", -6.177_463_257_461_286, 106.831_999_289_439_05),
                Location::new("Server Singapore", 1.327_532_426_561_102, 103.844_617_913_304_35),
                Location::new("Server Tokyo", 35.6762, 139.6503),
            ],
            barriers: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Read a JSON scenario file. History is sorted oldest first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let scenario = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            sources = scenario.sources.len(),
            centers = scenario.centers.len(),
            history = scenario.history.len(),
            "Scenario loaded"
        );
        Ok(scenario)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut scenario: Self = serde_json::from_str(raw)?;
        scenario.validate()?;
        scenario.history.sort_by_key(|record| record.timestamp);
        Ok(scenario)
    }

    /// Reject out-of-range coordinates in any pool.
    pub fn validate(&self) -> Result<()> {
        for location in self.sources.iter().chain(&self.centers).chain(&self.barriers) {
            location.validate()?;
        }
        if self.centers.is_empty() {
            warn!("Scenario has no defense centers");
        }
        Ok(())
    }

    pub fn is_replay(&self) -> bool {
        !self.history.is_empty()
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulatorError;

    #[test]
    fn test_defaults() {
        let scenario = Scenario::defaults();
        assert_eq!(scenario.sources.len(), 7);
        assert_eq!(scenario.centers.len(), 3);
        assert!(!scenario.is_replay());
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_from_json_sorts_history() {
        let raw = r#"{
            "centers": [{ "id": "Server Jakarta", "lat": -6.177, "lng": 106.832, "ip": "10.90.24.100" }],
            "history": [
                {
                    "id": "2", "attackType": "Cyber Attack", "threatLevel": "High",
                    "timestamp": "2024-03-01T10:05:00Z",
                    "source": { "ip": "1.2.3.4", "lat": 1.0, "lng": 2.0 },
                    "target": { "ip": "10.90.24.100", "lat": -6.177, "lng": 106.832 }
                },
                {
                    "id": "1", "attackType": "Cyber Attack", "threatLevel": "Low",
                    "timestamp": "2024-03-01T10:00:00Z",
                    "source": { "ip": "5.6.7.8", "lat": 3.0, "lng": 4.0 },
                    "target": { "ip": "10.90.24.100", "lat": -6.177, "lng": 106.832 }
                }
            ]
        }"#;

        let scenario = Scenario::from_json(raw).unwrap();
        assert!(scenario.sources.is_empty());
        assert!(scenario.is_replay());
        let ids: Vec<_> = scenario.history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(scenario.centers[0].ip.as_deref(), Some("10.90.24.100"));
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        let raw = r#"{ "sources": [{ "id": "Nowhere", "lat": 120.0, "lng": 0.0 }] }"#;
        assert!(matches!(Scenario::from_json(raw), Err(SimulatorError::Domain(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Scenario::from_json("{ not json"),
            Err(SimulatorError::ScenarioFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/nonexistent/threatmap-scenario.json"),
            Err(SimulatorError::ScenarioIo(_))
        ));
    }
}
