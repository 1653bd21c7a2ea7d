//! Attack event generation: synthetic sampling or historical replay.

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use threatmap_domain::{
    AttackDescriptor, HistoricalAttack, HistoricalEndpoint, Location, ThreatLevel,
    distance_meters,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attack labels used by synthetic generation
pub const ATTACK_TYPES: [&str; 4] = ["DDoS", "Brute Force", "SQL Injection", "Port Scan"];

/// Pick an item with probability proportional to its weight.
///
/// Draws `r` uniformly from `[0, total)` and returns the first item whose
/// cumulative weight exceeds `r`. Falls back to the last item when the
/// weights do not sum to a positive total.
pub fn pick_weighted<'a, T, R: Rng + ?Sized>(
    items: &'a [T],
    weight: impl Fn(&T) -> f64,
    rng: &mut R,
) -> Option<&'a T> {
    let total: f64 = items.iter().map(|item| weight(item).max(0.0)).sum();
    if !(total > 0.0 && total.is_finite()) {
        return items.last();
    }

    let r = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for item in items {
        cumulative += weight(item).max(0.0);
        if r < cumulative {
            return Some(item);
        }
    }
    items.last()
}

// =============================================================================
// SOURCES
// =============================================================================

/// Random source/target/threat sampling
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub sources: Vec<Location>,
    pub centers: Vec<Location>,
    pub attack_types: Vec<String>,
}

impl SyntheticSource {
    pub fn new(sources: Vec<Location>, centers: Vec<Location>) -> Self {
        Self {
            sources,
            centers,
            attack_types: ATTACK_TYPES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Replay cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Playing,
    Paused { resume_at: DateTime<Utc> },
}

/// Ordered replay of historical records
#[derive(Debug, Clone)]
pub struct ReplaySource {
    records: Vec<HistoricalAttack>,
    cursor: usize,
    state: ReplayState,
    pause: TimeDelta,
    known_sources: Vec<Location>,
    known_centers: Vec<Location>,
}

impl ReplaySource {
    /// Records are replayed oldest first.
    pub fn new(mut records: Vec<HistoricalAttack>, pause: TimeDelta) -> Self {
        records.sort_by_key(|record| record.timestamp);
        Self {
            records,
            cursor: 0,
            state: ReplayState::Playing,
            pause,
            known_sources: Vec::new(),
            known_centers: Vec::new(),
        }
    }

    /// Pools used to resolve record endpoints by IP.
    #[must_use]
    pub fn with_known_locations(mut self, sources: Vec<Location>, centers: Vec<Location>) -> Self {
        self.known_sources = sources;
        self.known_centers = centers;
        self
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub const fn state(&self) -> ReplayState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Next record, honoring the end-of-list pause.
    fn next_record(&mut self, now: DateTime<Utc>) -> Option<&HistoricalAttack> {
        if self.records.is_empty() {
            return None;
        }

        if let ReplayState::Paused { resume_at } = self.state {
            if now < resume_at {
                return None;
            }
            info!(records = self.records.len(), "Pause ended, restarting historical replay");
            self.cursor = 0;
            self.state = ReplayState::Playing;
        }

        if self.cursor >= self.records.len() {
            let resume_at = now + self.pause;
            info!(
                pause_ms = self.pause.num_milliseconds(),
                "All historical attacks launched, pausing replay"
            );
            self.state = ReplayState::Paused { resume_at };
            return None;
        }

        let record = &self.records[self.cursor];
        self.cursor += 1;
        Some(record)
    }
}

/// Where attacks come from
#[derive(Debug, Clone)]
pub enum ThreatSource {
    Synthetic(SyntheticSource),
    Replay(ReplaySource),
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Produces [`AttackDescriptor`]s from a [`ThreatSource`].
#[derive(Debug)]
pub struct EventGenerator<R = StdRng> {
    source: ThreatSource,
    attack_speed_mps: f64,
    max_travel_ms: Option<f64>,
    rng: R,
}

impl EventGenerator<StdRng> {
    pub fn new(source: ThreatSource, attack_speed_mps: f64, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self::with_rng(source, attack_speed_mps, rng)
    }
}

impl<R: Rng> EventGenerator<R> {
    pub const fn with_rng(source: ThreatSource, attack_speed_mps: f64, rng: R) -> Self {
        Self {
            source,
            attack_speed_mps,
            max_travel_ms: None,
            rng,
        }
    }

    /// Cap travel times, trading constant speed for bounded animation length.
    #[must_use]
    pub const fn with_max_travel_ms(mut self, cap: Option<f64>) -> Self {
        self.max_travel_ms = cap;
        self
    }

    pub const fn source(&self) -> &ThreatSource {
        &self.source
    }

    /// Produce the next attack, or `None` when nothing should launch now.
    pub fn next_attack(&mut self, now: DateTime<Utc>) -> Option<AttackDescriptor> {
        match &mut self.source {
            ThreatSource::Synthetic(synthetic) => {
                if synthetic.sources.is_empty() || synthetic.centers.is_empty() {
                    warn!(
                        sources = synthetic.sources.len(),
                        centers = synthetic.centers.len(),
                        "Cannot generate attack: empty location pool"
                    );
                    return None;
                }

                let rng = &mut self.rng;
                let source = synthetic.sources[rng.gen_range(0..synthetic.sources.len())].clone();
                let target = synthetic.centers[rng.gen_range(0..synthetic.centers.len())].clone();
                let threat_level = pick_weighted(&ThreatLevel::ALL, |l| f64::from(l.weight()), rng)
                    .copied()
                    .unwrap_or(ThreatLevel::Low);
                let attack_type = if synthetic.attack_types.is_empty() {
                    ATTACK_TYPES[0].to_string()
                } else {
                    synthetic.attack_types[rng.gen_range(0..synthetic.attack_types.len())].clone()
                };

                Some(self.build(source, target, threat_level, attack_type, now))
            }
            ThreatSource::Replay(replay) => {
                let record = replay.next_record(now)?.clone();
                let source = resolve_endpoint(&record.source, &replay.known_sources, false);
                let target = resolve_endpoint(&record.target, &replay.known_centers, true);
                let threat_level = record.threat_level.parse().unwrap_or_else(|_| {
                    debug!(level = %record.threat_level, "Unknown threat level, replaying as High");
                    ThreatLevel::High
                });

                let mut descriptor =
                    self.build(source, target, threat_level, record.attack_type, now);
                descriptor.historical_id = Some(record.id);
                descriptor.signature = record.signature;
                descriptor.category = record.category;
                Some(descriptor)
            }
        }
    }

    fn build(
        &self,
        source: Location,
        target: Location,
        threat_level: ThreatLevel,
        attack_type: String,
        now: DateTime<Utc>,
    ) -> AttackDescriptor {
        let total_distance_m = distance_meters(source.point(), target.point());
        let mut attack_travel_time_ms = total_distance_m / self.attack_speed_mps * 1000.0;
        if let Some(cap) = self.max_travel_ms {
            attack_travel_time_ms = attack_travel_time_ms.min(cap);
        }

        AttackDescriptor {
            id: Uuid::new_v4(),
            attack_type,
            source,
            target,
            threat_level,
            color: threat_level.color().to_string(),
            total_distance_m,
            attack_travel_time_ms,
            timestamp: now,
            historical_id: None,
            signature: None,
            category: None,
        }
    }
}

/// Match a record endpoint to a known location by IP, else describe it
/// from the record itself.
fn resolve_endpoint(endpoint: &HistoricalEndpoint, known: &[Location], is_center: bool) -> Location {
    if let Some(ip) = endpoint.ip.as_deref() {
        if let Some(location) = known.iter().find(|loc| loc.ip.as_deref() == Some(ip)) {
            return location.clone();
        }
    }

    let city = endpoint.city.as_deref().unwrap_or("Unknown");
    let label = match (endpoint.ip.as_deref(), is_center) {
        (Some(ip), true) => format!("{city} Server ({ip})"),
        (Some(ip), false) => format!("{city} ({ip})"),
        (None, true) => format!("{city} Server"),
        (None, false) => city.to_string(),
    };

    Location {
        id: label,
        latitude: endpoint.lat,
        longitude: endpoint.lng,
        ip: endpoint.ip.clone(),
        city: endpoint.city.clone(),
        country: endpoint.country.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> (Vec<Location>, Vec<Location>) {
        (
            vec![
                Location::new("Jakarta", -6.2088, 106.8456),
                Location::new("Paris", 48.8566, 2.3522),
            ],
            vec![Location::new("Server Tokyo", 35.6762, 139.6503)],
        )
    }

    fn record(id: &str, minute: u32) -> HistoricalAttack {
        HistoricalAttack {
            id: id.into(),
            attack_type: "Cyber Attack".into(),
            source: HistoricalEndpoint {
                ip: Some(format!("10.0.0.{minute}")),
                city: None,
                country: None,
                lat: -6.2,
                lng: 106.8,
            },
            target: HistoricalEndpoint {
                ip: Some("10.90.24.100".into()),
                city: Some("Jakarta".into()),
                country: Some("Indonesia".into()),
                lat: -6.177,
                lng: 106.832,
            },
            threat_level: "Medium".into(),
            timestamp: DateTime::parse_from_rfc3339(&format!("2024-01-01T00:{minute:02}:00Z"))
                .unwrap()
                .with_timezone(&Utc),
            signature: Some("sshd".into()),
            category: None,
        }
    }

    #[test]
    fn test_pick_weighted_boundaries() {
        struct Fixed(f64);
        impl rand::RngCore for Fixed {
            fn next_u32(&mut self) -> u32 {
                unimplemented!()
            }
            fn next_u64(&mut self) -> u64 {
                // gen_range(0.0..total) maps the top 52 bits to [0, 1)
                (self.0 * (1u64 << 52) as f64) as u64 * 4096
            }
            fn fill_bytes(&mut self, _: &mut [u8]) {
                unimplemented!()
            }
            fn try_fill_bytes(&mut self, _: &mut [u8]) -> Result<(), rand::Error> {
                unimplemented!()
            }
        }

        let levels = ThreatLevel::ALL;
        let weight = |l: &ThreatLevel| f64::from(l.weight());
        assert_eq!(pick_weighted(&levels, weight, &mut Fixed(0.0)), Some(&ThreatLevel::Low));
        assert_eq!(pick_weighted(&levels, weight, &mut Fixed(0.49)), Some(&ThreatLevel::Low));
        assert_eq!(pick_weighted(&levels, weight, &mut Fixed(0.51)), Some(&ThreatLevel::Medium));
        assert_eq!(pick_weighted(&levels, weight, &mut Fixed(0.90)), Some(&ThreatLevel::High));
        assert_eq!(pick_weighted(&levels, weight, &mut Fixed(0.99)), Some(&ThreatLevel::Critical));
    }

    #[test]
    fn test_pick_weighted_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 4];
        for _ in 0..10_000 {
            let level = pick_weighted(&ThreatLevel::ALL, |l| f64::from(l.weight()), &mut rng).unwrap();
            counts[ThreatLevel::ALL.iter().position(|l| l == level).unwrap()] += 1;
        }
        // 50/30/15/5
        assert!(counts[0] > 4_500 && counts[0] < 5_500);
        assert!(counts[3] > 300 && counts[3] < 700);
    }

    #[test]
    fn test_pick_weighted_degenerate() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: [u32; 0] = [];
        assert_eq!(pick_weighted(&empty, |_| 1.0, &mut rng), None);
        assert_eq!(pick_weighted(&[1, 2, 3], |_| 0.0, &mut rng), Some(&3));
    }

    #[test]
    fn test_synthetic_travel_time() {
        let source = Location::new("Origin", 0.0, 0.0);
        let target = Location::new("Server", 0.0, 10.0);
        let synthetic = SyntheticSource::new(vec![source], vec![target]);
        let mut generator = EventGenerator::new(ThreatSource::Synthetic(synthetic), 1000.0, Some(1));

        let attack = generator.next_attack(Utc::now()).unwrap();
        assert!((attack.total_distance_m - 1_111_949.27).abs() < 1.0);
        assert!((attack.attack_travel_time_ms - attack.total_distance_m).abs() < 1e-6);
        assert_eq!(attack.color, attack.threat_level.color());
        assert!(ATTACK_TYPES.contains(&attack.attack_type.as_str()));
    }

    #[test]
    fn test_synthetic_is_reproducible_with_seed() {
        let (sources, centers) = pools();
        let make = || {
            EventGenerator::new(
                ThreatSource::Synthetic(SyntheticSource::new(sources.clone(), centers.clone())),
                30_000.0,
                Some(42),
            )
        };
        let (mut a, mut b) = (make(), make());
        let now = Utc::now();
        for _ in 0..20 {
            let x = a.next_attack(now).unwrap();
            let y = b.next_attack(now).unwrap();
            assert_eq!(x.source, y.source);
            assert_eq!(x.threat_level, y.threat_level);
            assert_eq!(x.attack_type, y.attack_type);
            assert_ne!(x.id, y.id);
        }
    }

    #[test]
    fn test_synthetic_refuses_empty_pool() {
        let (sources, _) = pools();
        let mut generator = EventGenerator::new(
            ThreatSource::Synthetic(SyntheticSource::new(sources, Vec::new())),
            30_000.0,
            Some(1),
        );
        assert!(generator.next_attack(Utc::now()).is_none());
    }

    #[test]
    fn test_travel_time_cap() {
        let (sources, centers) = pools();
        let mut generator = EventGenerator::new(
            ThreatSource::Synthetic(SyntheticSource::new(sources, centers)),
            1.0,
            Some(3),
        )
        .with_max_travel_ms(Some(8000.0));
        assert_eq!(generator.next_attack(Utc::now()).unwrap().attack_travel_time_ms, 8000.0);
    }

    #[test]
    fn test_replay_pause_and_restart() {
        let records = vec![record("b", 2), record("a", 1), record("c", 3)];
        let replay = ReplaySource::new(records, TimeDelta::seconds(10));
        let mut generator = EventGenerator::new(ThreatSource::Replay(replay), 30_000.0, None);

        let t0 = Utc::now();
        let first_pass: Vec<_> = (0..3)
            .map(|i| generator.next_attack(t0 + TimeDelta::seconds(i)).unwrap())
            .map(|attack| attack.historical_id.unwrap())
            .collect();
        // replayed oldest first
        assert_eq!(first_pass, ["a", "b", "c"]);

        // end of list: silence for the whole pause window
        let end = t0 + TimeDelta::seconds(3);
        assert!(generator.next_attack(end).is_none());
        for s in 1..10 {
            assert!(generator.next_attack(end + TimeDelta::seconds(s)).is_none());
        }
        assert!(generator.next_attack(end + TimeDelta::milliseconds(9_999)).is_none());

        let second_pass: Vec<_> = (10..13)
            .map(|s| generator.next_attack(end + TimeDelta::seconds(s)).unwrap())
            .map(|attack| attack.historical_id.unwrap())
            .collect();
        assert_eq!(second_pass, first_pass);
    }

    #[test]
    fn test_replay_state_machine() {
        let replay = ReplaySource::new(vec![record("a", 1)], TimeDelta::seconds(10));
        let mut generator = EventGenerator::new(ThreatSource::Replay(replay), 30_000.0, None);
        let t0 = Utc::now();

        generator.next_attack(t0).unwrap();
        generator.next_attack(t0);
        let ThreatSource::Replay(replay) = generator.source() else {
            panic!("expected replay source");
        };
        assert_eq!(replay.state(), ReplayState::Paused { resume_at: t0 + TimeDelta::seconds(10) });
        assert_eq!(replay.cursor(), 1);
    }

    #[test]
    fn test_replay_resolves_known_locations() {
        let center = Location::new("Server Jakarta", -6.177463, 106.831999).with_ip("10.90.24.100");
        let replay = ReplaySource::new(vec![record("a", 1)], TimeDelta::seconds(10))
            .with_known_locations(Vec::new(), vec![center.clone()]);
        let mut generator = EventGenerator::new(ThreatSource::Replay(replay), 30_000.0, None);

        let attack = generator.next_attack(Utc::now()).unwrap();
        assert_eq!(attack.target, center);
        assert_eq!(attack.source.id, "Unknown (10.0.0.1)");
        assert_eq!(attack.threat_level, ThreatLevel::Medium);
        assert_eq!(attack.signature.as_deref(), Some("sshd"));
    }

    #[test]
    fn test_replay_unknown_threat_level() {
        let mut unknown = record("a", 1);
        unknown.threat_level = "Severe".into();
        let replay = ReplaySource::new(vec![unknown], TimeDelta::seconds(10));
        let mut generator = EventGenerator::new(ThreatSource::Replay(replay), 30_000.0, None);

        let attack = generator.next_attack(Utc::now()).unwrap();
        assert_eq!(attack.threat_level, ThreatLevel::High);
        assert_eq!(attack.color, "#FF9800");
        assert_eq!(attack.target.id, "Jakarta Server (10.90.24.100)");
    }
}
