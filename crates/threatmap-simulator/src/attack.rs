//! In-flight attack state.

use chrono::{DateTime, TimeDelta, Utc};
use threatmap_domain::{AttackDescriptor, AttackFinal, AttackResult, AttackUpdate, LatLng, interpolate};
use uuid::Uuid;

/// Milliseconds from `start` to `now`, never negative.
pub(crate) fn elapsed_ms(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let delta = now - start;
    #[allow(clippy::cast_precision_loss)]
    let ms = delta
        .num_microseconds()
        .map_or_else(|| delta.num_milliseconds() as f64, |us| us as f64 / 1000.0);
    ms.max(0.0)
}

/// Progress along a leg. Non-positive travel times arrive instantly.
pub(crate) fn progress_fraction(elapsed_ms: f64, travel_time_ms: f64) -> f64 {
    if travel_time_ms <= 0.0 || !travel_time_ms.is_finite() {
        return 1.0;
    }
    (elapsed_ms / travel_time_ms).clamp(0.0, 1.0)
}

/// `start + ms`, saturating on overflow.
pub(crate) fn offset_ms(start: DateTime<Utc>, ms: f64) -> DateTime<Utc> {
    #[allow(clippy::cast_possible_truncation)]
    let micros = (ms.max(0.0) * 1000.0).round() as i64;
    start
        .checked_add_signed(TimeDelta::microseconds(micros))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Attack lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    Active,
    /// Reached the target
    Hit,
    /// Destroyed by an interceptor
    Defeated,
}

/// Read-only snapshot of a missile handed to interceptors each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissileView {
    pub fraction: f64,
    pub position: LatLng,
    pub elapsed_ms: f64,
    pub arrival_time: DateTime<Utc>,
}

/// One in-flight attack.
#[derive(Debug, Clone)]
pub struct AttackSimulation {
    descriptor: AttackDescriptor,
    started_at: DateTime<Utc>,
    fraction: f64,
    elapsed_ms: f64,
    position: LatLng,
    phase: AttackPhase,
}

impl AttackSimulation {
    pub fn start(descriptor: AttackDescriptor, now: DateTime<Utc>) -> Self {
        let position = descriptor.source.point();
        Self {
            descriptor,
            started_at: now,
            fraction: 0.0,
            elapsed_ms: 0.0,
            position,
            phase: AttackPhase::Active,
        }
    }

    /// Advance to `now` and produce the position update.
    ///
    /// Returns `None` once the attack is terminal. The fraction never
    /// decreases, even if `now` moves backwards.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<AttackUpdate> {
        if self.phase != AttackPhase::Active {
            return None;
        }

        let elapsed = elapsed_ms(self.started_at, now).max(self.elapsed_ms);
        let fraction = progress_fraction(elapsed, self.descriptor.attack_travel_time_ms);
        self.elapsed_ms = elapsed;
        self.fraction = fraction.max(self.fraction);
        self.position = self.position_at(self.fraction);

        Some(AttackUpdate {
            id: self.descriptor.id,
            fraction: self.fraction,
            position: self.position,
            elapsed_ms: self.elapsed_ms,
            attack_travel_time_ms: self.descriptor.attack_travel_time_ms,
        })
    }

    /// Transition to `Hit` if the target has been reached.
    pub fn try_hit(&mut self) -> Option<AttackFinal> {
        if self.phase != AttackPhase::Active || !self.has_arrived() {
            return None;
        }
        self.phase = AttackPhase::Hit;
        Some(AttackFinal {
            id: self.descriptor.id,
            result: AttackResult::Hit,
            position: self.descriptor.target.point(),
        })
    }

    /// Freeze the attack where it was destroyed.
    pub fn defeat(&mut self) {
        if self.phase == AttackPhase::Active {
            self.phase = AttackPhase::Defeated;
        }
    }

    pub fn position_at(&self, fraction: f64) -> LatLng {
        interpolate(
            self.descriptor.source.point(),
            self.descriptor.target.point(),
            fraction,
        )
    }

    pub fn view(&self) -> MissileView {
        MissileView {
            fraction: self.fraction,
            position: self.position,
            elapsed_ms: self.elapsed_ms,
            arrival_time: self.arrival_time(),
        }
    }

    pub fn arrival_time(&self) -> DateTime<Utc> {
        offset_ms(self.started_at, self.descriptor.attack_travel_time_ms)
    }

    pub fn has_arrived(&self) -> bool {
        self.fraction >= 1.0
    }

    pub const fn id(&self) -> Uuid {
        self.descriptor.id
    }

    pub const fn descriptor(&self) -> &AttackDescriptor {
        &self.descriptor
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub const fn fraction(&self) -> f64 {
        self.fraction
    }

    pub const fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub const fn position(&self) -> LatLng {
        self.position
    }

    pub const fn phase(&self) -> AttackPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase != AttackPhase::Active
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use threatmap_domain::{Location, ThreatLevel, distance_meters};

    pub(crate) fn descriptor(source: Location, target: Location, travel_ms: f64) -> AttackDescriptor {
        AttackDescriptor {
            id: Uuid::new_v4(),
            attack_type: "DDoS".into(),
            total_distance_m: distance_meters(source.point(), target.point()),
            source,
            target,
            threat_level: ThreatLevel::Medium,
            color: ThreatLevel::Medium.color().into(),
            attack_travel_time_ms: travel_ms,
            timestamp: Utc::now(),
            historical_id: None,
            signature: None,
            category: None,
        }
    }

    pub(crate) fn at(start: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
        start + TimeDelta::milliseconds(ms)
    }

    fn equator_attack(travel_ms: f64) -> AttackDescriptor {
        descriptor(
            Location::new("Source", 0.0, 0.0),
            Location::new("Server", 0.0, 10.0),
            travel_ms,
        )
    }

    #[test]
    fn test_fraction_at_midpoint() {
        let t0 = Utc::now();
        let mut sim = AttackSimulation::start(equator_attack(4000.0), t0);

        let update = sim.advance(at(t0, 2000)).unwrap();
        assert!((update.fraction - 0.5).abs() < 1e-9);
        assert!((update.position.lng - 5.0).abs() < 1e-9);
        assert!((update.elapsed_ms - 2000.0).abs() < 1e-9);
        assert!(sim.try_hit().is_none());
    }

    #[test]
    fn test_hit_then_silent() {
        let t0 = Utc::now();
        let mut sim = AttackSimulation::start(equator_attack(1000.0), t0);

        let update = sim.advance(at(t0, 1500)).unwrap();
        assert_eq!(update.fraction, 1.0);

        let final_event = sim.try_hit().unwrap();
        assert_eq!(final_event.position.lng, 10.0);
        assert_eq!(sim.phase(), AttackPhase::Hit);

        assert!(sim.advance(at(t0, 1600)).is_none());
        assert!(sim.try_hit().is_none());
    }

    #[test]
    fn test_fraction_monotonic_and_bounded() {
        let t0 = Utc::now();
        let mut sim = AttackSimulation::start(equator_attack(1000.0), t0);
        let mut last = 0.0;
        for ms in [0, 100, 50, 400, 399, 900, 2000, 5000] {
            if let Some(update) = sim.advance(at(t0, ms)) {
                assert!((0.0..=1.0).contains(&update.fraction));
                assert!(update.fraction >= last);
                last = update.fraction;
            }
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_zero_travel_time_arrives_on_first_tick() {
        let t0 = Utc::now();
        let mut sim = AttackSimulation::start(equator_attack(0.0), t0);
        let update = sim.advance(t0).unwrap();
        assert_eq!(update.fraction, 1.0);
        assert!(sim.try_hit().is_some());

        let mut negative = AttackSimulation::start(equator_attack(-5.0), t0);
        assert_eq!(negative.advance(t0).unwrap().fraction, 1.0);
    }

    #[test]
    fn test_defeated_attack_stops() {
        let t0 = Utc::now();
        let mut sim = AttackSimulation::start(equator_attack(4000.0), t0);
        sim.advance(at(t0, 1000));
        sim.defeat();
        assert_eq!(sim.phase(), AttackPhase::Defeated);
        assert!(sim.advance(at(t0, 5000)).is_none());
        assert!(sim.try_hit().is_none());
        assert!((sim.fraction() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_arrival_time() {
        let t0 = Utc::now();
        let sim = AttackSimulation::start(equator_attack(4000.0), t0);
        assert_eq!(sim.arrival_time(), at(t0, 4000));
    }
}
