//! Single driving clock for generation and simulation ticks.

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use threatmap_domain::{CenterInfo, Location, SimEvent};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::error::{Result, SimulatorError};
use crate::generator::{EventGenerator, ReplaySource, SyntheticSource, ThreatSource};
use crate::registry::{SimulationRegistry, TickReport};
use crate::scenario::Scenario;
use crate::sink::EventSink;

/// Running totals over an engine's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub generated: u64,
    pub hits: u64,
    /// Attacks destroyed before reaching their target
    pub intercepted: u64,
    /// Interceptor results that did not destroy the attack
    pub missed: u64,
    pub ticks: u64,
}

impl EngineStats {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.hits += report.hits as u64;
        self.intercepted += report.defeated as u64;
        self.missed += report.missed as u64;
    }
}

/// Owns the generator, the registry and the outbound sink.
///
/// All mutation goes through `&mut self`, so the whole simulation lives in
/// whichever task drives it.
pub struct SimulationEngine<S> {
    config: SimConfig,
    generator: EventGenerator,
    registry: SimulationRegistry,
    centers: Vec<Location>,
    barriers: Vec<Location>,
    sink: S,
    stats: EngineStats,
}

impl<S: EventSink> SimulationEngine<S> {
    pub fn new(config: SimConfig, scenario: Scenario, sink: S) -> Result<Self> {
        config.validate()?;
        scenario.validate()?;
        if scenario.centers.is_empty() {
            return Err(SimulatorError::NoCenters);
        }
        if scenario.sources.is_empty() && !scenario.is_replay() {
            return Err(SimulatorError::NoSources);
        }

        let Scenario {
            sources,
            centers,
            barriers,
            history,
        } = scenario;

        let source = if history.is_empty() {
            info!(
                sources = sources.len(),
                centers = centers.len(),
                "Using synthetic attack generation"
            );
            ThreatSource::Synthetic(SyntheticSource::new(sources, centers.clone()))
        } else {
            let pause = TimeDelta::from_std(config.replay_pause)
                .map_err(|err| SimulatorError::Config(format!("replay_pause out of range: {err}")))?;
            info!(records = history.len(), "Using historical replay");
            ThreatSource::Replay(
                ReplaySource::new(history, pause).with_known_locations(sources, centers.clone()),
            )
        };

        let generator = EventGenerator::new(source, config.attack_speed_mps, config.seed)
            .with_max_travel_ms(config.max_attack_travel_ms);
        let registry = SimulationRegistry::new(config.intercept.clone());

        Ok(Self {
            config,
            generator,
            registry,
            centers,
            barriers,
            sink,
            stats: EngineStats::default(),
        })
    }

    /// Bootstrap payload for a newly connected consumer
    pub fn center_info(&self) -> CenterInfo {
        CenterInfo {
            centers: self.centers.clone(),
            barriers: self.barriers.clone(),
        }
    }

    /// Generate at most one attack and schedule its defenders.
    pub fn step_generation(&mut self, now: DateTime<Utc>) -> Option<Uuid> {
        let attack = self.generator.next_attack(now)?;
        self.stats.generated += 1;

        let defenders = self.defenders(&attack.target);
        self.sink.publish(SimEvent::AttackEvent(attack.clone()));
        let id = self.registry.register(attack, now);

        for center in &defenders {
            self.registry.attach_interceptor(id, center, now, &self.sink);
        }
        Some(id)
    }

    /// Advance every live simulation to `now`.
    pub fn step_tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let report = self.registry.tick(now, &self.sink);
        self.stats.record(&report);
        report
    }

    /// The target defends itself, then the nearest other centers.
    fn defenders(&self, target: &Location) -> Vec<Location> {
        let wanted = self.config.interceptors_per_attack;
        if wanted == 0 {
            return Vec::new();
        }

        let mut others: Vec<&Location> = self
            .centers
            .iter()
            .filter(|center| center.id != target.id)
            .collect();
        others.sort_by(|a, b| a.distance_to(target).total_cmp(&b.distance_to(target)));

        std::iter::once(target.clone())
            .chain(others.into_iter().cloned())
            .take(wanted)
            .collect()
    }

    /// Drive generation and ticks from tokio intervals until `shutdown`
    /// resolves, then drop whatever is still in flight.
    ///
    /// Simulation time is the wall clock read once at start plus monotonic
    /// elapsed time, so system clock steps do not move in-flight attacks.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> EngineStats {
        let started = Utc::now();
        let origin = Instant::now();
        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut generation = interval(self.config.generation_interval);
        generation.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            tick_ms = self.config.tick_interval.as_millis(),
            generation_ms = self.config.generation_interval.as_millis(),
            policy = ?self.config.intercept.launch_policy,
            "Simulation engine started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                at = generation.tick() => {
                    if let Some(id) = self.step_generation(clock_at(started, origin, at)) {
                        debug!(attack_id = %id, "Attack generated");
                    }
                }
                at = tick.tick() => {
                    self.step_tick(clock_at(started, origin, at));
                }
            }
        }

        let dropped = self.registry.retire_all();
        info!(
            generated = self.stats.generated,
            hits = self.stats.hits,
            intercepted = self.stats.intercepted,
            in_flight = dropped,
            "Simulation engine stopped"
        );
        self.stats
    }

    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    pub const fn registry(&self) -> &SimulationRegistry {
        &self.registry
    }

    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    pub const fn sink(&self) -> &S {
        &self.sink
    }
}

/// Map a monotonic instant onto simulation time anchored at `started`.
fn clock_at(started: DateTime<Utc>, origin: Instant, at: Instant) -> DateTime<Utc> {
    TimeDelta::from_std(at.saturating_duration_since(origin))
        .ok()
        .and_then(|elapsed| started.checked_add_signed(elapsed))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
