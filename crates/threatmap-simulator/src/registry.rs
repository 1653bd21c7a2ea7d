//! Ownership and routing for every in-flight simulation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use threatmap_domain::{AttackDescriptor, Location, SimEvent, SimId};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arena::Arena;
use crate::attack::{AttackPhase, AttackSimulation};
use crate::config::InterceptConfig;
use crate::interceptor::{InterceptorSimulation, plan_intercept};
use crate::sink::EventSink;

struct AttackEntry {
    attack: AttackSimulation,
    interceptors: Vec<SimId>,
}

/// A hit attack is done; a defeated one waits for its interceptors.
fn is_retirable(entry: &AttackEntry, interceptors: &Arena<InterceptorSimulation>) -> bool {
    match entry.attack.phase() {
        AttackPhase::Active => false,
        AttackPhase::Hit => true,
        AttackPhase::Defeated => entry.interceptors.iter().all(|sim_id| {
            interceptors
                .get(*sim_id)
                .is_none_or(InterceptorSimulation::is_terminal)
        }),
    }
}

/// Outcome counters for one registry tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Attacks that reached their target
    pub hits: usize,
    /// Attacks destroyed by an interceptor
    pub defeated: usize,
    /// Interceptor results with `intercepted = true`
    pub intercepted: usize,
    /// Interceptor results with `intercepted = false`, cancellations included
    pub missed: usize,
    /// Attack entries removed after going terminal
    pub retired: usize,
}

/// Process-wide table of live attacks and their interceptors.
///
/// Mutated only from the engine task; interceptors read their attack's
/// live state through the registry on every tick.
pub struct SimulationRegistry {
    attacks: Arena<AttackEntry>,
    index: HashMap<Uuid, SimId>,
    interceptors: Arena<InterceptorSimulation>,
    rules: InterceptConfig,
}

impl SimulationRegistry {
    pub fn new(rules: InterceptConfig) -> Self {
        Self {
            attacks: Arena::new(),
            index: HashMap::new(),
            interceptors: Arena::new(),
            rules,
        }
    }

    pub const fn rules(&self) -> &InterceptConfig {
        &self.rules
    }

    /// Start simulating `descriptor` from `now`.
    ///
    /// Registering an id that is already live leaves the existing entry
    /// untouched.
    pub fn register(&mut self, descriptor: AttackDescriptor, now: DateTime<Utc>) -> Uuid {
        let id = descriptor.id;
        if self.index.contains_key(&id) {
            warn!(attack_id = %id, "Attack already registered, ignoring duplicate");
            return id;
        }

        debug!(
            attack_id = %id,
            travel_ms = descriptor.attack_travel_time_ms,
            "Registering attack"
        );
        let key = self.attacks.insert(AttackEntry {
            attack: AttackSimulation::start(descriptor, now),
            interceptors: Vec::new(),
        });
        self.index.insert(id, key);
        id
    }

    /// Schedule an interceptor from `center` against a live attack.
    ///
    /// Unknown or already finished attacks are logged and ignored.
    pub fn attach_interceptor(
        &mut self,
        attack_id: Uuid,
        center: &Location,
        now: DateTime<Utc>,
        sink: &impl EventSink,
    ) -> Option<SimId> {
        let Some(entry) = self
            .index
            .get(&attack_id)
            .and_then(|key| self.attacks.get_mut(*key))
        else {
            warn!(attack_id = %attack_id, center = %center.id, "Cannot attach interceptor: unknown attack");
            return None;
        };
        if entry.attack.is_terminal() {
            warn!(attack_id = %attack_id, center = %center.id, "Cannot attach interceptor: attack already finished");
            return None;
        }

        let plan = plan_intercept(entry.attack.descriptor(), center, &self.rules);
        let sim_id = self.interceptors.insert_with(|sim_id| {
            InterceptorSimulation::schedule(sim_id, attack_id, center.clone(), plan, now)
        });
        entry.interceptors.push(sim_id);

        if let Some(interceptor) = self.interceptors.get(sim_id) {
            sink.publish(SimEvent::DefenseLaunch(interceptor.launch_event()));
        }
        Some(sim_id)
    }

    /// Advance every live simulation to `now`, publish what happened and
    /// retire entries that are finished.
    pub fn tick(&mut self, now: DateTime<Utc>, sink: &impl EventSink) -> TickReport {
        let mut report = TickReport::default();
        let mut finished = Vec::new();

        for key in self.attacks.keys() {
            let Some(entry) = self.attacks.get_mut(key) else {
                continue;
            };

            if let Some(update) = entry.attack.advance(now) {
                sink.publish(SimEvent::AttackUpdate(update));
            }
            let view = entry.attack.view();
            let cancel_siblings = self.rules.cancel_siblings_on_intercept;
            let mut defeated_now = false;

            for &sim_id in &entry.interceptors {
                let Some(interceptor) = self.interceptors.get_mut(sim_id) else {
                    continue;
                };

                let result = if defeated_now && cancel_siblings {
                    interceptor.cancel(&view)
                } else {
                    let tick = interceptor.advance(now, &view, &self.rules);
                    if let Some(update) = tick.update {
                        sink.publish(SimEvent::DefenseUpdate(update));
                    }
                    tick.result
                };

                let Some(result) = result else {
                    continue;
                };
                if result.intercepted {
                    report.intercepted += 1;
                    if entry.attack.phase() == AttackPhase::Active {
                        entry.attack.defeat();
                        defeated_now = true;
                        report.defeated += 1;
                        info!(
                            attack_id = %result.attack_id,
                            sim_id = %result.sim_id,
                            resolution = ?result.resolution,
                            "Attack intercepted"
                        );
                    }
                } else {
                    report.missed += 1;
                }
                sink.publish(SimEvent::InterceptResult(result));
            }

            // siblings that already flew this tick
            if defeated_now && cancel_siblings {
                for &sim_id in &entry.interceptors {
                    if let Some(result) = self
                        .interceptors
                        .get_mut(sim_id)
                        .and_then(|interceptor| interceptor.cancel(&view))
                    {
                        report.missed += 1;
                        sink.publish(SimEvent::InterceptResult(result));
                    }
                }
            }

            if let Some(hit) = entry.attack.try_hit() {
                report.hits += 1;
                info!(attack_id = %hit.id, "Attack reached target");
                sink.publish(SimEvent::AttackFinal(hit));
            }

            if is_retirable(entry, &self.interceptors) {
                finished.push(entry.attack.id());
            }
        }

        for attack_id in finished {
            if self.retire(attack_id) {
                report.retired += 1;
            }
        }
        report
    }

    /// Remove a finished attack and its interceptors.
    ///
    /// Returns `false` when the attack is unknown (including already
    /// retired) or still has work to do. Safe to call repeatedly.
    pub fn retire(&mut self, attack_id: Uuid) -> bool {
        let Some(&key) = self.index.get(&attack_id) else {
            return false;
        };
        let retirable = self
            .attacks
            .get(key)
            .is_some_and(|entry| is_retirable(entry, &self.interceptors));
        if !retirable {
            debug!(attack_id = %attack_id, "Attack still active, not retiring");
            return false;
        }

        self.index.remove(&attack_id);
        if let Some(entry) = self.attacks.remove(key) {
            for sim_id in entry.interceptors {
                self.interceptors.remove(sim_id);
            }
            info!(
                attack_id = %attack_id,
                phase = ?entry.attack.phase(),
                "Attack retired"
            );
        }
        true
    }

    /// Drop everything regardless of state. Returns the number of attacks
    /// removed.
    pub fn retire_all(&mut self) -> usize {
        let count = self.attacks.drain().len();
        let interceptors = self.interceptors.drain().len();
        self.index.clear();
        if count > 0 {
            info!(attacks = count, interceptors, "Retired all simulations");
        }
        count
    }

    /// Live fraction of an attack, if it is registered.
    pub fn attack_fraction(&self, attack_id: Uuid) -> Option<f64> {
        self.entry(attack_id).map(|entry| entry.attack.fraction())
    }

    pub fn attack_phase(&self, attack_id: Uuid) -> Option<AttackPhase> {
        self.entry(attack_id).map(|entry| entry.attack.phase())
    }

    /// Interceptor ids bound to an attack, in attach order
    pub fn interceptors_of(&self, attack_id: Uuid) -> Vec<SimId> {
        self.entry(attack_id)
            .map(|entry| entry.interceptors.clone())
            .unwrap_or_default()
    }

    pub fn interceptor(&self, sim_id: SimId) -> Option<&InterceptorSimulation> {
        self.interceptors.get(sim_id)
    }

    pub fn contains(&self, attack_id: Uuid) -> bool {
        self.index.contains_key(&attack_id)
    }

    pub fn active_attacks(&self) -> usize {
        self.attacks.len()
    }

    pub fn active_interceptors(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    fn entry(&self, attack_id: Uuid) -> Option<&AttackEntry> {
        self.index
            .get(&attack_id)
            .and_then(|key| self.attacks.get(*key))
    }
}

impl Default for SimulationRegistry {
    fn default() -> Self {
        Self::new(InterceptConfig::default())
    }
}
