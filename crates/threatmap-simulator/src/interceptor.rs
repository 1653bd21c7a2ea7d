//! Interceptor planning, flight and outcome resolution.

use chrono::{DateTime, Utc};
use threatmap_domain::{
    AttackDescriptor, DefenseLaunch, DefenseUpdate, InterceptResult, LatLng, Location,
    Resolution, SimId, distance_meters, interpolate,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::attack::{MissileView, elapsed_ms, offset_ms, progress_fraction};
use crate::config::{InterceptConfig, LaunchPolicy};

// =============================================================================
// PLANNING
// =============================================================================

/// Where and when an interceptor flies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptPlan {
    pub aim_point: LatLng,
    /// Fraction of the attack path at which `aim_point` lies
    pub aim_fraction: f64,
    pub interceptor_time_ms: f64,
    pub attack_time_to_intercept_ms: f64,
    pub delay_ms: f64,
}

/// Fraction along the attack path where an interceptor launched with the
/// attack arrives at the same moment.
///
/// The center-to-path distance is approximated as varying linearly from
/// `center_to_source_m` at fraction 0 to `center_to_target_m` at fraction 1,
/// which is exact whenever the center lies on the path (the defended target
/// itself). Solving `x * attack_leg = g(x) / ratio` for `x` gives the
/// closed form below. Returns 1.0 (aim at the target) when no meeting
/// point exists.
#[must_use]
pub fn intercept_fraction(
    attack_leg_m: f64,
    center_to_source_m: f64,
    center_to_target_m: f64,
    speed_ratio: f64,
) -> f64 {
    let denominator = speed_ratio * attack_leg_m + center_to_source_m - center_to_target_m;
    if attack_leg_m <= 0.0 || denominator <= 0.0 || !denominator.is_finite() {
        return 1.0;
    }
    (center_to_source_m / denominator).clamp(0.0, 1.0)
}

/// Fraction of the path lying `standoff_m` before the target.
#[must_use]
pub fn standoff_fraction(attack_leg_m: f64, standoff_m: f64) -> f64 {
    if attack_leg_m <= standoff_m || attack_leg_m <= 0.0 {
        return 0.0;
    }
    (attack_leg_m - standoff_m) / attack_leg_m
}

/// Plan an interceptor from `center` against `attack`.
#[must_use]
pub fn plan_intercept(
    attack: &AttackDescriptor,
    center: &Location,
    config: &InterceptConfig,
) -> InterceptPlan {
    let source = attack.source.point();
    let target = attack.target.point();
    let travel_ms = attack.attack_travel_time_ms.max(0.0);

    let aim_fraction = match config.launch_policy {
        LaunchPolicy::Immediate => attack.effective_speed_mps().map_or(1.0, |attack_speed| {
            intercept_fraction(
                attack.total_distance_m,
                distance_meters(center.point(), source),
                distance_meters(center.point(), target),
                config.interceptor_speed_mps / attack_speed,
            )
        }),
        LaunchPolicy::Delayed => {
            standoff_fraction(attack.total_distance_m, config.intercept_standoff_m)
        }
    };

    let aim_point = interpolate(source, target, aim_fraction);
    let interceptor_time_ms =
        distance_meters(center.point(), aim_point) / config.interceptor_speed_mps * 1000.0;
    let attack_time_to_intercept_ms = aim_fraction * travel_ms;
    let delay_ms = match config.launch_policy {
        LaunchPolicy::Immediate => 0.0,
        LaunchPolicy::Delayed => (attack_time_to_intercept_ms - interceptor_time_ms).max(0.0),
    };

    InterceptPlan {
        aim_point,
        aim_fraction,
        interceptor_time_ms,
        attack_time_to_intercept_ms,
        delay_ms,
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Decide whether this tick ends the engagement.
///
/// Rules in priority order: proximity kill, interceptor arrival, missile
/// arrival, and an arrival-time tie-break when both finish in one tick.
#[must_use]
pub fn evaluate(
    interceptor_fraction: f64,
    missile_fraction: f64,
    separation_m: f64,
    interceptor_arrival: DateTime<Utc>,
    missile_arrival: DateTime<Utc>,
    rules: &InterceptConfig,
) -> Option<Resolution> {
    if separation_m < rules.collision_threshold_m
        && interceptor_fraction >= rules.min_interceptor_fraction
    {
        return Some(Resolution::Proximity);
    }

    match (interceptor_fraction >= 1.0, missile_fraction >= 1.0) {
        (true, false) => Some(Resolution::InterceptorArrived),
        (false, true) => Some(Resolution::MissileArrived),
        (true, true) if interceptor_arrival <= missile_arrival => Some(Resolution::TieIntercepted),
        (true, true) => Some(Resolution::TieMissed),
        (false, false) => None,
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Interceptor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorPhase {
    /// Waiting out the launch delay
    Scheduled,
    InFlight,
    Resolved(Resolution),
}

/// Output of one interceptor tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterceptorTick {
    pub update: Option<DefenseUpdate>,
    pub result: Option<InterceptResult>,
}

/// One interceptor bound to an attack.
#[derive(Debug, Clone)]
pub struct InterceptorSimulation {
    sim_id: SimId,
    attack_id: Uuid,
    center: Location,
    plan: InterceptPlan,
    launch_at: DateTime<Utc>,
    fraction: f64,
    elapsed_ms: f64,
    position: LatLng,
    phase: InterceptorPhase,
}

impl InterceptorSimulation {
    pub fn schedule(
        sim_id: SimId,
        attack_id: Uuid,
        center: Location,
        plan: InterceptPlan,
        now: DateTime<Utc>,
    ) -> Self {
        let position = center.point();
        Self {
            sim_id,
            attack_id,
            center,
            plan,
            launch_at: offset_ms(now, plan.delay_ms),
            fraction: 0.0,
            elapsed_ms: 0.0,
            position,
            phase: InterceptorPhase::Scheduled,
        }
    }

    pub fn launch_event(&self) -> DefenseLaunch {
        DefenseLaunch {
            sim_id: self.sim_id,
            attack_id: self.attack_id,
            center: self.center.clone(),
            threat: self.plan.aim_point,
            interceptor_time_ms: self.plan.interceptor_time_ms,
            attack_time_to_intercept_ms: self.plan.attack_time_to_intercept_ms,
            launch_time: self.launch_at,
            delay_ms: self.plan.delay_ms,
        }
    }

    /// Advance to `now` against the missile's live state.
    pub fn advance(
        &mut self,
        now: DateTime<Utc>,
        missile: &MissileView,
        rules: &InterceptConfig,
    ) -> InterceptorTick {
        match self.phase {
            InterceptorPhase::Resolved(_) => return InterceptorTick::default(),
            InterceptorPhase::Scheduled if now < self.launch_at => {
                // still on the pad
                let result = (missile.fraction >= 1.0)
                    .then(|| self.resolve(Resolution::MissileArrived, missile, None));
                return InterceptorTick { update: None, result };
            }
            InterceptorPhase::Scheduled => {
                self.phase = InterceptorPhase::InFlight;
                info!(
                    sim_id = %self.sim_id,
                    attack_id = %self.attack_id,
                    center = %self.center.id,
                    "Interceptor launched"
                );
            }
            InterceptorPhase::InFlight => {}
        }

        let elapsed = elapsed_ms(self.launch_at, now).max(self.elapsed_ms);
        self.elapsed_ms = elapsed;
        self.fraction = progress_fraction(elapsed, self.plan.interceptor_time_ms).max(self.fraction);
        self.position = interpolate(self.center.point(), self.plan.aim_point, self.fraction);

        let update = DefenseUpdate {
            sim_id: self.sim_id,
            attack_id: self.attack_id,
            fraction_intercept: self.fraction,
            interceptor_position: self.position,
            missile_fraction: missile.fraction,
            missile_position: missile.position,
        };

        let separation = distance_meters(self.position, missile.position);
        let result = evaluate(
            self.fraction,
            missile.fraction,
            separation,
            self.arrival_time(),
            missile.arrival_time,
            rules,
        )
        .map(|resolution| {
            let collision = (resolution == Resolution::Proximity).then_some(separation);
            self.resolve(resolution, missile, collision)
        });

        InterceptorTick {
            update: Some(update),
            result,
        }
    }

    /// Stand down because a sibling already destroyed the attack.
    pub fn cancel(&mut self, missile: &MissileView) -> Option<InterceptResult> {
        if self.is_terminal() {
            return None;
        }
        Some(self.resolve(Resolution::SiblingIntercepted, missile, None))
    }

    fn resolve(
        &mut self,
        resolution: Resolution,
        missile: &MissileView,
        collision_distance_m: Option<f64>,
    ) -> InterceptResult {
        self.phase = InterceptorPhase::Resolved(resolution);

        let intercept_position = match resolution {
            Resolution::Proximity => interpolate(self.position, missile.position, 0.5),
            Resolution::InterceptorArrived
            | Resolution::TieIntercepted
            | Resolution::SiblingIntercepted => self.position,
            Resolution::MissileArrived | Resolution::TieMissed => missile.position,
        };

        debug!(
            sim_id = %self.sim_id,
            attack_id = %self.attack_id,
            ?resolution,
            fraction = self.fraction,
            missile_fraction = missile.fraction,
            "Interceptor resolved"
        );

        InterceptResult {
            sim_id: self.sim_id,
            attack_id: self.attack_id,
            intercepted: resolution.intercepted(),
            resolution,
            intercept_position,
            collision_distance_m,
            interceptor_elapsed_ms: self.elapsed_ms,
            missile_elapsed_ms: missile.elapsed_ms,
        }
    }

    pub fn arrival_time(&self) -> DateTime<Utc> {
        offset_ms(self.launch_at, self.plan.interceptor_time_ms)
    }

    pub const fn sim_id(&self) -> SimId {
        self.sim_id
    }

    pub const fn attack_id(&self) -> Uuid {
        self.attack_id
    }

    pub const fn center(&self) -> &Location {
        &self.center
    }

    pub const fn plan(&self) -> &InterceptPlan {
        &self.plan
    }

    pub const fn launch_at(&self) -> DateTime<Utc> {
        self.launch_at
    }

    pub const fn fraction(&self) -> f64 {
        self.fraction
    }

    pub const fn position(&self) -> LatLng {
        self.position
    }

    pub const fn phase(&self) -> InterceptorPhase {
        self.phase
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self.phase, InterceptorPhase::Resolved(_))
    }
}
