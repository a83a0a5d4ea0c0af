//! Optional external override layer. An [`Advisor`] can retune an allied craft's
//! parameters and priority weights, or hand it a complete action for one tick. Every
//! output is clamped or safety-checked here before it touches the craft.

use std::f32::consts::PI;
use std::ops::RangeInclusive;

use glam::Vec2;

use crate::arbitration::PriorityWeights;
use crate::ecs::components::{
    Tuning, BASE_DETECTION_RADIUS, BASE_ENEMY_FIRING_RANGE, BASE_FIRING_RANGE, BASE_FLOCK_WEIGHT,
    BASE_THRUST_FREQUENCY,
};
use crate::geometry::angle_diff;
use crate::phase::Phase;

/// Ticks between advisor consultations per craft.
pub const INFERENCE_INTERVAL: u32 = 5;
/// Thrusting toward a craft closer than this is rejected.
const UNSAFE_CRAFT_DISTANCE: f32 = 60.0;
/// Thrusting toward an obstacle closer than this is rejected.
const UNSAFE_OBSTACLE_DISTANCE: f32 = 80.0;
/// Half-angle of the "toward" cone in the safety check.
const UNSAFE_CONE: f32 = PI / 3.0;

const DETECTION_BOUNDS: RangeInclusive<f32> = 50.0..=200.0;
const FIRING_BOUNDS: RangeInclusive<f32> = 100.0..=400.0;
const FLOCK_BOUNDS: RangeInclusive<f32> = 0.1..=0.8;
const THRUST_BOUNDS: RangeInclusive<f32> = 0.01..=0.1;
const ENEMY_FIRING_BOUNDS: RangeInclusive<f32> = 150.0..=400.0;
const DEFENSIVE_FLOCK_BOUNDS: RangeInclusive<f32> = 0.4..=0.8;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

pub const FEATURE_COUNT: usize = 12;

/// Normalized observation handed to the advisor. Every entry is in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Features(pub [f32; FEATURE_COUNT]);

/// Raw readings the feature vector is built from.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub health_ratio: f32,
    pub phase: Phase,
    pub shielded: bool,
    pub speed: f32,
    pub obstacle_count: usize,
    pub nearest_obstacle: Option<f32>,
    pub enemy_count: usize,
    pub nearest_enemy: Option<f32>,
    /// Allies inside the flock radius.
    pub allies_near: usize,
    pub enemies_near: bool,
}

/// Combined danger from the nearest obstacle and nearest enemy, in [0, 1].
pub fn threat_level(nearest_obstacle: Option<f32>, nearest_enemy: Option<f32>) -> f32 {
    let mut threat = 0.0;
    if let Some(d) = nearest_obstacle.filter(|d| *d < 150.0) {
        threat += 0.3 * (1.0 - d / 150.0);
    }
    if let Some(d) = nearest_enemy.filter(|d| *d < 300.0) {
        threat += 0.4 * (1.0 - d / 300.0);
    }
    threat.min(1.0)
}

fn capped(value: f32, scale: f32) -> f32 {
    (value / scale).clamp(0.0, 1.0)
}

impl Features {
    pub fn from_observation(o: &Observation) -> Self {
        let density = capped(o.allies_near as f32, 9.0);
        Self([
            o.health_ratio.clamp(0.0, 1.0),
            o.phase.number() as f32 / 3.0,
            if o.shielded { 1.0 } else { 0.0 },
            capped(o.speed, 5.0),
            capped(o.obstacle_count as f32, 10.0),
            o.nearest_obstacle.map_or(1.0, |d| capped(d, 200.0)),
            capped(o.enemy_count as f32, 10.0),
            o.nearest_enemy.map_or(1.0, |d| capped(d, 400.0)),
            density,
            threat_level(o.nearest_obstacle, o.nearest_enemy),
            density,
            if o.enemies_near { 1.0 } else { 0.0 },
        ])
    }

    pub fn threat_level(&self) -> f32 {
        self.0[9]
    }

    pub fn enemies_near(&self) -> bool {
        self.0[11] > 0.5
    }
}

// ---------------------------------------------------------------------------
// Advisor contract
// ---------------------------------------------------------------------------

/// Raw parameter suggestion. Zero or non-finite fields mean "use the base value".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParameterSuggestion {
    pub detection_radius: f32,
    pub firing_range: f32,
    pub flock_weight: f32,
    pub thrust_frequency: f32,
    pub enemy_firing_range: f32,
}

/// One tick's worth of direct control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Action {
    /// -1, 0 or 1.
    pub rotate: i8,
    pub thrust: bool,
    pub fire: bool,
    pub shield: bool,
}

/// External parameter/action provider. Every hook defaults to "no opinion".
pub trait Advisor {
    fn parameters(
        &mut self,
        _craft: hecs::Entity,
        _features: &Features,
    ) -> Option<ParameterSuggestion> {
        None
    }

    fn priority_weights(
        &mut self,
        _craft: hecs::Entity,
        _features: &Features,
    ) -> Option<PriorityWeights> {
        None
    }

    fn action(&mut self, _craft: hecs::Entity, _features: &Features) -> Option<Action> {
        None
    }
}

/// The default: rule-based decisions only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvisor;

impl Advisor for NoAdvisor {}

fn sanitize(value: f32, base: f32, bounds: RangeInclusive<f32>) -> f32 {
    if !value.is_finite() || value == 0.0 {
        return base;
    }
    value.clamp(*bounds.start(), *bounds.end())
}

/// Write a (possibly missing) parameter suggestion into `tuning`, clamped to the safe
/// envelope. Missing suggestions restore the base table.
pub fn apply_parameters(
    tuning: &mut Tuning,
    suggestion: Option<ParameterSuggestion>,
    enemies_near: bool,
) {
    let s = suggestion.unwrap_or_default();
    tuning.detection_radius = sanitize(s.detection_radius, BASE_DETECTION_RADIUS, DETECTION_BOUNDS);
    tuning.firing_range = sanitize(s.firing_range, BASE_FIRING_RANGE, FIRING_BOUNDS);
    tuning.flock_weight = sanitize(s.flock_weight, BASE_FLOCK_WEIGHT, FLOCK_BOUNDS);
    tuning.thrust_frequency = sanitize(s.thrust_frequency, BASE_THRUST_FREQUENCY, THRUST_BOUNDS);
    tuning.enemy_firing_range =
        sanitize(s.enemy_firing_range, BASE_ENEMY_FIRING_RANGE, ENEMY_FIRING_BOUNDS);
    if suggestion.is_some() && enemies_near {
        tuning.defensive_flock_weight = (tuning.flock_weight * 1.2)
            .clamp(*DEFENSIVE_FLOCK_BOUNDS.start(), *DEFENSIVE_FLOCK_BOUNDS.end());
    }
}

/// Clamp a weight table. Avoid-craft is pinned to the ceiling.
pub fn clamp_weights(suggestion: Option<PriorityWeights>) -> PriorityWeights {
    let base = PriorityWeights::default();
    let Some(w) = suggestion else {
        return base;
    };
    PriorityWeights {
        avoid_craft: 1.0,
        fire_at_enemy: sanitize(w.fire_at_enemy, base.fire_at_enemy, 0.5..=1.0),
        protect_ally: sanitize(w.protect_ally, base.protect_ally, 0.3..=0.8),
        fire_at_obstacle: sanitize(w.fire_at_obstacle, base.fire_at_obstacle, 0.2..=0.6),
        avoid_obstacle: sanitize(w.avoid_obstacle, base.avoid_obstacle, 0.2..=0.5),
        random_navigate: sanitize(w.random_navigate, base.random_navigate, 0.05..=0.2),
    }
}

/// Something the safety check must not be steered into.
#[derive(Debug, Clone, Copy)]
pub struct Hazard {
    pub pos: Vec2,
    pub is_obstacle: bool,
}

/// Reject actions that thrust toward a nearby craft or obstacle.
/// `heading` is the craft's heading after the action's rotation.
pub fn action_is_safe(
    action: &Action,
    pos: Vec2,
    heading: f32,
    hazards: impl IntoIterator<Item = Hazard>,
) -> bool {
    if !action.thrust {
        return true;
    }
    hazards.into_iter().all(|h| {
        let offset = h.pos - pos;
        let d = offset.length();
        let limit = if h.is_obstacle {
            UNSAFE_OBSTACLE_DISTANCE
        } else {
            UNSAFE_CRAFT_DISTANCE
        };
        if d <= 0.0 || d >= limit {
            return true;
        }
        angle_diff(heading, offset.y.atan2(offset.x)).abs() >= UNSAFE_CONE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameters_restore_base() {
        let mut t = Tuning {
            detection_radius: 180.0,
            ..Tuning::default()
        };
        apply_parameters(&mut t, None, false);
        assert_eq!(t.detection_radius, BASE_DETECTION_RADIUS);
        assert_eq!(t.thrust_frequency, BASE_THRUST_FREQUENCY);
    }

    #[test]
    fn parameters_are_clamped_and_sanitized() {
        let mut t = Tuning::default();
        let s = ParameterSuggestion {
            detection_radius: 900.0,
            firing_range: f32::NAN,
            flock_weight: 0.0,
            thrust_frequency: 0.001,
            enemy_firing_range: 390.0,
        };
        apply_parameters(&mut t, Some(s), true);
        assert_eq!(t.detection_radius, 200.0);
        assert_eq!(t.firing_range, BASE_FIRING_RANGE);
        assert_eq!(t.flock_weight, BASE_FLOCK_WEIGHT);
        assert_eq!(t.thrust_frequency, 0.01);
        assert_eq!(t.enemy_firing_range, 390.0);
        // 0.3 * 1.2 = 0.36, floored to 0.4
        assert!((t.defensive_flock_weight - 0.4).abs() < 1e-6);
    }

    #[test]
    fn avoid_craft_weight_is_pinned() {
        let w = clamp_weights(Some(PriorityWeights {
            avoid_craft: 0.1,
            fire_at_enemy: 2.0,
            protect_ally: 0.1,
            fire_at_obstacle: f32::INFINITY,
            avoid_obstacle: 0.35,
            random_navigate: 0.0,
        }));
        assert_eq!(w.avoid_craft, 1.0);
        assert_eq!(w.fire_at_enemy, 1.0);
        assert_eq!(w.protect_ally, 0.3);
        assert_eq!(w.fire_at_obstacle, 0.4);
        assert_eq!(w.avoid_obstacle, 0.35);
        assert_eq!(w.random_navigate, 0.1);
    }

    #[test]
    fn thrust_into_close_craft_is_unsafe() {
        let go = Action {
            thrust: true,
            ..Action::default()
        };
        let craft = Hazard {
            pos: Vec2::new(40.0, 0.0),
            is_obstacle: false,
        };
        assert!(!action_is_safe(&go, Vec2::ZERO, 0.0, [craft]));
        // Facing away is fine.
        assert!(action_is_safe(&go, Vec2::ZERO, PI, [craft]));
        // Not thrusting is always fine.
        assert!(action_is_safe(&Action::default(), Vec2::ZERO, 0.0, [craft]));
    }

    #[test]
    fn obstacle_limit_is_wider() {
        let go = Action {
            thrust: true,
            ..Action::default()
        };
        let rock = Hazard {
            pos: Vec2::new(70.0, 0.0),
            is_obstacle: true,
        };
        let ship = Hazard {
            pos: Vec2::new(70.0, 0.0),
            is_obstacle: false,
        };
        assert!(!action_is_safe(&go, Vec2::ZERO, 0.0, [rock]));
        assert!(action_is_safe(&go, Vec2::ZERO, 0.0, [ship]));
    }

    #[test]
    fn features_are_normalized() {
        let f = Features::from_observation(&Observation {
            health_ratio: 0.5,
            phase: Phase::Two,
            shielded: true,
            speed: 10.0,
            obstacle_count: 5,
            nearest_obstacle: None,
            enemy_count: 20,
            nearest_enemy: Some(150.0),
            allies_near: 3,
            enemies_near: true,
        });
        assert!(f.0.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(f.0[3], 1.0);
        assert_eq!(f.0[5], 1.0);
        assert_eq!(f.0[6], 1.0);
        assert!((f.threat_level() - 0.2).abs() < 1e-6);
        assert!(f.enemies_near());
    }
}
