use glam::Vec2;

use crate::arbitration::{Behavior, PriorityWeights};
use crate::combat::{Burst, FirePattern};
use crate::phase::Phase;
use crate::squad::formation::Slot;
use crate::squad::role::Role;

/// Current world position in arena pixels.
#[derive(Debug, Clone, Copy)]
pub struct Position(pub Vec2);

/// Velocity in pixels/tick.
#[derive(Debug, Clone, Copy)]
pub struct Velocity(pub Vec2);

/// Facing and commanded facing, both radians in (-PI, PI].
#[derive(Debug, Clone, Copy)]
pub struct Heading {
    pub angle: f32,
    /// Where the current behavior wants to point.
    pub target: f32,
}

impl Heading {
    pub fn new(angle: f32) -> Self {
        Self {
            angle,
            target: angle,
        }
    }
}

// ---------------------------------------------------------------------------
// Craft kind
// ---------------------------------------------------------------------------

/// Faction and hull type. Drives the per-kind stat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CraftKind {
    Allied,
    Basic,
    Advanced,
    Boss,
}

/// Fixed per-kind body constants.
#[derive(Debug, Clone, Copy)]
pub struct HullStats {
    pub max_health: f32,
    pub size: f32,
    pub radius: f32,
    pub rotation_step: f32,
    pub thrust_power: f32,
    pub max_speed: f32,
    /// Ticks between shots (hostiles) or rapid-fire cooldown (allies).
    pub fire_interval: u32,
    pub projectile_speed: f32,
}

const ALLIED_STATS: HullStats = HullStats {
    max_health: 3.0,
    size: 20.0,
    radius: 15.0,
    rotation_step: 0.1,
    thrust_power: 0.15,
    max_speed: 8.0,
    fire_interval: 3,
    projectile_speed: 8.0,
};

const fn hostile(max_health: f32, size: f32, fire_interval: u32) -> HullStats {
    HullStats {
        max_health,
        size,
        radius: size * 0.75,
        rotation_step: 0.08,
        thrust_power: 0.12,
        max_speed: 6.0,
        fire_interval,
        projectile_speed: 7.0,
    }
}

impl CraftKind {
    pub const fn stats(self) -> HullStats {
        match self {
            CraftKind::Allied => ALLIED_STATS,
            CraftKind::Basic => hostile(1.0, 18.0, 30),
            CraftKind::Advanced => hostile(2.0, 22.0, 20),
            CraftKind::Boss => hostile(5.0, 35.0, 10),
        }
    }

    pub fn is_hostile(self) -> bool {
        !matches!(self, CraftKind::Allied)
    }

    /// Score awarded for destroying this kind.
    pub fn bounty(self) -> u32 {
        match self {
            CraftKind::Allied => 0,
            CraftKind::Basic => 100,
            CraftKind::Advanced => 250,
            CraftKind::Boss => 1000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CraftKind::Allied => "Allied",
            CraftKind::Basic => "Basic",
            CraftKind::Advanced => "Advanced",
            CraftKind::Boss => "Boss",
        }
    }
}

// ---------------------------------------------------------------------------
// Vitals
// ---------------------------------------------------------------------------

/// Hit points. `current` stays within `[0, max]`.
#[derive(Debug, Clone, Copy)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn ratio(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.current / self.max).clamp(0.0, 1.0)
    }

    /// Returns true when this hit destroyed the craft.
    pub fn damage(&mut self, amount: f32) -> bool {
        self.current = (self.current - amount).max(0.0);
        self.current <= 0.0
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    /// Change the cap, pulling current health down if it now exceeds it.
    pub fn set_max(&mut self, max: f32) {
        self.max = max;
        self.current = self.current.min(max);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseState {
    pub phase: Phase,
    /// Ticks left on the phase-change flash.
    pub transition_timer: u32,
}

/// Invulnerability window. Active shields absorb projectile and obstacle damage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shield {
    pub active: bool,
    pub duration: u32,
    pub cooldown: u32,
}

/// Ticks until the craft may fire again.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weapon {
    pub cooldown: u32,
}

// ---------------------------------------------------------------------------
// Allied
// ---------------------------------------------------------------------------

/// Base sensing radii, flocking and thrust tunables.
pub const BASE_DETECTION_RADIUS: f32 = 100.0;
pub const BASE_FIRING_RANGE: f32 = 200.0;
pub const BASE_FLOCK_WEIGHT: f32 = 0.3;
pub const BASE_THRUST_FREQUENCY: f32 = 0.02;
pub const BASE_ENEMY_FIRING_RANGE: f32 = 250.0;
pub const BASE_DEFENSIVE_FLOCK_WEIGHT: f32 = 0.8;

/// Allied tunables. Either the base table or values supplied by an [`Advisor`].
///
/// [`Advisor`]: crate::advisor::Advisor
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub detection_radius: f32,
    pub firing_range: f32,
    pub flock_weight: f32,
    pub thrust_frequency: f32,
    pub enemy_firing_range: f32,
    pub defensive_flock_weight: f32,
    pub weights: PriorityWeights,
    /// Ticks since the advisor was last consulted.
    pub inference_frame: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            detection_radius: BASE_DETECTION_RADIUS,
            firing_range: BASE_FIRING_RANGE,
            flock_weight: BASE_FLOCK_WEIGHT,
            thrust_frequency: BASE_THRUST_FREQUENCY,
            enemy_firing_range: BASE_ENEMY_FIRING_RANGE,
            defensive_flock_weight: BASE_DEFENSIVE_FLOCK_WEIGHT,
            weights: PriorityWeights::default(),
            inference_frame: 0,
        }
    }
}

/// Formation perks granted while flying with the squad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormationAbilities {
    pub shield: bool,
    pub boost: bool,
    pub heal: bool,
    pub radar: bool,
}

/// Squad membership bookkeeping for an allied craft.
#[derive(Debug, Clone, Copy)]
pub struct Wing {
    pub role: Option<Role>,
    pub role_assigned: bool,
    /// Pre-election max health, held only while this craft is alpha.
    pub base_max_health: Option<f32>,
    /// Squad-wide target, inherited from the alpha.
    pub attack_target: Option<hecs::Entity>,
    /// Per-craft target from multi-target distribution or a split.
    pub assigned_target: Option<hecs::Entity>,
    /// Side-flank slot when the alpha is close to its target.
    pub side_flank: Option<Vec2>,
    /// Position handed out by the alpha's flanking pattern.
    pub pattern_slot: Option<Vec2>,
    pub abilities: FormationAbilities,
    pub healing_cooldown: u32,
    /// Ticks left on the heal flash.
    pub healing_effect: u32,
    pub intercept_target: Option<hecs::Entity>,
    /// Last computed formation slot, for display only.
    pub slot: Option<Slot>,
    pub behavior: Behavior,
}

impl Default for Wing {
    fn default() -> Self {
        Self {
            role: None,
            role_assigned: false,
            base_max_health: None,
            attack_target: None,
            assigned_target: None,
            side_flank: None,
            pattern_slot: None,
            abilities: FormationAbilities::default(),
            healing_cooldown: 0,
            healing_effect: 0,
            intercept_target: None,
            slot: None,
            behavior: Behavior::RandomNavigate,
        }
    }
}

impl Wing {
    /// Whether this craft has something to shoot at; hostiles favour such targets.
    pub fn is_engaged(&self) -> bool {
        self.attack_target.is_some() || self.assigned_target.is_some()
    }
}

// ---------------------------------------------------------------------------
// Hostile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PursuitState {
    Pursuit,
    Attack,
    Evade,
    Retreat,
    Cover,
}

impl PursuitState {
    pub fn label(self) -> &'static str {
        match self {
            PursuitState::Pursuit => "pursuit",
            PursuitState::Attack => "attack",
            PursuitState::Evade => "evade",
            PursuitState::Retreat => "retreat",
            PursuitState::Cover => "cover",
        }
    }
}

/// Something a hostile can chase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    Player,
    Ally(hecs::Entity),
}

/// Boss-only pattern and phase bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct BossState {
    pub phase: Phase,
    pub pattern: FirePattern,
    pub pattern_timer: u32,
    pub rapid_count: u32,
    pub erratic_timer: u32,
    pub teleport_cooldown: u32,
    pub transition_timer: u32,
}

impl Default for BossState {
    fn default() -> Self {
        Self {
            phase: Phase::One,
            pattern: FirePattern::Normal,
            pattern_timer: 0,
            rapid_count: 0,
            erratic_timer: 0,
            teleport_cooldown: 0,
            transition_timer: 0,
        }
    }
}

/// Hostile decision state.
#[derive(Debug, Clone, Copy)]
pub struct Pursuit {
    pub state: PursuitState,
    pub target: Option<TargetRef>,
    pub burst: Option<Burst>,
    pub boss: Option<BossState>,
}

impl Pursuit {
    pub fn new(kind: CraftKind) -> Self {
        Self {
            state: PursuitState::Pursuit,
            target: None,
            burst: None,
            boss: (kind == CraftKind::Boss).then(BossState::default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_floors_at_zero() {
        let mut h = Health::full(3.0);
        assert!(!h.damage(1.0));
        assert!(h.damage(5.0));
        assert_eq!(h.current, 0.0);
    }

    #[test]
    fn heal_caps_at_max() {
        let mut h = Health { current: 2.5, max: 3.0 };
        h.heal(1.0);
        assert_eq!(h.current, 3.0);
    }

    #[test]
    fn set_max_pulls_current_down() {
        let mut h = Health { current: 3.75, max: 3.75 };
        h.set_max(3.0);
        assert_eq!(h.current, 3.0);
    }

    #[test]
    fn hostile_radius_is_three_quarters_size() {
        let boss = CraftKind::Boss.stats();
        assert!((boss.radius - 26.25).abs() < 1e-6);
        assert_eq!(CraftKind::Advanced.stats().fire_interval, 20);
    }
}
