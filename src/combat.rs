//! Fire control shared by both factions: aim tests, the shooter cap, and the
//! multi-shot patterns hostiles use.

use std::f32::consts::PI;

use glam::Vec2;

use crate::geometry::{angle_diff, bearing, heading_vec};

/// Allied craft whose own aim is checked by the coordination guard must sit within this radius.
pub const COORDINATION_RADIUS: f32 = 200.0;
/// Three committed shooters already on a target suppress a fourth.
pub const MAX_COMMITTED_SHOOTERS: usize = 3;
/// A shooter counts as aligned inside this cone.
const COORDINATION_ARC: f32 = PI / 3.0;

/// Allied "enemy in arc" test half-angle.
pub const ENEMY_FIRE_ARC: f32 = PI / 2.0;

/// Total fan of a hostile burst.
const BURST_SPREAD: f32 = PI / 12.0;
/// Total fan of a hostile predictive spread.
const SPREAD_FAN: f32 = PI / 8.0;
/// Total fan of a boss spread volley.
const BOSS_SPREAD_FAN: f32 = PI / 6.0;
pub const BOSS_SPREAD_SHOTS: usize = 5;
pub const CIRCULAR_SHOTS: usize = 8;
/// Rapid volleys per boss rapid cycle.
pub const RAPID_SHOTS: u32 = 3;
pub const RAPID_COOLDOWN: u32 = 5;

// ---------------------------------------------------------------------------
// Fire patterns
// ---------------------------------------------------------------------------

/// Boss firing modes, re-rolled on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirePattern {
    #[default]
    Normal,
    Spread,
    Rapid,
    Circular,
}

impl FirePattern {
    pub fn label(self) -> &'static str {
        match self {
            FirePattern::Normal => "normal",
            FirePattern::Spread => "spread",
            FirePattern::Rapid => "rapid",
            FirePattern::Circular => "circular",
        }
    }
}

/// Staggered multi-shot in progress. The first shot is fired by the caller when the
/// burst starts; later shots fall out of [`Burst::step`] every second tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    pub shots: u32,
    pub timer: u32,
    pub base_angle: f32,
}

impl Burst {
    pub fn new(shots: u32, base_angle: f32) -> Self {
        Self {
            shots,
            timer: 0,
            base_angle,
        }
    }

    /// Advance one tick. Returns the angle of a shot due this tick, if any.
    pub fn step(&mut self) -> Option<f32> {
        self.timer += 1;
        if self.timer % 2 != 0 {
            return None;
        }
        let index = self.timer / 2;
        (index > 0 && index < self.shots).then(|| burst_angle(self.base_angle, index, self.shots))
    }

    pub fn finished(&self) -> bool {
        self.timer >= self.shots * 2
    }
}

/// Angle of shot `index` in an `n`-shot burst.
pub fn burst_angle(base: f32, index: u32, n: u32) -> f32 {
    fan_angle(base, index as f32, n as f32, BURST_SPREAD)
}

/// Angles of an `n`-shot predictive spread, fired together.
pub fn spread_angles(base: f32, n: u32) -> impl Iterator<Item = f32> {
    (0..n).map(move |i| fan_angle(base, i as f32, n as f32, SPREAD_FAN))
}

fn fan_angle(base: f32, index: f32, n: f32, fan: f32) -> f32 {
    if n <= 1.0 {
        return base;
    }
    base + (index - n / 2.0) * (fan / (n - 1.0))
}

/// Five shots evenly over a 30 degree cone centred on `base`.
pub fn boss_spread_angles(base: f32) -> impl Iterator<Item = f32> {
    let step = BOSS_SPREAD_FAN / (BOSS_SPREAD_SHOTS - 1) as f32;
    (0..BOSS_SPREAD_SHOTS).map(move |i| base - BOSS_SPREAD_FAN / 2.0 + step * i as f32)
}

/// Eight shots in every direction.
pub fn circular_angles() -> impl Iterator<Item = f32> {
    (0..CIRCULAR_SHOTS).map(|i| i as f32 * 2.0 * PI / CIRCULAR_SHOTS as f32)
}

/// Projectile spawn point: one hull length out along the firing direction.
pub fn muzzle(pos: Vec2, angle: f32, size: f32) -> Vec2 {
    pos + heading_vec(angle) * size
}

// ---------------------------------------------------------------------------
// Aim tests
// ---------------------------------------------------------------------------

/// Whether `target` is inside `range` and within the forward firing arc.
pub fn should_fire_at_enemy(pos: Vec2, angle: f32, target: Vec2, range: f32) -> bool {
    let d = pos.distance(target);
    d < range && angle_diff(angle, bearing(pos, target)).abs() < ENEMY_FIRE_ARC
}

/// An allied craft that might already be shooting at the same target.
#[derive(Debug, Clone, Copy)]
pub struct Shooter {
    pub pos: Vec2,
    pub angle: f32,
    pub enemy_firing_range: f32,
}

/// Count shooters near `me` that are in range of and aligned with `target`.
/// The caller excludes itself from `others`.
pub fn committed_shooters(
    me: Vec2,
    target: Vec2,
    others: impl IntoIterator<Item = Shooter>,
) -> usize {
    others
        .into_iter()
        .filter(|s| {
            s.pos.distance(me) < COORDINATION_RADIUS
                && s.pos.distance(target) < s.enemy_firing_range
                && angle_diff(s.angle, bearing(s.pos, target)).abs() < COORDINATION_ARC
        })
        .count()
}

/// Soft cap on convergent fire.
pub fn coordination_allows(
    me: Vec2,
    target: Vec2,
    others: impl IntoIterator<Item = Shooter>,
) -> bool {
    committed_shooters(me, target, others) < MAX_COMMITTED_SHOOTERS
}

/// Inputs to the obstacle fire test.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleShot {
    pub distance: f32,
    /// |bearing - heading|.
    pub angle_off: f32,
    pub size: f32,
    /// Ticks until contact at current closing speed; infinite when not closing.
    pub time_to_collision: f32,
}

impl ObstacleShot {
    pub fn new(distance: f32, angle_off: f32, size: f32, relative_speed: f32) -> Self {
        let time_to_collision = if relative_speed > 0.0 {
            distance / relative_speed
        } else {
            f32::INFINITY
        };
        Self {
            distance,
            angle_off: angle_off.abs(),
            size,
            time_to_collision,
        }
    }
}

/// Imminent threats within this distance are always worth a shot.
pub const IMMINENT_THREAT_DISTANCE: f32 = 80.0;
/// Obstacles smaller than this are only shot when imminent.
pub const MIN_OBSTACLE_SIZE: f32 = 15.0;

/// Four independent rules; any one passing is enough.
pub fn obstacle_fire_test(shot: &ObstacleShot, firing_range: f32) -> bool {
    let narrow = shot.angle_off < PI / 3.0;
    let wide = shot.angle_off < PI / 2.0;
    let in_range = shot.distance < firing_range;

    let imminent =
        shot.distance < IMMINENT_THREAT_DISTANCE && narrow && shot.time_to_collision < 90.0;
    let closing =
        in_range && narrow && shot.size >= MIN_OBSTACLE_SIZE && shot.time_to_collision < 180.0;
    let large = in_range && narrow && shot.size >= 30.0;
    let sizable = in_range && wide && shot.size >= MIN_OBSTACLE_SIZE;

    imminent || closing || large || sizable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned_at(pos: Vec2, target: Vec2) -> Shooter {
        Shooter {
            pos,
            angle: bearing(pos, target),
            enemy_firing_range: 250.0,
        }
    }

    #[test]
    fn three_committed_suppresses() {
        let me = Vec2::new(100.0, 100.0);
        let target = Vec2::new(250.0, 100.0);
        let others = [
            aligned_at(Vec2::new(100.0, 130.0), target),
            aligned_at(Vec2::new(100.0, 70.0), target),
            aligned_at(Vec2::new(70.0, 100.0), target),
        ];
        assert_eq!(committed_shooters(me, target, others), 3);
        assert!(!coordination_allows(me, target, others));
        assert!(coordination_allows(me, target, others[..2].iter().copied()));
    }

    #[test]
    fn misaligned_or_distant_shooters_do_not_count() {
        let me = Vec2::new(100.0, 100.0);
        let target = Vec2::new(250.0, 100.0);
        let mut turned = aligned_at(Vec2::new(100.0, 130.0), target);
        turned.angle += PI;
        let far = aligned_at(Vec2::new(100.0, 400.0), target);
        let out_of_range = Shooter {
            enemy_firing_range: 50.0,
            ..aligned_at(Vec2::new(90.0, 100.0), target)
        };
        assert_eq!(committed_shooters(me, target, [turned, far, out_of_range]), 0);
    }

    #[test]
    fn burst_fires_every_second_tick() {
        let mut burst = Burst::new(3, 0.0);
        let mut shots = Vec::new();
        while !burst.finished() {
            if let Some(a) = burst.step() {
                shots.push(a);
            }
        }
        assert_eq!(shots.len(), 2);
        // index 1 of 3: (1 - 1.5) * (pi/12)/2
        assert!((shots[0] - (-0.5 * BURST_SPREAD / 2.0)).abs() < 1e-6);
        assert_eq!(burst.timer, 6);
    }

    #[test]
    fn boss_spread_is_symmetric() {
        let angles: Vec<f32> = boss_spread_angles(1.0).collect();
        assert_eq!(angles.len(), 5);
        assert!((angles[2] - 1.0).abs() < 1e-6);
        assert!((angles[0] - (1.0 - PI / 12.0)).abs() < 1e-6);
    }

    #[test]
    fn circular_covers_full_turn() {
        let angles: Vec<f32> = circular_angles().collect();
        assert_eq!(angles.len(), 8);
        assert!((angles[4] - PI).abs() < 1e-6);
    }

    #[test]
    fn obstacle_rules() {
        // Small rock, close and closing fast.
        assert!(obstacle_fire_test(&ObstacleShot::new(50.0, 0.2, 5.0, 2.0), 200.0));
        // Small rock at range never qualifies.
        assert!(!obstacle_fire_test(&ObstacleShot::new(150.0, 0.2, 10.0, 2.0), 200.0));
        // Large rock inside the wide arc.
        assert!(obstacle_fire_test(&ObstacleShot::new(150.0, 1.4, 20.0, 0.0), 200.0));
        // Out of range.
        assert!(!obstacle_fire_test(&ObstacleShot::new(250.0, 0.0, 60.0, 5.0), 200.0));
    }

    #[test]
    fn zero_closing_speed_never_collides() {
        let shot = ObstacleShot::new(50.0, 0.0, 5.0, 0.0);
        assert!(shot.time_to_collision.is_infinite());
        assert!(!obstacle_fire_test(&shot, 200.0));
    }

    #[test]
    fn fire_arc_is_half_turn() {
        let pos = Vec2::ZERO;
        assert!(should_fire_at_enemy(pos, 0.0, Vec2::new(100.0, 90.0), 250.0));
        assert!(!should_fire_at_enemy(pos, 0.0, Vec2::new(-100.0, 10.0), 250.0));
        assert!(!should_fire_at_enemy(pos, 0.0, Vec2::new(300.0, 0.0), 250.0));
    }
}
