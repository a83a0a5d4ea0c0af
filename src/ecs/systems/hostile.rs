//! Hostile pass: each hostile picks a target, steers and fires. Bosses additionally run
//! their phase ladder, pattern rotation, erratic movement and teleport.

use std::f32::consts::{PI, TAU};

use glam::Vec2;

use super::{movement, spatial};
use crate::arena::Arena;
use crate::combat::{self, Burst, FirePattern, RAPID_COOLDOWN, RAPID_SHOTS};
use crate::ecs::components::{
    BossState, CraftKind, Heading, Health, Position, Pursuit, PursuitState, Shield, TargetRef,
    Velocity, Weapon,
};
use crate::events::{Events, Faction, SimEvent};
use crate::geometry::{angle_diff, bearing, normalize_angle, Bounds};
use crate::obstacle::Obstacles;
use crate::phase::Phase;
use crate::projectile::{Owner, Projectiles, HOSTILE_SPEED};
use crate::spatial::{CraftSnapshot, Snapshots};
use crate::threat;

/// Targets are only considered inside this radius.
pub const DETECTION_RADIUS: f32 = 400.0;
/// Inside this a hostile switches to attack and may fire.
pub const ATTACK_RANGE: f32 = 300.0;
const EVASION_RADIUS: f32 = 80.0;
const EVASION_CONE: f32 = PI / 3.0;
const COVER_RANGE: f32 = 150.0;
/// Hostiles closer than this to another hostile steer away.
const SPACING: f32 = 50.0;
const ISOLATION_RADIUS: f32 = 150.0;
const FLANK_CHANCE: f32 = 0.1;

const SHIELD_TICKS: u32 = 60;
const SHIELD_COOLDOWN: u32 = 300;
const BOSS_SHIELD_TICKS: u32 = 90;
const PHASE_SHIELD_TICKS: u32 = 30;

const PATTERN_PERIOD: u32 = 120;
const ERRATIC_PERIOD: u32 = 10;
const TELEPORT_COOLDOWN: u32 = 180;
const TRANSITION_TICKS: u32 = 60;

// ---------------------------------------------------------------------------
// Targeting
// ---------------------------------------------------------------------------

/// A chosen target for this tick.
#[derive(Debug, Clone, Copy)]
pub struct Mark {
    pub target: TargetRef,
    pub pos: Vec2,
    pub vel: Vec2,
    pub distance: f32,
    pub bearing: f32,
}

/// Desirability of an allied craft before distance weighting.
pub fn ally_value(craft: &CraftSnapshot, allies: &[CraftSnapshot]) -> f32 {
    let mut value = (1.0 - craft.health_ratio()) * 100.0;
    if craft.is_alpha {
        value += 150.0;
    }
    let isolated = !allies
        .iter()
        .any(|a| a.entity != craft.entity && a.pos.distance(craft.pos) < ISOLATION_RADIUS);
    if isolated {
        value += 50.0;
    }
    if craft.engaged {
        value += 75.0;
    }
    if craft.shielded {
        value -= 100.0;
    }
    value
}

/// Best target inside the detection radius. The player scores 50, allied craft by
/// [`ally_value`], both divided by `distance + 1`.
pub fn find_target(
    pos: Vec2,
    player: Option<(Vec2, Vec2)>,
    allies: &[CraftSnapshot],
) -> Option<Mark> {
    let mut best: Option<(f32, Mark)> = None;
    let mut consider = |target: TargetRef, tpos: Vec2, tvel: Vec2, value: f32| {
        let distance = pos.distance(tpos);
        if distance >= DETECTION_RADIUS {
            return;
        }
        let score = value / (distance + 1.0);
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((
                score,
                Mark {
                    target,
                    pos: tpos,
                    vel: tvel,
                    distance,
                    bearing: bearing(pos, tpos),
                },
            ));
        }
    };
    if let Some((ppos, pvel)) = player {
        consider(TargetRef::Player, ppos, pvel, 50.0);
    }
    for a in allies {
        consider(TargetRef::Ally(a.entity), a.pos, a.vel, ally_value(a, allies));
    }
    best.map(|(_, m)| m)
}

/// Lead-corrected bearing inside attack range, else the plain bearing.
fn aim(pos: Vec2, mark: &Mark, bounds: &Bounds) -> f32 {
    threat::predict_lead(pos, mark.pos, mark.vel, HOSTILE_SPEED, ATTACK_RANGE, bounds)
        .map_or(mark.bearing, |lead| lead.bearing)
}

// ---------------------------------------------------------------------------
// Sensing
// ---------------------------------------------------------------------------

/// Bearing to the nearest friendly projectile inside the evasion radius that is
/// flying at this craft.
fn incoming_projectile(pos: Vec2, shots: impl Iterator<Item = (Vec2, Vec2)>) -> Option<f32> {
    let mut best: Option<(f32, f32)> = None;
    for (shot, vel) in shots {
        let d = pos.distance(shot);
        if d >= EVASION_RADIUS || d <= 0.0 || vel == Vec2::ZERO {
            continue;
        }
        let heading = vel.y.atan2(vel.x);
        if angle_diff(heading, bearing(shot, pos)).abs() >= EVASION_CONE {
            continue;
        }
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, bearing(pos, shot)));
        }
    }
    best.map(|(_, b)| b)
}

/// Heading that puts an obstacle between this craft and its target, if a useful one
/// sits in front and the craft is not already tucked in behind it.
fn cover_heading(pos: Vec2, size: f32, mark: &Mark, obstacles: &Obstacles) -> Option<f32> {
    let to_target = mark.pos - pos;
    let mut best: Option<(f32, usize)> = None;
    for (i, o) in obstacles.items.iter().enumerate() {
        let to_obstacle = o.pos - pos;
        let d = to_obstacle.length();
        if to_target.dot(to_obstacle) <= 0.0 || d >= mark.distance || d >= COVER_RANGE || d <= 0.0 {
            continue;
        }
        let value = o.size / d;
        if best.map_or(true, |(v, _)| value > v) {
            best = Some((value, i));
        }
    }
    let cover = &obstacles.items[best?.1];
    let shelter = bearing(cover.pos, mark.pos);
    let standoff = cover.size + size + 10.0;
    let spot = cover.pos - Vec2::new(shelter.cos(), shelter.sin()) * standoff;
    (pos.distance(spot) > 5.0).then(|| normalize_angle(shelter + PI))
}

// ---------------------------------------------------------------------------
// Shields and boss upkeep
// ---------------------------------------------------------------------------

fn tick_shield(shield: &mut Shield) {
    if shield.duration > 0 {
        shield.duration -= 1;
        shield.active = true;
    } else {
        shield.active = false;
    }
}

/// Basic and advanced craft raise a shield at random once the cooldown is spent.
fn update_shield(kind: CraftKind, shield: &mut Shield, rng: &mut fastrand::Rng) {
    tick_shield(shield);
    shield.cooldown = shield.cooldown.saturating_sub(1);
    let chance = if kind == CraftKind::Advanced { 0.01 } else { 0.005 };
    if shield.cooldown == 0 && !shield.active && rng.f32() < chance {
        shield.active = true;
        shield.duration = SHIELD_TICKS;
        shield.cooldown = SHIELD_COOLDOWN;
    }
}

fn update_boss_shield(phase: Phase, shield: &mut Shield, rng: &mut fastrand::Rng) {
    tick_shield(shield);
    if shield.cooldown > 0 {
        shield.cooldown -= 1;
    } else if phase != Phase::One && !shield.active && rng.f32() < 0.01 {
        shield.active = true;
        shield.duration = BOSS_SHIELD_TICKS;
        shield.cooldown = SHIELD_COOLDOWN;
    }
}

/// Recompute the boss phase. A change triggers a brief forced shield.
pub fn update_boss_phase(
    boss: &mut BossState,
    health: &Health,
    shield: &mut Shield,
) -> Option<Phase> {
    let next = Phase::boss_from_ratio(health.ratio());
    if next == boss.phase {
        return None;
    }
    boss.phase = next;
    boss.transition_timer = TRANSITION_TICKS;
    shield.active = true;
    shield.duration = PHASE_SHIELD_TICKS;
    Some(next)
}

fn reroll_pattern(boss: &mut BossState, rng: &mut fastrand::Rng) {
    boss.pattern_timer += 1;
    if boss.pattern_timer <= PATTERN_PERIOD {
        return;
    }
    boss.pattern_timer = 0;
    boss.pattern = match boss.phase {
        Phase::One => {
            if rng.f32() < 0.3 {
                FirePattern::Spread
            } else {
                FirePattern::Normal
            }
        }
        Phase::Two => {
            [FirePattern::Spread, FirePattern::Rapid, FirePattern::Normal][rng.usize(0..3)]
        }
        Phase::Three => [
            FirePattern::Spread,
            FirePattern::Rapid,
            FirePattern::Circular,
            FirePattern::Normal,
        ][rng.usize(0..4)],
    };
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

struct Raider {
    entity: hecs::Entity,
    kind: CraftKind,
    pos: Vec2,
    vel: Vec2,
    heading: Heading,
    health: Health,
    shield: Shield,
    weapon: Weapon,
    pursuit: Pursuit,
}

impl Raider {
    fn load(world: &hecs::World, entity: hecs::Entity) -> Option<Self> {
        let mut q = world
            .query_one::<(
                &CraftKind,
                &Position,
                &Velocity,
                &Heading,
                &Health,
                &Shield,
                &Weapon,
                &Pursuit,
            )>(entity)
            .ok()?;
        let (kind, pos, vel, heading, health, shield, weapon, pursuit) = q.get()?;
        Some(Self {
            entity,
            kind: *kind,
            pos: pos.0,
            vel: vel.0,
            heading: *heading,
            health: *health,
            shield: *shield,
            weapon: *weapon,
            pursuit: *pursuit,
        })
    }

    fn store(&self, world: &mut hecs::World) {
        if let Ok((pos, vel, heading, shield, weapon, pursuit)) = world.query_one_mut::<(
            &mut Position,
            &mut Velocity,
            &mut Heading,
            &mut Shield,
            &mut Weapon,
            &mut Pursuit,
        )>(self.entity)
        {
            pos.0 = self.pos;
            vel.0 = self.vel;
            *heading = self.heading;
            *shield = self.shield;
            *weapon = self.weapon;
            *pursuit = self.pursuit;
        }
    }

    fn thrust(&mut self, scale: f32) {
        let stats = self.kind.stats();
        movement::thrust(&mut self.vel, self.heading.angle, stats.thrust_power, scale);
        self.vel = movement::clamp_speed(self.vel, stats.max_speed);
    }

    fn shoot(&self, angle: f32, projectiles: &mut Projectiles) {
        let size = self.kind.stats().size;
        projectiles.fire(Owner::Hostile, Some(self.entity), self.pos, angle, size);
    }

    fn announce(&self, events: &mut Events) {
        events.push(SimEvent::Fired {
            shooter: Some(self.entity),
            faction: Faction::Hostile,
        });
    }
}

pub fn update(arena: &mut Arena) {
    let Arena {
        world,
        bounds,
        hostiles,
        player,
        projectiles,
        obstacles,
        events,
        rng,
        snapshots,
        ..
    } = arena;
    let player_body = player.active.then_some((player.pos, player.vel));

    for index in 0..hostiles.len() {
        let e = hostiles[index];
        let Some(mut raider) = Raider::load(world, e) else {
            continue;
        };
        decide(&mut raider, player_body, snapshots, obstacles, bounds, projectiles, events, rng);
        let max_speed = raider.kind.stats().max_speed;
        movement::integrate(&mut raider.pos, &mut raider.vel, max_speed, bounds);
        raider.store(world);
        if let Some(slot) = snapshots.hostiles.iter().position(|s| s.entity == e) {
            spatial::refresh_hostile(world, snapshots, slot);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn decide(
    raider: &mut Raider,
    player: Option<(Vec2, Vec2)>,
    snapshots: &Snapshots,
    obstacles: &Obstacles,
    bounds: &Bounds,
    projectiles: &mut Projectiles,
    events: &mut Events,
    rng: &mut fastrand::Rng,
) {
    let kind = raider.kind;
    let stats = kind.stats();
    raider.weapon.cooldown = raider.weapon.cooldown.saturating_sub(1);

    if let Some(mut burst) = raider.pursuit.burst {
        if let Some(angle) = burst.step() {
            raider.shoot(angle, projectiles);
            raider.announce(events);
        }
        raider.pursuit.burst = (!burst.finished()).then_some(burst);
    }

    // 1. Shields and health
    if kind == CraftKind::Boss {
        if let Some(mut boss) = raider.pursuit.boss {
            boss.teleport_cooldown = boss.teleport_cooldown.saturating_sub(1);
            boss.transition_timer = boss.transition_timer.saturating_sub(1);
            if let Some(phase) = update_boss_phase(&mut boss, &raider.health, &mut raider.shield) {
                log::info!("Boss {:?} entered phase {}", raider.entity, phase.number());
                events.push(SimEvent::PhaseChanged {
                    entity: raider.entity,
                    phase,
                });
            }
            reroll_pattern(&mut boss, rng);
            update_boss_shield(boss.phase, &mut raider.shield, rng);

            // 2. Boss phase-three antics
            if boss.phase == Phase::Three {
                boss.erratic_timer += 1;
                if boss.erratic_timer > ERRATIC_PERIOD {
                    boss.erratic_timer = 0;
                    if rng.f32() < 0.3 {
                        let jitter = (rng.f32() - 0.5) * PI;
                        raider.heading.target = normalize_angle(raider.heading.target + jitter);
                    }
                    if rng.f32() < 0.2 {
                        raider.thrust(2.0);
                    }
                }
            }
            let teleported = boss.teleport_cooldown == 0
                && boss.phase == Phase::Three
                && raider.health.current <= 1.0
                && rng.f32() < 0.02;
            if teleported {
                raider.pos = Vec2::new(rng.f32() * bounds.width, rng.f32() * bounds.height);
                boss.teleport_cooldown = TELEPORT_COOLDOWN;
                log::debug!("Boss {:?} teleported", raider.entity);
            }
            raider.pursuit.boss = Some(boss);
            if teleported {
                return;
            }
        }
    } else {
        update_shield(kind, &mut raider.shield, rng);
        let ratio = raider.health.ratio();
        if ratio < 0.3 {
            raider.pursuit.state = PursuitState::Retreat;
        } else if ratio < 0.6 && raider.pursuit.state == PursuitState::Pursuit {
            raider.pursuit.state = PursuitState::Evade;
        }
    }

    let mark = find_target(raider.pos, player, &snapshots.allies);
    raider.pursuit.target = mark.map(|m| m.target);

    // 3. Steering: evade, cover, then pursue or retreat
    if let Some(shot) = incoming_projectile(raider.pos, projectiles.friendly()) {
        raider.heading.target = normalize_angle(shot + PI / 2.0 + (rng.f32() - 0.5) * PI / 2.0);
        raider.pursuit.state = PursuitState::Evade;
    } else if let Some(cover) = mark
        .filter(|_| kind != CraftKind::Basic)
        .and_then(|m| cover_heading(raider.pos, stats.size, &m, obstacles))
    {
        raider.heading.target = cover;
        raider.pursuit.state = PursuitState::Cover;
    } else if let Some(m) = mark {
        if raider.pursuit.state == PursuitState::Retreat && kind != CraftKind::Boss {
            raider.heading.target = normalize_angle(m.bearing + PI);
        } else {
            if m.distance < ATTACK_RANGE {
                raider.pursuit.state = PursuitState::Attack;
                raider.heading.target = aim(raider.pos, &m, bounds);
            } else {
                raider.pursuit.state = PursuitState::Pursuit;
                raider.heading.target = m.bearing;
            }
            if kind == CraftKind::Advanced && rng.f32() < FLANK_CHANCE {
                let side = if rng.bool() { 1.0 } else { -1.0 };
                raider.heading.target = normalize_angle(m.bearing + side * PI / 2.0);
            }
        }
    } else if rng.f32() < 0.01 {
        raider.heading.target = normalize_angle(rng.f32() * TAU);
    }

    // 4. Spacing between non-basic hostiles
    if kind != CraftKind::Basic {
        for other in &snapshots.hostiles {
            if other.entity == raider.entity {
                continue;
            }
            let d = raider.pos.distance(other.pos);
            if d < SPACING && d > 0.0 {
                raider.heading.target = normalize_angle(bearing(raider.pos, other.pos) + PI);
            }
        }
    }

    movement::rotate_toward(&mut raider.heading, stats.rotation_step);

    // 5. Thrust by kind and state
    match (kind, raider.pursuit.boss.map(|b| b.phase)) {
        (CraftKind::Boss, Some(Phase::One)) | (CraftKind::Boss, None) => {
            if rng.f32() < 0.3 {
                raider.thrust(1.0);
            }
        }
        (CraftKind::Boss, Some(Phase::Two)) => {
            if rng.f32() < 0.4 {
                raider.thrust(1.2);
            }
        }
        (CraftKind::Boss, Some(Phase::Three)) => {
            if rng.f32() < 0.5 {
                raider.thrust(1.5);
            }
        }
        _ if raider.pursuit.state == PursuitState::Retreat => {
            if rng.f32() < 0.5 {
                raider.thrust(1.5);
            }
        }
        _ => {
            if rng.f32() < 0.3 {
                raider.thrust(1.0);
            }
        }
    }

    // 6. Fire
    if raider.weapon.cooldown == 0 {
        if let Some(m) = mark.filter(|m| m.distance <= ATTACK_RANGE) {
            fire(raider, &m, bounds, projectiles, events, rng);
        }
    }
}

/// Fire one volley in the craft's pattern and set the cooldown it implies.
fn fire(
    raider: &mut Raider,
    mark: &Mark,
    bounds: &Bounds,
    projectiles: &mut Projectiles,
    events: &mut Events,
    rng: &mut fastrand::Rng,
) {
    let interval = raider.kind.stats().fire_interval;
    let base = aim(raider.pos, mark, bounds);

    if let Some(mut boss) = raider.pursuit.boss {
        match boss.pattern {
            FirePattern::Spread => {
                for angle in combat::boss_spread_angles(base) {
                    raider.shoot(angle, projectiles);
                }
                raider.weapon.cooldown = interval * 3 / 2;
                raider.announce(events);
            }
            FirePattern::Rapid => {
                if boss.rapid_count < RAPID_SHOTS {
                    raider.shoot(base, projectiles);
                    boss.rapid_count += 1;
                    raider.weapon.cooldown = RAPID_COOLDOWN;
                    raider.announce(events);
                } else {
                    boss.rapid_count = 0;
                    raider.weapon.cooldown = interval * 2;
                    boss.pattern_timer = 0;
                }
            }
            FirePattern::Circular => {
                for angle in combat::circular_angles() {
                    raider.shoot(angle, projectiles);
                }
                raider.weapon.cooldown = interval * 2;
                raider.announce(events);
            }
            FirePattern::Normal => {
                raider.shoot(base, projectiles);
                raider.weapon.cooldown = interval;
                raider.announce(events);
            }
        }
        raider.pursuit.boss = Some(boss);
        return;
    }

    let roll = rng.f32();
    match raider.kind {
        CraftKind::Advanced if roll < 0.3 => start_burst(raider, 3, base, projectiles),
        CraftKind::Advanced if roll < 0.5 => {
            for angle in combat::spread_angles(base, 3) {
                raider.shoot(angle, projectiles);
            }
        }
        CraftKind::Basic if roll < 0.1 => start_burst(raider, 2, base, projectiles),
        _ => raider.shoot(base, projectiles),
    }
    raider.weapon.cooldown = interval;
    raider.announce(events);
}

fn start_burst(raider: &mut Raider, shots: u32, base: f32, projectiles: &mut Projectiles) {
    raider.shoot(base, projectiles);
    raider.pursuit.burst = Some(Burst::new(shots, base));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ally(pos: Vec2) -> CraftSnapshot {
        let mut world = hecs::World::new();
        CraftSnapshot {
            entity: world.spawn(()),
            kind: CraftKind::Allied,
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            health: 3.0,
            max_health: 3.0,
            phase: Phase::One,
            shielded: false,
            is_alpha: false,
            engaged: false,
            healing_cooldown: 0,
            enemy_firing_range: 250.0,
            radius: 15.0,
            size: 20.0,
        }
    }

    #[test]
    fn ally_value_adds_up() {
        let mut a = ally(Vec2::ZERO);
        a.health = 1.5;
        a.is_alpha = true;
        a.engaged = true;
        // 50 damage + 150 alpha + 50 isolated + 75 engaged
        assert!((ally_value(&a, &[a]) - 325.0).abs() < 1e-3);
        a.shielded = true;
        assert!((ally_value(&a, &[a]) - 225.0).abs() < 1e-3);
    }

    #[test]
    fn isolated_wounded_ally_beats_player() {
        let mut a = ally(Vec2::new(100.0, 0.0));
        a.health = 1.0;
        let player = Some((Vec2::new(100.0, 0.0), Vec2::ZERO));
        let mark = find_target(Vec2::ZERO, player, &[a]).unwrap();
        assert_eq!(mark.target, TargetRef::Ally(a.entity));
    }

    #[test]
    fn nothing_beyond_detection() {
        let a = ally(Vec2::new(DETECTION_RADIUS + 1.0, 0.0));
        assert!(find_target(Vec2::ZERO, None, &[a]).is_none());
    }

    #[test]
    fn only_shots_flying_at_us_trigger_evasion() {
        let toward = (Vec2::new(50.0, 0.0), Vec2::new(-8.0, 0.0));
        let away = (Vec2::new(50.0, 0.0), Vec2::new(8.0, 0.0));
        assert!(incoming_projectile(Vec2::ZERO, [toward].into_iter()).is_some());
        assert!(incoming_projectile(Vec2::ZERO, [away].into_iter()).is_none());
    }

    #[test]
    fn boss_phase_change_forces_shield() {
        let mut boss = BossState::default();
        let mut shield = Shield::default();
        let mut health = Health::full(5.0);
        assert!(update_boss_phase(&mut boss, &health, &mut shield).is_none());
        health.damage(3.0);
        assert_eq!(update_boss_phase(&mut boss, &health, &mut shield), Some(Phase::Two));
        assert!(shield.active);
        assert_eq!(shield.duration, PHASE_SHIELD_TICKS);
    }

    #[test]
    fn rapid_pattern_cycles_then_rests() {
        let mut world = hecs::World::new();
        let mut boss = BossState {
            pattern: FirePattern::Rapid,
            ..BossState::default()
        };
        boss.phase = Phase::Two;
        let mut raider = Raider {
            entity: world.spawn(()),
            kind: CraftKind::Boss,
            pos: Vec2::new(400.0, 300.0),
            vel: Vec2::ZERO,
            heading: Heading::new(0.0),
            health: Health::full(5.0),
            shield: Shield::default(),
            weapon: Weapon::default(),
            pursuit: Pursuit {
                boss: Some(boss),
                ..Pursuit::new(CraftKind::Boss)
            },
        };
        let mark = Mark {
            target: TargetRef::Player,
            pos: Vec2::new(500.0, 300.0),
            vel: Vec2::ZERO,
            distance: 100.0,
            bearing: 0.0,
        };
        let bounds = Bounds::new(800.0, 600.0);
        let mut projectiles = Projectiles::new();
        let mut events = Events::new();
        let mut rng = fastrand::Rng::with_seed(1);
        for _ in 0..3 {
            fire(&mut raider, &mark, &bounds, &mut projectiles, &mut events, &mut rng);
            assert_eq!(raider.weapon.cooldown, RAPID_COOLDOWN);
        }
        fire(&mut raider, &mark, &bounds, &mut projectiles, &mut events, &mut rng);
        assert_eq!(raider.weapon.cooldown, 20);
        assert_eq!(projectiles.len(), 3);
        assert_eq!(events.len(), 3);
    }
}
