//! Allied pass. Squad upkeep runs first, then every allied craft decides and acts in
//! collection order. Each craft's new state is written back before the next one is
//! processed, unless snapshot mode defers the refresh to the end of the pass.

use std::f32::consts::{PI, TAU};

use glam::Vec2;

use super::{movement, spatial};
use crate::advisor::{self, Action, Features, Hazard, Observation, INFERENCE_INTERVAL};
use crate::arbitration::{
    self, Behavior, Situation, SquadUrgency, HARD_AVOID_DISTANCE, SEEK_HEALING_RANGE,
};
use crate::arena::Arena;
use crate::combat::{self, ObstacleShot, Shooter};
use crate::ecs::components::{
    CraftKind, FormationAbilities, Heading, Health, PhaseState, Position, Shield, Tuning, Velocity,
    Weapon, Wing,
};
use crate::events::{Events, Faction, SimEvent};
use crate::flock::{self, FlockSteer, Neighbor, FLOCK_RADIUS};
use crate::geometry::{angle_diff, bearing, normalize_angle, Bounds};
use crate::obstacle::Obstacles;
use crate::perception::{self, Sighting};
use crate::phase::{self, Phase};
use crate::projectile::{Owner, Projectiles, FRIENDLY_SPEED};
use crate::spatial::{CraftSnapshot, Snapshots};
use crate::squad::escort::{self, Body, EscortContext, EscortGoal, EscortMode};
use crate::squad::formation;
use crate::squad::maneuver::{self, FlankPattern, HAMMER_CLOSE_DISTANCE};
use crate::squad::role::Role;
use crate::squad::sequence::{SequenceKind, Volley};
use crate::squad::targeting::{self, TargetCandidate};
use crate::squad::transition::{self, SplitEvent, SquadReading};
use crate::squad::{Squad, SquadToggles};
use crate::threat::{self, IncomingThreat, INCOMING_HORIZON};

/// Hostiles are noticed (and counted as "near") inside this radius.
pub const ENEMY_DETECTION_RADIUS: f32 = 300.0;
/// Nearby-craft scan; separation steering applies below this.
const SEPARATION_DISTANCE: f32 = 120.0;
/// Craft closer than this feed the evade-craft score.
const CRAFT_AVOID_RADIUS: f32 = 80.0;
const OBSTACLE_CONE: f32 = 2.0 * PI / 3.0;
const ENEMY_CONE: f32 = 5.0 * PI / 6.0;
/// Radar ability widens detection on the alpha.
const RADAR_BONUS: f32 = 1.3;
const AIM_TOLERANCE: f32 = 0.4;
const WIDE_AIM_TOLERANCE: f32 = 0.5;
/// Followers farther than this from their slot always thrust.
const SLOT_CATCH_UP: f32 = 100.0;
const ESCORT_CATCH_UP: f32 = 50.0;
const ADVISOR_SHIELD_TICKS: u32 = 60;
const ADVISOR_SHIELD_COOLDOWN: u32 = 300;

// ---------------------------------------------------------------------------
// Pilot: one craft's components, copied out for the duration of its turn
// ---------------------------------------------------------------------------

struct Pilot {
    entity: hecs::Entity,
    pos: Vec2,
    vel: Vec2,
    heading: Heading,
    health: Health,
    phase: PhaseState,
    shield: Shield,
    weapon: Weapon,
    tuning: Tuning,
    wing: Wing,
}

impl Pilot {
    fn load(world: &hecs::World, entity: hecs::Entity) -> Option<Self> {
        let mut q = world
            .query_one::<(
                &Position,
                &Velocity,
                &Heading,
                &Health,
                &PhaseState,
                &Shield,
                &Weapon,
                &Tuning,
                &Wing,
            )>(entity)
            .ok()?;
        let (pos, vel, heading, health, phase, shield, weapon, tuning, wing) = q.get()?;
        Some(Self {
            entity,
            pos: pos.0,
            vel: vel.0,
            heading: *heading,
            health: *health,
            phase: *phase,
            shield: *shield,
            weapon: *weapon,
            tuning: *tuning,
            wing: *wing,
        })
    }

    fn store(&self, world: &mut hecs::World) {
        let query = world.query_one_mut::<(
            &mut Position,
            &mut Velocity,
            &mut Heading,
            &mut Health,
            &mut PhaseState,
            &mut Shield,
            &mut Weapon,
            &mut Tuning,
            &mut Wing,
        )>(self.entity);
        if let Ok((pos, vel, heading, health, phase, shield, weapon, tuning, wing)) = query {
            pos.0 = self.pos;
            vel.0 = self.vel;
            *heading = self.heading;
            *health = self.health;
            *phase = self.phase;
            *shield = self.shield;
            *weapon = self.weapon;
            *tuning = self.tuning;
            *wing = self.wing;
        }
    }

    fn body(&self) -> Body {
        Body {
            pos: self.pos,
            vel: self.vel,
            angle: self.heading.angle,
        }
    }

    fn rotate_once(&mut self) {
        movement::rotate_once(&mut self.heading, ALLIED.rotation_step);
    }

    fn thrust(&mut self, scale: f32) {
        movement::thrust(&mut self.vel, self.heading.angle, ALLIED.thrust_power, scale);
    }

    fn chance_thrust(&mut self, rng: &mut fastrand::Rng, probability: f32, scale: f32) {
        if rng.f32() < probability {
            self.thrust(scale);
        }
    }

    /// Fire along `angle` if the gun is ready.
    fn fire(&mut self, angle: f32, projectiles: &mut Projectiles, events: &mut Events) -> bool {
        fire_from(self.entity, self.pos, angle, &mut self.weapon, projectiles, events)
    }
}

const ALLIED: crate::ecs::components::HullStats = CraftKind::Allied.stats();

fn fire_from(
    shooter: hecs::Entity,
    pos: Vec2,
    angle: f32,
    weapon: &mut Weapon,
    projectiles: &mut Projectiles,
    events: &mut Events,
) -> bool {
    if weapon.cooldown > 0 {
        return false;
    }
    projectiles.fire(Owner::Allied, Some(shooter), pos, angle, ALLIED.size);
    weapon.cooldown = ALLIED.fire_interval;
    events.push(SimEvent::Fired {
        shooter: Some(shooter),
        faction: Faction::Allied,
    });
    true
}

// ---------------------------------------------------------------------------
// Shared per-tick inputs
// ---------------------------------------------------------------------------

struct Field<'a> {
    bounds: Bounds,
    toggles: SquadToggles,
    alpha: Option<hecs::Entity>,
    followers: &'a [hecs::Entity],
    player: Option<Body>,
    hostile_bodies: &'a [(hecs::Entity, Body)],
    candidates: &'a [TargetCandidate],
    /// Hostile projectiles as `(position, velocity)`.
    shots: &'a [(Vec2, Vec2)],
    obstacles: &'a Obstacles,
    tick: u64,
}

impl Field<'_> {
    fn squad_active(&self) -> bool {
        self.toggles.enabled && self.alpha.is_some()
    }
}

/// Lead-corrected bearing to `target`, else the straight bearing.
fn aim(pos: Vec2, target: &CraftSnapshot, range: f32, bounds: &Bounds) -> f32 {
    threat::predict_lead(pos, target.pos, target.vel, FRIENDLY_SPEED, range, bounds)
        .map_or_else(|| bearing(pos, target.pos), |lead| lead.bearing)
}

/// Fire-coordination guard over every other allied craft.
fn coordination_clear(snapshots: &Snapshots, me: hecs::Entity, pos: Vec2, target: Vec2) -> bool {
    combat::coordination_allows(
        pos,
        target,
        snapshots.allies.iter().filter(|s| s.entity != me).map(|s| Shooter {
            pos: s.pos,
            angle: s.angle,
            enemy_firing_range: s.enemy_firing_range,
        }),
    )
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

/// Direction-free readings used by the squad stage and the advisor features.
struct Surroundings {
    nearest_enemy: Option<Sighting<usize>>,
    nearest_obstacle: Option<f32>,
}

fn survey(pos: Vec2, snapshots: &Snapshots, obstacles: &Obstacles) -> Surroundings {
    let hostile_pos = snapshots.hostiles.iter().map(|s| s.pos);
    Surroundings {
        nearest_enemy: perception::nearest_within(pos, hostile_pos.enumerate(), f32::INFINITY),
        nearest_obstacle: perception::nearest_within(
            pos,
            obstacles.positions().map(|p| ((), p)),
            f32::INFINITY,
        )
        .map(|s| s.distance),
    }
}

struct View {
    obstacle: Option<Sighting<usize>>,
    craft: Option<Sighting<()>>,
    enemy: Option<Sighting<usize>>,
    enemies_near: bool,
    healer: Option<Sighting<usize>>,
    incoming: Option<IncomingThreat>,
    allies_near: usize,
    flock: FlockSteer,
    protect: Option<f32>,
    obstacle_target: Option<Sighting<usize>>,
}

fn perceive(pilot: &Pilot, detection: f32, snapshots: &Snapshots, field: &Field<'_>) -> View {
    let me = pilot.entity;
    let pos = pilot.pos;
    let angle = pilot.heading.angle;
    let others = || snapshots.allies.iter().filter(move |s| s.entity != me);

    let obstacle = perception::nearest_in_cone(
        pos,
        angle,
        field.obstacles.items.iter().enumerate().map(|(i, o)| (i, o.pos)),
        detection,
        OBSTACLE_CONE,
    );
    let craft = perception::nearest_within(
        pos,
        others().map(|s| ((), s.pos)).chain(field.player.map(|p| ((), p.pos))),
        SEPARATION_DISTANCE,
    );
    let enemy = perception::nearest_in_cone(
        pos,
        angle,
        snapshots.hostiles.iter().map(|s| s.pos).enumerate(),
        ENEMY_DETECTION_RADIUS,
        ENEMY_CONE,
    );
    let enemy_pos = snapshots.hostiles.iter().map(|s| s.pos);
    let enemies_near = perception::any_within(pos, enemy_pos, ENEMY_DETECTION_RADIUS);

    let healer = if pilot.phase.phase == Phase::Three && pilot.wing.healing_cooldown == 0 {
        perception::nearest_within(
            pos,
            snapshots
                .allies
                .iter()
                .enumerate()
                .filter(|(_, s)| s.entity != me && s.phase == Phase::One)
                .map(|(i, s)| (i, s.pos)),
            SEEK_HEALING_RANGE,
        )
    } else {
        None
    };

    let incoming = threat::predict_incoming(
        pos,
        pilot.vel,
        ALLIED.radius * 2.0,
        field.shots.iter().copied(),
        INCOMING_HORIZON,
    );

    let neighbors: Vec<Neighbor> = others()
        .map(|s| Neighbor {
            pos: s.pos,
            angle: s.angle,
            health: s.health,
            max_health: s.max_health,
        })
        .collect();
    let allies_near = perception::count_within(pos, neighbors.iter().map(|n| n.pos), FLOCK_RADIUS);
    let flock = flock::flock(
        pos,
        angle,
        &neighbors,
        enemies_near,
        pilot.tuning.flock_weight,
        pilot.tuning.defensive_flock_weight,
    );
    let ally_pos: Vec<Vec2> = neighbors.iter().map(|n| n.pos).collect();
    let hostile_pos: Vec<Vec2> = snapshots.hostiles.iter().map(|s| s.pos).collect();
    let protect = flock::protection_bearing(pos, &ally_pos, &hostile_pos, enemies_near);

    let mut obstacle_target: Option<Sighting<usize>> = None;
    for (i, o) in field.obstacles.items.iter().enumerate() {
        let distance = pos.distance(o.pos);
        let to = bearing(pos, o.pos);
        let closing_speed = (o.vel - pilot.vel).length();
        let shot = ObstacleShot::new(distance, angle_diff(angle, to), o.size, closing_speed);
        if combat::obstacle_fire_test(&shot, pilot.tuning.firing_range)
            && obstacle_target.as_ref().map_or(true, |b| distance < b.distance)
        {
            obstacle_target = Some(Sighting {
                item: i,
                distance,
                bearing: to,
            });
        }
    }

    View {
        obstacle,
        craft,
        enemy,
        enemies_near,
        healer,
        incoming,
        allies_near,
        flock,
        protect,
        obstacle_target,
    }
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// Clear role bookkeeping so auto-assignment runs again.
pub fn reset_roles(world: &mut hecs::World, allies: &[hecs::Entity]) {
    for &e in allies {
        if let Ok(wing) = world.query_one_mut::<&mut Wing>(e) {
            wing.role = None;
            wing.role_assigned = false;
        }
    }
}

/// Squad-wide fields go stale once coordination is switched off.
fn disband(world: &mut hecs::World, allies: &[hecs::Entity]) {
    for &e in allies {
        if let Ok(wing) = world.query_one_mut::<&mut Wing>(e) {
            wing.role = None;
            wing.role_assigned = false;
            wing.attack_target = None;
            wing.assigned_target = None;
            wing.side_flank = None;
            wing.pattern_slot = None;
            wing.slot = None;
            wing.abilities = FormationAbilities::default();
        }
    }
}

pub fn update(arena: &mut Arena) {
    let Arena {
        world,
        bounds,
        allies,
        hostiles,
        player,
        projectiles,
        obstacles,
        squad,
        toggles,
        snapshot_mode,
        tick,
        events,
        rng,
        snapshots,
        advisor,
        ..
    } = arena;

    let alpha = if toggles.enabled {
        squad.ensure_alpha(world, allies, bounds, events)
    } else {
        if squad.alpha.is_some() {
            squad.relinquish(world, events);
            disband(world, allies);
        }
        None
    };
    spatial::rebuild_snapshots(world, allies, hostiles, alpha, snapshots);

    let followers = squad.followers(allies);
    let player_body = player.active.then(|| Body {
        pos: player.pos,
        vel: player.vel,
        angle: player.angle,
    });
    let hostile_bodies: Vec<(hecs::Entity, Body)> = snapshots
        .hostiles
        .iter()
        .map(|s| {
            (
                s.entity,
                Body {
                    pos: s.pos,
                    vel: s.vel,
                    angle: s.angle,
                },
            )
        })
        .collect();
    let candidates: Vec<TargetCandidate> = snapshots
        .hostiles
        .iter()
        .map(|s| TargetCandidate {
            entity: s.entity,
            pos: s.pos,
            is_boss: s.kind == CraftKind::Boss,
            damage_fraction: if s.max_health > 0.0 {
                (s.max_health - s.health) / s.max_health
            } else {
                0.0
            },
        })
        .collect();
    let shots: Vec<(Vec2, Vec2)> = projectiles.hostile().collect();

    let field = Field {
        bounds: *bounds,
        toggles: *toggles,
        alpha,
        followers: &followers,
        player: player_body,
        hostile_bodies: &hostile_bodies,
        candidates: &candidates,
        shots: &shots,
        obstacles,
        tick: *tick,
    };

    for index in 0..allies.len() {
        let e = allies[index];
        let Some(mut pilot) = Pilot::load(world, e) else {
            continue;
        };
        let is_alpha = alpha == Some(e);

        pilot.weapon.cooldown = pilot.weapon.cooldown.saturating_sub(1);
        pilot.wing.healing_cooldown = pilot.wing.healing_cooldown.saturating_sub(1);
        pilot.wing.healing_effect = pilot.wing.healing_effect.saturating_sub(1);

        let near = survey(pilot.pos, snapshots, field.obstacles);
        if field.squad_active() {
            squad_stage(
                &mut pilot,
                is_alpha,
                world,
                squad,
                &field,
                snapshots,
                &near,
                projectiles,
                events,
            );
        }

        let detection = effective_detection(&pilot, is_alpha);
        let view = perceive(&pilot, detection, snapshots, &field);

        let features = Features::from_observation(&Observation {
            health_ratio: pilot.health.ratio(),
            phase: pilot.phase.phase,
            shielded: pilot.shield.active,
            speed: pilot.vel.length(),
            obstacle_count: field.obstacles.len(),
            nearest_obstacle: near.nearest_obstacle,
            enemy_count: snapshots.hostiles.len(),
            nearest_enemy: near.nearest_enemy.map(|s| s.distance),
            allies_near: view.allies_near,
            enemies_near: view.enemies_near,
        });
        consult_parameters(&mut pilot, advisor.as_mut(), &features, view.enemies_near);

        let overridden = match advisor.action(e, &features) {
            Some(action) => run_action(&mut pilot, action, snapshots, &field, projectiles, events),
            None => false,
        };

        if !overridden {
            let orders = Orders::new(&pilot, is_alpha, squad, snapshots, &field, &near);
            let situation = situation(&pilot, detection, &view, &orders, snapshots, &field);
            let scores = arbitration::score(&situation, &pilot.tuning.weights);
            let behavior = arbitration::select(&scores);
            steer(
                &mut pilot,
                behavior,
                &view,
                &orders,
                snapshots,
                &field,
                projectiles,
                events,
                rng,
            );
            pilot.wing.behavior = behavior;

            movement::rotate_toward(&mut pilot.heading, ALLIED.rotation_step);
            let frequency = pilot.tuning.thrust_frequency;
            pilot.chance_thrust(rng, frequency, 1.0);
        }

        let changed = phase::update_phase(&pilot.health, &mut pilot.phase, &mut pilot.shield);
        if let Some(next) = changed {
            events.push(SimEvent::PhaseChanged {
                entity: e,
                phase: next,
            });
        }
        phase::update_shield(pilot.phase.phase, &mut pilot.shield, rng);

        movement::integrate(&mut pilot.pos, &mut pilot.vel, ALLIED.max_speed, bounds);
        if is_alpha && toggles.anchor_alpha {
            pilot.pos = bounds.center();
            pilot.vel = Vec2::ZERO;
        }

        pilot.store(world);
        if !*snapshot_mode {
            if let Some(slot) = snapshots.allies.iter().position(|s| s.entity == e) {
                spatial::refresh_ally(world, snapshots, slot, alpha);
            }
        }
    }

    if *snapshot_mode {
        spatial::rebuild_snapshots(world, allies, hostiles, alpha, snapshots);
    }
}

/// Tuned detection radius with role and radar modifiers.
fn effective_detection(pilot: &Pilot, is_alpha: bool) -> f32 {
    let mut radius = pilot.tuning.detection_radius;
    if let Some(role) = pilot.wing.role {
        radius *= role.modifiers().detection;
    }
    if is_alpha && pilot.wing.abilities.radar {
        radius *= RADAR_BONUS;
    }
    radius
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

fn consult_parameters(
    pilot: &mut Pilot,
    advisor: &mut dyn advisor::Advisor,
    features: &Features,
    enemies_near: bool,
) {
    pilot.tuning.inference_frame += 1;
    if pilot.tuning.inference_frame < INFERENCE_INTERVAL {
        return;
    }
    pilot.tuning.inference_frame = 0;
    let suggestion = advisor.parameters(pilot.entity, features);
    let weights = advisor.priority_weights(pilot.entity, features);
    if suggestion.is_some() || weights.is_some() {
        log::debug!("Advisor retuned {:?}", pilot.entity);
    }
    advisor::apply_parameters(&mut pilot.tuning, suggestion, enemies_near);
    pilot.tuning.weights = advisor::clamp_weights(weights);
}

/// Execute an advisor action when it passes the safety check. Returns whether it ran.
fn run_action(
    pilot: &mut Pilot,
    action: Action,
    snapshots: &Snapshots,
    field: &Field<'_>,
    projectiles: &mut Projectiles,
    events: &mut Events,
) -> bool {
    let direction = f32::from(action.rotate.signum());
    let turned = movement::rotate_by(pilot.heading.angle, direction, ALLIED.rotation_step);
    let me = pilot.entity;
    let hazards = snapshots
        .allies
        .iter()
        .filter(|s| s.entity != me)
        .map(|s| Hazard {
            pos: s.pos,
            is_obstacle: false,
        })
        .chain(field.player.map(|p| Hazard {
            pos: p.pos,
            is_obstacle: false,
        }))
        .chain(field.obstacles.positions().map(|pos| Hazard { pos, is_obstacle: true }));
    if !advisor::action_is_safe(&action, pilot.pos, turned, hazards) {
        log::warn!("Advisor action for {me:?} rejected as unsafe");
        return false;
    }

    pilot.heading.angle = turned;
    pilot.heading.target = turned;
    if action.thrust {
        pilot.thrust(1.0);
    }
    if action.fire {
        pilot.fire(turned, projectiles, events);
    }
    if action.shield && pilot.shield.cooldown == 0 && pilot.health.current < pilot.health.max {
        pilot.shield.active = true;
        pilot.shield.duration = ADVISOR_SHIELD_TICKS;
        pilot.shield.cooldown = ADVISOR_SHIELD_COOLDOWN;
    }
    true
}

// ---------------------------------------------------------------------------
// Squad stage
// ---------------------------------------------------------------------------

fn live(snapshots: &Snapshots, target: Option<hecs::Entity>) -> Option<hecs::Entity> {
    target.filter(|&t| snapshots.hostile(t).is_some())
}

#[allow(clippy::too_many_arguments)]
fn squad_stage(
    pilot: &mut Pilot,
    is_alpha: bool,
    world: &mut hecs::World,
    squad: &mut Squad,
    field: &Field<'_>,
    snapshots: &Snapshots,
    near: &Surroundings,
    projectiles: &mut Projectiles,
    events: &mut Events,
) {
    let Some(alpha) = field.alpha.and_then(|a| snapshots.ally(a).copied()) else {
        return;
    };
    let index = field.followers.iter().position(|&f| f == pilot.entity).unwrap_or(0);
    let count = field.followers.len();

    if field.toggles.auto_roles && !pilot.wing.role_assigned {
        pilot.wing.role = Some(Role::for_index(index, is_alpha));
        pilot.wing.role_assigned = true;
    }

    pilot.wing.attack_target = live(snapshots, pilot.wing.attack_target);
    pilot.wing.assigned_target = live(snapshots, pilot.wing.assigned_target);

    if is_alpha {
        pilot.wing.slot = None;
        pilot.wing.side_flank = None;
        pilot.wing.pattern_slot = None;
        lead_squad(pilot, world, squad, field, snapshots, near, projectiles, events);
    } else {
        pilot.wing.slot = formation::slot(squad.formation, alpha.pos, alpha.angle, index, count);
        let inherited = world.get::<&Wing>(alpha.entity).ok().and_then(|w| w.attack_target);
        pilot.wing.attack_target = live(snapshots, inherited);
        pilot.wing.side_flank = pilot
            .wing
            .attack_target
            .and_then(|t| snapshots.hostile(t))
            .and_then(|t| maneuver::side_flank(alpha.pos, t.pos, index));
    }

    let alpha_role = if is_alpha {
        pilot.wing.role
    } else {
        world.get::<&Wing>(alpha.entity).ok().and_then(|w| w.role)
    };
    pilot.wing.abilities = FormationAbilities {
        shield: count >= 2,
        boost: !is_alpha && pilot.wing.slot.is_some(),
        heal: pilot.wing.role == Some(Role::Support) || alpha_role == Some(Role::Support),
        radar: is_alpha,
    };
}

fn follower_mut<T: hecs::Component>(
    world: &mut hecs::World,
    e: hecs::Entity,
) -> Option<hecs::RefMut<'_, T>> {
    world.get::<&mut T>(e).ok()
}

/// Alpha-only work: target pick, distribution, sequences, transitions and flanking.
#[allow(clippy::too_many_arguments)]
fn lead_squad(
    pilot: &mut Pilot,
    world: &mut hecs::World,
    squad: &mut Squad,
    field: &Field<'_>,
    snapshots: &Snapshots,
    near: &Surroundings,
    projectiles: &mut Projectiles,
    events: &mut Events,
) {
    let followers = field.followers;
    let n = followers.len();
    let pos = pilot.pos;
    let toggles = field.toggles;

    pilot.wing.attack_target =
        targeting::squad_target(pos, field.candidates, ENEMY_DETECTION_RADIUS);
    let in_range: Vec<&TargetCandidate> = field
        .candidates
        .iter()
        .filter(|c| pos.distance(c.pos) < ENEMY_DETECTION_RADIUS)
        .collect();
    let enemy_count = in_range.len();

    if toggles.adaptive_formation {
        let follower_health = if n == 0 {
            1.0
        } else {
            followers
                .iter()
                .filter_map(|&f| snapshots.ally(f))
                .map(CraftSnapshot::health_ratio)
                .sum::<f32>()
                / n as f32
        };
        let reading = SquadReading {
            enemies_near: enemy_count > 0,
            enemy_count,
            follower_health,
            alpha_phase: pilot.phase.phase,
        };
        if let Some(next) = squad.adaptive.step(squad.formation, &reading) {
            switch_formation(squad, next, events);
        }
    }

    let plan = targeting::distribute(
        toggles.target_mode,
        pos,
        field.candidates,
        ENEMY_DETECTION_RADIUS,
        n,
    );
    if plan.alpha.is_some() {
        pilot.wing.assigned_target = plan.alpha;
    }
    for (&f, assignment) in followers.iter().zip(&plan.followers) {
        let Some(a) = assignment else {
            continue;
        };
        if let Some(mut wing) = follower_mut::<Wing>(world, f) {
            if a.assigned.is_some() {
                wing.assigned_target = a.assigned;
            }
            if a.attack.is_some() {
                wing.attack_target = a.attack;
            }
        }
    }

    let target = pilot.wing.attack_target.and_then(|t| snapshots.hostile(t)).copied();

    match target {
        Some(t) if toggles.attack_sequences => {
            let kind = SequenceKind::choose(enemy_count, n);
            match squad.sequence.step(kind, n) {
                Volley::Hold => {}
                Volley::Alpha => {
                    let range = pilot.tuning.enemy_firing_range;
                    if combat::should_fire_at_enemy(pos, pilot.heading.angle, t.pos, range) {
                        let angle = aim(pos, &t, range, &field.bounds);
                        pilot.fire(angle, projectiles, events);
                    }
                }
                Volley::Followers(range) => {
                    for &f in followers.get(range).unwrap_or(&[]) {
                        follower_volley(world, f, &t, snapshots, field, projectiles, events);
                    }
                }
            }
        }
        _ => squad.sequence.reset(),
    }

    if toggles.formation_transitions {
        let threat =
            advisor::threat_level(near.nearest_obstacle, near.nearest_enemy.map(|s| s.distance));
        let goal = transition::morph_goal(threat, enemy_count);
        if let Some(next) = squad.morph.step(squad.formation, goal) {
            switch_formation(squad, next, events);
        }
        match squad.split.step(enemy_count, n) {
            Some(SplitEvent::Split { at }) => {
                let second = in_range.get(1).map(|c| c.entity);
                for &f in followers.get(at..).unwrap_or(&[]) {
                    if let Some(mut wing) = follower_mut::<Wing>(world, f) {
                        wing.assigned_target = second;
                    }
                }
                events.push(SimEvent::SquadSplit { at });
                log::info!("Squad split at follower {at}");
            }
            Some(SplitEvent::Merge) => {
                for &f in followers {
                    if let Some(mut wing) = follower_mut::<Wing>(world, f) {
                        wing.assigned_target = None;
                    }
                }
                events.push(SimEvent::SquadMerged);
                log::info!("Squad merged");
            }
            None => {}
        }
    }

    let flank_target = target
        .or_else(|| near.nearest_enemy.and_then(|s| snapshots.hostiles.get(s.item).copied()));
    let pattern = match flank_target {
        Some(t) if toggles.advanced_flanking && n >= 2 => {
            FlankPattern::choose(pos.distance(t.pos), n)
        }
        _ => FlankPattern::None,
    };
    squad.flank.step(pattern);
    let slots = flank_target
        .map(|t| maneuver::pattern_slots(pattern, pos, t.pos, n))
        .unwrap_or_default();
    for (i, &f) in followers.iter().enumerate() {
        if let Some(mut wing) = follower_mut::<Wing>(world, f) {
            wing.pattern_slot = slots.get(i).copied();
        }
    }
}

fn switch_formation(squad: &mut Squad, next: formation::FormationKind, events: &mut Events) {
    squad.formation = next;
    events.push(SimEvent::FormationChanged(next));
    log::info!("Formation switched to {}", next.label());
}

/// A follower fires on the alpha's cue when its own aim and the coordination guard agree.
fn follower_volley(
    world: &mut hecs::World,
    follower: hecs::Entity,
    target: &CraftSnapshot,
    snapshots: &Snapshots,
    field: &Field<'_>,
    projectiles: &mut Projectiles,
    events: &mut Events,
) {
    let Some(me) = snapshots.ally(follower).copied() else {
        return;
    };
    if !combat::should_fire_at_enemy(me.pos, me.angle, target.pos, me.enemy_firing_range)
        || !coordination_clear(snapshots, follower, me.pos, target.pos)
    {
        return;
    }
    let angle = aim(me.pos, target, me.enemy_firing_range, &field.bounds);
    if let Some(mut weapon) = follower_mut::<Weapon>(world, follower) {
        fire_from(follower, me.pos, angle, &mut weapon, projectiles, events);
    }
}

// ---------------------------------------------------------------------------
// Arbitration
// ---------------------------------------------------------------------------

/// What the squad expects of this craft this tick.
struct Orders {
    is_alpha: bool,
    /// Assigned target if any, else the squad target.
    target: Option<CraftSnapshot>,
    /// Target of the alpha's flank pattern (squad target or nearest enemy).
    pattern_target: Option<CraftSnapshot>,
    pattern: FlankPattern,
    escort: Option<EscortGoal>,
    alpha_angle: Option<f32>,
}

impl Orders {
    fn new(
        pilot: &Pilot,
        is_alpha: bool,
        squad: &Squad,
        snapshots: &Snapshots,
        field: &Field<'_>,
        near: &Surroundings,
    ) -> Self {
        let squad_on = field.squad_active();
        let resolve = |t: Option<hecs::Entity>| t.and_then(|t| snapshots.hostile(t)).copied();
        let target = if squad_on {
            resolve(pilot.wing.assigned_target).or_else(|| resolve(pilot.wing.attack_target))
        } else {
            None
        };
        let pattern = if squad_on && is_alpha && field.toggles.advanced_flanking {
            squad.flank.pattern
        } else {
            FlankPattern::None
        };
        let pattern_target = resolve(pilot.wing.attack_target)
            .or_else(|| near.nearest_enemy.and_then(|s| snapshots.hostiles.get(s.item).copied()));

        let alpha_snapshot = field.alpha.and_then(|a| snapshots.ally(a));
        let escort = if field.toggles.escort == EscortMode::None {
            None
        } else {
            let index = field.followers.iter().position(|&f| f == pilot.entity).unwrap_or(0);
            escort::goal(
                field.toggles.escort,
                &EscortContext {
                    me: pilot.body(),
                    is_alpha,
                    player: field.player,
                    alpha_pos: alpha_snapshot.map(|a| a.pos),
                    attack_target: resolve(pilot.wing.attack_target).map(|t| t.pos),
                    patrol_index: index,
                    patrol_count: field.followers.len(),
                    hostiles: field.hostile_bodies,
                    tick: field.tick,
                },
            )
        };

        Self {
            is_alpha,
            target,
            pattern_target,
            pattern,
            escort,
            alpha_angle: if is_alpha { None } else { alpha_snapshot.map(|a| a.angle) },
        }
    }

    /// Follower steering point: pattern slot, side flank, then formation slot.
    fn follower_slot(pilot: &Pilot) -> Option<Vec2> {
        pilot
            .wing
            .pattern_slot
            .or(pilot.wing.side_flank)
            .or(pilot.wing.slot.map(|s| s.pos))
    }
}

fn squad_urgency(pilot: &Pilot, orders: &Orders, field: &Field<'_>) -> Option<SquadUrgency> {
    let normalized = |p: Vec2| pilot.pos.distance(p) / ENEMY_DETECTION_RADIUS;
    if orders.pattern != FlankPattern::None {
        if let Some(t) = orders.pattern_target {
            return Some(SquadUrgency::Pattern {
                distance_norm: normalized(t.pos),
            });
        }
    }
    if let Some(t) = orders.target {
        if orders.is_alpha {
            return Some(SquadUrgency::Lead {
                distance_norm: normalized(t.pos),
            });
        }
        if field.squad_active() {
            if let Some(slot) = pilot.wing.pattern_slot.or(pilot.wing.side_flank) {
                return Some(SquadUrgency::Flank {
                    distance: pilot.pos.distance(slot),
                });
            }
            if let Some(slot) = pilot.wing.slot {
                return Some(SquadUrgency::Slot {
                    distance: pilot.pos.distance(slot.pos),
                });
            }
        }
    }
    orders.escort.map(|g| SquadUrgency::Slot {
        distance: pilot.pos.distance(g.pos),
    })
}

fn situation(
    pilot: &Pilot,
    detection: f32,
    view: &View,
    orders: &Orders,
    snapshots: &Snapshots,
    field: &Field<'_>,
) -> Situation {
    let mut s =
        Situation::new(detection, pilot.tuning.firing_range, pilot.tuning.enemy_firing_range);
    s.craft_distance = view.craft.map(|c| c.distance).filter(|d| *d < CRAFT_AVOID_RADIUS);
    s.projectile_threat = view.incoming.map(|t| t.threat_level);
    s.healer_distance = view.healer.map(|h| h.distance);
    s.squad = squad_urgency(pilot, orders, field);
    s.enemy_in_arc = view
        .enemy
        .filter(|e| {
            snapshots.hostiles.get(e.item).is_some_and(|t| {
                combat::should_fire_at_enemy(
                    pilot.pos,
                    pilot.heading.angle,
                    t.pos,
                    pilot.tuning.enemy_firing_range,
                )
            })
        })
        .map(|e| e.distance);
    s.protect = view.protect.map(|_| view.enemies_near);
    s.obstacle_target = view.obstacle_target.map(|o| o.distance);
    s.nearest_obstacle = view.obstacle.map(|o| o.distance);
    s
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the chosen behavior. A behavior whose preconditions no longer hold falls
/// through to the safety rules and random navigation.
#[allow(clippy::too_many_arguments)]
fn steer(
    pilot: &mut Pilot,
    behavior: Behavior,
    view: &View,
    orders: &Orders,
    snapshots: &Snapshots,
    field: &Field<'_>,
    projectiles: &mut Projectiles,
    events: &mut Events,
    rng: &mut fastrand::Rng,
) {
    let w = pilot.tuning.weights;
    let pos = pilot.pos;
    let range = pilot.tuning.enemy_firing_range;

    if behavior == Behavior::EvadeProjectile {
        if let Some(threat) = view.incoming {
            if let Some(&(shot_pos, shot_vel)) = field.shots.get(threat.index) {
                let mut evasion = shot_vel.y.atan2(shot_vel.x) + PI / 2.0;
                if angle_diff(bearing(shot_pos, pos), evasion).abs() > PI / 2.0 {
                    evasion += PI;
                }
                pilot.heading.target = normalize_angle(evasion);
                pilot.chance_thrust(rng, 0.6 * threat.threat_level, 1.5);
                return;
            }
        }
    }

    if let Some(craft) = view.craft {
        if behavior == Behavior::EvadeCraft || craft.distance < HARD_AVOID_DISTANCE {
            pilot.heading.target = normalize_angle(craft.bearing + PI);
            pilot.chance_thrust(rng, 0.3 * w.avoid_craft, 1.5);
            return;
        }
    }

    if behavior == Behavior::SeekHealing {
        if let Some(healer) = view.healer {
            pilot.heading.target = healer.bearing;
            pilot.rotate_once();
            pilot.chance_thrust(rng, 0.4, 1.2);
            return;
        }
    }

    if behavior == Behavior::SquadAttack {
        if let (FlankPattern::HammerAnvil | FlankPattern::Scissors, Some(t)) =
            (orders.pattern, orders.pattern_target)
        {
            run_pattern(pilot, orders.pattern, &t, snapshots, field, projectiles, events, rng);
            return;
        }
        if let Some(goal) = orders.escort {
            hold_escort(pilot, &goal, orders, snapshots, field, projectiles, events, rng);
            return;
        }
        if let Some(t) = orders.target {
            if orders.is_alpha {
                pilot.heading.target = bearing(pos, t.pos);
                pilot.rotate_once();
                if angle_diff(pilot.heading.angle, pilot.heading.target).abs() < AIM_TOLERANCE
                    && coordination_clear(snapshots, pilot.entity, pos, t.pos)
                {
                    let angle = aim(pos, &t, range, &field.bounds);
                    pilot.fire(angle, projectiles, events);
                }
                if !field.toggles.anchor_alpha {
                    pilot.chance_thrust(rng, 0.5, 1.3);
                }
                return;
            }
            if let Some(slot) = Orders::follower_slot(pilot) {
                let distance = pos.distance(slot);
                pilot.heading.target = bearing(pos, slot);
                pilot.rotate_once();
                if let Some(alpha_angle) = orders.alpha_angle {
                    let drift = angle_diff(pilot.heading.angle, alpha_angle);
                    let nudge = drift.signum() * ALLIED.rotation_step * 0.5;
                    pilot.heading.angle = normalize_angle(pilot.heading.angle + nudge);
                }
                let to_target = bearing(pos, t.pos);
                if angle_diff(pilot.heading.angle, to_target).abs() < WIDE_AIM_TOLERANCE
                    && combat::should_fire_at_enemy(pos, pilot.heading.angle, t.pos, range)
                    && coordination_clear(snapshots, pilot.entity, pos, t.pos)
                {
                    let angle = aim(pos, &t, range, &field.bounds);
                    pilot.fire(angle, projectiles, events);
                }
                if rng.f32() < 0.4 || distance > SLOT_CATCH_UP {
                    pilot.thrust(1.2);
                }
                return;
            }
        }
    }

    if behavior == Behavior::FireAtEnemy {
        if let Some(t) = view.enemy.and_then(|e| snapshots.hostiles.get(e.item)).copied() {
            if combat::should_fire_at_enemy(pos, pilot.heading.angle, t.pos, range) {
                if coordination_clear(snapshots, pilot.entity, pos, t.pos) {
                    pilot.heading.target = aim(pos, &t, range, &field.bounds);
                    let diff = angle_diff(pilot.heading.angle, pilot.heading.target);
                    if diff.abs() < AIM_TOLERANCE {
                        pilot.fire(pilot.heading.target, projectiles, events);
                    }
                    pilot.rotate_once();
                } else {
                    pilot.heading.target = bearing(pos, t.pos);
                }
                return;
            }
        }
    }

    if behavior == Behavior::ProtectAlly {
        if let Some(angle) = view.protect {
            pilot.heading.target = angle;
            if view.enemies_near {
                pilot.chance_thrust(rng, 0.4 * w.protect_ally, 1.2);
            }
        } else if view.flock.angle != pilot.heading.angle {
            let current = pilot.heading.target;
            let blend = view.flock.weight * w.protect_ally;
            let turn = angle_diff(current, view.flock.angle) * blend;
            pilot.heading.target = normalize_angle(current + turn);
            if view.enemies_near {
                pilot.chance_thrust(rng, 0.3 * w.protect_ally, 1.1);
            }
        }
        return;
    }

    if behavior == Behavior::FireAtObstacle {
        if let Some(o) = view.obstacle_target {
            pilot.heading.target = o.bearing;
            let off_bore = angle_diff(pilot.heading.angle, o.bearing).abs();
            if off_bore < AIM_TOLERANCE * w.fire_at_obstacle {
                let angle = pilot.heading.angle;
                pilot.fire(angle, projectiles, events);
            }
            pilot.rotate_once();
            return;
        }
    }

    if behavior == Behavior::AvoidObstacle {
        if let Some(o) = view.obstacle {
            pilot.heading.target = normalize_angle(o.bearing + PI);
            pilot.chance_thrust(rng, 0.2 * w.avoid_obstacle, 1.1);
            return;
        }
    }

    if let Some(craft) = view.craft {
        pilot.heading.target = normalize_angle(craft.bearing + PI);
        return;
    }

    if rng.f32() < 0.01 * w.random_navigate {
        pilot.heading.target = normalize_angle(rng.f32() * TAU);
    }
}

/// Alpha side of hammer-and-anvil or scissors. Followers steer to their pattern slots
/// in their own turn.
#[allow(clippy::too_many_arguments)]
fn run_pattern(
    pilot: &mut Pilot,
    pattern: FlankPattern,
    target: &CraftSnapshot,
    snapshots: &Snapshots,
    field: &Field<'_>,
    projectiles: &mut Projectiles,
    events: &mut Events,
    rng: &mut fastrand::Rng,
) {
    let pos = pilot.pos;
    let range = pilot.tuning.enemy_firing_range;
    match pattern {
        FlankPattern::HammerAnvil => {
            if pos.distance(target.pos) > HAMMER_CLOSE_DISTANCE {
                pilot.heading.target = bearing(pos, target.pos);
                pilot.chance_thrust(rng, 0.5, 1.2);
            }
        }
        FlankPattern::Scissors => {
            pilot.heading.target = bearing(pos, target.pos);
            if combat::should_fire_at_enemy(pos, pilot.heading.angle, target.pos, range)
                && coordination_clear(snapshots, pilot.entity, pos, target.pos)
            {
                let angle = aim(pos, target, range, &field.bounds);
                pilot.fire(angle, projectiles, events);
            }
        }
        FlankPattern::None => {}
    }
    pilot.rotate_once();
}

/// Move to the escort goal; intercept and guard also shoot at their quarry.
#[allow(clippy::too_many_arguments)]
fn hold_escort(
    pilot: &mut Pilot,
    goal: &EscortGoal,
    orders: &Orders,
    snapshots: &Snapshots,
    field: &Field<'_>,
    projectiles: &mut Projectiles,
    events: &mut Events,
    rng: &mut fastrand::Rng,
) {
    let pos = pilot.pos;
    let distance = pos.distance(goal.pos);
    pilot.heading.target = bearing(pos, goal.pos);
    pilot.rotate_once();

    let quarry = match field.toggles.escort {
        EscortMode::Intercept => goal.intercept.and_then(|e| snapshots.hostile(e)).copied(),
        EscortMode::Guard => orders.target,
        _ => None,
    };
    if let Some(t) = quarry {
        let range = pilot.tuning.enemy_firing_range;
        if pos.distance(t.pos) < range
            && angle_diff(pilot.heading.angle, bearing(pos, t.pos)).abs() < WIDE_AIM_TOLERANCE
            && combat::should_fire_at_enemy(pos, pilot.heading.angle, t.pos, range)
            && coordination_clear(snapshots, pilot.entity, pos, t.pos)
        {
            let angle = aim(pos, &t, range, &field.bounds);
            pilot.fire(angle, projectiles, events);
        }
    }
    pilot.wing.intercept_target = goal.intercept;

    if rng.f32() < 0.5 || distance > ESCORT_CATCH_UP {
        pilot.thrust(1.2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn arena(allied: usize, toggles: SquadToggles) -> Arena {
        let mut a = Arena::new(&SimConfig {
            seed: Some(11),
            allied_count: allied,
            hostile_count: 0,
            boss_count: 0,
            obstacle_count: 0,
            squad: toggles,
            ..SimConfig::default()
        });
        a.player.active = false;
        a
    }

    fn place(a: &mut Arena, e: hecs::Entity, pos: Vec2, angle: f32) {
        let query = a.world.query_one_mut::<(&mut Position, &mut Velocity, &mut Heading)>(e);
        if let Ok((p, v, h)) = query {
            p.0 = pos;
            v.0 = Vec2::ZERO;
            *h = Heading::new(angle);
        }
    }

    fn solo() -> SquadToggles {
        SquadToggles {
            enabled: false,
            ..SquadToggles::default()
        }
    }

    #[test]
    fn close_craft_triggers_evasion() {
        let mut a = arena(2, solo());
        let (x, y) = (a.allies[0], a.allies[1]);
        place(&mut a, x, Vec2::new(500.0, 300.0), 0.0);
        place(&mut a, y, Vec2::new(530.0, 300.0), 0.0);
        update(&mut a);
        let wing = *a.world.get::<&Wing>(x).unwrap();
        assert_eq!(wing.behavior, Behavior::EvadeCraft);
        let h = *a.world.get::<&Heading>(x).unwrap();
        assert!((h.target.abs() - PI).abs() < 1e-4);
    }

    #[test]
    fn alpha_gets_health_bonus_through_the_pass() {
        let mut a = arena(3, SquadToggles::default());
        update(&mut a);
        let alpha = a.squad.alpha.unwrap();
        let h = *a.world.get::<&Health>(alpha).unwrap();
        assert!((h.max - 3.75).abs() < 1e-6);
        assert!(a.snapshots.ally(alpha).unwrap().is_alpha);
        assert!(a.events.iter().any(|e| matches!(e, SimEvent::AlphaElected(x) if *x == alpha)));

        a.set_toggles(solo());
        update(&mut a);
        assert!(a.squad.alpha.is_none());
        assert_eq!(a.world.get::<&Health>(alpha).unwrap().max, 3.0);
    }

    #[test]
    fn followers_get_roles_and_slots() {
        let mut a = arena(3, SquadToggles::default());
        update(&mut a);
        let alpha = a.squad.alpha.unwrap();
        assert_eq!(a.world.get::<&Wing>(alpha).unwrap().role, Some(Role::Dps));
        let followers = a.squad.followers(&a.allies);
        let first = *a.world.get::<&Wing>(followers[0]).unwrap();
        assert_eq!(first.role, Some(Role::Scout));
        assert!(first.slot.is_some());
        assert!(first.abilities.shield);
    }

    #[test]
    fn speed_stays_capped_over_many_ticks() {
        let mut a = arena(5, SquadToggles::default());
        for _ in 0..300 {
            update(&mut a);
            for s in &a.snapshots.allies {
                assert!(s.vel.length() <= ALLIED.max_speed + 1e-4);
                assert!(s.angle > -PI - 1e-6 && s.angle <= PI + 1e-6);
                assert!(s.health >= 0.0 && s.health <= s.max_health);
            }
        }
    }

    #[test]
    fn snapshot_mode_hides_earlier_moves() {
        let run = |snapshot_mode: bool| {
            let mut a = arena(2, solo());
            a.snapshot_mode = snapshot_mode;
            let (x, y) = (a.allies[0], a.allies[1]);
            // x drifts toward y; only the live pass lets y see x's new position.
            place(&mut a, x, Vec2::new(500.0, 300.0), 0.0);
            place(&mut a, y, Vec2::new(563.0, 300.0), 0.0);
            a.world.get::<&mut Velocity>(x).unwrap().0 = Vec2::new(5.0, 0.0);
            update(&mut a);
            let behavior = a.world.get::<&Wing>(y).unwrap().behavior;
            behavior
        };
        assert_eq!(run(false), Behavior::EvadeCraft);
        assert_ne!(run(true), Behavior::EvadeCraft);
    }

    #[test]
    fn rejected_advisor_action_falls_back_to_rules() {
        struct Ram;
        impl advisor::Advisor for Ram {
            fn action(&mut self, _: hecs::Entity, _: &Features) -> Option<Action> {
                Some(Action {
                    rotate: 0,
                    thrust: true,
                    fire: false,
                    shield: false,
                })
            }
        }
        let mut a = arena(2, solo());
        a.set_advisor(Box::new(Ram));
        let (x, y) = (a.allies[0], a.allies[1]);
        place(&mut a, x, Vec2::new(500.0, 300.0), 0.0);
        place(&mut a, y, Vec2::new(540.0, 300.0), PI);
        update(&mut a);
        assert_eq!(a.world.get::<&Wing>(x).unwrap().behavior, Behavior::EvadeCraft);
    }
}
