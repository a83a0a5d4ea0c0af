//! Discrete circle-overlap collisions, resolved once per tick after everything has
//! moved. Candidate pairs come from the spatial grids; the narrow phase is a plain
//! distance test against summed radii.

use glam::Vec2;

use super::{hostile, spatial};
use crate::arena::{Arena, Player, SHIELD_RADIUS};
use crate::ecs::components::{CraftKind, Health, PhaseState, Pursuit, Shield};
use crate::events::{Events, SimEvent};
use crate::obstacle::Obstacles;
use crate::phase;
use crate::projectile::PROJECTILE_RADIUS;
use crate::spatial::CraftSnapshot;

/// Score for shooting an obstacle.
pub const OBSTACLE_BOUNTY: u32 = 100;
/// Impulse an allied shield gives an obstacle it blocks.
const ALLIED_SHIELD_IMPULSE: f32 = 0.3;
/// Impulse a basic or advanced hostile shield gives an obstacle.
const HOSTILE_SHIELD_IMPULSE: f32 = 0.5;
/// Base player shield push, scaled down with depth of overlap.
const PLAYER_SHIELD_FORCE: f32 = 0.5;

fn overlaps(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance(b) < ra + rb
}

/// One hit, scaled by the live phase for craft that carry one. The phase is
/// reclassified straight away so a follow-up hit this pass sees the new multiplier
/// and the forced transition shield. Returns true the first time the craft reaches zero.
fn wound(world: &mut hecs::World, events: &mut Events, e: hecs::Entity) -> bool {
    let Ok((health, shield, state, pursuit)) = world.query_one_mut::<(
        &mut Health,
        &mut Shield,
        Option<&mut PhaseState>,
        Option<&mut Pursuit>,
    )>(e) else {
        return false;
    };
    if health.current <= 0.0 || shield.active {
        return false;
    }
    let amount = state.as_ref().map_or(1.0, |s| s.phase.damage_multiplier());
    let dead = health.damage(amount);
    let changed = match (state, pursuit.and_then(|p| p.boss.as_mut())) {
        (Some(state), _) => phase::reclassify(health, state, shield),
        (None, Some(boss)) => hostile::update_boss_phase(boss, health, shield),
        (None, None) => None,
    };
    if let (Some(next), false) = (changed, dead) {
        events.push(SimEvent::PhaseChanged { entity: e, phase: next });
    }
    dead
}

fn destroyed(events: &mut Events, craft: &CraftSnapshot, bounty: u32) {
    log::debug!("{} craft {:?} destroyed", craft.kind.label(), craft.entity);
    events.push(SimEvent::CraftDestroyed {
        entity: craft.entity,
        kind: craft.kind,
        bounty,
    });
}

/// Shielded hostiles (basic and advanced) and the shielded player push obstacles away.
pub fn repel_obstacles(arena: &mut Arena) {
    let Arena {
        player,
        obstacles,
        snapshots,
        ..
    } = arena;
    for s in &snapshots.hostiles {
        if !s.shielded || s.kind == CraftKind::Boss {
            continue;
        }
        for o in &mut obstacles.items {
            let d = o.pos.distance(s.pos);
            if d > 0.0 && d < SHIELD_RADIUS + o.radius {
                o.repel_from(s.pos, HOSTILE_SHIELD_IMPULSE);
            }
        }
    }

    if !player.active || !player.shield.active {
        return;
    }
    let player_size = CraftKind::Allied.stats().size;
    for o in &mut obstacles.items {
        let reach = SHIELD_RADIUS + o.radius;
        let offset = o.pos - player.pos;
        let d = offset.length();
        if d <= 0.0 || d >= reach {
            continue;
        }
        let dir = offset / d;
        let force = PLAYER_SHIELD_FORCE * (1.0 - d / reach);
        if o.size > player_size {
            // Big rocks shove the player instead.
            player.vel -= dir * force * (o.size / player_size) * 0.3;
            o.vel += dir * force * 0.2;
        } else {
            o.vel += dir * force;
        }
    }
}

pub fn update(arena: &mut Arena) {
    let Arena {
        world,
        allies,
        hostiles,
        player,
        projectiles,
        obstacles,
        squad,
        score,
        events,
        rng,
        snapshots,
        grids,
        bounds,
        ..
    } = arena;
    spatial::rebuild_snapshots(world, allies, hostiles, squad.alpha, snapshots);
    spatial::rebuild_grids(snapshots, obstacles, grids);

    let allied_radius = CraftKind::Allied.stats().radius;
    let mut spent = vec![false; projectiles.items.len()];
    let mut dead_allies = vec![false; snapshots.allies.len()];
    let mut dead_hostiles = vec![false; snapshots.hostiles.len()];
    let mut removed = vec![false; obstacles.items.len()];
    let mut near = Vec::new();

    // 1. Projectiles vs craft and obstacles
    for (pi, p) in projectiles.items.iter().enumerate() {
        if p.owner.is_friendly() {
            grids.hostile.candidates(p.pos, &mut near);
            for &i in &near {
                let i = i as usize;
                let s = &snapshots.hostiles[i];
                if dead_hostiles[i] || !overlaps(p.pos, PROJECTILE_RADIUS, s.pos, s.radius) {
                    continue;
                }
                spent[pi] = true;
                if !s.shielded && wound(world, events, s.entity) {
                    dead_hostiles[i] = true;
                    let bounty = s.kind.bounty();
                    *score += bounty;
                    destroyed(events, s, bounty);
                }
                break;
            }
            if spent[pi] {
                continue;
            }
            grids.obstacles.candidates(p.pos, &mut near);
            for &i in &near {
                let i = i as usize;
                let o = &obstacles.items[i];
                if removed[i] || !overlaps(p.pos, PROJECTILE_RADIUS, o.pos, o.radius) {
                    continue;
                }
                spent[pi] = true;
                removed[i] = true;
                *score += OBSTACLE_BOUNTY;
                events.push(SimEvent::ObstacleDestroyed);
                break;
            }
        } else {
            if player.active && overlaps(p.pos, PROJECTILE_RADIUS, player.pos, allied_radius) {
                spent[pi] = true;
                player_down(player, events);
                continue;
            }
            grids.allied.candidates(p.pos, &mut near);
            for &i in &near {
                let i = i as usize;
                let s = &snapshots.allies[i];
                if dead_allies[i] || !overlaps(p.pos, PROJECTILE_RADIUS, s.pos, s.radius) {
                    continue;
                }
                spent[pi] = true;
                if !s.shielded && wound(world, events, s.entity) {
                    dead_allies[i] = true;
                    destroyed(events, s, 0);
                }
                break;
            }
        }
    }

    // 2. Player vs obstacles
    if player.active && !player.shield.active {
        let hit = obstacles
            .items
            .iter()
            .zip(&removed)
            .any(|(o, &gone)| !gone && overlaps(player.pos, allied_radius, o.pos, o.radius));
        if hit {
            player_down(player, events);
        }
    }

    // 3. Hostile craft vs obstacles
    for (i, s) in snapshots.hostiles.iter().enumerate() {
        if dead_hostiles[i] {
            continue;
        }
        grids.obstacles.candidates(s.pos, &mut near);
        for &oi in &near {
            let oi = oi as usize;
            if removed[oi] {
                continue;
            }
            let o = &mut obstacles.items[oi];
            if !overlaps(s.pos, s.radius, o.pos, o.radius) {
                continue;
            }
            if s.shielded {
                if s.kind != CraftKind::Boss {
                    o.repel_from(s.pos, HOSTILE_SHIELD_IMPULSE);
                }
                continue;
            }
            if let Ok(mut health) = world.get::<&mut Health>(s.entity) {
                health.current = 0.0;
            }
            dead_hostiles[i] = true;
            destroyed(events, s, 0);
            break;
        }
    }

    // 4. Allied craft vs obstacles
    for (i, s) in snapshots.allies.iter().enumerate() {
        if dead_allies[i] {
            continue;
        }
        grids.obstacles.candidates(s.pos, &mut near);
        for &oi in &near {
            let oi = oi as usize;
            if removed[oi] {
                continue;
            }
            let o = &mut obstacles.items[oi];
            if !overlaps(s.pos, s.radius, o.pos, o.radius) {
                continue;
            }
            if s.shielded {
                o.repel_from(s.pos, ALLIED_SHIELD_IMPULSE);
                continue;
            }
            if wound(world, events, s.entity) {
                dead_allies[i] = true;
                destroyed(events, s, 0);
                break;
            }
        }
    }

    let mut flags = spent.into_iter();
    projectiles.items.retain(|_| !flags.next().unwrap_or(false));
    retain_obstacles(obstacles, &removed);
    obstacles.refill(bounds, rng);
}

fn retain_obstacles(obstacles: &mut Obstacles, removed: &[bool]) {
    let mut flags = removed.iter();
    obstacles.items.retain(|_| !flags.next().copied().unwrap_or(false));
}

fn player_down(player: &mut Player, events: &mut Events) {
    if !player.active {
        return;
    }
    player.active = false;
    player.vel = Vec2::ZERO;
    log::info!("Player destroyed");
    events.push(SimEvent::PlayerDestroyed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::ecs::components::Position;
    use crate::projectile::Owner;

    fn arena(allied: usize, hostile: usize) -> Arena {
        let mut a = Arena::new(&SimConfig {
            seed: Some(5),
            allied_count: allied,
            hostile_count: hostile,
            boss_count: 0,
            obstacle_count: 0,
            ..SimConfig::default()
        });
        a.player.active = false;
        a
    }

    fn put(a: &mut Arena, e: hecs::Entity, pos: Vec2) {
        a.world.get::<&mut Position>(e).unwrap().0 = pos;
    }

    fn shot(a: &mut Arena, owner: Owner, pos: Vec2) {
        a.projectiles.fire(owner, None, pos, 0.0, 0.0);
    }

    #[test]
    fn friendly_shot_destroys_basic_hostile_and_scores() {
        let mut a = arena(0, 1);
        let h = a.hostiles[0];
        put(&mut a, h, Vec2::new(300.0, 300.0));
        shot(&mut a, Owner::Allied, Vec2::new(305.0, 300.0));
        update(&mut a);
        assert!(a.projectiles.is_empty());
        assert_eq!(a.score, 100);
        assert!(a
            .events
            .iter()
            .any(|e| matches!(
                e,
                SimEvent::CraftDestroyed { entity, bounty: 100, .. } if *entity == h
            )));
    }

    #[test]
    fn shield_absorbs_without_damage() {
        let mut a = arena(0, 1);
        let h = a.hostiles[0];
        put(&mut a, h, Vec2::new(300.0, 300.0));
        *a.world.get::<&mut Shield>(h).unwrap() = Shield {
            active: true,
            duration: 10,
            cooldown: 0,
        };
        shot(&mut a, Owner::Player, Vec2::new(305.0, 300.0));
        update(&mut a);
        assert!(a.projectiles.is_empty());
        assert_eq!(a.world.get::<&Health>(h).unwrap().current, 1.0);
        assert_eq!(a.score, 0);
    }

    #[test]
    fn hostile_shot_damage_scales_with_phase() {
        let mut a = arena(1, 0);
        let e = a.allies[0];
        put(&mut a, e, Vec2::new(300.0, 300.0));
        a.world.get::<&mut Health>(e).unwrap().current = 1.5;
        a.world.get::<&mut PhaseState>(e).unwrap().phase = crate::phase::Phase::Two;
        shot(&mut a, Owner::Hostile, Vec2::new(305.0, 300.0));
        update(&mut a);
        assert!((a.world.get::<&Health>(e).unwrap().current - 0.75).abs() < 1e-6);
    }

    #[test]
    fn hit_reclassifies_phase_before_tick_ends() {
        let mut a = arena(1, 0);
        let e = a.allies[0];
        put(&mut a, e, Vec2::new(300.0, 300.0));
        a.world.get::<&mut Health>(e).unwrap().current = 2.0;
        shot(&mut a, Owner::Hostile, Vec2::new(305.0, 300.0));
        update(&mut a);

        let health = *a.world.get::<&Health>(e).unwrap();
        assert_eq!(health.current, 1.0);
        let stored = a.world.get::<&PhaseState>(e).unwrap().phase;
        assert_eq!(stored, crate::phase::Phase::of(&health));
        assert_eq!(stored, crate::phase::Phase::Three);
        assert!(a.world.get::<&Shield>(e).unwrap().active);
        let visual = a.visuals().into_iter().find(|v| v.entity == e).unwrap();
        assert_eq!(visual.phase, crate::phase::Phase::Three);
        assert!(a
            .events
            .iter()
            .any(|ev| matches!(ev, SimEvent::PhaseChanged { entity, .. } if *entity == e)));
    }

    #[test]
    fn transition_shield_absorbs_second_hit_in_same_pass() {
        let mut a = arena(1, 0);
        let e = a.allies[0];
        put(&mut a, e, Vec2::new(300.0, 300.0));
        a.world.get::<&mut Health>(e).unwrap().current = 2.5;
        shot(&mut a, Owner::Hostile, Vec2::new(305.0, 300.0));
        shot(&mut a, Owner::Hostile, Vec2::new(295.0, 300.0));
        update(&mut a);

        // First hit drops to phase two and forces the shield; the second is absorbed.
        assert!(a.projectiles.is_empty());
        assert!((a.world.get::<&Health>(e).unwrap().current - 1.5).abs() < 1e-6);
        assert_eq!(a.world.get::<&PhaseState>(e).unwrap().phase, crate::phase::Phase::Two);
    }

    #[test]
    fn shot_obstacle_is_replaced() {
        let mut a = arena(0, 0);
        a.obstacles.minimum = 1;
        a.obstacles.items.push(crate::obstacle::Obstacle::at(Vec2::new(300.0, 300.0), &mut a.rng));
        shot(&mut a, Owner::Player, Vec2::new(300.0, 300.0));
        update(&mut a);
        assert_eq!(a.score, OBSTACLE_BOUNTY);
        assert_eq!(a.obstacles.len(), 1);
        assert_ne!(a.obstacles.items[0].pos, Vec2::new(300.0, 300.0));
    }

    #[test]
    fn hostile_shot_takes_out_player() {
        let mut a = arena(0, 0);
        a.player.active = true;
        let pos = a.player.pos;
        shot(&mut a, Owner::Hostile, pos + Vec2::new(4.0, 0.0));
        update(&mut a);
        assert!(!a.player.active);
        assert!(a.events.iter().any(|e| *e == SimEvent::PlayerDestroyed));
    }
}
