use crate::ecs::components::{
    CraftKind, Health, Heading, PhaseState, Position, Pursuit, Shield, Tuning, Velocity, Wing,
};
use crate::obstacle::Obstacles;
use crate::phase::Phase;
use crate::spatial::{CraftGrids, CraftSnapshot, Snapshots};

pub fn ally_snapshot(
    world: &hecs::World,
    e: hecs::Entity,
    is_alpha: bool,
) -> Option<CraftSnapshot> {
    let mut q = world
        .query_one::<(
            &CraftKind,
            &Position,
            &Velocity,
            &Heading,
            &Health,
            &PhaseState,
            &Shield,
            &Tuning,
            &Wing,
        )>(e)
        .ok()?;
    let (kind, pos, vel, heading, health, phase, shield, tuning, wing) = q.get()?;
    let stats = kind.stats();
    Some(CraftSnapshot {
        entity: e,
        kind: *kind,
        pos: pos.0,
        vel: vel.0,
        angle: heading.angle,
        health: health.current,
        max_health: health.max,
        phase: phase.phase,
        shielded: shield.active,
        is_alpha,
        engaged: wing.is_engaged(),
        healing_cooldown: wing.healing_cooldown,
        enemy_firing_range: tuning.enemy_firing_range,
        radius: stats.radius,
        size: stats.size,
    })
}

pub fn hostile_snapshot(world: &hecs::World, e: hecs::Entity) -> Option<CraftSnapshot> {
    let mut q = world
        .query_one::<(&CraftKind, &Position, &Velocity, &Heading, &Health, &Shield, &Pursuit)>(e)
        .ok()?;
    let (kind, pos, vel, heading, health, shield, pursuit) = q.get()?;
    let stats = kind.stats();
    Some(CraftSnapshot {
        entity: e,
        kind: *kind,
        pos: pos.0,
        vel: vel.0,
        angle: heading.angle,
        health: health.current,
        max_health: health.max,
        phase: pursuit.boss.map_or_else(|| Phase::of(health), |b| b.phase),
        shielded: shield.active,
        is_alpha: false,
        engaged: pursuit.target.is_some(),
        healing_cooldown: 0,
        enemy_firing_range: 0.0,
        radius: stats.radius,
        size: stats.size,
    })
}

/// Rebuild both snapshot vectors, index-aligned with `allies` and `hostiles`.
/// Entities that no longer resolve are skipped, so callers prune the collections first.
pub fn rebuild_snapshots(
    world: &hecs::World,
    allies: &[hecs::Entity],
    hostiles: &[hecs::Entity],
    alpha: Option<hecs::Entity>,
    snapshots: &mut Snapshots,
) {
    snapshots.allies.clear();
    snapshots
        .allies
        .extend(allies.iter().filter_map(|&e| ally_snapshot(world, e, alpha == Some(e))));
    snapshots.hostiles.clear();
    snapshots
        .hostiles
        .extend(hostiles.iter().filter_map(|&e| hostile_snapshot(world, e)));
}

/// Refresh one allied snapshot in place, making this craft's new state visible to
/// every craft processed after it in the same tick.
pub fn refresh_ally(
    world: &hecs::World,
    snapshots: &mut Snapshots,
    index: usize,
    alpha: Option<hecs::Entity>,
) {
    let Some(slot) = snapshots.allies.get_mut(index) else {
        return;
    };
    if let Some(fresh) = ally_snapshot(world, slot.entity, alpha == Some(slot.entity)) {
        *slot = fresh;
    }
}

pub fn refresh_hostile(world: &hecs::World, snapshots: &mut Snapshots, index: usize) {
    let Some(slot) = snapshots.hostiles.get_mut(index) else {
        return;
    };
    if let Some(fresh) = hostile_snapshot(world, slot.entity) {
        *slot = fresh;
    }
}

/// Rebuild the collision grids from current snapshots and obstacle positions.
pub fn rebuild_grids(snapshots: &Snapshots, obstacles: &Obstacles, grids: &mut CraftGrids) {
    grids.allied.clear();
    for (i, s) in snapshots.allies.iter().enumerate() {
        grids.allied.insert(s.pos, i as u32);
    }
    grids.hostile.clear();
    for (i, s) in snapshots.hostiles.iter().enumerate() {
        grids.hostile.insert(s.pos, i as u32);
    }
    grids.obstacles.clear();
    for (i, o) in obstacles.items.iter().enumerate() {
        grids.obstacles.insert(o.pos, i as u32);
    }
}
