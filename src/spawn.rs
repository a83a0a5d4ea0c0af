//! Squad size management. Shrinking removes from the tail of the collection;
//! growing spawns fresh craft.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::arena::Arena;
use crate::config::MAX_SQUAD_SIZE;
use crate::ecs::components::{
    CraftKind, Heading, Health, PhaseState, Position, Pursuit, Shield, Tuning, Velocity, Weapon,
    Wing,
};
use crate::geometry::Bounds;

/// Score after which new hostiles may spawn as advanced.
const ADVANCED_SCORE: u32 = 1000;

pub fn spawn_ally(world: &mut hecs::World, pos: Vec2) -> hecs::Entity {
    let stats = CraftKind::Allied.stats();
    world.spawn((
        CraftKind::Allied,
        Position(pos),
        Velocity(Vec2::ZERO),
        Heading::new(0.0),
        Health::full(stats.max_health),
        PhaseState::default(),
        Shield::default(),
        Weapon::default(),
        Tuning::default(),
        Wing::default(),
    ))
}

/// Hostile on a random arena edge facing a random direction.
pub fn spawn_hostile(
    world: &mut hecs::World,
    kind: CraftKind,
    bounds: &Bounds,
    rng: &mut fastrand::Rng,
) -> hecs::Entity {
    let pos = match rng.u8(0..4) {
        0 => Vec2::new(rng.f32() * bounds.width, 0.0),
        1 => Vec2::new(bounds.width, rng.f32() * bounds.height),
        2 => Vec2::new(rng.f32() * bounds.width, bounds.height),
        _ => Vec2::new(0.0, rng.f32() * bounds.height),
    };
    let stats = kind.stats();
    world.spawn((
        kind,
        Position(pos),
        Velocity(Vec2::ZERO),
        Heading::new(crate::geometry::normalize_angle(rng.f32() * TAU)),
        Health::full(stats.max_health),
        Shield::default(),
        Weapon::default(),
        Pursuit::new(kind),
    ))
}

impl Arena {
    /// Clamp to `0..=10`, trim from the tail or spawn at random positions.
    pub fn set_allied_count(&mut self, count: usize) {
        let count = count.min(MAX_SQUAD_SIZE);
        while self.allies.len() > count {
            if let Some(e) = self.allies.pop() {
                let _ = self.world.despawn(e);
            }
        }
        while self.allies.len() < count {
            let pos = Vec2::new(
                self.rng.f32() * self.bounds.width,
                self.rng.f32() * self.bounds.height,
            );
            let e = spawn_ally(&mut self.world, pos);
            self.allies.push(e);
        }
        self.squad.reconcile(&self.world, &self.allies);
        self.refresh_snapshots();
        log::info!("Allied squad size: {}", self.allies.len());
    }

    /// Basic/advanced hostiles only. New ones are advanced half the time once the
    /// score passes 1000.
    pub fn set_hostile_count(&mut self, count: usize) {
        self.resize_hostiles(count.min(MAX_SQUAD_SIZE), false);
    }

    pub fn set_boss_count(&mut self, count: usize) {
        self.resize_hostiles(count.min(MAX_SQUAD_SIZE), true);
    }

    fn resize_hostiles(&mut self, count: usize, boss: bool) {
        let mut current = self.hostile_count(boss);
        let mut i = self.hostiles.len();
        while current > count && i > 0 {
            i -= 1;
            let e = self.hostiles[i];
            let is_boss = self
                .world
                .get::<&CraftKind>(e)
                .is_ok_and(|k| *k == CraftKind::Boss);
            if is_boss == boss {
                self.hostiles.remove(i);
                let _ = self.world.despawn(e);
                current -= 1;
            }
        }
        while current < count {
            let kind = if boss {
                CraftKind::Boss
            } else if self.score > ADVANCED_SCORE && self.rng.bool() {
                CraftKind::Advanced
            } else {
                CraftKind::Basic
            };
            let e = spawn_hostile(&mut self.world, kind, &self.bounds, &mut self.rng);
            self.hostiles.push(e);
            current += 1;
        }
        self.refresh_snapshots();
        log::info!(
            "{} count: {}",
            if boss { "Boss" } else { "Hostile" },
            current
        );
    }

    fn refresh_snapshots(&mut self) {
        crate::ecs::systems::spatial::rebuild_snapshots(
            &self.world,
            &self.allies,
            &self.hostiles,
            self.squad.alpha,
            &mut self.snapshots,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn arena() -> Arena {
        Arena::new(&SimConfig {
            seed: Some(3),
            allied_count: 0,
            hostile_count: 0,
            boss_count: 0,
            ..SimConfig::default()
        })
    }

    #[test]
    fn counts_are_clamped() {
        let mut a = arena();
        a.set_allied_count(25);
        assert_eq!(a.allies.len(), 10);
        a.set_boss_count(12);
        assert_eq!(a.hostile_count(true), 10);
    }

    #[test]
    fn shrinking_removes_from_tail() {
        let mut a = arena();
        a.set_allied_count(4);
        let keep = a.allies[..2].to_vec();
        let gone = a.allies[3];
        a.set_allied_count(2);
        assert_eq!(a.allies, keep);
        assert!(!a.world.contains(gone));
        assert_eq!(a.snapshots.allies.len(), 2);
    }

    #[test]
    fn hostile_and_boss_counts_are_independent() {
        let mut a = arena();
        a.set_hostile_count(3);
        a.set_boss_count(2);
        a.set_hostile_count(1);
        assert_eq!(a.hostile_count(false), 1);
        assert_eq!(a.hostile_count(true), 2);
        assert_eq!(a.hostiles.len(), 3);
    }

    #[test]
    fn hostiles_spawn_on_an_edge() {
        let mut a = arena();
        a.set_hostile_count(10);
        for s in &a.snapshots.hostiles {
            let b = a.bounds;
            assert!(s.pos.x == 0.0 || s.pos.y == 0.0 || s.pos.x == b.width || s.pos.y == b.height);
            assert_eq!(s.kind, CraftKind::Basic);
        }
    }
}
