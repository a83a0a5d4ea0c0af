//! The world context every system receives: ECS world, craft collections in
//! processing order, projectile and obstacle fields, squad state and the event queue.

use std::f32::consts::PI;

use glam::Vec2;

use crate::advisor::{Advisor, NoAdvisor};
use crate::config::SimConfig;
use crate::debug::timer::SystemTimers;
use crate::ecs::components::{CraftKind, Shield};
use crate::ecs::systems::{self, movement};
use crate::events::{Events, Faction, SimEvent};
use crate::geometry::Bounds;
use crate::obstacle::Obstacles;
use crate::projectile::{Owner, Projectiles};
use crate::spatial::{CraftGrids, Snapshots};
use crate::squad::{Squad, SquadToggles};

/// Ticks between player volleys.
const PLAYER_FIRE_COOLDOWN: u32 = 10;
/// Side barrels splay out by this much.
const PLAYER_SIDE_GUN_ANGLE: f32 = PI / 12.0;
/// Shield force-field radius around the player and allied craft.
pub const SHIELD_RADIUS: f32 = 40.0;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// The externally driven craft. Shares the allied hull constants.
#[derive(Debug, Clone)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: f32,
    /// Inactive players are ignored by every system.
    pub active: bool,
    /// Held shield: active while the host holds it.
    pub shield: Shield,
    pub fire_cooldown: u32,
}

impl Player {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            active: true,
            shield: Shield::default(),
            fire_cooldown: 0,
        }
    }

    pub fn rotate(&mut self, direction: f32) {
        let step = CraftKind::Allied.stats().rotation_step;
        self.angle = movement::rotate_by(self.angle, direction, step);
    }

    pub fn thrust(&mut self, power: f32) {
        movement::thrust(&mut self.vel, self.angle, CraftKind::Allied.stats().thrust_power, power);
    }

    pub fn set_shield(&mut self, held: bool) {
        self.shield.active = held;
    }

    /// Three-barrel volley. Returns false while the gun is cooling down.
    pub fn fire(&mut self, projectiles: &mut Projectiles, events: &mut Events) -> bool {
        if !self.active || self.fire_cooldown > 0 {
            return false;
        }
        let size = CraftKind::Allied.stats().size;
        for offset in [0.0, -PLAYER_SIDE_GUN_ANGLE, PLAYER_SIDE_GUN_ANGLE] {
            projectiles.fire(Owner::Player, None, self.pos, self.angle + offset, size);
        }
        self.fire_cooldown = PLAYER_FIRE_COOLDOWN;
        events.push(SimEvent::Fired {
            shooter: None,
            faction: Faction::Player,
        });
        true
    }

    pub fn update(&mut self, bounds: &Bounds) {
        if !self.active {
            return;
        }
        self.fire_cooldown = self.fire_cooldown.saturating_sub(1);
        let max_speed = CraftKind::Allied.stats().max_speed;
        movement::integrate(&mut self.pos, &mut self.vel, max_speed, bounds);
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

pub struct Arena {
    pub world: hecs::World,
    pub bounds: Bounds,
    /// Allied craft in processing order.
    pub allies: Vec<hecs::Entity>,
    /// Hostile craft in processing order.
    pub hostiles: Vec<hecs::Entity>,
    pub player: Player,
    pub projectiles: Projectiles,
    pub obstacles: Obstacles,
    pub squad: Squad,
    pub toggles: SquadToggles,
    /// Defer allied snapshot refreshes until the whole allied pass is done.
    pub snapshot_mode: bool,
    pub tick: u64,
    pub score: u32,
    pub events: Events,
    pub rng: fastrand::Rng,
    pub snapshots: Snapshots,
    pub grids: CraftGrids,
    pub advisor: Box<dyn Advisor>,
    pub timers: SystemTimers,
}

impl Arena {
    pub fn new(config: &SimConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let bounds = Bounds::new(config.width, config.height);
        let obstacles = Obstacles::new(config.obstacle_count, &bounds, &mut rng);

        let mut arena = Self {
            world: hecs::World::new(),
            bounds,
            allies: Vec::new(),
            hostiles: Vec::new(),
            player: Player::new(bounds.center()),
            projectiles: Projectiles::new(),
            obstacles,
            squad: Squad::new(config.squad.formation),
            toggles: config.squad,
            snapshot_mode: config.snapshot_mode,
            tick: 0,
            score: 0,
            events: Events::new(),
            rng,
            snapshots: Snapshots::default(),
            grids: CraftGrids::new(),
            advisor: Box::new(NoAdvisor),
            timers: SystemTimers::new(),
        };
        arena.set_allied_count(config.allied_count);
        arena.set_hostile_count(config.hostile_count);
        arena.set_boss_count(config.boss_count);
        log::info!(
            "Arena {}x{}: {} allied, {} hostile, {} obstacles",
            config.width,
            config.height,
            arena.allies.len(),
            arena.hostiles.len(),
            arena.obstacles.len()
        );
        arena
    }

    /// Install an external parameter/action provider.
    pub fn set_advisor(&mut self, advisor: Box<dyn Advisor>) {
        self.advisor = advisor;
    }

    /// Replace the squad toggles. The formation topology takes effect immediately.
    pub fn set_toggles(&mut self, toggles: SquadToggles) {
        if toggles.formation != self.toggles.formation {
            self.squad.formation = toggles.formation;
        }
        if toggles.auto_roles != self.toggles.auto_roles {
            systems::allied::reset_roles(&mut self.world, &self.allies);
        }
        self.toggles = toggles;
    }

    /// Advance the simulation by one fixed tick.
    pub fn step(&mut self) {
        systems::tick(self);
        self.tick += 1;
    }

    pub fn hostile_count(&self, boss: bool) -> usize {
        self.hostiles
            .iter()
            .filter(|&&e| {
                self.world
                    .get::<&CraftKind>(e)
                    .is_ok_and(|k| (*k == CraftKind::Boss) == boss)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_fires_three_barrels_with_cooldown() {
        let mut p = Player::new(Vec2::new(600.0, 300.0));
        let mut shots = Projectiles::new();
        let mut events = Events::new();
        assert!(p.fire(&mut shots, &mut events));
        assert_eq!(shots.len(), 3);
        assert!(!p.fire(&mut shots, &mut events));
        assert_eq!(events.len(), 1);

        let b = Bounds::new(1200.0, 600.0);
        for _ in 0..PLAYER_FIRE_COOLDOWN {
            p.update(&b);
        }
        assert!(p.fire(&mut shots, &mut events));
    }

    #[test]
    fn seeded_arenas_match() {
        let config = SimConfig {
            seed: Some(42),
            ..SimConfig::default()
        };
        let mut a = Arena::new(&config);
        let mut b = Arena::new(&config);
        for _ in 0..120 {
            a.step();
            b.step();
        }
        let pa: Vec<Vec2> = a.snapshots.allies.iter().map(|s| s.pos).collect();
        let pb: Vec<Vec2> = b.snapshots.allies.iter().map(|s| s.pos).collect();
        assert_eq!(pa, pb);
        assert_eq!(a.score, b.score);
    }
}
