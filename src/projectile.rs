use glam::Vec2;

use crate::combat::muzzle;
use crate::geometry::{heading_vec, Bounds};

/// Projectile collision radius.
pub const PROJECTILE_RADIUS: f32 = 3.0;
/// Ticks before a projectile expires.
pub const PROJECTILE_LIFETIME: u32 = 60;
/// Allied and player projectile speed.
pub const FRIENDLY_SPEED: f32 = 8.0;
/// Hostile projectile speed.
pub const HOSTILE_SPEED: f32 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Player,
    Allied,
    Hostile,
}

impl Owner {
    /// Player and allied projectiles hit hostiles and obstacles.
    pub fn is_friendly(self) -> bool {
        !matches!(self, Owner::Hostile)
    }

    pub fn speed(self) -> f32 {
        match self {
            Owner::Player | Owner::Allied => FRIENDLY_SPEED,
            Owner::Hostile => HOSTILE_SPEED,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Projectile {
    pub pos: Vec2,
    pub vel: Vec2,
    pub owner: Owner,
    pub lifetime: u32,
    pub shooter: Option<hecs::Entity>,
}

impl Projectile {
    pub fn alive(&self) -> bool {
        self.lifetime > 0
    }
}

/// Every projectile in flight, in spawn order.
#[derive(Debug, Default)]
pub struct Projectiles {
    pub items: Vec<Projectile>,
}

impl Projectiles {
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(256),
        }
    }

    /// Spawn one hull length out from `pos` along `angle`.
    pub fn fire(
        &mut self,
        owner: Owner,
        shooter: Option<hecs::Entity>,
        pos: Vec2,
        angle: f32,
        size: f32,
    ) {
        self.items.push(Projectile {
            pos: muzzle(pos, angle, size),
            vel: heading_vec(angle) * owner.speed(),
            owner,
            lifetime: PROJECTILE_LIFETIME,
            shooter,
        });
    }

    /// Straight-line flight with arena wrap; expired projectiles are dropped.
    pub fn update(&mut self, bounds: &Bounds) {
        for p in &mut self.items {
            p.pos = bounds.wrap_edge(p.pos + p.vel);
            p.lifetime = p.lifetime.saturating_sub(1);
        }
        self.items.retain(Projectile::alive);
    }

    /// `(position, velocity)` of hostile projectiles, for incoming-threat scans.
    pub fn hostile(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.items
            .iter()
            .filter(|p| !p.owner.is_friendly())
            .map(|p| (p.pos, p.vel))
    }

    /// `(position, velocity)` of player and allied projectiles.
    pub fn friendly(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.items
            .iter()
            .filter(|p| p.owner.is_friendly())
            .map(|p| (p.pos, p.vel))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawns_at_muzzle_with_owner_speed() {
        let mut p = Projectiles::new();
        p.fire(Owner::Hostile, None, Vec2::new(100.0, 100.0), 0.0, 22.0);
        let shot = p.items[0];
        assert_eq!(shot.pos, Vec2::new(122.0, 100.0));
        assert!((shot.vel.x - 7.0).abs() < 1e-6);
    }

    #[test]
    fn expires_after_lifetime() {
        let b = Bounds::new(1200.0, 600.0);
        let mut p = Projectiles::new();
        p.fire(Owner::Allied, None, Vec2::new(600.0, 300.0), 1.0, 20.0);
        for _ in 0..PROJECTILE_LIFETIME - 1 {
            p.update(&b);
        }
        assert_eq!(p.len(), 1);
        p.update(&b);
        assert!(p.is_empty());
    }

    #[test]
    fn wraps_at_edge() {
        let b = Bounds::new(1200.0, 600.0);
        let mut p = Projectiles::new();
        p.fire(Owner::Player, None, Vec2::new(1180.0, 300.0), 0.0, 20.0);
        p.update(&b);
        // 1200 + 8 is past the right edge
        assert_eq!(p.items[0].pos.x, 0.0);
    }

    #[test]
    fn friendly_filter() {
        let mut p = Projectiles::new();
        p.fire(Owner::Player, None, Vec2::ZERO, 0.0, 1.0);
        p.fire(Owner::Hostile, None, Vec2::ZERO, 0.0, 1.0);
        p.fire(Owner::Allied, None, Vec2::ZERO, 0.0, 1.0);
        assert_eq!(p.friendly().count(), 2);
        assert_eq!(p.hostile().count(), 1);
    }
}
