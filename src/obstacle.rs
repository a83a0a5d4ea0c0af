use std::f32::consts::TAU;

use glam::Vec2;

use crate::geometry::{heading_vec, Bounds};

const MIN_SPEED: f32 = 1.0;
const MAX_SPEED: f32 = 3.0;
const MIN_SIZE: f32 = 30.0;
const MAX_SIZE: f32 = 60.0;
/// Spin is drawn from [-MAX_SPIN, MAX_SPIN).
const MAX_SPIN: f32 = 0.05;
/// Outline radius jitter, either way.
const OUTLINE_JITTER: f32 = 5.0;

/// A drifting rock. The outline is cosmetic; collisions use `radius`.
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub radius: f32,
    pub rotation: f32,
    pub spin: f32,
    /// Vertex offsets in the obstacle's local frame.
    pub outline: Vec<Vec2>,
}

impl Obstacle {
    /// New obstacle on a random arena edge, drifting in a random direction.
    pub fn spawn(bounds: &Bounds, rng: &mut fastrand::Rng) -> Self {
        let pos = match rng.u8(0..4) {
            0 => Vec2::new(rng.f32() * bounds.width, 0.0),
            1 => Vec2::new(bounds.width, rng.f32() * bounds.height),
            2 => Vec2::new(rng.f32() * bounds.width, bounds.height),
            _ => Vec2::new(0.0, rng.f32() * bounds.height),
        };
        Self::at(pos, rng)
    }

    pub fn at(pos: Vec2, rng: &mut fastrand::Rng) -> Self {
        let speed = MIN_SPEED + rng.f32() * (MAX_SPEED - MIN_SPEED);
        let vel = heading_vec(rng.f32() * TAU) * speed;
        let size = MIN_SIZE + rng.f32() * (MAX_SIZE - MIN_SIZE);
        let vertices = rng.usize(8..12);
        let outline = (0..vertices)
            .map(|i| {
                let a = TAU * i as f32 / vertices as f32;
                let r = size / 2.0 + (rng.f32() - 0.5) * 2.0 * OUTLINE_JITTER;
                heading_vec(a) * r
            })
            .collect();
        Self {
            pos,
            vel,
            size,
            radius: size / 2.0,
            rotation: 0.0,
            spin: (rng.f32() - 0.5) * 2.0 * MAX_SPIN,
            outline,
        }
    }

    pub fn update(&mut self, bounds: &Bounds) {
        self.pos = bounds.wrap_with_margin(self.pos + self.vel, self.size);
        self.rotation += self.spin;
    }

    /// Push directly away from `from`.
    pub fn repel_from(&mut self, from: Vec2, force: f32) {
        let offset = self.pos - from;
        if offset.length_squared() > 0.0 {
            self.vel += offset.normalize() * force;
        }
    }
}

/// The obstacle field. Destroyed obstacles are replaced up to `minimum`.
#[derive(Debug)]
pub struct Obstacles {
    pub items: Vec<Obstacle>,
    pub minimum: usize,
}

impl Obstacles {
    pub fn new(minimum: usize, bounds: &Bounds, rng: &mut fastrand::Rng) -> Self {
        let mut field = Self {
            items: Vec::with_capacity(minimum + 4),
            minimum,
        };
        field.refill(bounds, rng);
        field
    }

    pub fn update(&mut self, bounds: &Bounds) {
        for o in &mut self.items {
            o.update(bounds);
        }
    }

    /// Spawn edge obstacles until the field is back at its minimum.
    pub fn refill(&mut self, bounds: &Bounds, rng: &mut fastrand::Rng) {
        while self.items.len() < self.minimum {
            self.items.push(Obstacle::spawn(bounds, rng));
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.items.iter().map(|o| o.pos)
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
    fn spawned_obstacles_stay_in_range() {
        let b = Bounds::new(1200.0, 600.0);
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..200 {
            let o = Obstacle::spawn(&b, &mut rng);
            assert!(o.size >= MIN_SIZE && o.size < MAX_SIZE);
            assert!((o.radius - o.size / 2.0).abs() < 1e-6);
            let speed = o.vel.length();
            assert!(speed >= MIN_SPEED - 1e-4 && speed <= MAX_SPEED + 1e-4);
            assert!((8..=11).contains(&o.outline.len()));
            assert!(o.spin.abs() <= MAX_SPIN);
            let on_edge =
                o.pos.x == 0.0 || o.pos.y == 0.0 || o.pos.x == b.width || o.pos.y == b.height;
            assert!(on_edge);
        }
    }

    #[test]
    fn wraps_with_size_margin() {
        let b = Bounds::new(1200.0, 600.0);
        let mut rng = fastrand::Rng::with_seed(2);
        let mut o = Obstacle::at(Vec2::new(-40.0, 300.0), &mut rng);
        o.size = 40.0;
        o.vel = Vec2::new(-1.0, 0.0);
        o.update(&b);
        assert_eq!(o.pos.x, 1240.0);
    }

    #[test]
    fn refill_restores_minimum() {
        let b = Bounds::new(1200.0, 600.0);
        let mut rng = fastrand::Rng::with_seed(5);
        let mut field = Obstacles::new(5, &b, &mut rng);
        field.items.truncate(2);
        field.refill(&b, &mut rng);
        assert_eq!(field.len(), 5);
    }
}
