use glam::Vec2;

use crate::ecs::components::Heading;
use crate::geometry::{angle_diff, heading_vec, normalize_angle, Bounds};

/// Velocity decay per tick, shared by every craft.
pub const FRICTION: f32 = 0.98;
/// Heading errors below this are left alone.
pub const HEADING_DEADBAND: f32 = 0.1;

/// One fixed step toward the commanded heading. Sign only, never proportional.
pub fn rotate_toward(heading: &mut Heading, step: f32) {
    let diff = angle_diff(heading.angle, heading.target);
    if diff.abs() > HEADING_DEADBAND {
        heading.angle = normalize_angle(heading.angle + step * diff.signum());
    }
}

/// Unconditional single step toward the commanded heading.
pub fn rotate_once(heading: &mut Heading, step: f32) {
    let diff = angle_diff(heading.angle, heading.target);
    if diff != 0.0 {
        heading.angle = normalize_angle(heading.angle + step * diff.signum());
    }
}

/// Turn by `direction` steps (-1, 0 or 1).
pub fn rotate_by(angle: f32, direction: f32, step: f32) -> f32 {
    normalize_angle(angle + direction * step)
}

/// Add `power * scale` along `angle`.
pub fn thrust(vel: &mut Vec2, angle: f32, power: f32, scale: f32) {
    *vel += heading_vec(angle) * power * scale;
}

/// Rescale uniformly so the speed never exceeds `max_speed`.
pub fn clamp_speed(vel: Vec2, max_speed: f32) -> Vec2 {
    let speed = vel.length();
    if speed > max_speed && speed > 0.0 {
        vel * (max_speed / speed)
    } else {
        vel
    }
}

/// Friction, speed clamp, move, then wrap at the arena edge.
pub fn integrate(pos: &mut Vec2, vel: &mut Vec2, max_speed: f32, bounds: &Bounds) {
    *vel = clamp_speed(*vel * FRICTION, max_speed);
    *pos = bounds.wrap_edge(*pos + *vel);
}
