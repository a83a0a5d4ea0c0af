//! Per-tick autonomous behaviour engine for a wrap-around asteroids arena: allied
//! squad coordination, hostile pursuit and fire control, and the collision rules
//! that tie them together. Rendering, audio and input belong to the host.

pub mod advisor;
pub mod arbitration;
pub mod arena;
pub mod combat;
pub mod config;
pub mod debug;
pub mod ecs;
pub mod events;
pub mod flock;
pub mod geometry;
pub mod obstacle;
pub mod perception;
pub mod phase;
pub mod projectile;
pub mod spatial;
pub mod spawn;
pub mod squad;
pub mod threat;
pub mod visual;
