//! Boids-style steering for allied craft, with tighter defensive variants while
//! hostiles are close, and the mutual-protection bearing.

use std::f32::consts::PI;

use glam::Vec2;

use crate::geometry::{angle_diff, bearing, normalize_angle};

/// Neighbours farther than this are ignored.
pub const FLOCK_RADIUS: f32 = 150.0;
const SEPARATION: f32 = 60.0;
const ALIGNMENT_RADIUS: f32 = 100.0;
const COHESION_RADIUS: f32 = 120.0;
const DEFENSIVE_SEPARATION: f32 = 25.0;
const DEFENSIVE_COHESION: f32 = 60.0;
/// Share of the separation turn applied in defensive mode.
const DEFENSIVE_SEPARATION_BLEND: f32 = 0.2;
/// Allies below this share of their cap get escorted first.
const LOW_HEALTH_RATIO: f32 = 0.5;
/// Hostile attack range used to decide whether an ally is threatened.
pub const HOSTILE_ATTACK_RANGE: f32 = 300.0;

/// Another allied craft, as the flock sees it.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub pos: Vec2,
    pub angle: f32,
    pub health: f32,
    pub max_health: f32,
}

/// Heading the flock wants and how strongly to blend it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockSteer {
    pub angle: f32,
    pub weight: f32,
}

/// Flocking heading for a craft at `pos` facing `angle`. `neighbors` excludes the craft itself.
///
/// Priority: escort a badly hurt ally (defensive only), then separation, then cohesion
/// (circling the local centre when defending in a group), then alignment. With nothing
/// nearby the current heading is kept.
pub fn flock(
    pos: Vec2,
    angle: f32,
    neighbors: &[Neighbor],
    enemies_near: bool,
    flock_weight: f32,
    defensive_weight: f32,
) -> FlockSteer {
    let (separation_dist, cohesion_radius, weight) = if enemies_near {
        (DEFENSIVE_SEPARATION, DEFENSIVE_COHESION, defensive_weight)
    } else {
        (SEPARATION, COHESION_RADIUS, flock_weight)
    };

    let mut weakest: Option<(Vec2, f32)> = None;
    let mut separation = Vec2::ZERO;
    let mut separation_count = 0usize;
    let mut alignment = Vec2::ZERO;
    let mut alignment_count = 0usize;
    let mut cohesion = Vec2::ZERO;
    let mut cohesion_count = 0usize;

    for n in neighbors {
        let offset = n.pos - pos;
        let d = offset.length();
        if d <= 0.0 || d >= FLOCK_RADIUS {
            continue;
        }
        if enemies_near
            && n.health < n.max_health * LOW_HEALTH_RATIO
            && weakest.map_or(true, |(_, h)| n.health < h)
        {
            weakest = Some((n.pos, n.health));
        }
        if d < separation_dist {
            let force = if enemies_near { 0.5 / d } else { 1.0 / d };
            separation -= offset / d * force;
            separation_count += 1;
        }
        if d < ALIGNMENT_RADIUS {
            alignment += Vec2::from_angle(n.angle);
            alignment_count += 1;
        }
        if d < cohesion_radius {
            cohesion += n.pos;
            cohesion_count += 1;
        }
    }

    let alignment_angle = (alignment_count > 0).then(|| alignment.y.atan2(alignment.x));

    let steer = if let Some((ally, _)) = weakest {
        bearing(pos, ally)
    } else if separation_count > 0 {
        let away = separation.y.atan2(separation.x);
        if enemies_near {
            angle + angle_diff(angle, away) * DEFENSIVE_SEPARATION_BLEND
        } else {
            away
        }
    } else if cohesion_count > 0 {
        let center = cohesion / cohesion_count as f32;
        let to_center = bearing(pos, center);
        if enemies_near {
            if cohesion_count >= 2 {
                to_center + PI / 2.0
            } else {
                to_center
            }
        } else {
            alignment_angle.unwrap_or(to_center)
        }
    } else if let Some(a) = alignment_angle {
        a
    } else {
        angle
    };

    FlockSteer {
        angle: normalize_angle(steer),
        weight,
    }
}

/// Bearing toward the ally most threatened by a hostile inside that hostile's attack
/// range. Threat is `1 / (d + 1)` on the hostile-to-ally distance. With no threatened
/// ally but enemies near, heads for the nearest ally instead.
pub fn protection_bearing(
    pos: Vec2,
    allies: &[Vec2],
    hostiles: &[Vec2],
    enemies_near: bool,
) -> Option<f32> {
    if hostiles.is_empty() {
        return None;
    }

    let mut nearest: Option<(Vec2, f32)> = None;
    let mut threatened: Option<(Vec2, f32)> = None;
    for &ally in allies {
        let d = pos.distance(ally);
        if d >= FLOCK_RADIUS {
            continue;
        }
        if nearest.map_or(true, |(_, best)| d < best) {
            nearest = Some((ally, d));
        }
        for &hostile in hostiles {
            let to_ally = hostile.distance(ally);
            if to_ally >= HOSTILE_ATTACK_RANGE {
                continue;
            }
            let threat = 1.0 / (to_ally + 1.0);
            if threatened.map_or(true, |(_, best)| threat > best) {
                threatened = Some((ally, threat));
            }
        }
    }

    if let Some((ally, _)) = threatened {
        return Some(bearing(pos, ally));
    }
    match nearest {
        Some((ally, _)) if enemies_near => Some(bearing(pos, ally)),
        _ => None,
    }
}
