use glam::Vec2;

use crate::geometry::{bearing, Bounds};

/// Projectiles farther than this are ignored by incoming-threat prediction.
pub const INCOMING_SCAN_RADIUS: f32 = 300.0;
/// Time-to-contact horizon in ticks (two seconds).
pub const INCOMING_HORIZON: f32 = 120.0;
/// Relative speeds below this are treated as stationary.
const MIN_RELATIVE_SPEED: f32 = 0.1;

/// Where to aim so a projectile meets a moving target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadSolution {
    pub point: Vec2,
    pub bearing: f32,
}

/// Extrapolate `target_pos` by its velocity over the projectile's flight time.
///
/// Returns `None` when the target is outside `max_range`. A non-positive projectile
/// speed gives no lead correction (the target's current position).
pub fn predict_lead(
    shooter: Vec2,
    target_pos: Vec2,
    target_vel: Vec2,
    projectile_speed: f32,
    max_range: f32,
    bounds: &Bounds,
) -> Option<LeadSolution> {
    let distance = shooter.distance(target_pos);
    if distance > max_range {
        return None;
    }
    let point = if projectile_speed > f32::EPSILON {
        bounds.wrap_point(target_pos + target_vel * (distance / projectile_speed))
    } else {
        target_pos
    };
    Some(LeadSolution {
        point,
        bearing: bearing(shooter, point),
    })
}

/// A projectile predicted to pass through the craft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomingThreat {
    /// Index into the slice the caller scanned.
    pub index: usize,
    pub time_to_contact: f32,
    pub distance: f32,
    /// Bearing from the craft to the projectile.
    pub bearing: f32,
    /// `1 / (time_to_contact + 1)`.
    pub threat_level: f32,
}

/// Find the incoming projectile with the least time-to-contact.
///
/// Each candidate is `(position, velocity)`. A projectile counts when it is within
/// [`INCOMING_SCAN_RADIUS`], its closest approach lies in `(0, horizon)` ticks, and its
/// extrapolated position at that time falls within `contact_radius` of the craft.
pub fn predict_incoming(
    craft_pos: Vec2,
    craft_vel: Vec2,
    contact_radius: f32,
    projectiles: impl IntoIterator<Item = (Vec2, Vec2)>,
    horizon: f32,
) -> Option<IncomingThreat> {
    let mut best: Option<IncomingThreat> = None;
    for (index, (pos, vel)) in projectiles.into_iter().enumerate() {
        let offset = pos - craft_pos;
        let distance = offset.length();
        if distance > INCOMING_SCAN_RADIUS {
            continue;
        }
        let rel = vel - craft_vel;
        let rel_speed_sq = rel.length_squared();
        if rel_speed_sq < MIN_RELATIVE_SPEED * MIN_RELATIVE_SPEED {
            continue;
        }
        let t = -offset.dot(rel) / rel_speed_sq;
        if !(t > 0.0 && t < horizon) {
            continue;
        }
        if best.as_ref().is_some_and(|b| t >= b.time_to_contact) {
            continue;
        }
        let predicted = pos + vel * t;
        if predicted.distance(craft_pos) < contact_radius {
            best = Some(IncomingThreat {
                index,
                time_to_contact: t,
                distance,
                bearing: bearing(craft_pos, pos),
                threat_level: 1.0 / (t + 1.0),
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_point_is_wrapped() {
        let b = Bounds::new(1200.0, 600.0);
        let lead = predict_lead(
            Vec2::new(1100.0, 300.0),
            Vec2::new(1180.0, 300.0),
            Vec2::new(4.0, 0.0),
            8.0,
            250.0,
            &b,
        )
        .unwrap();
        // 80 px at speed 8 -> 10 ticks -> +40 px -> 1220 wraps to 20
        assert!((lead.point.x - 20.0).abs() < 1e-3);
    }

    #[test]
    fn lead_out_of_range_is_none() {
        let b = Bounds::new(1200.0, 600.0);
        let far = Vec2::new(300.0, 0.0);
        assert!(predict_lead(Vec2::ZERO, far, Vec2::ZERO, 8.0, 250.0, &b).is_none());
    }

    #[test]
    fn zero_projectile_speed_aims_straight() {
        let b = Bounds::new(1200.0, 600.0);
        let lead = predict_lead(
            Vec2::new(100.0, 100.0),
            Vec2::new(200.0, 100.0),
            Vec2::new(3.0, 3.0),
            0.0,
            250.0,
            &b,
        )
        .unwrap();
        assert_eq!(lead.point, Vec2::new(200.0, 100.0));
        assert!(lead.bearing.abs() < 1e-6);
    }

    #[test]
    fn head_on_projectile_fifty_ticks_out() {
        // 100 px away closing at 2 px/tick -> contact in 50 ticks
        let threat = predict_incoming(
            Vec2::new(500.0, 300.0),
            Vec2::ZERO,
            40.0,
            [(Vec2::new(600.0, 300.0), Vec2::new(-2.0, 0.0))],
            INCOMING_HORIZON,
        )
        .unwrap();
        assert!((threat.time_to_contact - 50.0).abs() < 1e-3);
        assert!((threat.threat_level - 1.0 / 51.0).abs() < 1e-6);
    }

    #[test]
    fn zero_relative_speed_is_no_threat() {
        let threat = predict_incoming(
            Vec2::new(500.0, 300.0),
            Vec2::new(3.0, 0.0),
            40.0,
            [(Vec2::new(510.0, 300.0), Vec2::new(3.0, 0.0))],
            INCOMING_HORIZON,
        );
        assert!(threat.is_none());
    }

    #[test]
    fn receding_projectile_is_ignored() {
        let threat = predict_incoming(
            Vec2::new(500.0, 300.0),
            Vec2::ZERO,
            40.0,
            [(Vec2::new(600.0, 300.0), Vec2::new(7.0, 0.0))],
            INCOMING_HORIZON,
        );
        assert!(threat.is_none());
    }

    #[test]
    fn soonest_projectile_wins() {
        let threat = predict_incoming(
            Vec2::ZERO,
            Vec2::ZERO,
            40.0,
            [
                (Vec2::new(200.0, 0.0), Vec2::new(-7.0, 0.0)),
                (Vec2::new(0.0, 70.0), Vec2::new(0.0, -7.0)),
            ],
            INCOMING_HORIZON,
        )
        .unwrap();
        assert_eq!(threat.index, 1);
    }
}
