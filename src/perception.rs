use glam::Vec2;

use crate::geometry::{angle_diff, bearing};

/// A candidate that passed a proximity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting<T> {
    pub item: T,
    pub distance: f32,
    /// Bearing from the observer to the item.
    pub bearing: f32,
}

/// Closest candidate strictly inside `radius` and strictly inside a forward cone of
/// `half_angle` around `heading`. Earlier candidates win ties.
pub fn nearest_in_cone<T>(
    origin: Vec2,
    heading: f32,
    candidates: impl IntoIterator<Item = (T, Vec2)>,
    radius: f32,
    half_angle: f32,
) -> Option<Sighting<T>> {
    let mut best: Option<Sighting<T>> = None;
    for (item, pos) in candidates {
        let distance = origin.distance(pos);
        if distance >= radius {
            continue;
        }
        let to = bearing(origin, pos);
        if angle_diff(heading, to).abs() >= half_angle {
            continue;
        }
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(Sighting {
                item,
                distance,
                bearing: to,
            });
        }
    }
    best
}

/// Closest candidate strictly inside `radius`, ignoring facing.
/// Candidates sitting exactly on the origin are skipped (no bearing).
pub fn nearest_within<T>(
    origin: Vec2,
    candidates: impl IntoIterator<Item = (T, Vec2)>,
    radius: f32,
) -> Option<Sighting<T>> {
    let mut best: Option<Sighting<T>> = None;
    for (item, pos) in candidates {
        let distance = origin.distance(pos);
        if distance <= 0.0 || distance >= radius {
            continue;
        }
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(Sighting {
                item,
                distance,
                bearing: bearing(origin, pos),
            });
        }
    }
    best
}

/// Whether any candidate lies strictly inside `radius`.
pub fn any_within(origin: Vec2, mut candidates: impl Iterator<Item = Vec2>, radius: f32) -> bool {
    candidates.any(|p| origin.distance(p) < radius)
}

/// Count of candidates strictly inside `radius`.
pub fn count_within(origin: Vec2, candidates: impl Iterator<Item = Vec2>, radius: f32) -> usize {
    candidates.filter(|p| origin.distance(*p) < radius).count()
}
