//! Closed-form formation slots around the alpha.

use std::f32::consts::PI;

use glam::Vec2;

use crate::geometry::{heading_vec, normalize_angle, rotate_offset};

/// Arrowhead arm angle off the alpha's tail.
const ARROWHEAD_SPREAD: f32 = 60.0 * PI / 180.0;
const ARROWHEAD_DISTANCE: f32 = 80.0;
const ARROWHEAD_ROW_STEP: f32 = 40.0;
const LINE_SPACING: f32 = 60.0;
const CIRCLE_RADIUS: f32 = 100.0;
const DIAMOND_SIZE: f32 = 80.0;
const WEDGE_SPREAD: f32 = 30.0 * PI / 180.0;
const WEDGE_DISTANCE: f32 = 60.0;
const WEDGE_ROW_STEP: f32 = 30.0;

/// Follower layout relative to the alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum FormationKind {
    #[default]
    Arrowhead,
    Line,
    Circle,
    Diamond,
    Wedge,
}

impl FormationKind {
    pub const ALL: [FormationKind; 5] = [
        FormationKind::Arrowhead,
        FormationKind::Line,
        FormationKind::Circle,
        FormationKind::Diamond,
        FormationKind::Wedge,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormationKind::Arrowhead => "arrowhead",
            FormationKind::Line => "line",
            FormationKind::Circle => "circle",
            FormationKind::Diamond => "diamond",
            FormationKind::Wedge => "wedge",
        }
    }

    pub fn next(self) -> Self {
        match self {
            FormationKind::Arrowhead => FormationKind::Line,
            FormationKind::Line => FormationKind::Circle,
            FormationKind::Circle => FormationKind::Diamond,
            FormationKind::Diamond => FormationKind::Wedge,
            FormationKind::Wedge => FormationKind::Arrowhead,
        }
    }
}

/// Desired position and facing for one follower.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub pos: Vec2,
    pub heading: f32,
}

/// Slot for follower `index` of `count` around an alpha at `alpha_pos` facing `alpha_angle`.
///
/// Returns `None` when there are no followers or the index is out of range.
pub fn slot(
    kind: FormationKind,
    alpha_pos: Vec2,
    alpha_angle: f32,
    index: usize,
    count: usize,
) -> Option<Slot> {
    if count == 0 || index >= count {
        return None;
    }
    let i = index as f32;
    let n = count as f32;
    let behind = |angle: f32, dist: f32| alpha_pos - heading_vec(angle) * dist;

    let (pos, heading) = match kind {
        FormationKind::Arrowhead => {
            let offset = if index % 2 == 0 { -ARROWHEAD_SPREAD } else { ARROWHEAD_SPREAD };
            let row = (index / 2) as f32;
            let dist = ARROWHEAD_DISTANCE + row * ARROWHEAD_ROW_STEP;
            (behind(alpha_angle + offset, dist), alpha_angle)
        }
        FormationKind::Line => {
            let offset = (i - (n - 1.0) / 2.0) * LINE_SPACING;
            (alpha_pos + heading_vec(alpha_angle + PI / 2.0) * offset, alpha_angle)
        }
        FormationKind::Circle => {
            let angle = alpha_angle + PI + i * (2.0 * PI / n);
            (alpha_pos + heading_vec(angle) * CIRCLE_RADIUS, angle + PI)
        }
        FormationKind::Diamond => {
            let local = match index {
                0 => Vec2::new(0.0, -DIAMOND_SIZE),
                1 => Vec2::new(DIAMOND_SIZE, 0.0),
                2 => Vec2::new(0.0, DIAMOND_SIZE),
                3 => Vec2::new(-DIAMOND_SIZE, 0.0),
                _ => {
                    let outer = (i - 4.0) * (2.0 * PI / (n - 4.0));
                    heading_vec(outer) * (DIAMOND_SIZE * 1.5)
                }
            };
            (alpha_pos + rotate_offset(local, alpha_angle), alpha_angle)
        }
        FormationKind::Wedge => {
            let offset = if index % 2 == 0 { -WEDGE_SPREAD } else { WEDGE_SPREAD };
            let dist = WEDGE_DISTANCE + (index / 2) as f32 * WEDGE_ROW_STEP;
            (behind(alpha_angle + offset, dist), alpha_angle)
        }
    };

    Some(Slot {
        pos,
        heading: normalize_angle(heading),
    })
}
