//! Flanking geometry: side flank for followers near the target, and the alpha's
//! two multi-craft patterns.

use std::f32::consts::PI;

use glam::Vec2;

use crate::geometry::{bearing, heading_vec};

/// Side flanking kicks in when the alpha is this close to its target.
pub const SIDE_FLANK_TRIGGER: f32 = 200.0;
const SIDE_FLANK_DISTANCE: f32 = 150.0;
/// Hammer-and-anvil is chosen beyond this distance, scissors inside it.
const HAMMER_MIN_DISTANCE: f32 = 200.0;
const SCISSORS_MAX_DISTANCE: f32 = 300.0;
const ANVIL_DISTANCE: f32 = 120.0;
const SCISSORS_DISTANCE: f32 = 150.0;
const SCISSORS_STEP: f32 = 30.0;
/// Hammer-and-anvil: the alpha closes until this distance.
pub const HAMMER_CLOSE_DISTANCE: f32 = 150.0;

/// Side-flank slot for follower `index`: beside the target, even indices on the left.
pub fn side_flank(alpha_pos: Vec2, target_pos: Vec2, index: usize) -> Option<Vec2> {
    if alpha_pos.distance(target_pos) >= SIDE_FLANK_TRIGGER {
        return None;
    }
    let side = if index % 2 == 0 { -PI / 2.0 } else { PI / 2.0 };
    let angle = bearing(alpha_pos, target_pos) + side;
    Some(target_pos + heading_vec(angle) * SIDE_FLANK_DISTANCE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlankPattern {
    #[default]
    None,
    HammerAnvil,
    Scissors,
}

impl FlankPattern {
    pub fn label(self) -> &'static str {
        match self {
            FlankPattern::None => "none",
            FlankPattern::HammerAnvil => "hammer-anvil",
            FlankPattern::Scissors => "scissors",
        }
    }

    /// Pattern for an alpha `distance` from its target with `followers` in tow.
    pub fn choose(distance: f32, followers: usize) -> Self {
        if followers < 2 {
            FlankPattern::None
        } else if distance > HAMMER_MIN_DISTANCE {
            FlankPattern::HammerAnvil
        } else if distance < SCISSORS_MAX_DISTANCE {
            FlankPattern::Scissors
        } else {
            FlankPattern::None
        }
    }
}

/// Per-follower pattern slots, in follower order.
pub fn pattern_slots(
    pattern: FlankPattern,
    alpha_pos: Vec2,
    target_pos: Vec2,
    followers: usize,
) -> Vec<Vec2> {
    match pattern {
        FlankPattern::None => Vec::new(),
        FlankPattern::HammerAnvil => {
            // Far side of the target as seen from the hammer.
            let rear = bearing(alpha_pos, target_pos);
            (0..followers)
                .map(|i| {
                    let offset = if i % 2 == 0 { -PI / 4.0 } else { PI / 4.0 };
                    target_pos + heading_vec(rear + offset) * ANVIL_DISTANCE
                })
                .collect()
        }
        FlankPattern::Scissors => {
            let approach = bearing(alpha_pos, target_pos);
            let split = followers.div_ceil(2);
            (0..followers)
                .map(|i| {
                    let (angle, rank) = if i < split {
                        (approach - PI / 2.0, i)
                    } else {
                        (approach + PI / 2.0, i - split)
                    };
                    let dist = SCISSORS_DISTANCE + rank as f32 * SCISSORS_STEP;
                    target_pos + heading_vec(angle) * dist
                })
                .collect()
        }
    }
}

/// Elapsed ticks for the running pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlankState {
    pub pattern: FlankPattern,
    pub timer: u32,
}

impl FlankState {
    pub fn step(&mut self, pattern: FlankPattern) {
        if pattern != self.pattern {
            self.pattern = pattern;
            self.timer = 0;
        }
        if pattern != FlankPattern::None {
            self.timer += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_flank_only_when_close() {
        let target = Vec2::new(300.0, 0.0);
        assert!(side_flank(Vec2::ZERO, target, 0).is_none());
        let left = side_flank(Vec2::new(150.0, 0.0), target, 0).unwrap();
        assert!(left.distance(Vec2::new(300.0, -150.0)) < 1e-3);
        let right = side_flank(Vec2::new(150.0, 0.0), target, 1).unwrap();
        assert!(right.distance(Vec2::new(300.0, 150.0)) < 1e-3);
    }

    #[test]
    fn pattern_choice() {
        assert_eq!(FlankPattern::choose(250.0, 2), FlankPattern::HammerAnvil);
        assert_eq!(FlankPattern::choose(120.0, 3), FlankPattern::Scissors);
        assert_eq!(FlankPattern::choose(120.0, 1), FlankPattern::None);
    }

    #[test]
    fn anvil_slots_sit_behind_target() {
        let target = Vec2::new(500.0, 0.0);
        let slots = pattern_slots(FlankPattern::HammerAnvil, Vec2::ZERO, target, 2);
        for s in &slots {
            assert!((s.distance(target) - ANVIL_DISTANCE).abs() < 1e-3);
            // Behind the target from the alpha's side.
            assert!(s.x > target.x);
        }
        assert!(slots[0].y < 0.0 && slots[1].y > 0.0);
    }

    #[test]
    fn scissors_groups_take_opposite_sides() {
        let target = Vec2::new(200.0, 0.0);
        let slots = pattern_slots(FlankPattern::Scissors, Vec2::ZERO, target, 3);
        assert!(slots[0].distance(Vec2::new(200.0, -150.0)) < 1e-3);
        assert!(slots[1].distance(Vec2::new(200.0, -180.0)) < 1e-3);
        assert!(slots[2].distance(Vec2::new(200.0, 150.0)) < 1e-3);
    }
}
