//! Escort modes: positions held relative to a protected craft instead of a formation slot.

use std::f32::consts::PI;

use glam::Vec2;

use crate::geometry::{bearing, heading_vec, normalize_angle};

pub const ESCORT_DISTANCE: f32 = 100.0;
const GUARD_RADIUS: f32 = 120.0;
pub const PATROL_RADIUS: f32 = 200.0;
/// Patrol ring angular speed, radians per second of simulation time.
const PATROL_RATE: f32 = 0.5;
const COVER_DISTANCE: f32 = 150.0;
const INTERCEPT_SELF_RANGE: f32 = 300.0;
const INTERCEPT_PROTECT_RANGE: f32 = 200.0;
/// Assumed closing speed when estimating an intercept point.
const INTERCEPT_SPEED: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum EscortMode {
    #[default]
    None,
    Escort,
    Guard,
    Patrol,
    Intercept,
    Cover,
}

impl EscortMode {
    pub fn label(self) -> &'static str {
        match self {
            EscortMode::None => "none",
            EscortMode::Escort => "escort",
            EscortMode::Guard => "guard",
            EscortMode::Patrol => "patrol",
            EscortMode::Intercept => "intercept",
            EscortMode::Cover => "cover",
        }
    }

    pub fn next(self) -> Self {
        match self {
            EscortMode::None => EscortMode::Escort,
            EscortMode::Escort => EscortMode::Guard,
            EscortMode::Guard => EscortMode::Patrol,
            EscortMode::Patrol => EscortMode::Intercept,
            EscortMode::Intercept => EscortMode::Cover,
            EscortMode::Cover => EscortMode::None,
        }
    }
}

/// Position and facing an escort mode asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscortGoal {
    pub pos: Vec2,
    pub heading: f32,
    /// Hostile being intercepted, when the mode is intercept.
    pub intercept: Option<hecs::Entity>,
}

/// A body the escort logic reads.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: f32,
}

/// Everything an escort decision looks at, for one allied craft.
pub struct EscortContext<'a> {
    pub me: Body,
    pub is_alpha: bool,
    /// The active player, if any.
    pub player: Option<Body>,
    pub alpha_pos: Option<Vec2>,
    /// Squad attack target position (guard centre).
    pub attack_target: Option<Vec2>,
    /// Index among the allies patrolling this centre, and their count.
    pub patrol_index: usize,
    pub patrol_count: usize,
    pub hostiles: &'a [(hecs::Entity, Body)],
    pub tick: u64,
}

/// Escort goal for one craft, or `None` when the mode has nothing to say this tick.
pub fn goal(mode: EscortMode, ctx: &EscortContext<'_>) -> Option<EscortGoal> {
    let simple = |pos: Vec2, heading: f32| {
        Some(EscortGoal {
            pos,
            heading: normalize_angle(heading),
            intercept: None,
        })
    };

    match mode {
        EscortMode::None => None,
        EscortMode::Escort => {
            let player = ctx.player?;
            if ctx.me.pos.distance(player.pos) <= ESCORT_DISTANCE * 1.5 {
                return None;
            }
            simple(player.pos - heading_vec(player.angle) * ESCORT_DISTANCE, player.angle)
        }
        EscortMode::Guard => {
            if !ctx.is_alpha {
                return None;
            }
            let target = ctx.attack_target?;
            // The alpha is the only guard, so it always takes the first ring angle.
            let angle = 0.0f32;
            simple(target + heading_vec(angle) * GUARD_RADIUS, angle + PI)
        }
        EscortMode::Patrol => {
            if ctx.is_alpha {
                return None;
            }
            let center = ctx.alpha_pos.unwrap_or(ctx.me.pos);
            let seconds = ctx.tick as f32 / 60.0;
            let base = (seconds * PATROL_RATE) % (2.0 * PI);
            let count = ctx.patrol_count.max(1) as f32;
            let angle = base + ctx.patrol_index as f32 * 2.0 * PI / count;
            simple(center + heading_vec(angle) * PATROL_RADIUS, angle + PI / 2.0)
        }
        EscortMode::Intercept => {
            let protect = ctx.player.map_or(ctx.me.pos, |p| p.pos);
            let mut nearest: Option<(hecs::Entity, Body, f32)> = None;
            for &(e, body) in ctx.hostiles {
                let d = ctx.me.pos.distance(body.pos);
                if d < INTERCEPT_SELF_RANGE
                    && protect.distance(body.pos) < INTERCEPT_PROTECT_RANGE
                    && nearest.map_or(true, |(_, _, best)| d < best)
                {
                    nearest = Some((e, body, d));
                }
            }
            let (e, body, d) = nearest?;
            let point = body.pos + body.vel * (d / INTERCEPT_SPEED);
            Some(EscortGoal {
                pos: point,
                heading: bearing(ctx.me.pos, body.pos),
                intercept: Some(e),
            })
        }
        EscortMode::Cover => {
            let player = ctx.player?;
            simple(player.pos - heading_vec(player.angle) * COVER_DISTANCE, player.angle + PI)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(x: f32, y: f32, angle: f32) -> Body {
        Body {
            pos: Vec2::new(x, y),
            vel: Vec2::ZERO,
            angle,
        }
    }

    fn ctx<'a>(
        me: Body,
        player: Option<Body>,
        hostiles: &'a [(hecs::Entity, Body)],
    ) -> EscortContext<'a> {
        EscortContext {
            me,
            is_alpha: false,
            player,
            alpha_pos: None,
            attack_target: None,
            patrol_index: 0,
            patrol_count: 1,
            hostiles,
            tick: 0,
        }
    }

    #[test]
    fn escort_only_when_far() {
        let player = body(500.0, 300.0, 0.0);
        let near = ctx(body(450.0, 300.0, 0.0), Some(player), &[]);
        assert!(goal(EscortMode::Escort, &near).is_none());
        let far = ctx(body(100.0, 300.0, 0.0), Some(player), &[]);
        let g = goal(EscortMode::Escort, &far).unwrap();
        assert!(g.pos.distance(Vec2::new(400.0, 300.0)) < 1e-3);
    }

    #[test]
    fn cover_faces_away_from_player() {
        let c = ctx(body(0.0, 0.0, 0.0), Some(body(500.0, 300.0, 0.0)), &[]);
        let g = goal(EscortMode::Cover, &c).unwrap();
        assert!(g.pos.distance(Vec2::new(350.0, 300.0)) < 1e-3);
        assert!((g.heading - PI).abs() < 1e-5);
    }

    #[test]
    fn patrol_rings_the_alpha() {
        let mut c = ctx(body(0.0, 0.0, 0.0), None, &[]);
        c.alpha_pos = Some(Vec2::new(600.0, 300.0));
        c.patrol_index = 1;
        c.patrol_count = 2;
        let g = goal(EscortMode::Patrol, &c).unwrap();
        assert!((g.pos.distance(Vec2::new(600.0, 300.0)) - PATROL_RADIUS).abs() < 1e-3);
        // Tick 0, second of two slots: half a turn round the ring.
        assert!(g.pos.distance(Vec2::new(400.0, 300.0)) < 1e-3);
    }

    #[test]
    fn intercept_needs_threat_near_protectee() {
        let mut world = hecs::World::new();
        let e = world.spawn(());
        let hostiles = [(e, Body {
            pos: Vec2::new(150.0, 0.0),
            vel: Vec2::new(-2.0, 0.0),
            angle: PI,
        })];
        let c = ctx(body(0.0, 0.0, 0.0), None, &hostiles);
        let g = goal(EscortMode::Intercept, &c).unwrap();
        assert_eq!(g.intercept, Some(e));
        // 150 / 5 = 30 ticks of lead at -2 px/tick.
        assert!(g.pos.distance(Vec2::new(90.0, 0.0)) < 1e-3);

        let far_player = ctx(body(0.0, 0.0, 0.0), Some(body(900.0, 0.0, 0.0)), &hostiles);
        assert!(goal(EscortMode::Intercept, &far_player).is_none());
    }

    #[test]
    fn guard_is_alpha_only() {
        let mut c = ctx(body(0.0, 0.0, 0.0), None, &[]);
        c.attack_target = Some(Vec2::new(300.0, 300.0));
        assert!(goal(EscortMode::Guard, &c).is_none());
        c.is_alpha = true;
        let g = goal(EscortMode::Guard, &c).unwrap();
        assert!(g.pos.distance(Vec2::new(420.0, 300.0)) < 1e-3);
    }
}
