//! Squad target selection and multi-target distribution.

use std::cmp::Ordering;

use glam::Vec2;

/// How the alpha spreads the squad across hostiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum TargetMode {
    /// Everyone on the single best target.
    #[default]
    Focus,
    /// Alpha takes the best target, followers fan out over the rest.
    Split,
    /// Ranked list handed out one per follower.
    Prioritize,
}

impl TargetMode {
    pub fn label(self) -> &'static str {
        match self {
            TargetMode::Focus => "focus",
            TargetMode::Split => "split",
            TargetMode::Prioritize => "prioritize",
        }
    }

    pub fn next(self) -> Self {
        match self {
            TargetMode::Focus => TargetMode::Split,
            TargetMode::Split => TargetMode::Prioritize,
            TargetMode::Prioritize => TargetMode::Focus,
        }
    }
}

/// A hostile as the squad sees it.
#[derive(Debug, Clone, Copy)]
pub struct TargetCandidate {
    pub entity: hecs::Entity,
    pub pos: Vec2,
    pub is_boss: bool,
    /// `(max - current) / max`.
    pub damage_fraction: f32,
}

/// Inverse-distance priority, boosted for bosses and for already-damaged hulls.
fn priority(from: Vec2, c: &TargetCandidate, boss_weight: f32, with_damage: bool) -> f32 {
    let mut score = 1.0 / (from.distance(c.pos) + 1.0);
    if c.is_boss {
        score *= boss_weight;
    }
    if with_damage {
        score *= 1.0 + c.damage_fraction;
    }
    score
}

fn best_by(
    from: Vec2,
    candidates: &[TargetCandidate],
    radius: f32,
    boss_weight: f32,
    with_damage: bool,
) -> Option<hecs::Entity> {
    let mut best: Option<(hecs::Entity, f32)> = None;
    for c in candidates {
        if from.distance(c.pos) >= radius {
            continue;
        }
        let s = priority(from, c, boss_weight, with_damage);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((c.entity, s));
        }
    }
    best.map(|(e, _)| e)
}

/// The alpha's own pick: best hostile inside `radius`.
pub fn squad_target(
    alpha_pos: Vec2,
    candidates: &[TargetCandidate],
    radius: f32,
) -> Option<hecs::Entity> {
    best_by(alpha_pos, candidates, radius, 1.5, true)
}

/// Target handed to one follower. `None` fields leave the follower's current value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Assignment {
    pub assigned: Option<hecs::Entity>,
    pub attack: Option<hecs::Entity>,
}

/// Outcome of a distribution pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Distribution {
    pub alpha: Option<hecs::Entity>,
    /// One entry per follower, in follower order. `None` means untouched.
    pub followers: Vec<Option<Assignment>>,
}

/// Spread `followers` craft across the hostiles inside `radius` of the alpha.
pub fn distribute(
    mode: TargetMode,
    alpha_pos: Vec2,
    candidates: &[TargetCandidate],
    radius: f32,
    followers: usize,
) -> Distribution {
    let mut out = Distribution {
        alpha: None,
        followers: vec![None; followers],
    };

    match mode {
        TargetMode::Focus => {
            if let Some(best) = best_by(alpha_pos, candidates, radius, 2.0, true) {
                out.alpha = Some(best);
                let all = Assignment {
                    assigned: Some(best),
                    attack: Some(best),
                };
                out.followers.iter_mut().for_each(|f| *f = Some(all));
            }
        }
        TargetMode::Split => {
            let available: Vec<&TargetCandidate> = candidates
                .iter()
                .filter(|c| alpha_pos.distance(c.pos) < radius)
                .collect();
            if available.len() > 1 {
                out.alpha = best_by(alpha_pos, candidates, radius, 1.5, false);
                for (i, f) in out.followers.iter_mut().enumerate() {
                    if available.len() > i + 1 {
                        let t = available[(i + 1) % available.len()].entity;
                        *f = Some(Assignment {
                            assigned: Some(t),
                            attack: Some(t),
                        });
                    }
                }
            }
        }
        TargetMode::Prioritize => {
            let mut ranked: Vec<(hecs::Entity, f32)> = candidates
                .iter()
                .filter(|c| alpha_pos.distance(c.pos) < radius)
                .map(|c| (c.entity, priority(alpha_pos, c, 2.0, true)))
                .collect();
            // Stable sort keeps collection order among equal priorities.
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            if let Some(&(top, _)) = ranked.first() {
                out.alpha = Some(top);
                for (i, f) in out.followers.iter_mut().enumerate() {
                    if let Some(&(t, _)) = ranked.get(i + 1) {
                        *f = Some(Assignment {
                            assigned: Some(t),
                            attack: Some(top),
                        });
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with(n: usize) -> (hecs::World, Vec<hecs::Entity>) {
        let mut world = hecs::World::new();
        let ents = (0..n).map(|_| world.spawn(())).collect();
        (world, ents)
    }

    fn cand(entity: hecs::Entity, x: f32, is_boss: bool) -> TargetCandidate {
        TargetCandidate {
            entity,
            pos: Vec2::new(x, 0.0),
            is_boss,
            damage_fraction: 0.0,
        }
    }

    #[test]
    fn boss_outweighs_slightly_closer_basic() {
        let (_w, e) = world_with(2);
        let c = [cand(e[0], 100.0, false), cand(e[1], 120.0, true)];
        assert_eq!(squad_target(Vec2::ZERO, &c, 300.0), Some(e[1]));
    }

    #[test]
    fn nothing_in_radius() {
        let (_w, e) = world_with(1);
        assert_eq!(squad_target(Vec2::ZERO, &[cand(e[0], 400.0, false)], 300.0), None);
    }

    #[test]
    fn focus_gives_everyone_the_same_target() {
        let (_w, e) = world_with(2);
        let c = [cand(e[0], 50.0, false), cand(e[1], 200.0, false)];
        let d = distribute(TargetMode::Focus, Vec2::ZERO, &c, 300.0, 3);
        assert_eq!(d.alpha, Some(e[0]));
        assert!(d.followers.iter().all(|f| f.map(|a| a.assigned) == Some(Some(e[0]))));
    }

    #[test]
    fn split_needs_two_targets() {
        let (_w, e) = world_with(3);
        let one = [cand(e[0], 50.0, false)];
        assert_eq!(distribute(TargetMode::Split, Vec2::ZERO, &one, 300.0, 2), Distribution {
            alpha: None,
            followers: vec![None, None],
        });

        let c = [cand(e[0], 50.0, false), cand(e[1], 80.0, false), cand(e[2], 90.0, false)];
        let d = distribute(TargetMode::Split, Vec2::ZERO, &c, 300.0, 3);
        assert_eq!(d.followers[0].and_then(|a| a.assigned), Some(e[1]));
        assert_eq!(d.followers[1].and_then(|a| a.assigned), Some(e[2]));
        assert_eq!(d.followers[2], None);
    }

    #[test]
    fn prioritize_keeps_formation_on_top_target() {
        let (_w, e) = world_with(2);
        let c = [cand(e[0], 200.0, false), cand(e[1], 50.0, false)];
        let d = distribute(TargetMode::Prioritize, Vec2::ZERO, &c, 300.0, 1);
        assert_eq!(d.alpha, Some(e[1]));
        assert_eq!(
            d.followers[0],
            Some(Assignment {
                assigned: Some(e[0]),
                attack: Some(e[1]),
            })
        );
    }
}
