//! Allied squad coordination: alpha election, feature toggles, and the per-alpha
//! counters the submodules advance.

pub mod escort;
pub mod formation;
pub mod maneuver;
pub mod role;
pub mod sequence;
pub mod targeting;
pub mod transition;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ecs::components::{Health, PhaseState, Position, Shield, Velocity, Wing};
use crate::events::{Events, SimEvent};
use crate::geometry::Bounds;
use crate::phase::Phase;

use escort::EscortMode;
use formation::FormationKind;
use maneuver::FlankState;
use role::Role;
use sequence::SequenceState;
use targeting::TargetMode;
use transition::{Adaptive, Morph, SplitState};

/// Alpha health cap multiplier while it leads.
pub const ALPHA_HEALTH_BONUS: f32 = 1.25;

// ---------------------------------------------------------------------------
// Toggles
// ---------------------------------------------------------------------------

/// Host-controlled switches for every squad feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadToggles {
    /// Master switch for alpha coordination.
    pub enabled: bool,
    pub formation: FormationKind,
    pub auto_roles: bool,
    pub adaptive_formation: bool,
    pub target_mode: TargetMode,
    pub escort: EscortMode,
    pub attack_sequences: bool,
    pub formation_transitions: bool,
    pub advanced_flanking: bool,
    /// Pin the alpha to arena centre during integration.
    pub anchor_alpha: bool,
}

impl Default for SquadToggles {
    fn default() -> Self {
        Self {
            enabled: true,
            formation: FormationKind::Arrowhead,
            auto_roles: true,
            adaptive_formation: false,
            target_mode: TargetMode::Focus,
            escort: EscortMode::None,
            attack_sequences: true,
            formation_transitions: true,
            advanced_flanking: true,
            anchor_alpha: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Election
// ---------------------------------------------------------------------------

/// What the election heuristic looks at for one craft.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub phase: Phase,
    pub health: Health,
    pub pos: Vec2,
    pub shield_ready: bool,
    pub role: Option<Role>,
    pub recently_healed: bool,
    pub following: bool,
}

/// Weighted suitability for leading the squad. Higher is better.
pub fn election_score(c: &Candidate, bounds: &Bounds) -> f32 {
    let mut score = match c.phase {
        Phase::One => 200.0,
        Phase::Two => 50.0,
        Phase::Three => -30.0,
    };
    score += c.health.ratio() * 100.0;
    score += c.health.current * 15.0;

    let max_distance = bounds.half_diagonal();
    if max_distance > 0.0 {
        let proximity = 1.0 - (c.pos.distance(bounds.center()) / max_distance).min(1.0);
        score += proximity * 30.0;
    }

    if c.shield_ready {
        score += 20.0;
    }
    score += match c.role {
        None | Some(Role::Dps) => 10.0,
        Some(Role::Support) => 5.0,
        Some(_) => 0.0,
    };
    if c.recently_healed {
        score -= 15.0;
    }
    if !c.following {
        score += 5.0;
    }
    if c.phase == Phase::Three {
        score += (c.health.current - 0.5) * 20.0;
    }
    score
}

fn candidate(world: &hecs::World, e: hecs::Entity) -> Option<Candidate> {
    let mut q = world
        .query_one::<(&Health, &PhaseState, &Position, &Shield, &Wing)>(e)
        .ok()?;
    let (health, phase, pos, shield, wing) = q.get()?;
    Some(Candidate {
        phase: phase.phase,
        health: *health,
        pos: pos.0,
        shield_ready: shield.cooldown == 0,
        role: wing.role,
        recently_healed: wing.healing_cooldown > 0,
        following: wing.slot.is_some() || wing.side_flank.is_some() || wing.pattern_slot.is_some(),
    })
}

/// Pick the best-scoring craft. Falls back to the healthiest, then the first live one.
pub fn elect(
    world: &hecs::World,
    allies: &[hecs::Entity],
    bounds: &Bounds,
) -> Option<hecs::Entity> {
    let mut best: Option<(hecs::Entity, f32)> = None;
    for &e in allies {
        let Some(c) = candidate(world, e) else {
            continue;
        };
        let s = election_score(&c, bounds);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((e, s));
        }
    }
    if let Some((e, _)) = best {
        return Some(e);
    }

    let mut healthiest: Option<(hecs::Entity, f32)> = None;
    for &e in allies {
        if let Ok(h) = world.get::<&Health>(e) {
            if healthiest.map_or(true, |(_, best)| h.current > best) {
                healthiest = Some((e, h.current));
            }
        }
    }
    healthiest
        .map(|(e, _)| e)
        .or_else(|| allies.iter().copied().find(|&e| world.contains(e)))
}

// ---------------------------------------------------------------------------
// Squad
// ---------------------------------------------------------------------------

/// The allied squad: explicit leader reference plus per-alpha pattern counters.
#[derive(Debug, Clone, Default)]
pub struct Squad {
    pub alpha: Option<hecs::Entity>,
    pub formation: FormationKind,
    pub adaptive: Adaptive,
    pub morph: Morph,
    pub split: SplitState,
    pub sequence: SequenceState,
    pub flank: FlankState,
}

impl Squad {
    pub fn new(formation: FormationKind) -> Self {
        Self {
            formation,
            ..Self::default()
        }
    }

    /// Return the current alpha, electing one first if there is none.
    /// Calling this again while an alpha exists changes nothing.
    pub fn ensure_alpha(
        &mut self,
        world: &mut hecs::World,
        allies: &[hecs::Entity],
        bounds: &Bounds,
        events: &mut Events,
    ) -> Option<hecs::Entity> {
        if let Some(alpha) = self.alpha {
            if world.contains(alpha) && allies.contains(&alpha) {
                return Some(alpha);
            }
            self.alpha = None;
            self.reset_counters();
        }

        let elected = elect(world, allies, bounds)?;
        crown(world, elected, bounds);
        self.alpha = Some(elected);
        events.push(SimEvent::AlphaElected(elected));
        log::info!("Alpha elected: {elected:?}");
        Some(elected)
    }

    /// Step the alpha down, restoring its pre-election health cap exactly.
    pub fn relinquish(&mut self, world: &mut hecs::World, events: &mut Events) {
        let Some(alpha) = self.alpha.take() else {
            return;
        };
        self.reset_counters();
        if let Ok((wing, health)) = world.query_one_mut::<(&mut Wing, &mut Health)>(alpha) {
            if let Some(base) = wing.base_max_health.take() {
                health.set_max(base);
            }
            events.push(SimEvent::AlphaRelinquished(alpha));
            log::info!("Alpha relinquished: {alpha:?}");
        }
    }

    /// Drop a leader reference that no longer points at a live squad member.
    pub fn reconcile(&mut self, world: &hecs::World, allies: &[hecs::Entity]) {
        if let Some(alpha) = self.alpha {
            if !world.contains(alpha) || !allies.contains(&alpha) {
                log::info!("Alpha {alpha:?} lost");
                self.alpha = None;
                self.reset_counters();
            }
        }
    }

    pub fn is_alpha(&self, e: hecs::Entity) -> bool {
        self.alpha == Some(e)
    }

    /// Allies other than the alpha, in collection order.
    pub fn followers(&self, allies: &[hecs::Entity]) -> Vec<hecs::Entity> {
        allies
            .iter()
            .copied()
            .filter(|&e| Some(e) != self.alpha)
            .collect()
    }

    fn reset_counters(&mut self) {
        self.adaptive = Adaptive::default();
        self.morph = Morph::default();
        self.split = SplitState::default();
        self.sequence.reset();
        self.flank = FlankState::default();
    }
}

/// Apply the leader bonus and move the new alpha to arena centre at rest.
fn crown(world: &mut hecs::World, e: hecs::Entity, bounds: &Bounds) {
    if let Ok((wing, health, pos, vel)) =
        world.query_one_mut::<(&mut Wing, &mut Health, &mut Position, &mut Velocity)>(e)
    {
        let base = *wing.base_max_health.get_or_insert(health.max);
        health.set_max(base * ALPHA_HEALTH_BONUS);
        wing.attack_target = None;
        wing.assigned_target = None;
        wing.side_flank = None;
        wing.pattern_slot = None;
        pos.0 = bounds.center();
        vel.0 = Vec2::ZERO;
    }
}
