//! Read-only presentation export. The engine draws nothing; a host renderer pulls
//! [`VisualState`] for overlays and [`CraftInstance`] for GPU instancing.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::arbitration::Behavior;
use crate::arena::Arena;
use crate::combat::FirePattern;
use crate::ecs::components::{
    CraftKind, Heading, Health, PhaseState, Position, Pursuit, Shield, Wing,
};
use crate::phase::Phase;
use crate::squad::role::Role;

/// Everything a renderer needs to draw one craft and its debug overlay.
#[derive(Debug, Clone)]
pub struct VisualState {
    pub entity: hecs::Entity,
    pub kind: CraftKind,
    pub pos: Vec2,
    pub angle: f32,
    pub phase: Phase,
    pub health_ratio: f32,
    pub shielded: bool,
    pub role: Option<Role>,
    pub is_alpha: bool,
    pub is_follower: bool,
    /// Active allied behavior; `None` for hostiles.
    pub behavior: Option<Behavior>,
    /// Running squad pattern names, alpha only.
    pub patterns: Vec<&'static str>,
    /// Boss firing pattern.
    pub fire_pattern: Option<FirePattern>,
    /// Formation slot the craft is steering for (debug overlay).
    pub slot: Option<Vec2>,
    pub healing: bool,
}

/// Per-instance data uploaded to the GPU each frame.
/// Stride = 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CraftInstance {
    pub position: [f32; 2],
    pub angle: f32,
    pub size: f32,
    /// RGBA packed as u32.
    pub color: u32,
    /// 0 allied, 1 basic, 2 advanced, 3 boss.
    pub kind: u32,
    /// Bit 0 shield, bit 1 alpha, bit 2 healing flash.
    pub flags: u32,
    /// Phase number 1-3.
    pub phase: u32,
}

pub const FLAG_SHIELD: u32 = 1;
pub const FLAG_ALPHA: u32 = 1 << 1;
pub const FLAG_HEALING: u32 = 1 << 2;

impl CraftInstance {
    pub fn from_visual(v: &VisualState) -> Self {
        let mut flags = 0;
        if v.shielded {
            flags |= FLAG_SHIELD;
        }
        if v.is_alpha {
            flags |= FLAG_ALPHA;
        }
        if v.healing {
            flags |= FLAG_HEALING;
        }
        Self {
            position: v.pos.into(),
            angle: v.angle,
            size: v.kind.stats().size,
            color: color(v.kind, v.phase),
            kind: v.kind as u32,
            flags,
            phase: u32::from(v.phase.number()),
        }
    }
}

/// Hull tint: cyan allies, red basic, purple advanced, boss reddening by phase.
fn color(kind: CraftKind, phase: Phase) -> u32 {
    match kind {
        CraftKind::Allied => 0x00ff_ffff,
        CraftKind::Basic => 0xff44_44ff,
        CraftKind::Advanced => 0xaa44_ffff,
        CraftKind::Boss => match phase {
            Phase::One => 0xff64_64ff,
            Phase::Two => 0xff53_53ff,
            Phase::Three => 0xff42_42ff,
        },
    }
}

impl Arena {
    /// Visual state for every craft, allies first, in processing order.
    pub fn visuals(&self) -> Vec<VisualState> {
        let mut out = Vec::with_capacity(self.allies.len() + self.hostiles.len());
        for &e in &self.allies {
            let Ok(mut q) = self
                .world
                .query_one::<(&Position, &Heading, &Health, &PhaseState, &Shield, &Wing)>(e)
            else {
                continue;
            };
            let Some((pos, heading, health, phase, shield, wing)) = q.get() else {
                continue;
            };
            let is_alpha = self.squad.is_alpha(e);
            let patterns = if is_alpha { self.squad_patterns() } else { Vec::new() };
            out.push(VisualState {
                entity: e,
                kind: CraftKind::Allied,
                pos: pos.0,
                angle: heading.angle,
                phase: phase.phase,
                health_ratio: health.ratio(),
                shielded: shield.active,
                role: wing.role,
                is_alpha,
                is_follower: self.squad.alpha.is_some() && !is_alpha,
                behavior: Some(wing.behavior),
                patterns,
                fire_pattern: None,
                slot: wing.pattern_slot.or(wing.side_flank).or(wing.slot.map(|s| s.pos)),
                healing: wing.healing_effect > 0,
            });
        }
        for &e in &self.hostiles {
            let Ok(mut q) = self
                .world
                .query_one::<(&CraftKind, &Position, &Heading, &Health, &Shield, &Pursuit)>(e)
            else {
                continue;
            };
            let Some((kind, pos, heading, health, shield, pursuit)) = q.get() else {
                continue;
            };
            out.push(VisualState {
                entity: e,
                kind: *kind,
                pos: pos.0,
                angle: heading.angle,
                phase: pursuit.boss.map_or_else(|| Phase::of(health), |b| b.phase),
                health_ratio: health.ratio(),
                shielded: shield.active,
                role: None,
                is_alpha: false,
                is_follower: false,
                behavior: None,
                patterns: Vec::new(),
                fire_pattern: pursuit.boss.map(|b| b.pattern),
                slot: None,
                healing: false,
            });
        }
        out
    }

    /// GPU instance buffer contents, same order as [`Arena::visuals`].
    pub fn instances(&self) -> Vec<CraftInstance> {
        self.visuals().iter().map(CraftInstance::from_visual).collect()
    }

    fn squad_patterns(&self) -> Vec<&'static str> {
        let mut names = vec![self.squad.formation.label()];
        if self.squad.sequence.kind != crate::squad::sequence::SequenceKind::None {
            names.push(self.squad.sequence.kind.label());
        }
        if self.squad.flank.pattern != crate::squad::maneuver::FlankPattern::None {
            names.push(self.squad.flank.pattern.label());
        }
        names
    }
}
