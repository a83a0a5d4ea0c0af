//! Notifications drained by the host once per frame (audio cues, score display,
//! game-over handling).

use crate::ecs::components::CraftKind;
use crate::phase::Phase;
use crate::squad::formation::FormationKind;

/// Who pulled the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Faction {
    Player,
    Allied,
    Hostile,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// A projectile left a muzzle. One event per volley.
    Fired {
        shooter: Option<hecs::Entity>,
        faction: Faction,
    },
    CraftDestroyed {
        entity: hecs::Entity,
        kind: CraftKind,
        bounty: u32,
    },
    AlphaElected(hecs::Entity),
    AlphaRelinquished(hecs::Entity),
    FormationChanged(FormationKind),
    SquadSplit {
        at: usize,
    },
    SquadMerged,
    PhaseChanged {
        entity: hecs::Entity,
        phase: Phase,
    },
    Healed {
        entity: hecs::Entity,
        health: f32,
    },
    PlayerDestroyed,
    ObstacleDestroyed,
}

/// Per-tick event queue. The host drains it; nothing inside the engine reads it back.
#[derive(Debug, Default)]
pub struct Events {
    queue: Vec<SimEvent>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        self.queue.push(event);
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, SimEvent> {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.queue.iter()
    }
}
