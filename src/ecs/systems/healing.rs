use glam::Vec2;

use crate::arena::Arena;
use crate::ecs::components::{Health, PhaseState, Position, Shield, Wing};
use crate::events::SimEvent;
use crate::phase::{self, Phase};

/// Contact distance between a wounded craft and a healthy one.
pub const HEALING_RANGE: f32 = 30.0;
pub const HEALING_COOLDOWN: u32 = 180;
/// Ticks the heal flash stays visible.
pub const HEALING_EFFECT_TICKS: u32 = 30;

/// Phase-three allied craft touching a phase-one ally regain one health point.
pub fn update(arena: &mut Arena) {
    let Arena {
        world, allies, events, ..
    } = arena;

    // (entity, position, phase, alive)
    let roster: Vec<(hecs::Entity, Vec2, Phase, bool)> = allies
        .iter()
        .filter_map(|&e| {
            let mut q = world.query_one::<(&Position, &PhaseState, &Health)>(e).ok()?;
            let (pos, phase, health) = q.get()?;
            Some((e, pos.0, phase.phase, health.current > 0.0))
        })
        .collect();

    for &(e, pos, phase, alive) in &roster {
        if phase != Phase::Three || !alive {
            continue;
        }
        let touching = roster.iter().any(|&(other, p, ph, ok)| {
            other != e && ok && ph == Phase::One && pos.distance(p) < HEALING_RANGE
        });
        if !touching {
            continue;
        }
        let Ok((health, wing, state, shield)) =
            world.query_one_mut::<(&mut Health, &mut Wing, &mut PhaseState, &mut Shield)>(e)
        else {
            continue;
        };
        if wing.healing_cooldown > 0 {
            continue;
        }
        health.heal(1.0);
        wing.healing_cooldown = HEALING_COOLDOWN;
        wing.healing_effect = HEALING_EFFECT_TICKS;
        log::debug!("Craft {e:?} healed to {:.1}", health.current);
        events.push(SimEvent::Healed {
            entity: e,
            health: health.current,
        });
        if let Some(next) = phase::reclassify(health, state, shield) {
            events.push(SimEvent::PhaseChanged { entity: e, phase: next });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::squad::SquadToggles;

    fn pair() -> Arena {
        let a = Arena::new(&SimConfig {
            seed: Some(3),
            allied_count: 2,
            hostile_count: 0,
            boss_count: 0,
            obstacle_count: 0,
            squad: SquadToggles {
                enabled: false,
                ..SquadToggles::default()
            },
            ..SimConfig::default()
        });
        let (x, y) = (a.allies[0], a.allies[1]);
        a.world.get::<&mut Position>(x).unwrap().0 = Vec2::new(200.0, 200.0);
        a.world.get::<&mut Position>(y).unwrap().0 = Vec2::new(220.0, 200.0);
        a.world.get::<&mut Health>(x).unwrap().current = 0.8;
        a.world.get::<&mut PhaseState>(x).unwrap().phase = Phase::Three;
        a
    }

    #[test]
    fn contact_heals_once_per_cooldown() {
        let mut a = pair();
        let x = a.allies[0];
        update(&mut a);
        assert!((a.world.get::<&Health>(x).unwrap().current - 1.8).abs() < 1e-6);
        assert_eq!(a.world.get::<&Wing>(x).unwrap().healing_cooldown, HEALING_COOLDOWN);
        update(&mut a);
        assert!((a.world.get::<&Health>(x).unwrap().current - 1.8).abs() < 1e-6);
    }

    #[test]
    fn heal_reclassifies_phase() {
        let mut a = pair();
        let x = a.allies[0];
        update(&mut a);
        // 1.8 / 3 is phase two
        assert_eq!(a.world.get::<&PhaseState>(x).unwrap().phase, Phase::Two);
        assert!(a.world.get::<&Shield>(x).unwrap().active);
        assert!(a
            .events
            .iter()
            .any(|ev| *ev == SimEvent::PhaseChanged { entity: x, phase: Phase::Two }));
        let visual = a.visuals().into_iter().find(|v| v.entity == x).unwrap();
        assert_eq!(visual.phase, Phase::Two);
    }

    #[test]
    fn no_heal_out_of_contact() {
        let mut a = pair();
        let (x, y) = (a.allies[0], a.allies[1]);
        a.world.get::<&mut Position>(y).unwrap().0 = Vec2::new(240.0, 200.0);
        update(&mut a);
        assert_eq!(a.world.get::<&Health>(x).unwrap().current, 0.8);
    }
}
