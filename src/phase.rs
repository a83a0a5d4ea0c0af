//! Health-ratio combat phases and the shield windows they drive.

use crate::ecs::components::{Health, PhaseState, Shield};

/// Ticks the phase-change flash stays visible.
pub const TRANSITION_TICKS: u32 = 60;
/// Forced shield on entering phase 1 or 2.
const TRANSITION_SHIELD_TICKS: u32 = 30;
/// Forced shield on entering phase 3.
const TRANSITION_SHIELD_TICKS_CRITICAL: u32 = 45;

/// Health-derived combat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    One = 1,
    Two = 2,
    Three = 3,
}

impl Phase {
    /// Classify a health ratio: above 0.66 is phase 1, at or below one third is phase 3.
    pub fn from_ratio(ratio: f32) -> Self {
        let ratio = ratio.clamp(0.0, 1.0);
        if ratio > 0.66 {
            Phase::One
        } else if ratio > 1.0 / 3.0 {
            Phase::Two
        } else {
            Phase::Three
        }
    }

    /// Boss ladder: phase 1 above 60%, phase 3 at or below 30%.
    pub fn boss_from_ratio(ratio: f32) -> Self {
        if ratio > 0.6 {
            Phase::One
        } else if ratio > 0.3 {
            Phase::Two
        } else {
            Phase::Three
        }
    }

    pub fn of(health: &Health) -> Self {
        Self::from_ratio(health.ratio())
    }

    /// Incoming-damage scale.
    pub fn damage_multiplier(self) -> f32 {
        match self {
            Phase::One => 1.0,
            Phase::Two => 0.75,
            Phase::Three => 0.5,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Per-tick opportunistic shield roll: (chance, duration, cooldown).
    fn shield_proc(self) -> Option<(f32, u32, u32)> {
        match self {
            Phase::One => None,
            Phase::Two => Some((0.01, 75, 300)),
            Phase::Three => Some((0.02, 90, 240)),
        }
    }
}

/// Per-tick phase upkeep: count down the flash timer, then [`reclassify`].
pub fn update_phase(health: &Health, state: &mut PhaseState, shield: &mut Shield) -> Option<Phase> {
    if state.transition_timer > 0 {
        state.transition_timer -= 1;
    }
    reclassify(health, state, shield)
}

/// Reclassify the phase; on change start the flash timer and force the shield on.
/// Returns the new phase when it changed. Call after any health change.
pub fn reclassify(health: &Health, state: &mut PhaseState, shield: &mut Shield) -> Option<Phase> {
    if health.max <= 0.0 {
        return None;
    }
    let next = Phase::of(health);
    if next == state.phase {
        return None;
    }
    state.phase = next;
    state.transition_timer = TRANSITION_TICKS;
    shield.active = true;
    shield.duration = if next == Phase::Three {
        TRANSITION_SHIELD_TICKS_CRITICAL
    } else {
        TRANSITION_SHIELD_TICKS
    };
    Some(next)
}

/// Count down the active window, then roll for an opportunistic shield from phase 2 on.
pub fn update_shield(phase: Phase, shield: &mut Shield, rng: &mut fastrand::Rng) {
    if shield.duration > 0 {
        shield.duration -= 1;
        shield.active = true;
    } else {
        shield.active = false;
    }

    if shield.cooldown > 0 {
        shield.cooldown -= 1;
        return;
    }
    if shield.active {
        return;
    }
    if let Some((chance, duration, cooldown)) = phase.shield_proc() {
        if rng.f32() < chance {
            shield.active = true;
            shield.duration = duration;
            shield.cooldown = cooldown;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(current: f32, max: f32) -> Health {
        Health { current, max }
    }

    #[test]
    fn one_third_is_phase_three() {
        assert_eq!(Phase::of(&health(1.0, 3.0)), Phase::Three);
    }

    #[test]
    fn two_thirds_is_phase_one() {
        assert_eq!(Phase::of(&health(2.0, 3.0)), Phase::One);
        assert_eq!(Phase::from_ratio(0.66), Phase::Two);
        assert_eq!(Phase::from_ratio(0.5), Phase::Two);
    }

    #[test]
    fn full_and_empty() {
        assert_eq!(Phase::of(&health(3.0, 3.0)), Phase::One);
        assert_eq!(Phase::of(&health(0.0, 3.0)), Phase::Three);
    }

    #[test]
    fn damage_scales_by_phase() {
        assert_eq!(Phase::One.damage_multiplier(), 1.0);
        assert_eq!(Phase::Two.damage_multiplier(), 0.75);
        assert_eq!(Phase::Three.damage_multiplier(), 0.5);
    }

    #[test]
    fn transition_forces_shield() {
        let mut state = PhaseState::default();
        let mut shield = Shield::default();
        let changed = update_phase(&health(1.0, 3.0), &mut state, &mut shield);
        assert_eq!(changed, Some(Phase::Three));
        assert!(shield.active);
        assert_eq!(shield.duration, 45);
        assert_eq!(state.transition_timer, TRANSITION_TICKS);

        // Same classification next tick: no new event, timer ticks down.
        assert_eq!(update_phase(&health(1.0, 3.0), &mut state, &mut shield), None);
        assert_eq!(state.transition_timer, TRANSITION_TICKS - 1);
    }

    #[test]
    fn reclassify_keeps_running_timer() {
        let mut state = PhaseState {
            phase: Phase::Two,
            transition_timer: 10,
        };
        let mut shield = Shield::default();
        assert_eq!(reclassify(&health(1.5, 3.0), &mut state, &mut shield), None);
        assert_eq!(state.transition_timer, 10);
        assert!(!shield.active);
    }

    #[test]
    fn shield_window_expires() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mut shield = Shield {
            active: true,
            duration: 2,
            cooldown: 50,
        };
        update_shield(Phase::One, &mut shield, &mut rng);
        update_shield(Phase::One, &mut shield, &mut rng);
        assert!(shield.active);
        update_shield(Phase::One, &mut shield, &mut rng);
        assert!(!shield.active);
        assert_eq!(shield.cooldown, 47);
    }

    #[test]
    fn phase_one_never_procs() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut shield = Shield::default();
        for _ in 0..5000 {
            update_shield(Phase::One, &mut shield, &mut rng);
        }
        assert!(!shield.active);
    }

    #[test]
    fn phase_three_eventually_procs_with_cooldown() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut shield = Shield::default();
        let mut procced = false;
        for _ in 0..5000 {
            update_shield(Phase::Three, &mut shield, &mut rng);
            if shield.active {
                procced = true;
                break;
            }
        }
        assert!(procced);
        assert_eq!(shield.duration, 90);
        assert_eq!(shield.cooldown, 240);
    }
}
