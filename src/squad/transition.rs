//! Formation changes over time: the adaptive rule ladder, gradual morphing, and
//! splitting the followers into two groups.

use crate::phase::Phase;
use crate::squad::formation::FormationKind;

/// Ticks between adaptive formation switches.
pub const FORMATION_SWITCH_COOLDOWN: u32 = 300;
/// Morph progress gained per tick (one second to complete).
const MORPH_RATE: f32 = 1.0 / 60.0;
/// Threat level above which the squad closes into a circle.
const MORPH_THREAT: f32 = 0.7;
/// Ticks a split lasts before the groups merge.
pub const MERGE_TICKS: u32 = 180;

/// What the adaptive ladder looks at.
#[derive(Debug, Clone, Copy)]
pub struct SquadReading {
    pub enemies_near: bool,
    pub enemy_count: usize,
    /// Mean follower health ratio; 1.0 without followers.
    pub follower_health: f32,
    pub alpha_phase: Phase,
}

/// First matching rule wins.
pub fn recommend(r: &SquadReading) -> FormationKind {
    if r.enemies_near && r.enemy_count >= 2 {
        FormationKind::Circle
    } else if r.enemy_count >= 3 {
        FormationKind::Line
    } else if r.enemy_count == 1 {
        FormationKind::Diamond
    } else if r.follower_health < 0.5 {
        FormationKind::Circle
    } else {
        match r.alpha_phase {
            Phase::Three => FormationKind::Circle,
            Phase::Two => FormationKind::Diamond,
            Phase::One => FormationKind::Arrowhead,
        }
    }
}

/// Adaptive switching with a cooldown between changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adaptive {
    pub cooldown: u32,
}

impl Default for Adaptive {
    fn default() -> Self {
        Self {
            cooldown: FORMATION_SWITCH_COOLDOWN,
        }
    }
}

impl Adaptive {
    /// Returns the new formation when a switch happens this tick.
    pub fn step(
        &mut self,
        current: FormationKind,
        reading: &SquadReading,
    ) -> Option<FormationKind> {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }
        let next = recommend(reading);
        if next == current {
            return None;
        }
        self.cooldown = FORMATION_SWITCH_COOLDOWN;
        Some(next)
    }
}

/// Formation the morph rules want, if any.
pub fn morph_goal(threat_level: f32, enemy_count: usize) -> Option<FormationKind> {
    if threat_level > MORPH_THREAT {
        Some(FormationKind::Circle)
    } else if enemy_count >= 3 {
        Some(FormationKind::Line)
    } else if enemy_count == 1 {
        Some(FormationKind::Diamond)
    } else {
        None
    }
}

/// Gradual change toward a goal formation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Morph {
    pub target: Option<FormationKind>,
    pub progress: f32,
}

impl Morph {
    /// Advance toward `goal`. Returns the goal once the morph completes.
    pub fn step(
        &mut self,
        current: FormationKind,
        goal: Option<FormationKind>,
    ) -> Option<FormationKind> {
        let Some(goal) = goal.filter(|g| *g != current) else {
            *self = Self::default();
            return None;
        };
        if self.target != Some(goal) {
            self.target = Some(goal);
            self.progress = 0.0;
        }
        self.progress += MORPH_RATE;
        if self.progress >= 1.0 - 1e-4 {
            *self = Self::default();
            return Some(goal);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitEvent {
    /// Followers `[0, at)` form group one, the rest group two.
    Split { at: usize },
    Merge,
}

/// Split/merge bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitState {
    pub active: bool,
    pub merge_timer: u32,
    pub at: usize,
}

impl SplitState {
    pub fn step(&mut self, enemy_count: usize, followers: usize) -> Option<SplitEvent> {
        if enemy_count == 0 {
            let was = self.active;
            *self = Self::default();
            return was.then_some(SplitEvent::Merge);
        }
        if followers < 2 {
            return None;
        }
        let mut event = None;
        if !self.active && enemy_count >= 2 {
            self.active = true;
            self.merge_timer = 0;
            self.at = followers.div_ceil(2);
            event = Some(SplitEvent::Split { at: self.at });
        }
        if self.active {
            self.merge_timer += 1;
            if self.merge_timer >= MERGE_TICKS || enemy_count < 2 {
                *self = Self::default();
                event = Some(SplitEvent::Merge);
            }
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(enemy_count: usize) -> SquadReading {
        SquadReading {
            enemies_near: false,
            enemy_count,
            follower_health: 1.0,
            alpha_phase: Phase::One,
        }
    }

    #[test]
    fn ladder_order() {
        assert_eq!(recommend(&reading(0)), FormationKind::Arrowhead);
        assert_eq!(recommend(&reading(1)), FormationKind::Diamond);
        assert_eq!(recommend(&reading(3)), FormationKind::Line);
        let mut r = reading(2);
        r.enemies_near = true;
        assert_eq!(recommend(&r), FormationKind::Circle);
        let mut r = reading(0);
        r.alpha_phase = Phase::Two;
        assert_eq!(recommend(&r), FormationKind::Diamond);
        r.follower_health = 0.3;
        assert_eq!(recommend(&r), FormationKind::Circle);
    }

    #[test]
    fn adaptive_waits_for_cooldown() {
        let mut a = Adaptive::default();
        for _ in 0..FORMATION_SWITCH_COOLDOWN {
            assert_eq!(a.step(FormationKind::Arrowhead, &reading(1)), None);
        }
        assert_eq!(a.step(FormationKind::Arrowhead, &reading(1)), Some(FormationKind::Diamond));
        assert_eq!(a.cooldown, FORMATION_SWITCH_COOLDOWN);
    }

    #[test]
    fn morph_completes_after_a_second() {
        let mut m = Morph::default();
        let goal = morph_goal(0.0, 3);
        let mut done = None;
        let mut ticks = 0;
        while done.is_none() && ticks < 100 {
            done = m.step(FormationKind::Arrowhead, goal);
            ticks += 1;
        }
        assert_eq!(done, Some(FormationKind::Line));
        assert_eq!(ticks, 60);
    }

    #[test]
    fn split_then_merge() {
        let mut s = SplitState::default();
        assert_eq!(s.step(2, 3), Some(SplitEvent::Split { at: 2 }));
        for _ in 1..MERGE_TICKS - 1 {
            assert_eq!(s.step(2, 3), None);
        }
        assert_eq!(s.step(2, 3), Some(SplitEvent::Merge));
        assert!(!s.active);
    }

    #[test]
    fn merge_when_enemies_drop() {
        let mut s = SplitState::default();
        s.step(2, 2);
        assert_eq!(s.step(1, 2), Some(SplitEvent::Merge));
    }
}
