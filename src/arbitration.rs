//! Weighted priority arbitration: every candidate behavior gets a score each tick and
//! the strictly highest one wins.

/// Nearest craft closer than this triggers hard avoidance.
pub const HARD_AVOID_DISTANCE: f32 = 60.0;
/// Seek-healing urgency is normalized over this range.
pub const SEEK_HEALING_RANGE: f32 = 400.0;
/// Follower flank/slot urgency is normalized over this distance.
const SLOT_NORMALIZE: f32 = 200.0;

/// Candidate behaviors in declaration order. Earlier variants win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Behavior {
    EvadeProjectile,
    EvadeCraft,
    SeekHealing,
    SquadAttack,
    FireAtEnemy,
    ProtectAlly,
    FireAtObstacle,
    AvoidObstacle,
    RandomNavigate,
}

impl Behavior {
    pub const COUNT: usize = 9;

    pub const ALL: [Behavior; Self::COUNT] = [
        Self::EvadeProjectile,
        Self::EvadeCraft,
        Self::SeekHealing,
        Self::SquadAttack,
        Self::FireAtEnemy,
        Self::ProtectAlly,
        Self::FireAtObstacle,
        Self::AvoidObstacle,
        Self::RandomNavigate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::EvadeProjectile => "evade-projectile",
            Self::EvadeCraft => "evade-craft",
            Self::SeekHealing => "seek-healing",
            Self::SquadAttack => "squad-attack",
            Self::FireAtEnemy => "fire-at-enemy",
            Self::ProtectAlly => "protect-ally",
            Self::FireAtObstacle => "fire-at-obstacle",
            Self::AvoidObstacle => "avoid-obstacle",
            Self::RandomNavigate => "random-navigate",
        }
    }
}

/// Priority weight table. `avoid_craft` is the safety ceiling and never lowered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityWeights {
    pub avoid_craft: f32,
    pub fire_at_enemy: f32,
    pub protect_ally: f32,
    pub fire_at_obstacle: f32,
    pub avoid_obstacle: f32,
    pub random_navigate: f32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            avoid_craft: 1.0,
            fire_at_enemy: 0.8,
            protect_ally: 0.6,
            fire_at_obstacle: 0.4,
            avoid_obstacle: 0.3,
            random_navigate: 0.1,
        }
    }
}

/// Squad-attack urgency, depending on what the craft is doing for the squad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SquadUrgency {
    /// Alpha running hammer-and-anvil or scissors. Distance normalized by enemy detection.
    Pattern { distance_norm: f32 },
    /// Alpha leading the attack on the squad target.
    Lead { distance_norm: f32 },
    /// Follower heading for its side-flank slot.
    Flank { distance: f32 },
    /// Follower keeping its formation slot.
    Slot { distance: f32 },
}

impl SquadUrgency {
    fn score(self) -> f32 {
        match self {
            Self::Pattern { distance_norm } => 0.9 * (1.0 - distance_norm.min(1.0) * 0.4),
            Self::Lead { distance_norm } => 0.85 * (1.0 - distance_norm.min(1.0) * 0.5),
            Self::Flank { distance } => 0.9 * (1.0 - (distance / SLOT_NORMALIZE).min(1.0) * 0.3),
            Self::Slot { distance } => 0.8 * (1.0 - (distance / SLOT_NORMALIZE).min(1.0) * 0.4),
        }
    }
}

/// Everything the scorer needs, already perceived. `None` means "no candidate".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Situation {
    /// Distance to the nearest craft inside the avoidance radius.
    pub craft_distance: Option<f32>,
    pub projectile_threat: Option<f32>,
    /// Distance to an eligible healer (only set when seeking is allowed).
    pub healer_distance: Option<f32>,
    pub squad: Option<SquadUrgency>,
    /// Distance to the nearest enemy that passes the fire test.
    pub enemy_in_arc: Option<f32>,
    /// Present when a protection bearing exists; the flag says enemies are near.
    pub protect: Option<bool>,
    /// Distance to the nearest obstacle passing the obstacle fire test.
    pub obstacle_target: Option<f32>,
    /// Distance to the nearest obstacle in the forward cone.
    pub nearest_obstacle: Option<f32>,
    pub detection_radius: f32,
    pub firing_range: f32,
    pub enemy_firing_range: f32,
}

impl Situation {
    pub fn new(detection_radius: f32, firing_range: f32, enemy_firing_range: f32) -> Self {
        Self {
            craft_distance: None,
            projectile_threat: None,
            healer_distance: None,
            squad: None,
            enemy_in_arc: None,
            protect: None,
            obstacle_target: None,
            nearest_obstacle: None,
            detection_radius,
            firing_range,
            enemy_firing_range,
        }
    }
}

/// One score per [`Behavior`], indexed by declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scores([f32; Behavior::COUNT]);

impl Scores {
    pub fn get(&self, behavior: Behavior) -> f32 {
        self.0[behavior as usize]
    }

    pub fn set(&mut self, behavior: Behavior, score: f32) {
        self.0[behavior as usize] = score;
    }
}

fn ratio(distance: f32, range: f32) -> f32 {
    if range <= 0.0 {
        return 1.0;
    }
    (distance / range).min(1.0)
}

/// Score every candidate.
pub fn score(situation: &Situation, weights: &PriorityWeights) -> Scores {
    let mut s = Scores::default();

    if let Some(threat) = situation.projectile_threat {
        s.set(Behavior::EvadeProjectile, (threat * 1.5).min(1.0));
    }
    if let Some(d) = situation.craft_distance {
        if d < HARD_AVOID_DISTANCE {
            s.set(
                Behavior::EvadeCraft,
                weights.avoid_craft * (1.0 - d / HARD_AVOID_DISTANCE),
            );
        }
    }
    if let Some(d) = situation.healer_distance {
        s.set(
            Behavior::SeekHealing,
            0.9 * (1.0 - ratio(d, SEEK_HEALING_RANGE) * 0.3),
        );
    }
    if let Some(urgency) = situation.squad {
        s.set(Behavior::SquadAttack, urgency.score());
    }
    if let Some(d) = situation.enemy_in_arc {
        s.set(
            Behavior::FireAtEnemy,
            weights.fire_at_enemy * (1.0 - ratio(d, situation.enemy_firing_range) * 0.5),
        );
    }
    if let Some(enemies_near) = situation.protect {
        let factor = if enemies_near { 1.0 } else { 0.6 };
        s.set(Behavior::ProtectAlly, weights.protect_ally * factor);
    }
    if let Some(d) = situation.obstacle_target {
        s.set(
            Behavior::FireAtObstacle,
            weights.fire_at_obstacle * (1.0 - ratio(d, situation.firing_range) * 0.5),
        );
    }
    if let Some(d) = situation.nearest_obstacle {
        s.set(
            Behavior::AvoidObstacle,
            weights.avoid_obstacle * (1.0 - ratio(d, situation.detection_radius)),
        );
    }
    s.set(Behavior::RandomNavigate, weights.random_navigate * 0.1);
    s
}

/// Pick the strictly highest score, starting from random-navigate.
pub fn select(scores: &Scores) -> Behavior {
    let mut best = Behavior::RandomNavigate;
    let mut best_score = scores.get(best);
    for behavior in Behavior::ALL {
        let s = scores.get(behavior);
        if s > best_score {
            best = behavior;
            best_score = s;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Situation {
        Situation::new(100.0, 200.0, 250.0)
    }

    #[test]
    fn idle_falls_back_to_random_navigate() {
        let scores = score(&base(), &PriorityWeights::default());
        assert_eq!(select(&scores), Behavior::RandomNavigate);
        assert!((scores.get(Behavior::RandomNavigate) - 0.01).abs() < 1e-6);
    }

    #[test]
    fn selection_is_deterministic() {
        let mut sit = base();
        sit.enemy_in_arc = Some(120.0);
        sit.nearest_obstacle = Some(40.0);
        sit.protect = Some(true);
        let w = PriorityWeights::default();
        let first = select(&score(&sit, &w));
        for _ in 0..100 {
            assert_eq!(select(&score(&sit, &w)), first);
        }
    }

    #[test]
    fn ties_go_to_first_declared() {
        let mut scores = Scores::default();
        scores.set(Behavior::ProtectAlly, 0.5);
        scores.set(Behavior::FireAtEnemy, 0.5);
        scores.set(Behavior::AvoidObstacle, 0.5);
        assert_eq!(select(&scores), Behavior::FireAtEnemy);
    }

    #[test]
    fn close_craft_outranks_combat() {
        let mut sit = base();
        sit.craft_distance = Some(5.0);
        sit.enemy_in_arc = Some(10.0);
        assert_eq!(select(&score(&sit, &PriorityWeights::default())), Behavior::EvadeCraft);
    }

    #[test]
    fn craft_outside_hard_radius_scores_nothing() {
        let mut sit = base();
        sit.craft_distance = Some(70.0);
        let s = score(&sit, &PriorityWeights::default());
        assert_eq!(s.get(Behavior::EvadeCraft), 0.0);
    }

    #[test]
    fn projectile_threat_is_unweighted_and_capped() {
        let mut sit = base();
        sit.projectile_threat = Some(0.9);
        let s = score(&sit, &PriorityWeights::default());
        assert_eq!(s.get(Behavior::EvadeProjectile), 1.0);
    }

    #[test]
    fn squad_urgency_factors() {
        assert!((SquadUrgency::Lead { distance_norm: 1.0 }.score() - 0.425).abs() < 1e-6);
        assert!((SquadUrgency::Slot { distance: 0.0 }.score() - 0.8).abs() < 1e-6);
        assert!((SquadUrgency::Flank { distance: 400.0 }.score() - 0.63).abs() < 1e-6);
        assert!((SquadUrgency::Pattern { distance_norm: 0.5 }.score() - 0.72).abs() < 1e-6);
    }

    #[test]
    fn fire_at_enemy_scales_with_range() {
        let mut sit = base();
        sit.enemy_in_arc = Some(250.0);
        let s = score(&sit, &PriorityWeights::default());
        assert!((s.get(Behavior::FireAtEnemy) - 0.4).abs() < 1e-6);
    }
}
