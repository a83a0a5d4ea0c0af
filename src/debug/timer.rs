use instant::Instant;

/// Which stage of the simulation tick is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemPhase {
    Allied = 0,
    Projectiles = 1,
    Hostile = 2,
    Obstacles = 3,
    Collisions = 4,
    Healing = 5,
}

impl SystemPhase {
    pub const COUNT: usize = 6;

    pub const ALL: [SystemPhase; Self::COUNT] = [
        Self::Allied,
        Self::Projectiles,
        Self::Hostile,
        Self::Obstacles,
        Self::Collisions,
        Self::Healing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Allied => "Allied",
            Self::Projectiles => "Projectiles",
            Self::Hostile => "Hostile",
            Self::Obstacles => "Obstacles",
            Self::Collisions => "Collisions",
            Self::Healing => "Healing",
        }
    }
}

/// Per-system timing with exponential moving average smoothing.
pub struct SystemTimers {
    /// EMA-smoothed duration in microseconds per phase.
    pub durations_us: [f64; SystemPhase::COUNT],
    /// Timestamp when `begin()` was called.
    start: Instant,
}

const EMA_ALPHA: f64 = 0.1;

impl SystemTimers {
    pub fn new() -> Self {
        Self {
            durations_us: [0.0; SystemPhase::COUNT],
            start: Instant::now(),
        }
    }

    /// Call before a system runs.
    pub fn begin(&mut self) {
        self.start = Instant::now();
    }

    /// Call after a system finishes. Records elapsed time for `phase`.
    pub fn end(&mut self, phase: SystemPhase) {
        let elapsed_us = self.start.elapsed().as_secs_f64() * 1_000_000.0;
        self.record(phase, elapsed_us);
    }

    fn record(&mut self, phase: SystemPhase, elapsed_us: f64) {
        let idx = phase as usize;
        self.durations_us[idx] =
            self.durations_us[idx] * (1.0 - EMA_ALPHA) + elapsed_us * EMA_ALPHA;
    }

    pub fn get(&self, phase: SystemPhase) -> f64 {
        self.durations_us[phase as usize]
    }

    /// Sum of all phase durations (microseconds).
    pub fn total_us(&self) -> f64 {
        self.durations_us.iter().sum()
    }
}

impl Default for SystemTimers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_moves_a_tenth_per_sample() {
        let mut t = SystemTimers::new();
        t.record(SystemPhase::Hostile, 100.0);
        assert!((t.get(SystemPhase::Hostile) - 10.0).abs() < 1e-9);
        t.record(SystemPhase::Hostile, 100.0);
        assert!((t.get(SystemPhase::Hostile) - 19.0).abs() < 1e-9);
        assert!((t.total_us() - 19.0).abs() < 1e-9);
    }

    #[test]
    fn labels_are_distinct() {
        let mut labels: Vec<_> = SystemPhase::ALL.iter().map(|p| p.label()).collect();
        labels.dedup();
        assert_eq!(labels.len(), SystemPhase::COUNT);
    }
}
