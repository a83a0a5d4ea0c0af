//! Timed attack sequences driven by the alpha.

use std::ops::Range;

const STRIKE_PHASE_TICKS: u32 = 30;
const WAVE_TICKS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceKind {
    #[default]
    None,
    /// Alpha fires, then followers, then the alpha again.
    AlphaStrike,
    /// Alpha leads, then up to two follower waves.
    Wave,
}

impl SequenceKind {
    pub fn label(self) -> &'static str {
        match self {
            SequenceKind::None => "none",
            SequenceKind::AlphaStrike => "alpha-strike",
            SequenceKind::Wave => "wave",
        }
    }

    /// Which sequence fits the current fight, if any.
    pub fn choose(enemy_count: usize, followers: usize) -> Self {
        if enemy_count == 1 && followers >= 2 {
            SequenceKind::AlphaStrike
        } else if enemy_count >= 2 && followers >= 4 {
            SequenceKind::Wave
        } else {
            SequenceKind::None
        }
    }
}

/// Who is cleared to fire this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Volley {
    Hold,
    Alpha,
    /// Follower indices, in follower order.
    Followers(Range<usize>),
}

/// Per-alpha sequence counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceState {
    pub kind: SequenceKind,
    pub phase: u32,
    pub timer: u32,
}

impl SequenceState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance the running sequence by one tick, starting `kind` if it is not the
    /// one already running.
    pub fn step(&mut self, kind: SequenceKind, followers: usize) -> Volley {
        if kind == SequenceKind::None {
            self.reset();
            return Volley::Hold;
        }
        if self.kind != kind {
            *self = Self {
                kind,
                phase: 0,
                timer: 0,
            };
        }
        self.timer += 1;

        match kind {
            SequenceKind::None => Volley::Hold,
            SequenceKind::AlphaStrike => {
                if self.timer < STRIKE_PHASE_TICKS {
                    return match self.phase {
                        1 => Volley::Followers(0..followers),
                        _ => Volley::Alpha,
                    };
                }
                if self.phase >= 2 {
                    self.reset();
                } else {
                    self.phase += 1;
                    self.timer = 0;
                }
                Volley::Hold
            }
            SequenceKind::Wave => {
                let total_waves = (followers / 2 + 1).min(3);
                let half = followers.div_ceil(2);
                match self.phase {
                    0 => {
                        if self.timer < WAVE_TICKS {
                            return Volley::Alpha;
                        }
                        self.phase = 1;
                        self.timer = 0;
                        Volley::Hold
                    }
                    1 if followers >= 2 => {
                        if self.timer < WAVE_TICKS {
                            return Volley::Followers(0..half);
                        }
                        if total_waves > 2 {
                            self.phase = 2;
                            self.timer = 0;
                        } else {
                            self.reset();
                        }
                        Volley::Hold
                    }
                    2 => {
                        if self.timer < WAVE_TICKS {
                            return Volley::Followers(half..followers);
                        }
                        self.reset();
                        Volley::Hold
                    }
                    _ => Volley::Hold,
                }
            }
        }
    }
}
