pub mod ring;
pub mod timer;

use instant::Instant;

use self::ring::RingBuffer;
use self::timer::{SystemPhase, SystemTimers};

/// Number of tick durations kept for the periodic summary.
const TICK_HISTORY_LEN: usize = 300;
/// How often to log the summary (seconds).
const LOG_INTERVAL: f64 = 5.0;

/// Rolling tick-cost statistics for the headless runner.
pub struct TickStats {
    /// Recent wall-clock tick durations (seconds).
    pub tick_times: RingBuffer<f64>,
    pub tick_count: u64,
    last_log_time: Instant,
    ticks_since_log: u32,
}

impl TickStats {
    pub fn new() -> Self {
        Self {
            tick_times: RingBuffer::new(TICK_HISTORY_LEN),
            tick_count: 0,
            last_log_time: Instant::now(),
            ticks_since_log: 0,
        }
    }

    /// Record one tick. Logs a summary every few seconds.
    pub fn record_tick(&mut self, dt: f64, timers: &SystemTimers) {
        self.tick_count += 1;
        self.ticks_since_log += 1;
        self.tick_times.push(dt);

        let elapsed = self.last_log_time.elapsed().as_secs_f64();
        if elapsed < LOG_INTERVAL {
            return;
        }
        if let Some((avg, min, max)) = self.tick_times.summary() {
            log::info!(
                "TPS: {:.0} | avg: {:.3}ms | min: {:.3}ms | max: {:.3}ms | total ticks: {}",
                self.ticks_since_log as f64 / elapsed,
                avg * 1000.0,
                min * 1000.0,
                max * 1000.0,
                self.tick_count,
            );
        }
        let breakdown: Vec<String> = SystemPhase::ALL
            .iter()
            .map(|&p| format!("{} {:.1}us", p.label(), timers.get(p)))
            .collect();
        log::debug!("Systems: {}", breakdown.join(" | "));
        self.last_log_time = Instant::now();
        self.ticks_since_log = 0;
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}
