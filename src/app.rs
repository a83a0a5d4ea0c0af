//! Headless host: loads the config, drives the arena on a fixed timestep and turns
//! the event queue into log lines.

use std::time::Duration;

use instant::Instant;

use skirmish::arena::Arena;
use skirmish::config::SimConfig;
use skirmish::debug::TickStats;
use skirmish::events::{Faction, SimEvent};
use skirmish::visual::CraftInstance;

/// Fixed simulation tick rate (60 Hz).
const TICK_RATE: f64 = 1.0 / 60.0;
/// Cap the accumulator so a stall cannot trigger a catch-up spiral.
const MAX_ACCUMULATOR: f64 = 0.25;
/// Idle sleep between frames in realtime mode.
const FRAME_SLEEP: Duration = Duration::from_millis(4);

struct App {
    arena: Arena,
    stats: TickStats,

    // Fixed timestep
    last_frame_time: Option<Instant>,
    accumulator: f64,
    run_ticks: u64,

    // Reusable instance buffer (what a renderer would upload each frame)
    instance_buf: Vec<CraftInstance>,

    // Running tallies from the event queue
    shots: [u64; 3],
    kills: u64,
}

impl App {
    fn new(config: &SimConfig) -> Self {
        Self {
            arena: Arena::new(config),
            stats: TickStats::new(),
            last_frame_time: None,
            accumulator: 0.0,
            run_ticks: config.run_ticks,
            instance_buf: Vec::new(),
            shots: [0; 3],
            kills: 0,
        }
    }

    fn finished(&self) -> bool {
        self.arena.tick >= self.run_ticks
    }

    /// Run fixed-timestep simulation ticks.
    fn run_fixed_update(&mut self, dt: f64) {
        self.accumulator += dt;

        if self.accumulator > MAX_ACCUMULATOR {
            self.accumulator = MAX_ACCUMULATOR;
        }

        while self.accumulator >= TICK_RATE && !self.finished() {
            self.tick_once();
            self.accumulator -= TICK_RATE;
        }
    }

    fn tick_once(&mut self) {
        let start = Instant::now();
        self.arena.step();
        self.stats.record_tick(start.elapsed().as_secs_f64(), &self.arena.timers);
        self.drain_events();
    }

    fn drain_events(&mut self) {
        for event in self.arena.events.drain() {
            match event {
                SimEvent::Fired { faction, .. } => {
                    let slot = match faction {
                        Faction::Player => 0,
                        Faction::Allied => 1,
                        Faction::Hostile => 2,
                    };
                    self.shots[slot] += 1;
                }
                SimEvent::CraftDestroyed { entity, kind, bounty } => {
                    self.kills += 1;
                    log::info!("{} {entity:?} destroyed (+{bounty})", kind.label());
                }
                SimEvent::AlphaElected(e) => log::info!("Alpha elected: {e:?}"),
                SimEvent::AlphaRelinquished(e) => log::info!("Alpha relinquished: {e:?}"),
                SimEvent::FormationChanged(f) => log::info!("Formation: {}", f.label()),
                SimEvent::SquadSplit { at } => log::info!("Squad split at {at}"),
                SimEvent::SquadMerged => log::info!("Squad merged"),
                SimEvent::PhaseChanged { entity, phase } => {
                    log::debug!("{entity:?} now phase {}", phase.number());
                }
                SimEvent::Healed { entity, health } => {
                    log::debug!("{entity:?} healed to {health:.1}");
                }
                SimEvent::PlayerDestroyed => {
                    log::warn!("Player destroyed at tick {}", self.arena.tick);
                }
                SimEvent::ObstacleDestroyed => {}
            }
        }
    }

    /// Build instance buffer from the arena, as a renderer would each frame.
    fn build_instances(&mut self) {
        self.instance_buf.clear();
        self.instance_buf.extend(self.arena.instances());
    }

    fn report(&self) {
        log::info!(
            "Finished after {} ticks: score {}, {} allied / {} hostile left, {} kills, shots p/a/h {}/{}/{}",
            self.arena.tick,
            self.arena.score,
            self.arena.allies.len(),
            self.arena.hostiles.len(),
            self.kills,
            self.shots[0],
            self.shots[1],
            self.shots[2],
        );
    }
}

/// Entry point: load config and simulate `run_ticks` ticks.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = SimConfig::load();
    let mut app = App::new(&config);

    if config.realtime {
        while !app.finished() {
            let now = Instant::now();
            if let Some(last) = app.last_frame_time {
                let dt = now.duration_since(last).as_secs_f64();
                app.run_fixed_update(dt);
                app.build_instances();
            }
            app.last_frame_time = Some(now);
            std::thread::sleep(FRAME_SLEEP);
        }
    } else {
        while !app.finished() {
            app.tick_once();
        }
        app.build_instances();
    }

    log::debug!("{} instances in final frame", app.instance_buf.len());
    app.report();
    Ok(())
}
