//! Simulation settings. Loaded from `skirmish.ron` at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::squad::SquadToggles;

/// Upper bound on every squad-size setting.
pub const MAX_SQUAD_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Arena width in pixels.
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default = "default_allied_count")]
    pub allied_count: usize,
    /// Basic and advanced hostiles; the kind is rolled per spawn.
    #[serde(default = "default_one")]
    pub hostile_count: usize,
    #[serde(default = "default_one")]
    pub boss_count: usize,
    /// Minimum obstacle field size.
    #[serde(default = "default_obstacle_count")]
    pub obstacle_count: usize,
    /// Fixed RNG seed. Absent means seed from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Defer allied snapshot refreshes to the end of the allied pass.
    #[serde(default)]
    pub snapshot_mode: bool,
    /// Ticks the headless runner simulates before exiting.
    #[serde(default = "default_run_ticks")]
    pub run_ticks: u64,
    /// Pace the headless runner at wall-clock speed.
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub squad: SquadToggles,
}

fn default_width() -> f32 {
    1200.0
}
fn default_height() -> f32 {
    600.0
}
fn default_allied_count() -> usize {
    3
}
fn default_one() -> usize {
    1
}
fn default_obstacle_count() -> usize {
    5
}
fn default_run_ticks() -> u64 {
    3600
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            allied_count: default_allied_count(),
            hostile_count: default_one(),
            boss_count: default_one(),
            obstacle_count: default_obstacle_count(),
            seed: None,
            snapshot_mode: false,
            run_ticks: default_run_ticks(),
            realtime: false,
            squad: SquadToggles::default(),
        }
    }
}

impl SimConfig {
    /// Load `skirmish.ron` from the working directory. Missing files give defaults;
    /// unreadable or invalid ones are logged and replaced by defaults.
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Invalid config at {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate RON text. Squad sizes above the cap are clamped.
    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let mut config: Self = ron::from_str(data).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is not a positive size"),
                });
            }
        }
        self.allied_count = self.allied_count.min(MAX_SQUAD_SIZE);
        self.hostile_count = self.hostile_count.min(MAX_SQUAD_SIZE);
        self.boss_count = self.boss_count.min(MAX_SQUAD_SIZE);
        Ok(())
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("skirmish.ron")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::escort::EscortMode;
    use crate::squad::formation::FormationKind;

    #[test]
    fn empty_document_gives_defaults() {
        let c = SimConfig::parse("()").unwrap();
        assert_eq!(c.width, 1200.0);
        assert_eq!(c.height, 600.0);
        assert_eq!(c.allied_count, 3);
        assert_eq!(c.hostile_count, 1);
        assert_eq!(c.boss_count, 1);
        assert_eq!(c.obstacle_count, 5);
        assert!(c.seed.is_none());
        assert!(!c.snapshot_mode);
        assert_eq!(c.squad, SquadToggles::default());
    }

    #[test]
    fn partial_toggles_keep_other_defaults() {
        let text = "(seed: Some(7), squad: (formation: Circle, escort: Patrol))";
        let c = SimConfig::parse(text).unwrap();
        assert_eq!(c.seed, Some(7));
        assert_eq!(c.squad.formation, FormationKind::Circle);
        assert_eq!(c.squad.escort, EscortMode::Patrol);
        assert!(c.squad.enabled);
        assert!(c.squad.attack_sequences);
    }

    #[test]
    fn squad_sizes_are_clamped() {
        let c = SimConfig::parse("(allied_count: 40, boss_count: 11)").unwrap();
        assert_eq!(c.allied_count, MAX_SQUAD_SIZE);
        assert_eq!(c.boss_count, MAX_SQUAD_SIZE);
    }

    #[test]
    fn bad_arena_is_rejected() {
        assert!(matches!(
            SimConfig::parse("(width: 0.0)"),
            Err(ConfigError::Invalid { field: "width", .. })
        ));
        assert!(matches!(SimConfig::parse("(width: "), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SimConfig::load_from(Path::new("/nonexistent/skirmish.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
