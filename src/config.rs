//! Runtime configuration: roster bounds, per-stage deadlines, and the sweep
//! interval.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::game::stage::Stage;

/// Default location on disk where the host looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MAFIA_HOST_CONFIG_PATH";

/// Immutable runtime configuration shared across the services.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Smallest roster a lobby may hand over.
    pub min_players: usize,
    /// Largest roster a lobby may hand over.
    pub max_players: usize,
    /// Interval between deadline sweeps.
    pub sweep_interval: Duration,
    durations: StageDurations,
}

#[derive(Debug, Clone)]
struct StageDurations {
    don_order: Duration,
    discussion: Duration,
    vote: Duration,
    don_check: Duration,
    sheriff_check: Duration,
}

impl GameConfig {
    /// Load the configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded game configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Deadline duration for a stage.
    ///
    /// Dealing has none: it only ends once every card is drawn, or through
    /// an end poll.
    pub fn stage_duration(&self, stage: Stage) -> Option<Duration> {
        match stage {
            Stage::Dealing => None,
            Stage::DonOrder => Some(self.durations.don_order),
            Stage::Discussion => Some(self.durations.discussion),
            Stage::Vote => Some(self.durations.vote),
            Stage::DonCheck => Some(self.durations.don_check),
            Stage::SheriffCheck => Some(self.durations.sheriff_check),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 20,
            sweep_interval: Duration::from_secs(10),
            durations: StageDurations {
                don_order: Duration::from_secs(60),
                discussion: Duration::from_secs(300),
                vote: Duration::from_secs(120),
                don_check: Duration::from_secs(90),
                sheriff_check: Duration::from_secs(90),
            },
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    min_players: usize,
    max_players: usize,
    sweep_interval_secs: u64,
    stage_secs: RawStageSecs,
}

/// JSON representation of the per-stage deadline table, in seconds.
#[derive(Debug, Deserialize)]
struct RawStageSecs {
    don_order: u64,
    discussion: u64,
    vote: u64,
    don_check: u64,
    sheriff_check: u64,
}

impl From<RawConfig> for GameConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            min_players: value.min_players,
            max_players: value.max_players,
            sweep_interval: Duration::from_secs(value.sweep_interval_secs),
            durations: StageDurations {
                don_order: Duration::from_secs(value.stage_secs.don_order),
                discussion: Duration::from_secs(value.stage_secs.discussion),
                vote: Duration::from_secs(value.stage_secs.vote),
                don_check: Duration::from_secs(value.stage_secs.don_check),
                sheriff_check: Duration::from_secs(value.stage_secs.sheriff_check),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into
/// account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
