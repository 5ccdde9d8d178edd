//! Application-level configuration loading: session timing, scoring and limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::results::ScoreScaling;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_GAME_BACK_CONFIG_PATH";

const DEFAULT_COUNTDOWN_MS: u64 = 3_000;
const DEFAULT_MAX_AUTO_START_NUM: u32 = 50;
const DEFAULT_MAX_ACTIVE_SESSIONS_PER_QUIZ: usize = 10;
const DEFAULT_DATA_PATH: &str = "data/store.json";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    countdown: Duration,
    score_scaling: ScoreScaling,
    max_auto_start_num: u32,
    max_active_sessions_per_quiz: usize,
    data_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        countdown_ms = app_config.countdown.as_millis() as u64,
                        score_scaling = ?app_config.score_scaling,
                        "loaded configuration"
                    );
                    app_config
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

    /// Delay between a question being selected and it opening for answers.
    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    pub fn score_scaling(&self) -> ScoreScaling {
        self.score_scaling
    }

    /// Largest accepted auto-start threshold.
    pub fn max_auto_start_num(&self) -> u32 {
        self.max_auto_start_num
    }

    /// Maximum number of sessions of one quiz that may be outside END at once.
    pub fn max_active_sessions_per_quiz(&self) -> usize {
        self.max_active_sessions_per_quiz
    }

    /// Flat file backing the store; `None` keeps everything in memory.
    pub fn data_path(&self) -> Option<&PathBuf> {
        self.data_path.as_ref()
    }

    /// Same configuration with another countdown.
    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn with_score_scaling(mut self, score_scaling: ScoreScaling) -> Self {
        self.score_scaling = score_scaling;
        self
    }

    /// Same configuration with a different store file (or none).
    pub fn with_data_path(mut self, data_path: Option<PathBuf>) -> Self {
        self.data_path = data_path;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_millis(DEFAULT_COUNTDOWN_MS),
            score_scaling: ScoreScaling::default(),
            max_auto_start_num: DEFAULT_MAX_AUTO_START_NUM,
            max_active_sessions_per_quiz: DEFAULT_MAX_ACTIVE_SESSIONS_PER_QUIZ,
            data_path: Some(PathBuf::from(DEFAULT_DATA_PATH)),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; missing ones take the built-in default.
struct RawConfig {
    countdown_ms: Option<u64>,
    score_scaling: Option<ScoreScaling>,
    max_auto_start_num: Option<u32>,
    max_active_sessions_per_quiz: Option<usize>,
    /// `null` disables the flat file.
    #[serde(default = "default_data_path")]
    data_path: Option<PathBuf>,
}

fn default_data_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_DATA_PATH))
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            countdown: Duration::from_millis(value.countdown_ms.unwrap_or(DEFAULT_COUNTDOWN_MS)),
            score_scaling: value.score_scaling.unwrap_or_default(),
            max_auto_start_num: value
                .max_auto_start_num
                .unwrap_or(DEFAULT_MAX_AUTO_START_NUM),
            max_active_sessions_per_quiz: value
                .max_active_sessions_per_quiz
                .unwrap_or(DEFAULT_MAX_ACTIVE_SESSIONS_PER_QUIZ),
            data_path: value.data_path,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
