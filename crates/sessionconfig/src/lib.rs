use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glsltex::session::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use glsltex::{image_key, SessionParams, TimeMode};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FPS: f32 = 24.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    #[default]
    Frames,
    System,
    Still,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub version: u32,
    #[serde(
        default = "default_tick_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub tick_interval: Duration,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClockConfig {
    #[serde(default)]
    pub time: ClockMode,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub still_time: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Defaults {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionEntry {
    pub source: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(100)
}

/// A duration written either as seconds (`2`, `0.25`) or as a humantime
/// string (`"250ms"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(f64),
    Text(String),
}

impl DurationValue {
    fn into_duration(self) -> Result<Duration, String> {
        match self {
            DurationValue::Seconds(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                Ok(Duration::from_secs_f64(seconds))
            }
            DurationValue::Seconds(seconds) => {
                Err(format!("duration must be a non-negative number, got {seconds}"))
            }
            DurationValue::Text(text) => humantime::parse_duration(&text)
                .map_err(|err| format!("invalid duration '{text}': {err}")),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    DurationValue::deserialize(deserializer)?
        .into_duration()
        .map_err(de::Error::custom)
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DurationValue>::deserialize(deserializer)?
        .map(DurationValue::into_duration)
        .transpose()
        .map_err(de::Error::custom)
}

impl SessionConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SessionConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn time_mode(&self) -> TimeMode {
        self.clock.time_mode()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.defaults.output_dir.as_deref()
    }

    /// Session parameters with defaults filled in, in file order.
    pub fn resolved_sessions(&self) -> Vec<SessionParams> {
        self.sessions
            .iter()
            .map(|entry| entry.resolve(&self.defaults))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be greater than zero".into(),
            ));
        }

        if let Some(fps) = self.clock.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ConfigError::Invalid("clock.fps must be > 0".into()));
            }
        }

        validate_dimension("defaults.width", self.defaults.width)?;
        validate_dimension("defaults.height", self.defaults.height)?;

        if self.sessions.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one session".into(),
            ));
        }

        let mut keys: BTreeMap<String, &str> = BTreeMap::new();
        for entry in &self.sessions {
            let source = entry.source.trim();
            if source.is_empty() {
                return Err(ConfigError::Invalid(
                    "sessions contains an entry with empty source".into(),
                ));
            }
            validate_dimension(&format!("session '{source}' width"), entry.width)?;
            validate_dimension(&format!("session '{source}' height"), entry.height)?;

            let key = image_key(&entry.source);
            if let Some(previous) = keys.insert(key.clone(), &entry.source) {
                return Err(ConfigError::Invalid(format!(
                    "sessions '{previous}' and '{}' would both publish image '{key}'",
                    entry.source
                )));
            }
        }

        Ok(())
    }
}

fn validate_dimension(what: &str, value: Option<u32>) -> Result<(), ConfigError> {
    if value == Some(0) {
        return Err(ConfigError::Invalid(format!("{what} must be at least 1")));
    }
    Ok(())
}

impl ClockConfig {
    pub fn time_mode(&self) -> TimeMode {
        match self.time {
            ClockMode::Frames => TimeMode::Frames {
                fps: self.fps.unwrap_or(DEFAULT_FPS),
            },
            ClockMode::System => TimeMode::System,
            ClockMode::Still => TimeMode::Still {
                time: self.still_time.unwrap_or_default().as_secs_f32(),
            },
        }
    }
}

impl SessionEntry {
    pub fn resolve(&self, defaults: &Defaults) -> SessionParams {
        SessionParams {
            source: self.source.clone(),
            width: self.width.or(defaults.width).unwrap_or(DEFAULT_WIDTH),
            height: self.height.or(defaults.height).unwrap_or(DEFAULT_HEIGHT),
        }
    }
}
