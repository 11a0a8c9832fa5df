//! Configuration — tempo defaults, scheduling constants and click sound,
//! loaded from ~/.stride/config.yaml.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::SessionConfig;
use crate::tone::ClickTone;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    Io(io::Error),
    /// The file is not valid YAML for [`StrideConfig`].
    Parse(serde_yaml::Error),
    /// A value is out of its allowed range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config io error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Lookahead constants. Fixed for a metronome's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far ahead of the audio clock beats are committed.
    pub horizon_ms: f64,
    /// Period of the driver loop. Must be shorter than the horizon.
    pub wake_interval_ms: f64,
    /// Delay from start to the first beat.
    pub lead_ms: f64,
}

impl SchedulerConfig {
    const DEFAULT_WAKE: Duration = Duration::from_millis(25);

    pub fn horizon_secs(&self) -> f64 {
        self.horizon_ms / 1000.0
    }

    pub fn lead_secs(&self) -> f64 {
        self.lead_ms / 1000.0
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.wake_interval_ms / 1000.0)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Self::DEFAULT_WAKE)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("horizon_ms", self.horizon_ms),
            ("wake_interval_ms", self.wake_interval_ms),
            ("lead_ms", self.lead_ms),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.wake_interval_ms >= self.horizon_ms {
            return Err(ConfigError::Invalid(format!(
                "wake_interval_ms ({}) must be shorter than horizon_ms ({})",
                self.wake_interval_ms, self.horizon_ms
            )));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            horizon_ms: 100.0,
            wake_interval_ms: 25.0,
            lead_ms: 50.0,
        }
    }
}

/// Click sound parameters as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    pub frequency_hz: f64,
    pub attack_ms: f64,
    pub decay_ms: f64,
    pub gain: f64,
}

impl ClickConfig {
    pub fn to_tone(&self) -> ClickTone {
        ClickTone {
            frequency_hz: self.frequency_hz,
            attack: self.attack_ms / 1000.0,
            decay: self.decay_ms / 1000.0,
            gain: self.gain,
            ..ClickTone::default()
        }
    }

    /// Reject clicks that cannot be rendered, or that would still be sounding
    /// when a beat `shortest_beat_ms` later starts.
    pub fn validate(&self, shortest_beat_ms: f64) -> Result<(), ConfigError> {
        for (name, value) in [
            ("frequency_hz", self.frequency_hz),
            ("attack_ms", self.attack_ms),
            ("decay_ms", self.decay_ms),
            ("gain", self.gain),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "click.{name} must be finite, got {value}"
                )));
            }
        }
        if self.frequency_hz <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "click.frequency_hz must be positive, got {}",
                self.frequency_hz
            )));
        }
        if !(0.0 <= self.attack_ms && self.attack_ms < self.decay_ms) {
            return Err(ConfigError::Invalid(format!(
                "click.attack_ms ({}) must be in 0..decay_ms ({})",
                self.attack_ms, self.decay_ms
            )));
        }
        if self.decay_ms > shortest_beat_ms {
            return Err(ConfigError::Invalid(format!(
                "click.decay_ms ({}) is longer than the fastest beat ({shortest_beat_ms} ms)",
                self.decay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.gain) {
            return Err(ConfigError::Invalid(format!(
                "click.gain must be in 0..=1, got {}",
                self.gain
            )));
        }
        Ok(())
    }
}

impl Default for ClickConfig {
    fn default() -> Self {
        let tone = ClickTone::default();
        Self {
            frequency_hz: tone.frequency_hz,
            attack_ms: tone.attack * 1000.0,
            decay_ms: tone.decay * 1000.0,
            gain: tone.gain,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrideConfig {
    /// Tempo a session starts at.
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// Session length.
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    /// Lowest tempo the CLI accepts.
    #[serde(default = "default_min_bpm")]
    pub min_bpm: f64,
    /// Highest tempo the CLI accepts.
    #[serde(default = "default_max_bpm")]
    pub max_bpm: f64,
    /// Master output volume (0.0-1.0).
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub click: ClickConfig,
}

fn default_bpm() -> f64 {
    180.0
}

fn default_duration_minutes() -> u32 {
    30
}

fn default_min_bpm() -> f64 {
    150.0
}

fn default_max_bpm() -> f64 {
    200.0
}

fn default_volume() -> f32 {
    0.8
}

impl StrideConfig {
    /// Standard config location (~/.stride/config.yaml).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".stride").join("config.yaml"))
    }

    /// Load from the standard path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring config file");
            Self::default()
        })
    }

    /// Load and validate a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        if !(self.min_bpm > 0.0 && self.min_bpm <= self.max_bpm) {
            return Err(ConfigError::Invalid(format!(
                "bpm range {}..={} is empty or non-positive",
                self.min_bpm, self.max_bpm
            )));
        }
        self.check_bpm(self.bpm)?;
        check_volume(self.volume)?;
        self.click.validate(60_000.0 / self.max_bpm)?;
        if self.duration_minutes == 0 {
            return Err(ConfigError::Invalid(
                "duration_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Accept `bpm` only inside the supported range.
    pub fn check_bpm(&self, bpm: f64) -> Result<f64, ConfigError> {
        if (self.min_bpm..=self.max_bpm).contains(&bpm) {
            Ok(bpm)
        } else {
            Err(ConfigError::Invalid(format!(
                "bpm {bpm} outside supported range {}..={}",
                self.min_bpm, self.max_bpm
            )))
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            duration_minutes: self.duration_minutes,
            bpm: self.bpm,
        }
    }
}

/// Accept a master volume only inside 0.0..=1.0.
pub fn check_volume(volume: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(ConfigError::Invalid(format!(
            "volume must be in 0..=1, got {volume}"
        )))
    }
}

impl Default for StrideConfig {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            duration_minutes: default_duration_minutes(),
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            volume: default_volume(),
            scheduler: SchedulerConfig::default(),
            click: ClickConfig::default(),
        }
    }
}
