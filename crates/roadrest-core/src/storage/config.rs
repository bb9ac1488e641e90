//! TOML-based application configuration.
//!
//! Stores scheduler timing, routing and place-search settings.
//! Configuration is stored at `~/.config/roadrest/config.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

/// Break scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Monitor tick period in seconds.
    #[serde(default = "default_monitor_period")]
    pub monitor_period_secs: u64,
    /// How far ahead of a break's scheduled time it becomes "upcoming".
    #[serde(default = "default_lead_window")]
    pub lead_window_secs: i64,
    /// Planned duration of each generated break.
    #[serde(default = "default_break_duration")]
    pub break_duration_secs: i64,
    /// Interval used when the prediction model has nothing better.
    #[serde(default = "default_interval")]
    pub default_interval_secs: i64,
}

/// Routing provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_speed")]
    pub average_speed_kmh: f64,
}

/// Place search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    #[serde(default = "default_overpass_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_poi_radius")]
    pub radius_m: f64,
}

/// Notification delivery switches (app-wide; per-user switches live on
/// the user's preference bundle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/roadrest/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_monitor_period() -> u64 {
    60
}
fn default_lead_window() -> i64 {
    900
}
fn default_break_duration() -> i64 {
    900
}
fn default_interval() -> i64 {
    7200
}
fn default_speed() -> f64 {
    80.0
}
fn default_overpass_endpoint() -> String {
    "https://overpass-api.de/api/interpreter".into()
}
fn default_poi_radius() -> f64 {
    5000.0
}
fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            monitor_period_secs: default_monitor_period(),
            lead_window_secs: default_lead_window(),
            break_duration_secs: default_break_duration(),
            default_interval_secs: default_interval(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: default_speed(),
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_overpass_endpoint(),
            radius_m: default_poi_radius(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Path of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file
    /// does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed { path, source })
    }

    /// Persist the configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(&path, raw).map_err(|source| ConfigError::WriteFailed { path, source })
    }
}
