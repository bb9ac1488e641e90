//! Domain model: users, routes, break points, POIs, exercises.
//!
//! Every published value derives `PartialEq` because the propagation bus
//! gates re-publication on value inequality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS-84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseDifficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseCategory {
    Stretching,
    Mobility,
    Cardio,
    Strength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
    Restaurant,
    Cafe,
    Park,
    GasStation,
    RestArea,
    Other,
}

/// Per-user notification switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub break_reminders: bool,
    #[serde(default = "default_true")]
    pub exercise_reminders: bool,
    #[serde(default = "default_true")]
    pub route_updates: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            break_reminders: true,
            exercise_reminders: true,
            route_updates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExercisePreferences {
    pub preferred_categories: Vec<ExerciseCategory>,
    pub difficulty: ExerciseDifficulty,
}

impl Default for ExercisePreferences {
    fn default() -> Self {
        Self {
            preferred_categories: vec![ExerciseCategory::Stretching, ExerciseCategory::Mobility],
            difficulty: ExerciseDifficulty::Easy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiPreferences {
    pub preferred_categories: Vec<String>,
}

impl Default for PoiPreferences {
    fn default() -> Self {
        Self {
            preferred_categories: vec!["Cafe".into(), "Park".into(), "Restaurant".into()],
        }
    }
}

/// The full preference bundle attached to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Preferred gap between breaks while driving, in seconds.
    #[serde(default = "default_break_interval")]
    pub preferred_break_interval_secs: i64,
    #[serde(default)]
    pub exercise: ExercisePreferences,
    #[serde(default)]
    pub poi: PoiPreferences,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            preferred_break_interval_secs: default_break_interval(),
            exercise: ExercisePreferences::default(),
            poi: PoiPreferences::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

fn default_break_interval() -> i64 {
    7200
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub profile_image_url: Option<String>,
    pub preferences: UserPreferences,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl User {
    /// A fresh user with default preferences, as created on sign-up.
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            profile_image_url: None,
            preferences: UserPreferences::default(),
            created_at: now,
            last_login: now,
        }
    }
}

/// A planned trip. Immutable after creation except for the favorite flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub waypoints: Vec<GeoPoint>,
    /// Sampled geometry of the computed route, start to end.
    pub polyline: Vec<GeoPoint>,
    pub estimated_duration_secs: i64,
    pub distance_m: f64,
    pub created_at: DateTime<Utc>,
    pub favorite: bool,
}

/// A point of interest near a break location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: String,
    pub name: String,
    pub category: PoiCategory,
    pub location: GeoPoint,
    pub address: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: f64,
    pub review_count: u32,
    pub price_level: Option<u8>,
    pub open_now: Option<bool>,
}

/// A scheduled rest stop along a route.
///
/// Break points are created in one batch when a route becomes active,
/// ordered by scheduled time, and mutated only to flip completion or
/// attach a POI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPoint {
    pub id: String,
    pub route_id: String,
    pub location: GeoPoint,
    pub scheduled_time: DateTime<Utc>,
    pub poi: Option<Poi>,
    pub duration_secs: i64,
    pub completed: bool,
    pub notes: Option<String>,
}

/// A catalog exercise. Static data, read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration_secs: i64,
    pub difficulty: ExerciseDifficulty,
    pub category: ExerciseCategory,
    pub video: String,
    pub instructions: Vec<String>,
    pub thumbnail: String,
}

/// The record produced when an exercise session ends. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub id: String,
    pub exercise_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub completion_pct: f64,
    pub feedback: Option<String>,
}

impl ExerciseResult {
    /// Rough calorie estimate from active duration.
    pub fn calories_burned(&self) -> f64 {
        self.duration_secs as f64 * 0.05
    }
}
