//! Persistence: the abstract `Repository` collaborator plus the
//! SQLite-backed and in-memory implementations, TOML configuration and
//! the shared data directory.

pub mod config;
pub mod memory;
pub mod sqlite;

pub use config::Config;
pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{BreakPoint, ExerciseResult, Route, User};

/// Abstract persistence collaborator.
///
/// Each call is atomic at single-record granularity; there are no
/// partial writes. `save_route` is an upsert (the favorite flag is the
/// only mutable route field).
#[async_trait]
pub trait Repository: Send + Sync {
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    async fn fetch_user(&self, user_id: &str) -> Result<User, StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn save_route(&self, route: &Route) -> Result<(), StoreError>;
    /// Routes owned by the user, most recently created first.
    async fn fetch_routes(&self, user_id: &str) -> Result<Vec<Route>, StoreError>;
    /// Removes the route and its break points.
    async fn delete_route(&self, route_id: &str) -> Result<(), StoreError>;

    async fn save_break_point(&self, point: &BreakPoint) -> Result<(), StoreError>;
    /// Break points for the route, ascending by scheduled time.
    async fn fetch_break_points(&self, route_id: &str) -> Result<Vec<BreakPoint>, StoreError>;
    async fn update_break_point(&self, point: &BreakPoint) -> Result<(), StoreError>;
    /// Drops the route's whole schedule (re-activation replaces it).
    async fn delete_break_points(&self, route_id: &str) -> Result<(), StoreError>;

    async fn save_exercise_result(
        &self,
        user_id: &str,
        result: &ExerciseResult,
    ) -> Result<(), StoreError>;
    /// Exercise history for the user, most recent first.
    async fn fetch_exercise_history(&self, user_id: &str)
        -> Result<Vec<ExerciseResult>, StoreError>;
}

/// Returns `~/.config/roadrest[-dev]/` based on ROADREST_ENV.
///
/// Set ROADREST_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ROADREST_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("roadrest-dev")
    } else {
        base_dir.join("roadrest")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
