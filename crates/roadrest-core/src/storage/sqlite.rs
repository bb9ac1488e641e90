//! SQLite-backed repository.
//!
//! Single-file database at `~/.config/roadrest/roadrest.db`. Nested
//! values (preference bundles, waypoints, attached POIs) are stored as
//! JSON columns; timestamps as RFC 3339 text.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{data_dir, Repository};
use crate::error::StoreError;
use crate::model::{BreakPoint, ExerciseResult, GeoPoint, Route, User};

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open the database at `~/.config/roadrest/roadrest.db`,
    /// creating file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_at(&dir.join("roadrest.db"))
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.migrate()?;
        Ok(repo)
    }

    /// Open an in-memory database (tests, ephemeral sessions).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.migrate()?;
        Ok(repo)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id                TEXT PRIMARY KEY,
                email             TEXT NOT NULL UNIQUE,
                name              TEXT NOT NULL,
                profile_image_url TEXT,
                preferences       TEXT NOT NULL,
                created_at        TEXT NOT NULL,
                last_login        TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS routes (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                name          TEXT NOT NULL,
                start_lat     REAL NOT NULL,
                start_lon     REAL NOT NULL,
                end_lat       REAL NOT NULL,
                end_lon       REAL NOT NULL,
                waypoints     TEXT NOT NULL,
                polyline      TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                distance_m    REAL NOT NULL,
                created_at    TEXT NOT NULL,
                favorite      INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_routes_user
                ON routes(user_id, created_at DESC);
            CREATE TABLE IF NOT EXISTS break_points (
                id             TEXT PRIMARY KEY,
                route_id       TEXT NOT NULL,
                lat            REAL NOT NULL,
                lon            REAL NOT NULL,
                scheduled_time TEXT NOT NULL,
                poi            TEXT,
                duration_secs  INTEGER NOT NULL,
                completed      INTEGER NOT NULL DEFAULT 0,
                notes          TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_break_points_route
                ON break_points(route_id, scheduled_time);
            CREATE TABLE IF NOT EXISTS exercise_results (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                exercise_id    TEXT NOT NULL,
                started_at     TEXT NOT NULL,
                ended_at       TEXT NOT NULL,
                duration_secs  INTEGER NOT NULL,
                completion_pct REAL NOT NULL,
                feedback       TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_results_user
                ON exercise_results(user_id, ended_at DESC);",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

type UserRow = (String, String, String, Option<String>, String, String, String);

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (id, email, name, profile_image_url, preferences, created_at, last_login) = row;
    Ok(User {
        id,
        email,
        name,
        profile_image_url,
        preferences: decode(&preferences)?,
        created_at: parse_ts(&created_at)?,
        last_login: parse_ts(&last_login)?,
    })
}

type RouteRow = (
    String,
    String,
    String,
    f64,
    f64,
    f64,
    f64,
    String,
    String,
    i64,
    f64,
    String,
    bool,
);

fn route_from_row(row: RouteRow) -> Result<Route, StoreError> {
    let (
        id,
        user_id,
        name,
        start_lat,
        start_lon,
        end_lat,
        end_lon,
        waypoints,
        polyline,
        duration_secs,
        distance_m,
        created_at,
        favorite,
    ) = row;
    Ok(Route {
        id,
        user_id,
        name,
        start: GeoPoint::new(start_lat, start_lon),
        end: GeoPoint::new(end_lat, end_lon),
        waypoints: decode(&waypoints)?,
        polyline: decode(&polyline)?,
        estimated_duration_secs: duration_secs,
        distance_m,
        created_at: parse_ts(&created_at)?,
        favorite,
    })
}

type BreakRow = (
    String,
    String,
    f64,
    f64,
    String,
    Option<String>,
    i64,
    bool,
    Option<String>,
);

fn break_from_row(row: BreakRow) -> Result<BreakPoint, StoreError> {
    let (id, route_id, lat, lon, scheduled_time, poi, duration_secs, completed, notes) = row;
    Ok(BreakPoint {
        id,
        route_id,
        location: GeoPoint::new(lat, lon),
        scheduled_time: parse_ts(&scheduled_time)?,
        poi: poi.as_deref().map(decode).transpose()?,
        duration_secs,
        completed,
        notes,
    })
}

type ResultRow = (String, String, String, String, i64, f64, Option<String>);

fn result_from_row(row: ResultRow) -> Result<ExerciseResult, StoreError> {
    let (id, exercise_id, started_at, ended_at, duration_secs, completion_pct, feedback) = row;
    Ok(ExerciseResult {
        id,
        exercise_id,
        started_at: parse_ts(&started_at)?,
        ended_at: parse_ts(&ended_at)?,
        duration_secs,
        completion_pct,
        feedback,
    })
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let preferences = encode(&user.preferences)?;
        self.lock().execute(
            "INSERT INTO users (id, email, name, profile_image_url, preferences, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.name,
                user.profile_image_url,
                preferences,
                user.created_at.to_rfc3339(),
                user.last_login.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn fetch_user(&self, user_id: &str) -> Result<User, StoreError> {
        let row: Option<UserRow> = self
            .lock()
            .query_row(
                "SELECT id, email, name, profile_image_url, preferences, created_at, last_login
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some(row) => user_from_row(row),
            None => Err(StoreError::NotFound {
                entity: "user",
                id: user_id.into(),
            }),
        }
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let preferences = encode(&user.preferences)?;
        let changed = self.lock().execute(
            "UPDATE users
             SET email = ?2, name = ?3, profile_image_url = ?4, preferences = ?5, last_login = ?6
             WHERE id = ?1",
            params![
                user.id,
                user.email,
                user.name,
                user.profile_image_url,
                preferences,
                user.last_login.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user.id.clone(),
            });
        }
        Ok(())
    }

    async fn save_route(&self, route: &Route) -> Result<(), StoreError> {
        let waypoints = encode(&route.waypoints)?;
        let polyline = encode(&route.polyline)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO routes
             (id, user_id, name, start_lat, start_lon, end_lat, end_lon,
              waypoints, polyline, duration_secs, distance_m, created_at, favorite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                route.id,
                route.user_id,
                route.name,
                route.start.lat,
                route.start.lon,
                route.end.lat,
                route.end.lon,
                waypoints,
                polyline,
                route.estimated_duration_secs,
                route.distance_m,
                route.created_at.to_rfc3339(),
                route.favorite,
            ],
        )?;
        Ok(())
    }

    async fn fetch_routes(&self, user_id: &str) -> Result<Vec<Route>, StoreError> {
        let rows: Vec<RouteRow> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, start_lat, start_lon, end_lat, end_lon,
                        waypoints, polyline, duration_secs, distance_m, created_at, favorite
                 FROM routes WHERE user_id = ?1 ORDER BY created_at DESC",
            )?;
            let mapped = stmt.query_map(params![user_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                    row.get(12)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };
        rows.into_iter().map(route_from_row).collect()
    }

    async fn delete_route(&self, route_id: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM break_points WHERE route_id = ?1",
            params![route_id],
        )?;
        let changed = conn.execute("DELETE FROM routes WHERE id = ?1", params![route_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "route",
                id: route_id.into(),
            });
        }
        Ok(())
    }

    async fn save_break_point(&self, point: &BreakPoint) -> Result<(), StoreError> {
        let poi = point.poi.as_ref().map(encode).transpose()?;
        self.lock().execute(
            "INSERT OR REPLACE INTO break_points
             (id, route_id, lat, lon, scheduled_time, poi, duration_secs, completed, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                point.id,
                point.route_id,
                point.location.lat,
                point.location.lon,
                point.scheduled_time.to_rfc3339(),
                poi,
                point.duration_secs,
                point.completed,
                point.notes,
            ],
        )?;
        Ok(())
    }

    async fn fetch_break_points(&self, route_id: &str) -> Result<Vec<BreakPoint>, StoreError> {
        let rows: Vec<BreakRow> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT id, route_id, lat, lon, scheduled_time, poi, duration_secs, completed, notes
                 FROM break_points WHERE route_id = ?1 ORDER BY scheduled_time ASC",
            )?;
            let mapped = stmt.query_map(params![route_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };
        rows.into_iter().map(break_from_row).collect()
    }

    async fn update_break_point(&self, point: &BreakPoint) -> Result<(), StoreError> {
        let poi = point.poi.as_ref().map(encode).transpose()?;
        let changed = self.lock().execute(
            "UPDATE break_points SET poi = ?2, completed = ?3, notes = ?4 WHERE id = ?1",
            params![point.id, poi, point.completed, point.notes],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "break point",
                id: point.id.clone(),
            });
        }
        Ok(())
    }

    async fn delete_break_points(&self, route_id: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "DELETE FROM break_points WHERE route_id = ?1",
            params![route_id],
        )?;
        Ok(())
    }

    async fn save_exercise_result(
        &self,
        user_id: &str,
        result: &ExerciseResult,
    ) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT INTO exercise_results
             (id, user_id, exercise_id, started_at, ended_at, duration_secs, completion_pct, feedback)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.id,
                user_id,
                result.exercise_id,
                result.started_at.to_rfc3339(),
                result.ended_at.to_rfc3339(),
                result.duration_secs,
                result.completion_pct,
                result.feedback,
            ],
        )?;
        Ok(())
    }

    async fn fetch_exercise_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<ExerciseResult>, StoreError> {
        let rows: Vec<ResultRow> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT id, exercise_id, started_at, ended_at, duration_secs, completion_pct, feedback
                 FROM exercise_results WHERE user_id = ?1 ORDER BY ended_at DESC",
            )?;
            let mapped = stmt.query_map(params![user_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };
        rows.into_iter().map(result_from_row).collect()
    }
}
