//! In-memory repository for tests and ephemeral demo sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::Repository;
use crate::error::StoreError;
use crate::model::{BreakPoint, ExerciseResult, Route, User};

#[derive(Default)]
struct Store {
    users: HashMap<String, User>,
    routes: Vec<Route>,
    break_points: Vec<BreakPoint>,
    results: Vec<(String, ExerciseResult)>,
}

#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.lock().users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn fetch_user(&self, user_id: &str) -> Result<User, StoreError> {
        self.lock()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: user_id.into(),
            })
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut store = self.lock();
        if !store.users.contains_key(&user.id) {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user.id.clone(),
            });
        }
        store.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn save_route(&self, route: &Route) -> Result<(), StoreError> {
        let mut store = self.lock();
        store.routes.retain(|r| r.id != route.id);
        store.routes.push(route.clone());
        Ok(())
    }

    async fn fetch_routes(&self, user_id: &str) -> Result<Vec<Route>, StoreError> {
        let store = self.lock();
        let mut routes: Vec<Route> = store
            .routes
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        routes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(routes)
    }

    async fn delete_route(&self, route_id: &str) -> Result<(), StoreError> {
        let mut store = self.lock();
        let before = store.routes.len();
        store.routes.retain(|r| r.id != route_id);
        if store.routes.len() == before {
            return Err(StoreError::NotFound {
                entity: "route",
                id: route_id.into(),
            });
        }
        store.break_points.retain(|b| b.route_id != route_id);
        Ok(())
    }

    async fn save_break_point(&self, point: &BreakPoint) -> Result<(), StoreError> {
        let mut store = self.lock();
        store.break_points.retain(|b| b.id != point.id);
        store.break_points.push(point.clone());
        Ok(())
    }

    async fn fetch_break_points(&self, route_id: &str) -> Result<Vec<BreakPoint>, StoreError> {
        let store = self.lock();
        let mut points: Vec<BreakPoint> = store
            .break_points
            .iter()
            .filter(|b| b.route_id == route_id)
            .cloned()
            .collect();
        points.sort_by_key(|b| b.scheduled_time);
        Ok(points)
    }

    async fn update_break_point(&self, point: &BreakPoint) -> Result<(), StoreError> {
        let mut store = self.lock();
        match store.break_points.iter_mut().find(|b| b.id == point.id) {
            Some(existing) => {
                *existing = point.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "break point",
                id: point.id.clone(),
            }),
        }
    }

    async fn delete_break_points(&self, route_id: &str) -> Result<(), StoreError> {
        self.lock().break_points.retain(|b| b.route_id != route_id);
        Ok(())
    }

    async fn save_exercise_result(
        &self,
        user_id: &str,
        result: &ExerciseResult,
    ) -> Result<(), StoreError> {
        self.lock().results.push((user_id.into(), result.clone()));
        Ok(())
    }

    async fn fetch_exercise_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<ExerciseResult>, StoreError> {
        let store = self.lock();
        let mut history: Vec<ExerciseResult> = store
            .results
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, result)| result.clone())
            .collect();
        history.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        Ok(history)
    }
}
