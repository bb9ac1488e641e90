//! Route lifecycle: create, load, delete, favorite, and the single
//! active route.
//!
//! Publishes `recent_routes` and `active_route`; BreakScheduler reacts
//! to the latter. Reacts itself to identity changes by (re)loading the
//! signed-in user's routes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::identity::IdentityContext;
use crate::model::{GeoPoint, Route, User};
use crate::observable::{Observable, Subscription};
use crate::providers::RoutingProvider;
use crate::storage::Repository;

pub struct RouteLifecycle {
    repo: Arc<dyn Repository>,
    routing: Arc<dyn RoutingProvider>,
    current_user: Observable<Option<User>>,
    recent_routes: Observable<Vec<Route>>,
    active_route: Observable<Option<Route>>,
    last_error: Observable<Option<String>>,
    loading: Observable<bool>,
    /// Serializes compound read-modify-write updates of the published
    /// lists (never held across an await).
    state_lock: Mutex<()>,
    /// Bumped per identity change so a stale route load cannot clobber
    /// a newer session's list.
    generation: AtomicU64,
    last_user_id: Mutex<Option<String>>,
    self_weak: Weak<Self>,
    _user_sub: Mutex<Option<Subscription>>,
}

impl RouteLifecycle {
    /// Build the manager and subscribe it to identity changes.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        repo: Arc<dyn Repository>,
        routing: Arc<dyn RoutingProvider>,
        identity: &IdentityContext,
    ) -> Arc<Self> {
        let mgr = Arc::new_cyclic(|weak| Self {
            repo,
            routing,
            current_user: identity.current_user(),
            recent_routes: Observable::new(Vec::new()),
            active_route: Observable::new(None),
            last_error: Observable::new(None),
            loading: Observable::new(false),
            state_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            last_user_id: Mutex::new(None),
            self_weak: weak.clone(),
            _user_sub: Mutex::new(None),
        });

        let weak = Arc::downgrade(&mgr);
        let sub = identity.current_user().subscribe(move |user| {
            if let Some(mgr) = weak.upgrade() {
                mgr.on_user_changed(user.as_ref().map(|u| u.id.clone()));
            }
        });
        *mgr._user_sub.lock().unwrap_or_else(PoisonError::into_inner) = Some(sub);
        mgr
    }

    fn on_user_changed(&self, user_id: Option<String>) {
        {
            let mut last = self
                .last_user_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *last == user_id {
                return; // preference update etc., same session
            }
            *last = user_id.clone();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match user_id {
            None => {
                self.recent_routes.set(Vec::new());
                self.active_route.set(None);
            }
            Some(id) => {
                let Some(mgr) = self.self_weak.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    if let Err(err) = mgr.load_routes_guarded(&id, generation).await {
                        warn!(error = %err, "route load failed");
                    }
                });
            }
        }
    }

    async fn load_routes_guarded(&self, user_id: &str, generation: u64) -> Result<(), CoreError> {
        self.loading.set(true);
        let fetched = self.repo.fetch_routes(user_id).await;
        self.loading.set(false);
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(()); // a newer identity change owns the list now
        }
        match fetched {
            Ok(routes) => {
                debug!(count = routes.len(), "routes loaded");
                self.recent_routes.set(routes);
                Ok(())
            }
            Err(err) => {
                let err: CoreError = err.into();
                self.last_error.set(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Fetch the signed-in user's routes, replacing the published list.
    pub async fn load_routes(&self) -> Result<Vec<Route>, CoreError> {
        let Some(user) = self.current_user.get() else {
            return Err(CoreError::Auth("no user signed in".into()));
        };
        let generation = self.generation.load(Ordering::SeqCst);
        self.load_routes_guarded(&user.id, generation).await?;
        Ok(self.recent_routes.get())
    }

    /// Compute, persist and activate a new route.
    ///
    /// On routing or persistence failure the computed route is
    /// discarded; no partial state is retained.
    pub async fn create_route(
        &self,
        name: &str,
        start: GeoPoint,
        end: GeoPoint,
        waypoints: Vec<GeoPoint>,
    ) -> Result<Route, CoreError> {
        let Some(user) = self.current_user.get() else {
            return Err(CoreError::Auth("no user signed in".into()));
        };
        self.loading.set(true);
        let result = self
            .create_route_inner(&user, name, start, end, waypoints)
            .await;
        self.loading.set(false);
        if let Err(err) = &result {
            self.last_error.set(Some(err.to_string()));
        }
        result
    }

    async fn create_route_inner(
        &self,
        user: &User,
        name: &str,
        start: GeoPoint,
        end: GeoPoint,
        waypoints: Vec<GeoPoint>,
    ) -> Result<Route, CoreError> {
        let geometry = self.routing.compute(start, end, &waypoints).await?;
        let route = Route {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            name: name.to_string(),
            start,
            end,
            waypoints,
            polyline: geometry.polyline,
            estimated_duration_secs: geometry.duration_secs,
            distance_m: geometry.distance_m,
            created_at: Utc::now(),
            favorite: false,
        };
        self.repo.save_route(&route).await?;

        {
            let _guard = self.lock_state();
            let mut routes = self.recent_routes.get();
            routes.insert(0, route.clone());
            self.recent_routes.set(routes);
        }
        self.active_route.set(Some(route.clone()));
        Ok(route)
    }

    /// Select the route for trip monitoring. Idempotent for subscribers
    /// when the value is unchanged.
    pub fn set_active_route(&self, route: Route) {
        self.active_route.set(Some(route));
    }

    pub fn clear_active_route(&self) {
        self.active_route.set(None);
    }

    /// Remove a route from store and list; clears the active route if it
    /// was the deleted one (downstream schedules cascade away).
    pub async fn delete_route(&self, route: &Route) -> Result<(), CoreError> {
        self.repo.delete_route(&route.id).await?;
        {
            let _guard = self.lock_state();
            let mut routes = self.recent_routes.get();
            routes.retain(|r| r.id != route.id);
            self.recent_routes.set(routes);
        }
        if self.active_route.get().is_some_and(|r| r.id == route.id) {
            self.active_route.set(None);
        }
        Ok(())
    }

    /// Flip the favorite flag, optimistically: the local flip is
    /// published first and stands even if the write fails (the failure
    /// is logged and surfaced on `last_error`).
    pub async fn toggle_favorite(&self, route: &Route) -> Route {
        let mut updated = route.clone();
        updated.favorite = !updated.favorite;

        {
            let _guard = self.lock_state();
            let mut routes = self.recent_routes.get();
            if let Some(entry) = routes.iter_mut().find(|r| r.id == updated.id) {
                *entry = updated.clone();
            }
            self.recent_routes.set(routes);
        }
        if self.active_route.get().is_some_and(|r| r.id == updated.id) {
            self.active_route.set(Some(updated.clone()));
        }

        if let Err(err) = self.repo.save_route(&updated).await {
            warn!(route_id = %updated.id, error = %err, "favorite flip not persisted");
            self.last_error.set(Some(err.to_string()));
        }
        updated
    }

    pub fn recent_routes(&self) -> Observable<Vec<Route>> {
        self.recent_routes.clone()
    }

    pub fn active_route(&self) -> Observable<Option<Route>> {
        self.active_route.clone()
    }

    pub fn last_error(&self) -> Observable<Option<String>> {
        self.last_error.clone()
    }

    pub fn loading(&self) -> Observable<bool> {
        self.loading.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ()> {
        self.state_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
