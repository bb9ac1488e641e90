//! Break scheduling and monitoring.
//!
//! `BreakScheduler` reacts to active-route changes: it derives a break
//! schedule from the predicted interval, persists it, and runs a
//! periodic monitor that promotes the next due break and requests a
//! notification exactly once per point.
//!
//! Phase machine per active route: `Idle -> Scheduling -> Monitoring ->
//! Idle`, re-entered on every route change or clear.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{BreakPoint, GeoPoint, Poi, Route};
use crate::observable::{Observable, Subscription};
use crate::providers::{NotificationSink, PlaceSearchProvider, PredictionModel};
use crate::route::RouteLifecycle;
use crate::storage::Repository;

const BREAK_TITLE: &str = "Time for a break!";
const BREAK_BODY: &str = "You've been driving for a while. Time to stretch and refresh.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    Idle,
    Scheduling,
    Monitoring,
}

/// Timing knobs for the scheduler, usually taken from
/// [`crate::storage::config::SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Monitor tick period.
    pub period: StdDuration,
    /// How far ahead of its scheduled time a break becomes "upcoming".
    pub lead_window_secs: i64,
    /// Planned duration of each generated break.
    pub break_duration_secs: i64,
    /// Interval used when the prediction model fails.
    pub default_interval_secs: i64,
    /// Radius for POI lookup around a break location.
    pub poi_radius_m: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            period: StdDuration::from_secs(60),
            lead_window_secs: 900,
            break_duration_secs: 900,
            default_interval_secs: 7200,
            poi_radius_m: 5000.0,
        }
    }
}

/// Strategy for placing a break along a route.
///
/// The naive policy pins every break to the route start; a routing
/// provider that keeps geometry around can interpolate a real position
/// (see `GreatCircleRouter`).
pub trait BreakPlacement: Send + Sync {
    /// Location for a break at `fraction` (0..=1) of the trip.
    fn locate(&self, route: &Route, fraction: f64) -> GeoPoint;
}

/// Placeholder placement: every break sits at the route start.
pub struct RouteStartPlacement;

impl BreakPlacement for RouteStartPlacement {
    fn locate(&self, route: &Route, _fraction: f64) -> GeoPoint {
        route.start
    }
}

/// Derive the break sequence for a route.
///
/// The count is `floor(duration / interval)` with the *unclamped*
/// predicted interval: an interval at or beyond the trip duration
/// yields no points, so no break is ever scheduled at or past arrival.
/// Point `k` (0-based) is due at `now + interval * (k + 1)`.
pub fn generate_break_points(
    route: &Route,
    interval_secs: i64,
    now: DateTime<Utc>,
    break_duration_secs: i64,
    placement: &dyn BreakPlacement,
) -> Vec<BreakPoint> {
    let duration = route.estimated_duration_secs;
    if duration <= 0 || interval_secs <= 0 || interval_secs > duration {
        return Vec::new();
    }
    let count = (duration / interval_secs) as usize;
    (0..count)
        .map(|k| {
            let offset = interval_secs * (k as i64 + 1);
            BreakPoint {
                id: Uuid::new_v4().to_string(),
                route_id: route.id.clone(),
                location: placement.locate(route, offset as f64 / duration as f64),
                scheduled_time: now + Duration::seconds(offset),
                poi: None,
                duration_secs: break_duration_secs,
                completed: false,
                notes: Some(format!("Break #{}", k + 1)),
            }
        })
        .collect()
}

struct SchedulerState {
    /// Break point ids that already triggered a notification.
    notified: HashSet<String>,
    /// Bumped on every active-route transition; in-flight scheduling
    /// work checks it before publishing.
    generation: u64,
}

pub struct BreakScheduler {
    repo: Arc<dyn Repository>,
    prediction: Arc<dyn PredictionModel>,
    notifier: Arc<dyn NotificationSink>,
    placement: Arc<dyn BreakPlacement>,
    places: Arc<dyn PlaceSearchProvider>,
    settings: MonitorSettings,
    phase: Observable<SchedulerPhase>,
    scheduled_breaks: Observable<Vec<BreakPoint>>,
    upcoming_break: Observable<Option<BreakPoint>>,
    last_error: Observable<Option<String>>,
    state: Mutex<SchedulerState>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<Self>,
    _route_sub: Mutex<Option<Subscription>>,
}

impl BreakScheduler {
    /// Build the scheduler and subscribe it to active-route changes.
    ///
    /// Must be called within a tokio runtime: scheduling and the
    /// monitor run as spawned tasks.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn Repository>,
        prediction: Arc<dyn PredictionModel>,
        notifier: Arc<dyn NotificationSink>,
        placement: Arc<dyn BreakPlacement>,
        places: Arc<dyn PlaceSearchProvider>,
        settings: MonitorSettings,
        routes: &RouteLifecycle,
    ) -> Arc<Self> {
        let scheduler = Arc::new_cyclic(|weak| Self {
            repo,
            prediction,
            notifier,
            placement,
            places,
            settings,
            phase: Observable::new(SchedulerPhase::Idle),
            scheduled_breaks: Observable::new(Vec::new()),
            upcoming_break: Observable::new(None),
            last_error: Observable::new(None),
            state: Mutex::new(SchedulerState {
                notified: HashSet::new(),
                generation: 0,
            }),
            monitor: Mutex::new(None),
            self_weak: weak.clone(),
            _route_sub: Mutex::new(None),
        });

        let weak = Arc::downgrade(&scheduler);
        let sub = routes.active_route().subscribe(move |route| {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.on_route_changed(route.clone());
            }
        });
        *scheduler
            ._route_sub
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sub);
        scheduler
    }

    fn on_route_changed(&self, route: Option<Route>) {
        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.generation
        };
        self.cancel_monitor();

        match route {
            None => self.clear_schedule(),
            Some(route) => {
                // The outgoing schedule is this driver's most recent
                // break history; hand it to the prediction model before
                // the switch clears it.
                let history = self.scheduled_breaks.get();
                self.scheduled_breaks.set(Vec::new());
                self.upcoming_break.set(None);
                self.phase.set(SchedulerPhase::Scheduling);
                let Some(scheduler) = self.self_weak.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    scheduler.schedule_for_route(route, history, generation).await;
                });
            }
        }
    }

    async fn schedule_for_route(
        self: Arc<Self>,
        route: Route,
        history: Vec<BreakPoint>,
        generation: u64,
    ) {
        let interval = match self
            .prediction
            .predict_interval(route.estimated_duration_secs, &history)
        {
            Ok(interval) => interval,
            Err(err) => {
                warn!(error = %err, "prediction unavailable, using default interval");
                self.settings.default_interval_secs
            }
        };

        let points = generate_break_points(
            &route,
            interval,
            Utc::now(),
            self.settings.break_duration_secs,
            self.placement.as_ref(),
        );
        info!(route_id = %route.id, interval_secs = interval, count = points.len(), "break schedule computed");

        if let Err(err) = self.persist_schedule(&route.id, &points).await {
            self.last_error.set(Some(err.to_string()));
            if self.lock_state().generation == generation {
                self.scheduled_breaks.set(Vec::new());
                self.upcoming_break.set(None);
                self.phase.set(SchedulerPhase::Idle);
            }
            return;
        }

        {
            let mut state = self.lock_state();
            if state.generation != generation {
                debug!(route_id = %route.id, "discarding stale schedule");
                return;
            }
            state.notified.clear();
        }
        self.scheduled_breaks.set(points);
        self.phase.set(SchedulerPhase::Monitoring);
        self.restart_monitor();
        self.evaluate_upcoming();
    }

    async fn persist_schedule(
        &self,
        route_id: &str,
        points: &[BreakPoint],
    ) -> Result<(), CoreError> {
        // Replace any schedule a previous activation left behind.
        self.repo.delete_break_points(route_id).await?;
        for point in points {
            self.repo.save_break_point(point).await?;
        }
        Ok(())
    }

    fn clear_schedule(&self) {
        {
            let mut state = self.lock_state();
            state.notified.clear();
        }
        self.scheduled_breaks.set(Vec::new());
        self.upcoming_break.set(None);
        self.phase.set(SchedulerPhase::Idle);
    }

    /// One monitor evaluation: promote the first incomplete point inside
    /// the lead window, or clear the upcoming value.
    fn evaluate_upcoming(&self) {
        let breaks = self.scheduled_breaks.get();
        let next = breaks.iter().find(|b| !b.completed);
        let due = next.filter(|b| {
            (b.scheduled_time - Utc::now()).num_seconds() <= self.settings.lead_window_secs
        });

        match due {
            Some(point) => {
                let first_notice = {
                    let mut state = self.lock_state();
                    state.notified.insert(point.id.clone())
                };
                self.upcoming_break.set(Some(point.clone()));
                if first_notice {
                    info!(break_id = %point.id, at = %point.scheduled_time, "break due soon");
                    if let Err(err) =
                        self.notifier
                            .schedule(point.scheduled_time, BREAK_TITLE, BREAK_BODY)
                    {
                        warn!(error = %err, "break notification not delivered");
                    }
                }
            }
            None => {
                self.upcoming_break.set(None);
            }
        }
    }

    fn restart_monitor(&self) {
        self.cancel_monitor();
        let weak = self.self_weak.clone();
        let period = self.settings.period;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick; evaluation already ran
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(scheduler) => scheduler.evaluate_upcoming(),
                    None => break,
                }
            }
        });
        *self.lock_monitor() = Some(handle);
    }

    fn cancel_monitor(&self) {
        if let Some(handle) = self.lock_monitor().take() {
            handle.abort();
        }
    }

    /// Mark a break completed. Idempotent: completing an already
    /// completed point is a no-op. Re-evaluates the upcoming break
    /// immediately instead of waiting for the next tick.
    pub async fn complete_break(&self, point: &BreakPoint) -> Result<(), CoreError> {
        let updated = {
            let _guard = self.lock_state();
            let mut points = self.scheduled_breaks.get();
            let Some(entry) = points.iter_mut().find(|p| p.id == point.id) else {
                return Err(CoreError::NotFound {
                    entity: "break point",
                    id: point.id.clone(),
                });
            };
            if entry.completed {
                return Ok(());
            }
            entry.completed = true;
            let updated = entry.clone();
            self.scheduled_breaks.set(points);
            updated
        };
        self.evaluate_upcoming();

        if let Err(err) = self.repo.update_break_point(&updated).await {
            let err: CoreError = err.into();
            self.last_error.set(Some(err.to_string()));
            return Err(err);
        }
        Ok(())
    }

    /// Resume a persisted schedule (session restore). Re-enters
    /// `Monitoring` when incomplete points remain.
    pub async fn load_schedule(&self, route_id: &str) -> Result<(), CoreError> {
        let mut points = self.repo.fetch_break_points(route_id).await?;
        points.sort_by_key(|p| p.scheduled_time);
        {
            let mut state = self.lock_state();
            state.notified.clear();
        }
        let has_open = points.iter().any(|p| !p.completed);
        self.scheduled_breaks.set(points);
        if has_open {
            self.phase.set(SchedulerPhase::Monitoring);
            self.restart_monitor();
            self.evaluate_upcoming();
        } else {
            self.cancel_monitor();
            self.upcoming_break.set(None);
            self.phase.set(SchedulerPhase::Idle);
        }
        Ok(())
    }

    /// POIs near a break location, filtered by the given category names.
    pub async fn find_nearby_pois(
        &self,
        point: &BreakPoint,
        categories: &[String],
    ) -> Result<Vec<Poi>, CoreError> {
        self.places
            .search_nearby(point.location, self.settings.poi_radius_m, categories)
            .await
    }

    /// Attach a POI to a break point, in memory and in the store.
    pub async fn attach_poi(&self, point: &BreakPoint, poi: Poi) -> Result<BreakPoint, CoreError> {
        let updated = {
            let _guard = self.lock_state();
            let mut points = self.scheduled_breaks.get();
            let Some(entry) = points.iter_mut().find(|p| p.id == point.id) else {
                return Err(CoreError::NotFound {
                    entity: "break point",
                    id: point.id.clone(),
                });
            };
            entry.poi = Some(poi);
            let updated = entry.clone();
            self.scheduled_breaks.set(points);
            updated
        };
        if let Err(err) = self.repo.update_break_point(&updated).await {
            let err: CoreError = err.into();
            self.last_error.set(Some(err.to_string()));
            return Err(err);
        }
        Ok(updated)
    }

    pub fn phase(&self) -> Observable<SchedulerPhase> {
        self.phase.clone()
    }

    pub fn scheduled_breaks(&self) -> Observable<Vec<BreakPoint>> {
        self.scheduled_breaks.clone()
    }

    pub fn upcoming_break(&self) -> Observable<Option<BreakPoint>> {
        self.upcoming_break.clone()
    }

    pub fn last_error(&self) -> Observable<Option<String>> {
        self.last_error.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_monitor(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BreakScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_monitor().take() {
            handle.abort();
        }
    }
}
