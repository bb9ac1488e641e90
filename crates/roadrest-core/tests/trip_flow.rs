//! End-to-end tests of the trip-session manager graph with fake
//! collaborators: identity change -> route load -> break schedule ->
//! upcoming break -> exercise recommendation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use roadrest_core::catalog::default_catalog;
use roadrest_core::error::{CoreError, StoreError};
use roadrest_core::model::{BreakPoint, ExerciseResult, GeoPoint, Poi, Route, User};
use roadrest_core::observable::Observable;
use roadrest_core::providers::{
    IdentityProvider, NotificationSink, PlaceSearchProvider, RouteGeometry, RoutingProvider,
};
use roadrest_core::storage::Repository;
use roadrest_core::{
    HeuristicPrediction, MemoryRepository, MonitorSettings, RouteStartPlacement, SchedulerPhase,
    SessionPhase, TripDeps, TripSession,
};

const START: GeoPoint = GeoPoint { lat: 48.137, lon: 11.575 };
const END: GeoPoint = GeoPoint { lat: 52.520, lon: 13.405 };

// ── Fakes ────────────────────────────────────────────────────────────

struct FakeIdentity {
    signal: Observable<Option<String>>,
}

impl FakeIdentity {
    fn new() -> Self {
        Self {
            signal: Observable::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn signal(&self) -> Observable<Option<String>> {
        self.signal.clone()
    }

    async fn authenticate(&self, email: &str, _password: &str) -> Result<String, CoreError> {
        self.signal.set(Some(email.to_string()));
        Ok(email.to_string())
    }

    async fn register(
        &self,
        email: &str,
        _password: &str,
        _name: &str,
    ) -> Result<String, CoreError> {
        self.signal.set(Some(email.to_string()));
        Ok(email.to_string())
    }

    async fn sign_out(&self) {
        self.signal.set(None);
    }
}

struct FakeRouting {
    duration_secs: i64,
    fail: bool,
}

#[async_trait]
impl RoutingProvider for FakeRouting {
    async fn compute(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        _waypoints: &[GeoPoint],
    ) -> Result<RouteGeometry, CoreError> {
        if self.fail {
            return Err(CoreError::Routing("no road between these points".into()));
        }
        Ok(RouteGeometry {
            polyline: vec![start, end],
            duration_secs: self.duration_secs,
            distance_m: 100_000.0,
        })
    }
}

struct NoPlaces;

#[async_trait]
impl PlaceSearchProvider for NoPlaces {
    async fn search_nearby(
        &self,
        _location: GeoPoint,
        _radius_m: f64,
        _categories: &[String],
    ) -> Result<Vec<Poi>, CoreError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CountingNotifier {
    count: AtomicUsize,
}

impl NotificationSink for CountingNotifier {
    fn schedule(
        &self,
        _at: DateTime<Utc>,
        _title: &str,
        _body: &str,
    ) -> Result<(), CoreError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Delegates to a [`MemoryRepository`], with an injectable route-save
/// failure for the optimistic-write tests.
struct FlakyRepo {
    inner: MemoryRepository,
    fail_save_route: AtomicBool,
}

impl FlakyRepo {
    fn new() -> Self {
        Self {
            inner: MemoryRepository::new(),
            fail_save_route: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Repository for FlakyRepo {
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.save_user(user).await
    }
    async fn fetch_user(&self, user_id: &str) -> Result<User, StoreError> {
        self.inner.fetch_user(user_id).await
    }
    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.update_user(user).await
    }
    async fn save_route(&self, route: &Route) -> Result<(), StoreError> {
        if self.fail_save_route.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        self.inner.save_route(route).await
    }
    async fn fetch_routes(&self, user_id: &str) -> Result<Vec<Route>, StoreError> {
        self.inner.fetch_routes(user_id).await
    }
    async fn delete_route(&self, route_id: &str) -> Result<(), StoreError> {
        self.inner.delete_route(route_id).await
    }
    async fn save_break_point(&self, point: &BreakPoint) -> Result<(), StoreError> {
        self.inner.save_break_point(point).await
    }
    async fn fetch_break_points(&self, route_id: &str) -> Result<Vec<BreakPoint>, StoreError> {
        self.inner.fetch_break_points(route_id).await
    }
    async fn update_break_point(&self, point: &BreakPoint) -> Result<(), StoreError> {
        self.inner.update_break_point(point).await
    }
    async fn delete_break_points(&self, route_id: &str) -> Result<(), StoreError> {
        self.inner.delete_break_points(route_id).await
    }
    async fn save_exercise_result(
        &self,
        user_id: &str,
        result: &ExerciseResult,
    ) -> Result<(), StoreError> {
        self.inner.save_exercise_result(user_id, result).await
    }
    async fn fetch_exercise_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<ExerciseResult>, StoreError> {
        self.inner.fetch_exercise_history(user_id).await
    }
}

// ── Harness ──────────────────────────────────────────────────────────

struct Harness {
    session: TripSession,
    repo: Arc<MemoryRepository>,
    notifier: Arc<CountingNotifier>,
}

fn test_settings() -> MonitorSettings {
    MonitorSettings {
        period: StdDuration::from_millis(25),
        lead_window_secs: 900,
        break_duration_secs: 900,
        default_interval_secs: 7200,
        poi_radius_m: 5000.0,
    }
}

fn harness(route_duration_secs: i64, interval_secs: i64) -> Harness {
    harness_with(
        Arc::new(MemoryRepository::new()),
        route_duration_secs,
        interval_secs,
        test_settings(),
    )
}

fn harness_with(
    repo: Arc<MemoryRepository>,
    route_duration_secs: i64,
    interval_secs: i64,
    settings: MonitorSettings,
) -> Harness {
    let notifier = Arc::new(CountingNotifier::default());
    let session = TripSession::new(TripDeps {
        repo: repo.clone(),
        routing: Arc::new(FakeRouting {
            duration_secs: route_duration_secs,
            fail: false,
        }),
        places: Arc::new(NoPlaces),
        prediction: Arc::new(HeuristicPrediction::new(default_catalog(), interval_secs)),
        notifier: notifier.clone(),
        identity: Arc::new(FakeIdentity::new()),
        placement: Arc::new(RouteStartPlacement),
        settings,
    });
    Harness {
        session,
        repo,
        notifier,
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}

async fn sign_up(session: &TripSession) -> User {
    session
        .identity
        .sign_up("driver@example.com", "hunter2", "Driver")
        .await
        .expect("sign up")
}

// ── Scheduling ───────────────────────────────────────────────────────

#[tokio::test]
async fn activating_a_route_derives_the_break_schedule() {
    let h = harness(14_400, 7_200);
    sign_up(&h.session).await;

    let before = Utc::now();
    let route = h
        .session
        .routes
        .create_route("Munich to Berlin", START, END, vec![])
        .await
        .expect("create route");
    assert_eq!(route.estimated_duration_secs, 14_400);
    assert_eq!(h.session.routes.active_route().get().map(|r| r.id), Some(route.id.clone()));

    eventually("two breaks scheduled", || {
        h.session.breaks.scheduled_breaks().get().len() == 2
    })
    .await;
    assert_eq!(h.session.breaks.phase().get(), SchedulerPhase::Monitoring);

    let points = h.session.breaks.scheduled_breaks().get();
    assert!(points[0].scheduled_time < points[1].scheduled_time);
    assert!(points[0].scheduled_time >= before + Duration::seconds(7_200));
    assert!(points[1].scheduled_time >= before + Duration::seconds(14_400));
    assert!(points.iter().all(|p| p.route_id == route.id));

    // Both breaks are hours away: nothing upcoming, nothing notified.
    assert_eq!(h.session.breaks.upcoming_break().get(), None);
    assert_eq!(h.notifier.count.load(Ordering::SeqCst), 0);
    assert!(!h.session.routes.loading().get());

    // The schedule is persisted in one batch.
    assert_eq!(h.repo.fetch_break_points(&route.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn interval_beyond_duration_schedules_nothing() {
    let h = harness(1_800, 7_200);
    sign_up(&h.session).await;
    h.session
        .routes
        .create_route("Short hop", START, END, vec![])
        .await
        .expect("create route");

    eventually("scheduler reaches monitoring", || {
        h.session.breaks.phase().get() == SchedulerPhase::Monitoring
    })
    .await;
    assert!(h.session.breaks.scheduled_breaks().get().is_empty());
    assert_eq!(h.session.breaks.upcoming_break().get(), None);
}

#[tokio::test]
async fn due_break_is_promoted_and_notified_exactly_once() {
    // 120s interval on a 1000s trip: first break is inside the lead
    // window as soon as the schedule lands.
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    h.session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");

    eventually("first break promoted", || {
        h.session.breaks.upcoming_break().get().is_some()
    })
    .await;
    let upcoming = h.session.breaks.upcoming_break().get().unwrap();
    let first = &h.session.breaks.scheduled_breaks().get()[0];
    assert_eq!(upcoming.id, first.id);
    assert_eq!(h.notifier.count.load(Ordering::SeqCst), 1);

    // Several monitor ticks later it is still a single notification.
    tokio::time::sleep(StdDuration::from_millis(150)).await;
    assert_eq!(h.notifier.count.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.breaks.upcoming_break().get().unwrap().id, upcoming.id);
}

#[tokio::test]
async fn complete_break_advances_immediately_and_is_idempotent() {
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    let route = h
        .session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");

    eventually("first break promoted", || {
        h.session.breaks.upcoming_break().get().is_some()
    })
    .await;
    let first = h.session.breaks.upcoming_break().get().unwrap();

    h.session.breaks.complete_break(&first).await.expect("complete");
    // Promotion does not wait for the next tick.
    let next = h.session.breaks.upcoming_break().get().expect("next break");
    assert_ne!(next.id, first.id);

    // Completing the same point again changes nothing.
    h.session.breaks.complete_break(&first).await.expect("idempotent");
    let persisted = h.repo.fetch_break_points(&route.id).await.unwrap();
    assert_eq!(persisted.iter().filter(|p| p.completed).count(), 1);
    assert!(persisted.iter().any(|p| p.id == first.id && p.completed));
}

#[tokio::test]
async fn completing_every_break_clears_the_upcoming_value() {
    let h = harness(240, 120);
    sign_up(&h.session).await;
    h.session
        .routes
        .create_route("Two stops", START, END, vec![])
        .await
        .expect("create route");

    eventually("schedule lands", || {
        h.session.breaks.scheduled_breaks().get().len() == 2
    })
    .await;
    for point in h.session.breaks.scheduled_breaks().get() {
        h.session.breaks.complete_break(&point).await.expect("complete");
    }
    assert_eq!(h.session.breaks.upcoming_break().get(), None);

    // Downstream, the orchestrator fell back to idle and dropped the
    // recommendation.
    eventually("orchestrator idle", || {
        h.session.exercises.phase().get() == SessionPhase::Idle
    })
    .await;
    assert_eq!(h.session.exercises.recommended().get(), None);
}

#[tokio::test]
async fn clearing_the_route_cancels_the_monitor() {
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    h.session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");

    eventually("monitoring with a due break", || {
        h.session.breaks.upcoming_break().get().is_some()
    })
    .await;

    h.session.routes.clear_active_route();
    eventually("scheduler idle", || {
        h.session.breaks.phase().get() == SchedulerPhase::Idle
    })
    .await;
    assert!(h.session.breaks.scheduled_breaks().get().is_empty());
    assert_eq!(h.session.breaks.upcoming_break().get(), None);

    // No further ticks: the notification count stays frozen even though
    // the (now cleared) first break would be due again.
    let frozen = h.notifier.count.load(Ordering::SeqCst);
    tokio::time::sleep(StdDuration::from_millis(200)).await;
    assert_eq!(h.notifier.count.load(Ordering::SeqCst), frozen);
}

#[tokio::test]
async fn reactivating_a_route_replaces_the_persisted_schedule() {
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    let route = h
        .session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");

    eventually("first schedule lands", || {
        !h.session.breaks.scheduled_breaks().get().is_empty()
    })
    .await;
    let first_batch = h.session.breaks.scheduled_breaks().get();

    h.session.routes.clear_active_route();
    eventually("scheduler idle", || {
        h.session.breaks.phase().get() == SchedulerPhase::Idle
    })
    .await;
    h.session.routes.set_active_route(route.clone());
    eventually("second schedule lands", || {
        let points = h.session.breaks.scheduled_breaks().get();
        !points.is_empty() && points[0].id != first_batch[0].id
    })
    .await;

    // The store holds only the new batch.
    let persisted = h.repo.fetch_break_points(&route.id).await.unwrap();
    assert_eq!(persisted.len(), first_batch.len());
    assert!(persisted.iter().all(|p| first_batch.iter().all(|old| old.id != p.id)));
}

// ── Exercise orchestration ───────────────────────────────────────────

#[tokio::test]
async fn upcoming_break_triggers_a_deterministic_recommendation() {
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    h.session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");

    eventually("recommendation published", || {
        h.session.exercises.recommended().get().is_some()
    })
    .await;
    assert_eq!(h.session.exercises.phase().get(), SessionPhase::Recommending);
    // First catalog entry matching default prefs (easy stretching,
    // duration within the 900s break).
    assert_eq!(
        h.session.exercises.recommended().get().unwrap().id,
        "neck-stretches"
    );
}

#[tokio::test]
async fn exercise_session_runs_the_full_state_machine() {
    let h = harness(1_000, 120);
    let user = sign_up(&h.session).await;
    h.session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");
    eventually("recommendation published", || {
        h.session.exercises.recommended().get().is_some()
    })
    .await;

    let exercise = h.session.exercises.recommended().get().unwrap();
    h.session
        .exercises
        .start_exercise(exercise.clone())
        .expect("start");
    assert_eq!(h.session.exercises.phase().get(), SessionPhase::InProgress);

    // A second start is rejected and does not corrupt the session.
    let err = h.session.exercises.start_exercise(exercise.clone()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
    assert_eq!(h.session.exercises.phase().get(), SessionPhase::InProgress);

    assert!(h.session.exercises.pause_exercise());
    assert_eq!(h.session.exercises.phase().get(), SessionPhase::Paused);
    assert!(!h.session.exercises.pause_exercise());
    assert!(h.session.exercises.resume_exercise());

    let result = h.session.exercises.stop_exercise().await.expect("stop");
    assert_eq!(result.exercise_id, exercise.id);
    assert!((0.0..=100.0).contains(&result.completion_pct));
    assert_eq!(h.session.exercises.phase().get(), SessionPhase::Idle);

    // Exactly one result, most recent first, and persisted.
    let history = h.session.exercises.history().get();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, result.id);
    let persisted = h.repo.fetch_exercise_history(&user.id).await.unwrap();
    assert_eq!(persisted.len(), 1);

    // Stopping again without a session is invalid.
    assert!(h.session.exercises.stop_exercise().await.is_err());
}

#[tokio::test]
async fn load_history_is_most_recent_first() {
    let h = harness(1_000, 120);
    let user = sign_up(&h.session).await;
    let older = ExerciseResult {
        id: "e1".into(),
        exercise_id: "neck-stretches".into(),
        started_at: Utc::now() - Duration::seconds(600),
        ended_at: Utc::now() - Duration::seconds(480),
        duration_secs: 120,
        completion_pct: 100.0,
        feedback: None,
    };
    let newer = ExerciseResult {
        id: "e2".into(),
        exercise_id: "shoulder-rolls".into(),
        started_at: Utc::now() - Duration::seconds(120),
        ended_at: Utc::now(),
        duration_secs: 90,
        completion_pct: 75.0,
        feedback: None,
    };
    h.repo.save_exercise_result(&user.id, &older).await.unwrap();
    h.repo.save_exercise_result(&user.id, &newer).await.unwrap();

    let history = h.session.exercises.load_history().await.expect("history");
    assert_eq!(
        history.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["e2", "e1"]
    );
}

// ── Route lifecycle errors and identity cascade ──────────────────────

#[tokio::test]
async fn routing_failure_leaves_no_partial_state() {
    let repo = Arc::new(MemoryRepository::new());
    let notifier = Arc::new(CountingNotifier::default());
    let session = TripSession::new(TripDeps {
        repo: repo.clone(),
        routing: Arc::new(FakeRouting {
            duration_secs: 0,
            fail: true,
        }),
        places: Arc::new(NoPlaces),
        prediction: Arc::new(HeuristicPrediction::new(default_catalog(), 7200)),
        notifier,
        identity: Arc::new(FakeIdentity::new()),
        placement: Arc::new(RouteStartPlacement),
        settings: test_settings(),
    });
    sign_up(&session).await;

    let err = session
        .routes
        .create_route("Nowhere", START, END, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Routing(_)));
    assert!(session.routes.recent_routes().get().is_empty());
    assert_eq!(session.routes.active_route().get(), None);
    assert_eq!(session.breaks.phase().get(), SchedulerPhase::Idle);
    assert!(session.routes.last_error().get().is_some());
}

#[tokio::test]
async fn persistence_failure_discards_the_computed_route() {
    let repo = Arc::new(FlakyRepo::new());
    let notifier = Arc::new(CountingNotifier::default());
    let session = TripSession::new(TripDeps {
        repo: repo.clone(),
        routing: Arc::new(FakeRouting {
            duration_secs: 14_400,
            fail: false,
        }),
        places: Arc::new(NoPlaces),
        prediction: Arc::new(HeuristicPrediction::new(default_catalog(), 7200)),
        notifier,
        identity: Arc::new(FakeIdentity::new()),
        placement: Arc::new(RouteStartPlacement),
        settings: test_settings(),
    });
    sign_up(&session).await;
    repo.fail_save_route.store(true, Ordering::SeqCst);

    let err = session
        .routes
        .create_route("Munich to Berlin", START, END, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Persistence(_)));
    assert!(session.routes.recent_routes().get().is_empty());
    assert_eq!(session.routes.active_route().get(), None);
}

#[tokio::test]
async fn favorite_flip_survives_a_failed_write() {
    let repo = Arc::new(FlakyRepo::new());
    let notifier = Arc::new(CountingNotifier::default());
    let session = TripSession::new(TripDeps {
        repo: repo.clone(),
        routing: Arc::new(FakeRouting {
            duration_secs: 14_400,
            fail: false,
        }),
        places: Arc::new(NoPlaces),
        prediction: Arc::new(HeuristicPrediction::new(default_catalog(), 7200)),
        notifier,
        identity: Arc::new(FakeIdentity::new()),
        placement: Arc::new(RouteStartPlacement),
        settings: test_settings(),
    });
    sign_up(&session).await;
    let route = session
        .routes
        .create_route("Munich to Berlin", START, END, vec![])
        .await
        .expect("create route");

    repo.fail_save_route.store(true, Ordering::SeqCst);
    let flipped = session.routes.toggle_favorite(&route).await;

    // The optimistic flip stands; the failure is surfaced, not rolled back.
    assert!(flipped.favorite);
    assert!(session.routes.recent_routes().get()[0].favorite);
    assert!(session.routes.last_error().get().is_some());
}

#[tokio::test]
async fn deleting_the_active_route_cascades_downstream() {
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    let route = h
        .session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");
    eventually("schedule lands", || {
        !h.session.breaks.scheduled_breaks().get().is_empty()
    })
    .await;

    h.session.routes.delete_route(&route).await.expect("delete");
    assert!(h.session.routes.recent_routes().get().is_empty());
    assert_eq!(h.session.routes.active_route().get(), None);
    eventually("scheduler cleared", || {
        h.session.breaks.phase().get() == SchedulerPhase::Idle
            && h.session.breaks.scheduled_breaks().get().is_empty()
    })
    .await;
}

#[tokio::test]
async fn sign_out_tears_down_the_whole_graph() {
    let h = harness(1_000, 120);
    sign_up(&h.session).await;
    h.session
        .routes
        .create_route("City loop", START, END, vec![])
        .await
        .expect("create route");
    eventually("recommendation published", || {
        h.session.exercises.recommended().get().is_some()
    })
    .await;

    h.session.identity.sign_out().await;
    eventually("graph cleared", || {
        h.session.routes.recent_routes().get().is_empty()
            && h.session.routes.active_route().get().is_none()
            && h.session.breaks.phase().get() == SchedulerPhase::Idle
            && h.session.exercises.recommended().get().is_none()
    })
    .await;
    assert!(!h.session.identity.is_authenticated());
}

#[tokio::test]
async fn sign_in_loads_existing_routes() {
    let repo = Arc::new(MemoryRepository::new());
    // First session: create data.
    {
        let h = harness_with(repo.clone(), 14_400, 7_200, test_settings());
        sign_up(&h.session).await;
        h.session
            .routes
            .create_route("Munich to Berlin", START, END, vec![])
            .await
            .expect("create route");
    }
    // Second session over the same store: signing in loads the routes.
    let h = harness_with(repo, 14_400, 7_200, test_settings());
    h.session
        .identity
        .sign_in("driver@example.com", "hunter2")
        .await
        .expect("sign in");
    eventually("routes loaded", || {
        h.session.routes.recent_routes().get().len() == 1
    })
    .await;
}

#[tokio::test]
async fn load_schedule_resumes_monitoring_across_sessions() {
    let repo = Arc::new(MemoryRepository::new());
    let route_id = {
        let h = harness_with(repo.clone(), 1_000, 120, test_settings());
        sign_up(&h.session).await;
        let route = h
            .session
            .routes
            .create_route("City loop", START, END, vec![])
            .await
            .expect("create route");
        eventually("schedule persisted", || {
            !h.session.breaks.scheduled_breaks().get().is_empty()
        })
        .await;
        route.id
    };

    let h = harness_with(repo, 1_000, 120, test_settings());
    h.session
        .identity
        .sign_in("driver@example.com", "hunter2")
        .await
        .expect("sign in");
    h.session
        .breaks
        .load_schedule(&route_id)
        .await
        .expect("load schedule");

    assert_eq!(h.session.breaks.phase().get(), SchedulerPhase::Monitoring);
    assert!(!h.session.breaks.scheduled_breaks().get().is_empty());
    eventually("resumed schedule promotes a break", || {
        h.session.breaks.upcoming_break().get().is_some()
    })
    .await;
}
