use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use clap::Subcommand;

use roadrest_core::catalog::default_catalog;
use roadrest_core::error::CoreError;
use roadrest_core::observable::Observable;
use roadrest_core::providers::{IdentityProvider, RouteGeometry, RoutingProvider};
use roadrest_core::{
    GeoPoint, HeuristicPrediction, MemoryRepository, MonitorSettings, RouteStartPlacement,
    TripDeps, TripSession,
};

use crate::common::{self, CliError};
use crate::notify::ConsoleNotifier;
use crate::state;

#[derive(Subcommand)]
pub enum TripAction {
    /// Monitor the active route until interrupted (Ctrl+C)
    Watch {
        /// Route to activate first (defaults to the stored active trip)
        #[arg(long)]
        route: Option<String>,
    },
    /// Run a compressed end-to-end demonstration in memory
    Demo,
}

pub async fn run(action: TripAction) -> Result<(), CliError> {
    match action {
        TripAction::Watch { route } => watch(route).await,
        TripAction::Demo => demo().await,
    }
}

async fn watch(route_arg: Option<String>) -> Result<(), CliError> {
    let ctx = common::context().await?;
    common::require_user(&ctx).await?;
    let routes = ctx.session.routes.load_routes().await?;

    let needle = route_arg
        .or_else(state::active_route_id)
        .ok_or("no active trip (run `roadrest route activate <route>`) ")?;
    let route = common::find_route(&routes, &needle)?;
    println!(
        "watching '{}' ({}, {})",
        route.name,
        common::format_distance(route.distance_m),
        common::format_duration(route.estimated_duration_secs),
    );

    let _breaks_sub = ctx.session.breaks.scheduled_breaks().subscribe(|points| {
        if !points.is_empty() {
            let open = points.iter().filter(|p| !p.completed).count();
            println!("schedule: {} break(s), {open} open", points.len());
        }
    });
    let _upcoming_sub = ctx.session.breaks.upcoming_break().subscribe(|upcoming| {
        if let Some(point) = upcoming {
            println!(
                "next break {} at {}",
                common::short_id(&point.id),
                point.scheduled_time.with_timezone(&Local).format("%H:%M"),
            );
        }
    });
    let _recommended_sub = ctx.session.exercises.recommended().subscribe(|exercise| {
        if let Some(exercise) = exercise {
            println!(
                "suggested exercise: {} ({}s, {:?})",
                exercise.name, exercise.duration_secs, exercise.difficulty,
            );
        }
    });

    state::set_active_route_id(Some(&route.id))?;
    ctx.session.routes.set_active_route(route);

    println!("press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    ctx.session.routes.clear_active_route();
    println!("\ntrip monitoring stopped");
    Ok(())
}

// ── Demo ─────────────────────────────────────────────────────────────

/// Identity provider that accepts anything; demo only.
struct DemoIdentity {
    signal: Observable<Option<String>>,
}

#[async_trait]
impl IdentityProvider for DemoIdentity {
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

/// Fixed 40-second "drive" so the demo finishes quickly.
struct DemoRouting;

#[async_trait]
impl RoutingProvider for DemoRouting {
    async fn compute(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        _waypoints: &[GeoPoint],
    ) -> Result<RouteGeometry, CoreError> {
        Ok(RouteGeometry {
            polyline: vec![start, end],
            duration_secs: 40,
            distance_m: 1_000.0,
        })
    }
}

async fn demo() -> Result<(), CliError> {
    println!("demo: 40s drive, a break every 10s, everything in memory\n");

    let session = TripSession::new(TripDeps {
        repo: Arc::new(MemoryRepository::new()),
        routing: Arc::new(DemoRouting),
        places: Arc::new(NoDemoPlaces),
        prediction: Arc::new(HeuristicPrediction::new(default_catalog(), 10)),
        notifier: Arc::new(ConsoleNotifier::new(true)),
        identity: Arc::new(DemoIdentity {
            signal: Observable::new(None),
        }),
        placement: Arc::new(RouteStartPlacement),
        settings: MonitorSettings {
            period: Duration::from_secs(1),
            lead_window_secs: 12,
            break_duration_secs: 120,
            default_interval_secs: 10,
            poi_radius_m: 5000.0,
        },
    });

    session
        .identity
        .sign_up("demo@roadrest.local", "demo", "Demo Driver")
        .await?;
    session
        .routes
        .create_route(
            "Demo drive",
            GeoPoint::new(48.137, 11.575),
            GeoPoint::new(48.265, 11.671),
            vec![],
        )
        .await?;

    // Wait for the schedule, then walk the whole trip: exercise through
    // each break as it comes due.
    for _ in 0..100 {
        if !session.breaks.scheduled_breaks().get().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let total = session.breaks.scheduled_breaks().get().len();
    println!("scheduled {total} breaks\n");

    let mut completed = 0;
    let mut ticks = 0;
    while completed < total {
        ticks += 1;
        if ticks > 400 {
            return Err("demo stalled waiting for a break".into());
        }
        let Some(point) = session.breaks.upcoming_break().get() else {
            tokio::time::sleep(Duration::from_millis(250)).await;
            continue;
        };
        if let Some(exercise) = session.exercises.recommended().get() {
            println!("> starting '{}'", exercise.name);
            session.exercises.start_exercise(exercise)?;
            tokio::time::sleep(Duration::from_millis(1500)).await;
            let result = session.exercises.stop_exercise().await?;
            println!(
                "> finished at {:.0}% ({:.1} kcal)",
                result.completion_pct,
                result.calories_burned(),
            );
        }
        session.breaks.complete_break(&point).await?;
        completed += 1;
        println!("> break {completed}/{total} done\n");
    }

    session.routes.clear_active_route();
    let history = session.exercises.history().get();
    println!("demo complete: {} exercise(s) recorded", history.len());
    Ok(())
}

struct NoDemoPlaces;

#[async_trait]
impl roadrest_core::providers::PlaceSearchProvider for NoDemoPlaces {
    async fn search_nearby(
        &self,
        _location: GeoPoint,
        _radius_m: f64,
        _categories: &[String],
    ) -> Result<Vec<roadrest_core::Poi>, CoreError> {
        Ok(Vec::new())
    }
}
