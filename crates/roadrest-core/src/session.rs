//! Wiring for the trip-session manager graph.
//!
//! Managers are constructed once per process and handed to their
//! dependents by reference; the propagation graph is fixed here and is
//! a DAG by construction:
//!
//! ```text
//! IdentityContext.current_user -> RouteLifecycle
//! RouteLifecycle.active_route  -> BreakScheduler
//! BreakScheduler.upcoming_break -> ExerciseOrchestrator
//! ```

use std::sync::Arc;

use crate::breaks::{BreakPlacement, BreakScheduler, MonitorSettings};
use crate::exercise::ExerciseOrchestrator;
use crate::identity::IdentityContext;
use crate::providers::{
    IdentityProvider, NotificationSink, PlaceSearchProvider, PredictionModel, RoutingProvider,
};
use crate::route::RouteLifecycle;
use crate::storage::Repository;

/// Everything a session needs injected.
pub struct TripDeps {
    pub repo: Arc<dyn Repository>,
    pub routing: Arc<dyn RoutingProvider>,
    pub places: Arc<dyn PlaceSearchProvider>,
    pub prediction: Arc<dyn PredictionModel>,
    pub notifier: Arc<dyn NotificationSink>,
    pub identity: Arc<dyn IdentityProvider>,
    pub placement: Arc<dyn BreakPlacement>,
    pub settings: MonitorSettings,
}

/// The fully wired manager graph for one process.
pub struct TripSession {
    pub identity: Arc<IdentityContext>,
    pub routes: Arc<RouteLifecycle>,
    pub breaks: Arc<BreakScheduler>,
    pub exercises: Arc<ExerciseOrchestrator>,
}

impl TripSession {
    /// Construct all four managers and their subscriptions, leaves
    /// first. Must be called within a tokio runtime.
    pub fn new(deps: TripDeps) -> Self {
        let identity = IdentityContext::new(Arc::clone(&deps.identity), Arc::clone(&deps.repo));
        let routes = RouteLifecycle::new(
            Arc::clone(&deps.repo),
            Arc::clone(&deps.routing),
            &identity,
        );
        let breaks = BreakScheduler::new(
            Arc::clone(&deps.repo),
            Arc::clone(&deps.prediction),
            Arc::clone(&deps.notifier),
            Arc::clone(&deps.placement),
            Arc::clone(&deps.places),
            deps.settings.clone(),
            &routes,
        );
        let exercises = ExerciseOrchestrator::new(
            Arc::clone(&deps.repo),
            Arc::clone(&deps.prediction),
            &breaks,
            &identity,
        );
        Self {
            identity,
            routes,
            breaks,
            exercises,
        }
    }
}
