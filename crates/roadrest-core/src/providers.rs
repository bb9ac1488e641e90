//! Collaborator traits the core depends on.
//!
//! The trip-session managers never talk to a concrete backend; every
//! external capability (route computation, POI lookup, location
//! sampling, break/exercise prediction, notification delivery,
//! identity) is injected behind one of these traits. The persistence
//! collaborator lives in [`crate::storage::Repository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{BreakPoint, Exercise, GeoPoint, Poi, User};
use crate::observable::Observable;

/// Result of a route computation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    /// Sampled points along the route, start to end.
    pub polyline: Vec<GeoPoint>,
    pub duration_secs: i64,
    pub distance_m: f64,
}

/// Turn-by-turn geometry computation for a start/end/waypoints triple.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Compute geometry, estimated duration and distance.
    ///
    /// # Errors
    /// Returns [`CoreError::Routing`] when no geometry can be computed.
    async fn compute(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        waypoints: &[GeoPoint],
    ) -> Result<RouteGeometry, CoreError>;
}

/// Point-of-interest lookup around a coordinate.
#[async_trait]
pub trait PlaceSearchProvider: Send + Sync {
    /// Search within `radius_m` of `location`, restricted to the given
    /// category names (empty slice = provider default set).
    async fn search_nearby(
        &self,
        location: GeoPoint,
        radius_m: f64,
        categories: &[String],
    ) -> Result<Vec<Poi>, CoreError>;
}

/// Device location sampling.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<GeoPoint, CoreError>;
}

/// Pluggable heuristic for break intervals and exercise recommendations.
///
/// This is a function, not a learned model; implementations must be
/// deterministic for a given input.
pub trait PredictionModel: Send + Sync {
    /// Predict the gap between breaks for a trip of the given duration,
    /// in seconds. `history` carries the driver's recent break points.
    fn predict_interval(
        &self,
        driving_duration_secs: i64,
        history: &[BreakPoint],
    ) -> Result<i64, CoreError>;

    /// Exercises fitting the user's preferences and the break duration,
    /// in deterministic catalog order.
    fn recommend(&self, user: &User, break_duration_secs: i64) -> Result<Vec<Exercise>, CoreError>;
}

/// Fire-and-forget notification delivery. Failures are logged by the
/// caller and never abort scheduling.
pub trait NotificationSink: Send + Sync {
    fn schedule(&self, at: DateTime<Utc>, title: &str, body: &str) -> Result<(), CoreError>;
}

/// Upstream identity signal plus credential operations.
///
/// The core treats the emitted user id purely as a signal; fetching and
/// publishing the full [`User`] is [`crate::identity::IdentityContext`]'s
/// job.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently authenticated user id, or `None`.
    fn signal(&self) -> Observable<Option<String>>;

    /// Verify credentials and return the user id. Implementations also
    /// flip [`Self::signal`] to the new id.
    async fn authenticate(&self, email: &str, password: &str) -> Result<String, CoreError>;

    /// Create an account and return the fresh user id.
    async fn register(&self, email: &str, password: &str, name: &str)
        -> Result<String, CoreError>;

    async fn sign_out(&self);
}
