//! # Roadrest Core Library
//!
//! This library provides the core business logic for Roadrest, a road
//! trip companion that plans rest breaks and exercise prompts for
//! drivers. The CLI binary is a thin layer over this library.
//!
//! ## Architecture
//!
//! Four independently stateful managers publish their state through a
//! small observable-value primitive and subscribe to exactly the
//! upstream values they depend on (a DAG, never cyclic):
//!
//! - [`IdentityContext`]: the authenticated user
//! - [`RouteLifecycle`]: recent routes and the single active route
//! - [`BreakScheduler`]: the break schedule, its periodic monitor and
//!   the "upcoming break"
//! - [`ExerciseOrchestrator`]: exercise recommendation and the
//!   in-progress session state machine
//!
//! A single mutating operation is serialized by its owning manager; all
//! I/O (routing, persistence, prediction, POI search) runs on
//! background tasks whose results are discarded when the triggering
//! state has gone stale.
//!
//! ## Key components
//!
//! - [`TripSession`]: constructs the wired manager graph
//! - [`Observable`]: the propagation bus
//! - [`SessionEngine`]: wall-clock exercise state machine
//! - [`SqliteRepository`] / [`Config`]: persistence and configuration

pub mod breaks;
pub mod catalog;
pub mod error;
pub mod exercise;
pub mod identity;
pub mod model;
pub mod observable;
pub mod places;
pub mod prediction;
pub mod providers;
pub mod route;
pub mod routing;
pub mod session;
pub mod storage;

pub use breaks::{BreakPlacement, BreakScheduler, MonitorSettings, RouteStartPlacement, SchedulerPhase};
pub use error::{ConfigError, CoreError, StoreError};
pub use exercise::{ExerciseOrchestrator, SessionEngine, SessionPhase};
pub use identity::IdentityContext;
pub use model::{
    BreakPoint, Exercise, ExerciseCategory, ExerciseDifficulty, ExerciseResult, GeoPoint, Poi,
    PoiCategory, Route, User, UserPreferences,
};
pub use observable::{Observable, Subscription};
pub use places::OverpassPlaces;
pub use prediction::HeuristicPrediction;
pub use providers::{
    IdentityProvider, LocationProvider, NotificationSink, PlaceSearchProvider, PredictionModel,
    RouteGeometry, RoutingProvider,
};
pub use route::RouteLifecycle;
pub use routing::GreatCircleRouter;
pub use session::{TripDeps, TripSession};
pub use storage::{Config, MemoryRepository, Repository, SqliteRepository};
