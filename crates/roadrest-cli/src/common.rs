//! Shared CLI plumbing: the wired session context and small parsing
//! and formatting helpers.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use roadrest_core::catalog::default_catalog;
use roadrest_core::{
    Config, GeoPoint, GreatCircleRouter, HeuristicPrediction, MonitorSettings, OverpassPlaces,
    Route, SqliteRepository, TripDeps, TripSession, User,
};

use crate::identity::LocalIdentity;
use crate::notify::ConsoleNotifier;

pub type CliError = Box<dyn std::error::Error>;

pub struct Context {
    pub config: Config,
    pub session: TripSession,
    pub repo: Arc<SqliteRepository>,
    pub provider: Arc<LocalIdentity>,
}

/// Build the full manager graph over the on-disk store and restore any
/// saved session.
pub async fn context() -> Result<Context, CliError> {
    let config = Config::load()?;
    let repo = Arc::new(SqliteRepository::open()?);
    let provider = Arc::new(LocalIdentity::open()?);
    let router = Arc::new(GreatCircleRouter::new(config.routing.average_speed_kmh));
    let endpoint = Url::parse(&config.places.endpoint)?;

    let session = TripSession::new(TripDeps {
        repo: repo.clone(),
        routing: router.clone(),
        places: Arc::new(OverpassPlaces::new(endpoint)),
        prediction: Arc::new(HeuristicPrediction::new(
            default_catalog(),
            config.scheduler.default_interval_secs,
        )),
        notifier: Arc::new(ConsoleNotifier::new(config.notifications.enabled)),
        identity: provider.clone(),
        placement: router,
        settings: MonitorSettings {
            period: Duration::from_secs(config.scheduler.monitor_period_secs.max(1)),
            lead_window_secs: config.scheduler.lead_window_secs,
            break_duration_secs: config.scheduler.break_duration_secs,
            default_interval_secs: config.scheduler.default_interval_secs,
            poi_radius_m: config.places.radius_m,
        },
    });
    provider.resume();

    Ok(Context {
        config,
        session,
        repo,
        provider,
    })
}

/// The signed-in user, waiting briefly for a restored session to
/// resolve against the store.
pub async fn require_user(ctx: &Context) -> Result<User, CliError> {
    if !ctx.provider.has_session() {
        return Err("not signed in (run `roadrest auth login`)".into());
    }
    for _ in 0..200 {
        if let Some(user) = ctx.session.identity.current_user().get() {
            return Ok(user);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err("session could not be restored (run `roadrest auth login`)".into())
}

/// Parse a `lat,lon` pair.
pub fn parse_geo(raw: &str) -> Result<GeoPoint, CliError> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lon but got '{raw}'"))?;
    Ok(GeoPoint::new(lat.trim().parse()?, lon.trim().parse()?))
}

/// Resolve a route by id, id prefix or exact name.
pub fn find_route(routes: &[Route], needle: &str) -> Result<Route, CliError> {
    routes
        .iter()
        .find(|r| r.id == needle || r.id.starts_with(needle) || r.name == needle)
        .cloned()
        .ok_or_else(|| format!("no route matching '{needle}'").into())
}

pub fn format_distance(distance_m: f64) -> String {
    format!("{:.0} km", distance_m / 1000.0)
}

pub fn format_duration(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn parses_geo_pairs() {
        let p = parse_geo("48.137, 11.575").unwrap();
        assert!((p.lat - 48.137).abs() < 1e-9);
        assert!((p.lon - 11.575).abs() < 1e-9);
        assert!(parse_geo("48.137").is_err());
        assert!(parse_geo("a,b").is_err());
    }

    #[test]
    fn finds_routes_by_prefix_and_name() {
        let route = Route {
            id: "abcdef12-3456".into(),
            user_id: "u1".into(),
            name: "Munich to Berlin".into(),
            start: GeoPoint::new(48.1, 11.5),
            end: GeoPoint::new(52.5, 13.4),
            waypoints: vec![],
            polyline: vec![],
            estimated_duration_secs: 3600,
            distance_m: 80_000.0,
            created_at: Utc::now(),
            favorite: false,
        };
        let routes = vec![route];
        assert!(find_route(&routes, "abcdef12").is_ok());
        assert!(find_route(&routes, "Munich to Berlin").is_ok());
        assert!(find_route(&routes, "nope").is_err());
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(5400), "1h30m");
        assert_eq!(format_duration(900), "15m");
    }
}
