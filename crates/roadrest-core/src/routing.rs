//! Great-circle routing provider.
//!
//! Computes leg distances with the haversine formula and derives the
//! duration from a configured average speed. The sampled polyline it
//! produces also backs the position-along-route break placement
//! strategy.

use async_trait::async_trait;

use crate::breaks::BreakPlacement;
use crate::error::CoreError;
use crate::model::{GeoPoint, Route};
use crate::providers::{RouteGeometry, RoutingProvider};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance between polyline samples.
const SAMPLE_STEP_M: f64 = 10_000.0;

pub struct GreatCircleRouter {
    average_speed_kmh: f64,
}

impl GreatCircleRouter {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

/// Haversine distance in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

fn lerp(a: GeoPoint, b: GeoPoint, t: f64) -> GeoPoint {
    // Linear interpolation is accurate enough at sample-step granularity.
    GeoPoint::new(a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
}

#[async_trait]
impl RoutingProvider for GreatCircleRouter {
    async fn compute(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        waypoints: &[GeoPoint],
    ) -> Result<RouteGeometry, CoreError> {
        let mut legs = Vec::with_capacity(waypoints.len() + 2);
        legs.push(start);
        legs.extend_from_slice(waypoints);
        legs.push(end);

        if legs
            .iter()
            .any(|p| !p.lat.is_finite() || !p.lon.is_finite() || p.lat.abs() > 90.0)
        {
            return Err(CoreError::Routing("coordinates out of range".into()));
        }

        let distance_m: f64 = legs.windows(2).map(|w| haversine_m(w[0], w[1])).sum();
        if distance_m <= 0.0 {
            return Err(CoreError::Routing("start and end coincide".into()));
        }
        if self.average_speed_kmh <= 0.0 {
            return Err(CoreError::Routing("average speed must be positive".into()));
        }

        let mut polyline = Vec::new();
        for w in legs.windows(2) {
            let leg_m = haversine_m(w[0], w[1]);
            let steps = (leg_m / SAMPLE_STEP_M).ceil().max(1.0) as usize;
            for j in 0..steps {
                polyline.push(lerp(w[0], w[1], j as f64 / steps as f64));
            }
        }
        polyline.push(end);

        let duration_secs = (distance_m / (self.average_speed_kmh / 3.6)).round() as i64;
        Ok(RouteGeometry {
            polyline,
            duration_secs,
            distance_m,
        })
    }
}

impl BreakPlacement for GreatCircleRouter {
    /// Interpolate along the route polyline to the given fraction of the
    /// total distance.
    fn locate(&self, route: &Route, fraction: f64) -> GeoPoint {
        let line = &route.polyline;
        if line.len() < 2 {
            return route.start;
        }
        let total: f64 = line.windows(2).map(|w| haversine_m(w[0], w[1])).sum();
        if total <= 0.0 {
            return route.start;
        }
        let mut remaining = fraction.clamp(0.0, 1.0) * total;
        for w in line.windows(2) {
            let seg = haversine_m(w[0], w[1]);
            if remaining <= seg {
                let t = if seg > 0.0 { remaining / seg } else { 0.0 };
                return lerp(w[0], w[1], t);
            }
            remaining -= seg;
        }
        route.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const MUNICH: GeoPoint = GeoPoint { lat: 48.137, lon: 11.575 };
    const BERLIN: GeoPoint = GeoPoint { lat: 52.520, lon: 13.405 };

    fn route_with_polyline(polyline: Vec<GeoPoint>) -> Route {
        Route {
            id: "r1".into(),
            user_id: "u1".into(),
            name: "test".into(),
            start: polyline.first().copied().unwrap_or(MUNICH),
            end: polyline.last().copied().unwrap_or(BERLIN),
            waypoints: vec![],
            polyline,
            estimated_duration_secs: 0,
            distance_m: 0.0,
            created_at: Utc::now(),
            favorite: false,
        }
    }

    #[test]
    fn haversine_munich_berlin_is_about_500km() {
        let d = haversine_m(MUNICH, BERLIN);
        assert!((450_000.0..550_000.0).contains(&d), "got {d}");
    }

    #[tokio::test]
    async fn compute_scales_duration_with_speed() {
        let fast = GreatCircleRouter::new(160.0);
        let slow = GreatCircleRouter::new(80.0);
        let a = fast.compute(MUNICH, BERLIN, &[]).await.unwrap();
        let b = slow.compute(MUNICH, BERLIN, &[]).await.unwrap();
        assert!((a.distance_m - b.distance_m).abs() < 1.0);
        assert!(b.duration_secs > a.duration_secs);
        assert!(a.polyline.len() >= 2);
    }

    #[tokio::test]
    async fn waypoints_lengthen_the_route() {
        let router = GreatCircleRouter::new(80.0);
        let direct = router.compute(MUNICH, BERLIN, &[]).await.unwrap();
        let detour = router
            .compute(MUNICH, BERLIN, &[GeoPoint::new(50.1, 8.7)]) // via Frankfurt
            .await
            .unwrap();
        assert!(detour.distance_m > direct.distance_m);
    }

    #[tokio::test]
    async fn degenerate_route_is_a_routing_failure() {
        let router = GreatCircleRouter::new(80.0);
        let err = router.compute(MUNICH, MUNICH, &[]).await.unwrap_err();
        assert!(matches!(err, CoreError::Routing(_)));
    }

    #[tokio::test]
    async fn locate_walks_the_polyline() {
        let router = GreatCircleRouter::new(80.0);
        let geometry = router.compute(MUNICH, BERLIN, &[]).await.unwrap();
        let route = route_with_polyline(geometry.polyline);

        let near_start = router.locate(&route, 0.0);
        let near_end = router.locate(&route, 1.0);
        assert!(haversine_m(near_start, MUNICH) < 1_000.0);
        assert!(haversine_m(near_end, BERLIN) < 1_000.0);

        let midpoint = router.locate(&route, 0.5);
        let to_start = haversine_m(midpoint, MUNICH);
        let to_end = haversine_m(midpoint, BERLIN);
        // Within a sample step of the true midpoint.
        assert!((to_start - to_end).abs() < 2.0 * SAMPLE_STEP_M, "{to_start} vs {to_end}");
    }

    #[test]
    fn locate_falls_back_to_route_start_without_geometry() {
        let router = GreatCircleRouter::new(80.0);
        let route = route_with_polyline(vec![]);
        assert_eq!(router.locate(&route, 0.5), route.start);
    }
}
