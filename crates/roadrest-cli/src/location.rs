//! Headless location sampling.
//!
//! A CLI has no GPS; the device position comes from the
//! `ROADREST_LOCATION` environment variable as `lat,lon`.

use async_trait::async_trait;

use roadrest_core::error::CoreError;
use roadrest_core::providers::LocationProvider;
use roadrest_core::GeoPoint;

pub const LOCATION_ENV: &str = "ROADREST_LOCATION";

pub struct EnvLocation;

#[async_trait]
impl LocationProvider for EnvLocation {
    async fn current_location(&self) -> Result<GeoPoint, CoreError> {
        let raw = std::env::var(LOCATION_ENV)
            .map_err(|_| CoreError::Routing(format!("{LOCATION_ENV} is not set")))?;
        let (lat, lon) = raw
            .split_once(',')
            .ok_or_else(|| CoreError::Routing(format!("{LOCATION_ENV} must be lat,lon")))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| CoreError::Routing(format!("bad latitude in {LOCATION_ENV}")))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| CoreError::Routing(format!("bad longitude in {LOCATION_ENV}")))?;
        Ok(GeoPoint::new(lat, lon))
    }
}
