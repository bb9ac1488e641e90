//! Overpass-backed point-of-interest search.
//!
//! Maps the user's POI category preferences onto OpenStreetMap tag
//! selectors and queries a configurable Overpass endpoint.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::CoreError;
use crate::model::{GeoPoint, Poi, PoiCategory};
use crate::providers::PlaceSearchProvider;

const MAX_RESULTS: usize = 25;

pub struct OverpassPlaces {
    client: reqwest::Client,
    endpoint: Url,
}

impl OverpassPlaces {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl PlaceSearchProvider for OverpassPlaces {
    async fn search_nearby(
        &self,
        location: GeoPoint,
        radius_m: f64,
        categories: &[String],
    ) -> Result<Vec<Poi>, CoreError> {
        let query = overpass_query(location, radius_m, categories);
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| CoreError::PlaceSearch(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::PlaceSearch(e.to_string()))?;
        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|e| CoreError::PlaceSearch(e.to_string()))?;

        Ok(body
            .elements
            .into_iter()
            .filter_map(poi_from_element)
            .take(MAX_RESULTS)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// OSM tag selector for a user-facing category name, if we know one.
fn selector_for(category: &str) -> Option<&'static str> {
    match category.to_ascii_lowercase().as_str() {
        "cafe" => Some("[amenity=cafe]"),
        "restaurant" => Some("[amenity=restaurant]"),
        "park" => Some("[leisure=park]"),
        "gas station" | "fuel" => Some("[amenity=fuel]"),
        "rest area" => Some("[highway=rest_area]"),
        _ => None,
    }
}

const DEFAULT_SELECTORS: &[&str] = &[
    "[amenity=cafe]",
    "[amenity=restaurant]",
    "[leisure=park]",
    "[amenity=fuel]",
    "[highway=rest_area]",
];

fn overpass_query(location: GeoPoint, radius_m: f64, categories: &[String]) -> String {
    let mut selectors: Vec<&str> = categories
        .iter()
        .filter_map(|c| selector_for(c))
        .collect();
    if selectors.is_empty() {
        selectors = DEFAULT_SELECTORS.to_vec();
    }

    let around = format!("around:{:.0},{:.6},{:.6}", radius_m, location.lat, location.lon);
    let mut query = String::from("[out:json][timeout:10];\n(\n");
    for selector in selectors {
        query.push_str(&format!("  node({around}){selector};\n"));
    }
    query.push_str(");\nout body;\n");
    query
}

fn category_from_tags(tags: &HashMap<String, String>) -> PoiCategory {
    match tags.get("amenity").map(String::as_str) {
        Some("cafe") => return PoiCategory::Cafe,
        Some("restaurant") => return PoiCategory::Restaurant,
        Some("fuel") => return PoiCategory::GasStation,
        _ => {}
    }
    if tags.get("leisure").map(String::as_str) == Some("park") {
        return PoiCategory::Park;
    }
    if tags.get("highway").map(String::as_str) == Some("rest_area") {
        return PoiCategory::RestArea;
    }
    PoiCategory::Other
}

fn address_from_tags(tags: &HashMap<String, String>) -> String {
    let mut parts = Vec::new();
    if let Some(street) = tags.get("addr:street") {
        match tags.get("addr:housenumber") {
            Some(number) => parts.push(format!("{street} {number}")),
            None => parts.push(street.clone()),
        }
    }
    if let Some(city) = tags.get("addr:city") {
        parts.push(city.clone());
    }
    parts.join(", ")
}

fn poi_from_element(element: OverpassElement) -> Option<Poi> {
    let lat = element.lat?;
    let lon = element.lon?;
    let name = element
        .tags
        .get("name")
        .cloned()
        .unwrap_or_else(|| "Unnamed".into());
    Some(Poi {
        id: element.id.to_string(),
        name,
        category: category_from_tags(&element.tags),
        location: GeoPoint::new(lat, lon),
        address: address_from_tags(&element.tags),
        phone: element.tags.get("phone").cloned(),
        website: element.tags.get("website").cloned(),
        // Overpass carries no rating data; parity with the search
        // backend contract, which treats these as optional extras.
        rating: 0.0,
        review_count: 0,
        price_level: None,
        open_now: None,
    })
}
