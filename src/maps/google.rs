//! Google Maps web-service client.
//!
//! Uses the Distance Matrix, Geocoding and Directions JSON APIs with a
//! blocking HTTP client. Each call is independent; a failure is reported for
//! the place or pair that caused it and leaves nothing behind.

use super::{DirectionsService, DistanceOracle, Geocoder, MapsError, Step, MAX_MATRIX_PLACES};
use crate::matrix::{DurationMatrix, MatrixCell};
use crate::place::{Coordinate, Place};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    steps: Vec<DirectionsStep>,
}

#[derive(Debug, Deserialize)]
struct DirectionsStep {
    html_instructions: String,
    distance: TextValue,
    duration: TextValue,
}

fn status_error(endpoint: &'static str, status: String, message: Option<String>) -> MapsError {
    MapsError::Status {
        endpoint,
        status,
        message: message.unwrap_or_default(),
    }
}

/// Decode a Distance Matrix response for `n` origins and `n` destinations
pub(crate) fn parse_matrix(body: &str, n: usize) -> Result<DurationMatrix, MapsError> {
    let response: MatrixResponse = serde_json::from_str(body)?;
    if response.status != "OK" {
        return Err(status_error("distancematrix", response.status, response.error_message));
    }
    if response.rows.len() != n || response.rows.iter().any(|r| r.elements.len() != n) {
        return Err(MapsError::Malformed(format!(
            "expected a {}x{} matrix",
            n, n
        )));
    }

    let rows = response
        .rows
        .into_iter()
        .map(|row| {
            row.elements
                .into_iter()
                .map(|el| match el.duration {
                    Some(d) if el.status == "OK" => MatrixCell::Seconds(d.value),
                    None if el.status == "OK" => MatrixCell::unreachable("NO_DURATION"),
                    _ => MatrixCell::Unreachable { status: el.status },
                })
                .collect()
        })
        .collect();
    DurationMatrix::from_rows(rows).map_err(|e| MapsError::Malformed(e.to_string()))
}

pub(crate) fn parse_geocode(body: &str) -> Result<Coordinate, MapsError> {
    let response: GeocodeResponse = serde_json::from_str(body)?;
    match response.status.as_str() {
        "OK" => response
            .results
            .into_iter()
            .next()
            .map(|r| Coordinate::new(r.geometry.location.lat, r.geometry.location.lng))
            .ok_or(MapsError::NotFound),
        "ZERO_RESULTS" => Err(MapsError::NotFound),
        _ => Err(status_error("geocode", response.status, response.error_message)),
    }
}

pub(crate) fn parse_directions(body: &str) -> Result<Vec<Step>, MapsError> {
    let response: DirectionsResponse = serde_json::from_str(body)?;
    if response.status != "OK" {
        return Err(status_error("directions", response.status, response.error_message));
    }
    let leg = response
        .routes
        .into_iter()
        .next()
        .and_then(|r| r.legs.into_iter().next())
        .ok_or_else(|| MapsError::Malformed("directions response has no route".to_string()))?;
    Ok(leg
        .steps
        .into_iter()
        .map(|s| Step {
            instruction: s.html_instructions,
            distance: s.distance.text,
            duration: s.duration.text,
        })
        .collect())
}

pub struct GoogleMaps {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleMaps {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, MapsError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(MapsError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("route-planner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GoogleMaps {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, MapsError> {
        let url = format!("{}/{}/json", self.base_url.trim_end_matches('/'), endpoint);
        log::debug!("GET {} {:?}", url, params);
        let body = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body)
    }
}

/// Origins/destinations parameter for a matrix request
pub(crate) fn join_places(places: &[Place]) -> Result<String, MapsError> {
    if let Some(bad) = places.iter().find(|p| p.as_str().contains('|')) {
        return Err(MapsError::InvalidPlace(bad.to_string()));
    }
    Ok(places.iter().map(Place::as_str).collect::<Vec<_>>().join("|"))
}

impl DistanceOracle for GoogleMaps {
    fn duration_matrix(&self, places: &[Place]) -> Result<DurationMatrix, MapsError> {
        if places.len() > MAX_MATRIX_PLACES {
            return Err(MapsError::TooManyPlaces {
                places: places.len(),
                cap: MAX_MATRIX_PLACES,
            });
        }
        let joined = join_places(places)?;
        let body = self.get(
            "distancematrix",
            &[
                ("origins", joined.as_str()),
                ("destinations", joined.as_str()),
                ("mode", "driving"),
            ],
        )?;
        parse_matrix(&body, places.len())
    }
}

impl Geocoder for GoogleMaps {
    fn geocode(&self, place: &Place) -> Result<Coordinate, MapsError> {
        let body = self.get("geocode", &[("address", place.as_str())])?;
        parse_geocode(&body)
    }
}

impl DirectionsService for GoogleMaps {
    fn directions(&self, origin: &Place, destination: &Place) -> Result<Vec<Step>, MapsError> {
        let body = self.get(
            "directions",
            &[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", "driving"),
            ],
        )?;
        parse_directions(&body)
    }
}
