//! In-memory mapping service.
//!
//! Serves travel times, coordinates and directions from a fixture instead of
//! the network. Used for offline runs (`--fixture`) and tests. It answers the
//! same way the web service does: unknown places give `NOT_FOUND` cells,
//! missing durations give `ZERO_RESULTS`, and oversized matrix requests are
//! rejected.

use super::{DirectionsService, DistanceOracle, Geocoder, MapsError, Step, MAX_MATRIX_PLACES};
use crate::matrix::{DurationMatrix, MatrixCell};
use crate::place::{Coordinate, Place};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturePlace {
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureLeg {
    pub from: String,
    pub to: String,
    pub steps: Vec<Step>,
}

/// On-disk fixture format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub max_places: Option<usize>,
    pub places: Vec<FixturePlace>,
    /// Row-major seconds; `null` marks an unreachable pair
    pub durations: Vec<Vec<Option<u64>>>,
    #[serde(default)]
    pub directions: Vec<FixtureLeg>,
}

pub struct MemoryMaps {
    index: HashMap<String, usize>,
    places: Vec<String>,
    durations: Vec<Vec<Option<u64>>>,
    coordinates: Vec<Option<Coordinate>>,
    directions: HashMap<(usize, usize), Vec<Step>>,
    max_places: usize,
    matrix_requests: AtomicUsize,
    geocode_requests: AtomicUsize,
}

impl MemoryMaps {
    pub fn from_fixture(fixture: Fixture) -> Result<Self, MapsError> {
        let n = fixture.places.len();
        if fixture.durations.len() != n || fixture.durations.iter().any(|r| r.len() != n) {
            return Err(MapsError::Malformed(format!(
                "fixture durations must be {}x{}",
                n, n
            )));
        }

        let places: Vec<String> = fixture.places.iter().map(|p| p.address.clone()).collect();
        let index = places
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect::<HashMap<_, _>>();
        let coordinates = fixture
            .places
            .iter()
            .map(|p| match (p.lat, p.lng) {
                (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
                _ => None,
            })
            .collect();

        let mut directions = HashMap::new();
        for leg in fixture.directions {
            match (index.get(&leg.from), index.get(&leg.to)) {
                (Some(&i), Some(&j)) => {
                    directions.insert((i, j), leg.steps);
                }
                _ => {
                    return Err(MapsError::Malformed(format!(
                        "directions reference unknown place: {} -> {}",
                        leg.from, leg.to
                    )))
                }
            }
        }

        Ok(MemoryMaps {
            index,
            places,
            durations: fixture.durations,
            coordinates,
            directions,
            max_places: fixture.max_places.unwrap_or(MAX_MATRIX_PLACES),
            matrix_requests: AtomicUsize::new(0),
            geocode_requests: AtomicUsize::new(0),
        })
    }

    /// Load a JSON fixture from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MapsError> {
        let file = File::open(&path)
            .map_err(|e| MapsError::Malformed(format!("cannot open fixture: {}", e)))?;
        let fixture: Fixture = serde_json::from_reader(BufReader::new(file))?;
        Self::from_fixture(fixture)
    }

    /// Fully reachable service without coordinates or scripted directions
    #[cfg(test)]
    pub fn from_seconds(places: &[&str], durations: Vec<Vec<u64>>) -> Self {
        let fixture = Fixture {
            max_places: None,
            places: places
                .iter()
                .map(|&address| FixturePlace {
                    address: address.to_string(),
                    lat: None,
                    lng: None,
                })
                .collect(),
            durations: durations
                .into_iter()
                .map(|row| row.into_iter().map(Some).collect())
                .collect(),
            directions: Vec::new(),
        };
        Self::from_fixture(fixture).expect("valid in-memory maps")
    }

    pub fn with_max_places(mut self, max_places: usize) -> Self {
        self.max_places = max_places;
        self
    }

    pub fn with_coordinate(mut self, address: &str, coordinate: Coordinate) -> Self {
        if let Some(&i) = self.index.get(address) {
            self.coordinates[i] = Some(coordinate);
        }
        self
    }

    /// Number of distance-matrix requests served so far
    pub fn matrix_requests(&self) -> usize {
        self.matrix_requests.load(Ordering::Relaxed)
    }

    pub fn geocode_requests(&self) -> usize {
        self.geocode_requests.load(Ordering::Relaxed)
    }

    fn lookup(&self, place: &Place) -> Option<usize> {
        self.index.get(place.as_str()).copied()
    }
}

impl DistanceOracle for MemoryMaps {
    fn duration_matrix(&self, places: &[Place]) -> Result<DurationMatrix, MapsError> {
        self.matrix_requests.fetch_add(1, Ordering::Relaxed);
        if places.len() > self.max_places {
            return Err(MapsError::TooManyPlaces {
                places: places.len(),
                cap: self.max_places,
            });
        }

        let ids: Vec<Option<usize>> = places.iter().map(|p| self.lookup(p)).collect();
        let rows = ids
            .iter()
            .map(|&from| {
                ids.iter()
                    .map(|&to| match (from, to) {
                        (Some(i), Some(j)) => match self.durations[i][j] {
                            Some(s) => MatrixCell::Seconds(s),
                            None => MatrixCell::unreachable("ZERO_RESULTS"),
                        },
                        _ => MatrixCell::unreachable("NOT_FOUND"),
                    })
                    .collect()
            })
            .collect();
        DurationMatrix::from_rows(rows).map_err(|e| MapsError::Malformed(e.to_string()))
    }

    fn max_places(&self) -> usize {
        self.max_places
    }
}

impl Geocoder for MemoryMaps {
    fn geocode(&self, place: &Place) -> Result<Coordinate, MapsError> {
        self.geocode_requests.fetch_add(1, Ordering::Relaxed);
        self.lookup(place)
            .and_then(|i| self.coordinates[i])
            .ok_or(MapsError::NotFound)
    }
}

impl DirectionsService for MemoryMaps {
    fn directions(&self, origin: &Place, destination: &Place) -> Result<Vec<Step>, MapsError> {
        let (i, j) = match (self.lookup(origin), self.lookup(destination)) {
            (Some(i), Some(j)) => (i, j),
            _ => return Err(MapsError::NotFound),
        };
        if let Some(steps) = self.directions.get(&(i, j)) {
            return Ok(steps.clone());
        }
        match self.durations[i][j] {
            Some(seconds) => Ok(vec![Step {
                instruction: format!("Head to <b>{}</b>", self.places[j]),
                distance: String::new(),
                duration: format!("{} mins", seconds.div_ceil(60)),
            }]),
            None => Err(MapsError::Status {
                endpoint: "directions",
                status: "ZERO_RESULTS".to_string(),
                message: format!("{} -> {}", origin, destination),
            }),
        }
    }
}
