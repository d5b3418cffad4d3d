//! Mapping service interfaces.
//!
//! The planner talks to the outside world through three traits: a distance
//! oracle that returns directed travel times between places, a geocoder, and a
//! directions service. [`google::GoogleMaps`] implements all three against the
//! Google Maps web services; [`memory::MemoryMaps`] replays fixed data.

pub mod google;
pub mod memory;

use crate::matrix::{DurationMatrix, MatrixCell};
use crate::place::{Coordinate, Place};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Places allowed in one distance-matrix request (start + 9 stops)
pub const MAX_MATRIX_PLACES: usize = 10;

/// Places allowed in one shareable map link
pub const MAX_LINK_PLACES: usize = 10;

#[derive(Debug, Error)]
pub enum MapsError {
    #[error("no API key configured (set GOOGLE_MAPS_API_KEY or api_key in the config file)")]
    MissingApiKey,

    #[error("not found")]
    NotFound,

    #[error("{endpoint} request failed with status {status} {message}")]
    Status {
        endpoint: &'static str,
        status: String,
        message: String,
    },

    #[error("{places} places in one matrix request, the service accepts at most {cap}")]
    TooManyPlaces { places: usize, cap: usize },

    #[error("'{0}' contains '|', which the distance matrix request uses as its place separator")]
    InvalidPlace(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One turn-by-turn instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Instruction text as returned by the service (may contain HTML markup)
    pub instruction: String,
    /// Human-readable distance, e.g. "0.4 mi"
    pub distance: String,
    /// Human-readable duration, e.g. "2 mins"
    pub duration: String,
}

pub trait DistanceOracle: Send + Sync {
    /// Directed travel times between every pair of `places`, in input order
    fn duration_matrix(&self, places: &[Place]) -> Result<DurationMatrix, MapsError>;

    /// Largest number of places one request may contain
    fn max_places(&self) -> usize {
        MAX_MATRIX_PLACES
    }
}

pub trait Geocoder: Send + Sync {
    /// Coordinate of `place`, or [`MapsError::NotFound`]
    fn geocode(&self, place: &Place) -> Result<Coordinate, MapsError>;
}

pub trait DirectionsService: Send + Sync {
    /// Driving steps from `origin` to `destination`
    fn directions(&self, origin: &Place, destination: &Place) -> Result<Vec<Step>, MapsError>;
}

/// Everything the planner needs from a mapping provider
pub trait MapsService: DistanceOracle + Geocoder + DirectionsService {}

impl<T: DistanceOracle + Geocoder + DirectionsService> MapsService for T {}

/// Assemble a full matrix from two-place requests, which always fit under the
/// request cap. A failed request only marks its own pair unreachable.
pub fn pairwise_matrix<O: DistanceOracle + ?Sized>(oracle: &O, places: &[Place]) -> DurationMatrix {
    let n = places.len();
    let mut matrix = DurationMatrix::unknown(n);
    for i in 0..n {
        for j in i + 1..n {
            let pair = [places[i].clone(), places[j].clone()];
            match oracle.duration_matrix(&pair) {
                Ok(m) if m.size() == 2 => {
                    matrix.set(i, j, m.cell(0, 1).clone());
                    matrix.set(j, i, m.cell(1, 0).clone());
                }
                Ok(m) => {
                    let status = format!("expected a 2x2 matrix, got {}x{}", m.size(), m.size());
                    matrix.set(i, j, MatrixCell::unreachable(status.clone()));
                    matrix.set(j, i, MatrixCell::unreachable(status));
                }
                Err(e) => {
                    log::warn!("Travel time between '{}' and '{}' unavailable: {}", places[i], places[j], e);
                    matrix.set(i, j, MatrixCell::unreachable(e.to_string()));
                    matrix.set(j, i, MatrixCell::unreachable(e.to_string()));
                }
            }
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps::memory::MemoryMaps;

    #[test]
    fn test_pairwise_matrix_matches_full_request() {
        let maps = MemoryMaps::from_seconds(
            &["A", "B", "C"],
            vec![vec![0, 100, 500], vec![150, 0, 200], vec![100, 300, 0]],
        );
        let places: Vec<Place> = ["A", "B", "C"].iter().map(|&p| Place::new(p)).collect();
        let full = maps.duration_matrix(&places).unwrap();
        let pairwise = pairwise_matrix(&maps, &places);
        assert_eq!(full, pairwise);
        assert_eq!(maps.matrix_requests(), 4);
    }

    #[test]
    fn test_pairwise_matrix_isolates_failures() {
        let maps = MemoryMaps::from_seconds(&["A", "B"], vec![vec![0, 60], vec![70, 0]]);
        let places = vec![Place::new("A"), Place::new("B"), Place::new("Nowhere")];
        let matrix = pairwise_matrix(&maps, &places);
        assert_eq!(matrix.duration(0, 1).unwrap(), 60);
        assert_eq!(matrix.duration(1, 0).unwrap(), 70);
        assert!(matrix.duration(0, 2).is_err());
        assert!(matrix.duration(2, 1).is_err());
    }
}
