//! Error types for route planning.
//!
//! Errors fall into three groups: input errors (raised before any call to the
//! mapping service), external-service errors (attributable to one place or one
//! pair of places), and capacity errors (a group is too large for the mapping
//! service or for exact search).

use crate::maps::MapsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("please enter a starting address")]
    MissingStart,

    #[error("please enter at least one destination stop")]
    NoStops,

    #[error("invalid stop set: {0}")]
    InvalidStops(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("only {available} stops could be located but {groups} groups were requested; lower the driver count")]
    InsufficientStops { available: usize, groups: usize },

    #[error("clustering produced an empty group ({0}); try fewer drivers")]
    EmptyGroup(String),

    #[error("{source}; could not locate: {}", skipped.join(", "))]
    Unlocated {
        skipped: Vec<String>,
        #[source]
        source: Box<PlannerError>,
    },

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("no drivable route from place {from} to place {to}")]
    Unreachable { from: usize, to: usize },

    #[error("no drivable route from '{from}' to '{to}'")]
    NoRoute { from: String, to: String },

    #[error("could not locate '{address}': {source}")]
    Geocode {
        address: String,
        #[source]
        source: MapsError,
    },

    #[error(
        "route has {places} places but the mapping service accepts at most {cap} per request; \
         use at least {suggested_drivers} drivers or enable directions-only mode"
    )]
    CapacityExceeded {
        places: usize,
        cap: usize,
        suggested_drivers: usize,
    },

    #[error(
        "exact search over {stops} stops is too slow (limit {max}); \
         use farthest-first ordering or split the stops across more drivers"
    )]
    ExactSearchTooLarge { stops: usize, max: usize },

    #[error("mapping service error: {0}")]
    Maps(#[from] MapsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
