//! Route Planner Library
//!
//! Plans driving routes from a start address through a set of stops, using
//! an external mapping service for travel times, geocoding and directions.
//!
//! # Features
//!
//! - Exact visiting order by exhaustive search (up to 9 stops)
//! - Farthest-first ordering heuristic
//! - Multi-driver planning with seeded k-means or capacity-driven clustering
//! - Turn-by-turn directions and a shareable map link per route
//! - Stop-count guard for the mapping service's per-request limit
//! - Google Maps client and an offline in-memory service
//! - Text, JSON, CSV and SVG output
//!
//! # Example
//!
//! ```no_run
//! use route_planner::config::PlannerConfig;
//! use route_planner::maps::memory::MemoryMaps;
//! use route_planner::place::Place;
//! use route_planner::planner::{PlanRequest, Planner};
//! use route_planner::report::PlanReport;
//!
//! let maps = MemoryMaps::from_file("fixture.json").unwrap();
//! let config = PlannerConfig::default();
//! let request = PlanRequest::new("1 Depot Rd", vec![Place::new("22 Oak St"), Place::new("5 Elm Ave")]);
//!
//! let response = Planner::new(&maps, &config).plan(&request).unwrap();
//! println!("{}", PlanReport::from_response(&response).to_text());
//! ```

pub mod config;
pub mod directions;
pub mod error;
pub mod maps;
pub mod matrix;
pub mod optimizer;
pub mod partition;
pub mod place;
pub mod planner;
pub mod report;
pub mod route;
pub mod visualization;

pub use error::{PlannerError, Result};
pub use place::Place;
pub use planner::{PlanRequest, PlanResponse, Planner};
