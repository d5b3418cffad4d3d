//! Planner configuration.
//!
//! Values come from built-in defaults, then an optional JSON file, then the
//! command line. The API key may also come from the `GOOGLE_MAPS_API_KEY`
//! environment variable, which wins over the file.

use crate::error::{PlannerError, Result};
use crate::optimizer::Strategy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// What to do with a group too large for one distance-matrix request
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Refuse the group and suggest a driver count that fits
    #[default]
    Refuse,
    /// Build the matrix from pairwise requests and skip the map link
    DirectionsOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub strategy: Strategy,
    /// Fixed number of drivers, used unless `max_stops_per_group` is set
    pub drivers: usize,
    /// Derive the driver count from a per-driver stop cap instead
    pub max_stops_per_group: Option<usize>,
    /// Dwell time at every stop, in minutes
    pub stop_minutes: u32,
    /// Seed for clustering
    pub seed: u64,
    pub kmeans_max_iterations: usize,
    pub overflow: OverflowPolicy,
    /// Plan driver groups on the rayon pool
    pub parallel: bool,
    pub request_timeout_secs: u64,
    pub show_progress: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            strategy: Strategy::Exact,
            drivers: 1,
            max_stops_per_group: None,
            stop_minutes: 5,
            seed: 42,
            kmeans_max_iterations: 300,
            overflow: OverflowPolicy::Refuse,
            parallel: false,
            request_timeout_secs: 10,
            show_progress: false,
            api_key: None,
        }
    }
}

impl PlannerConfig {
    /// Read a JSON config file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let config: PlannerConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Take the API key from the environment when it is set
    pub fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.drivers == 0 {
            return Err(PlannerError::InvalidConfig(
                "drivers must be at least 1".to_string(),
            ));
        }
        if self.max_stops_per_group == Some(0) {
            return Err(PlannerError::InvalidConfig(
                "max_stops_per_group must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(PlannerError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"strategy": "farthest-first", "drivers": 3, "overflow": "directions-only"}"#)
                .unwrap();
        assert_eq!(config.strategy, Strategy::FarthestFirst);
        assert_eq!(config.drivers, 3);
        assert_eq!(config.overflow, OverflowPolicy::DirectionsOnly);
        assert_eq!(config.seed, 42);
        assert_eq!(config.stop_minutes, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_drivers() {
        let config = PlannerConfig {
            drivers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PlannerError::InvalidConfig(_))));

        let config = PlannerConfig {
            max_stops_per_group: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = PlannerConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
