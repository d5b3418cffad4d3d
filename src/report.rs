//! Rendering of a finished plan as text, JSON or CSV.

use crate::directions::{strip_html, LegDirections, LegOutcome};
use crate::error::Result;
use crate::optimizer::Strategy;
use crate::place::Place;
use crate::planner::{GroupOutcome, PlanResponse, SkippedStop};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Serializable view of one driver's outcome
#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    pub driver: usize,
    pub stops: Vec<Place>,
    /// Visiting order, start first; empty when planning failed
    pub route: Vec<Place>,
    pub drive_minutes: Option<u64>,
    pub total_minutes: Option<u64>,
    pub return_minutes: Option<u64>,
    pub map_link: Option<String>,
    pub directions_only: bool,
    pub directions: Vec<LegDirections>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub generated_at: String,
    pub start: Place,
    pub strategy: Strategy,
    pub stop_minutes: u32,
    pub drivers: Vec<DriverReport>,
    pub skipped: Vec<SkippedStop>,
}

#[derive(Debug, Serialize)]
struct RouteRow<'a> {
    driver: usize,
    position: usize,
    address: &'a str,
}

impl DriverReport {
    fn from_outcome(outcome: &GroupOutcome, places: &[Place]) -> Self {
        let stops = outcome.stops.iter().map(|&s| places[s].clone()).collect();
        match &outcome.result {
            Ok(plan) => DriverReport {
                driver: outcome.driver,
                stops,
                route: plan.ordered.clone(),
                drive_minutes: Some(plan.estimate.drive_minutes()),
                total_minutes: Some(plan.estimate.total_minutes()),
                return_minutes: plan.estimate.return_minutes(),
                map_link: plan.map_link.clone(),
                directions_only: plan.directions_only,
                directions: plan.directions.clone(),
                error: None,
            },
            Err(e) => DriverReport {
                driver: outcome.driver,
                stops,
                route: Vec::new(),
                drive_minutes: None,
                total_minutes: None,
                return_minutes: None,
                map_link: None,
                directions_only: false,
                directions: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

impl PlanReport {
    pub fn from_response(response: &PlanResponse) -> Self {
        PlanReport {
            generated_at: response.generated_at.clone(),
            start: response.start.clone(),
            strategy: response.strategy,
            stop_minutes: response.stop_minutes,
            drivers: response
                .groups
                .iter()
                .map(|g| DriverReport::from_outcome(g, &response.places))
                .collect(),
            skipped: response.skipped.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per place per driver, in visiting order
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for driver in &self.drivers {
            for (position, place) in driver.route.iter().enumerate() {
                writer.serialize(RouteRow {
                    driver: driver.driver,
                    position,
                    address: place.as_str(),
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_csv(file)
    }

    /// Human-readable report
    pub fn to_text(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("              Route Plan\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", self.generated_at));
        report.push_str(&format!(
            "Strategy:  {} ({} min per stop)\n\n",
            self.strategy.label(),
            self.stop_minutes
        ));

        for driver in &self.drivers {
            if self.drivers.len() > 1 {
                report.push_str(&format!("Driver {}\n", driver.driver));
                report.push_str("-".repeat(40).as_str());
                report.push('\n');
            }

            if let Some(error) = &driver.error {
                report.push_str(&format!("Could not plan this route: {}\n", error));
                report.push_str("Assigned stops:\n");
                for stop in &driver.stops {
                    report.push_str(&format!("  - {}\n", stop));
                }
                report.push('\n');
                continue;
            }

            report.push_str("Route Order:\n");
            for (i, place) in driver.route.iter().enumerate() {
                if i == 0 {
                    report.push_str(&format!("  Start: {}\n", place));
                } else {
                    report.push_str(&format!("  {}. {}\n", i, place));
                }
            }

            if let (Some(drive), Some(total)) = (driver.drive_minutes, driver.total_minutes) {
                report.push_str(&format!("Estimated drive time: {} minutes\n", drive));
                report.push_str(&format!(
                    "Estimated total time (with stops): {} minutes\n",
                    total
                ));
            }
            match driver.return_minutes {
                Some(m) => report.push_str(&format!("Return to start: {} minutes\n", m)),
                None => report.push_str("Return to start: unavailable\n"),
            }

            match &driver.map_link {
                Some(link) => report.push_str(&format!("Map: {}\n", link)),
                None if driver.directions_only => report.push_str(
                    "Map: not available (too many places for one link, directions only)\n",
                ),
                None => {}
            }

            report.push_str("\nDirections:\n");
            for leg in &driver.directions {
                report.push_str(&format!("  {} -> {}\n", leg.origin, leg.destination));
                match &leg.outcome {
                    LegOutcome::Steps(steps) => {
                        for step in steps {
                            let text = strip_html(&step.instruction);
                            if step.distance.is_empty() {
                                report.push_str(&format!("    - {} ({})\n", text, step.duration));
                            } else {
                                report.push_str(&format!(
                                    "    - {} ({}, {})\n",
                                    text, step.distance, step.duration
                                ));
                            }
                        }
                    }
                    LegOutcome::Failed(reason) => {
                        report.push_str(&format!("    ! directions unavailable: {}\n", reason));
                    }
                }
            }
            report.push('\n');
        }

        if !self.skipped.is_empty() {
            report.push_str("Skipped stops (could not be located):\n");
            for s in &self.skipped {
                report.push_str(&format!("  - {}: {}\n", s.place, s.reason));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::error::PlannerError;
    use crate::maps::memory::MemoryMaps;
    use crate::planner::{PlanRequest, Planner};

    fn response() -> PlanResponse {
        let maps = MemoryMaps::from_seconds(
            &["A St", "B Ave", "C Rd"],
            vec![vec![0, 100, 500], vec![150, 0, 200], vec![100, 300, 0]],
        );
        let config = PlannerConfig::default();
        let request = PlanRequest::new("A St", vec![Place::new("B Ave"), Place::new("C Rd")]);
        Planner::new(&maps, &config).plan(&request).unwrap()
    }

    #[test]
    fn test_text_report() {
        let report = PlanReport::from_response(&response());
        let text = report.to_text();
        assert!(text.contains("  Start: A St\n  1. B Ave\n  2. C Rd\n"));
        assert!(text.contains("Estimated drive time: 5 minutes"));
        assert!(text.contains("Estimated total time (with stops): 15 minutes"));
        assert!(text.contains("Return to start: 1 minutes"));
        assert!(text.contains("Map: https://www.google.com/maps/dir/A+St/B+Ave/C+Rd"));
        assert!(text.contains("    - Head to B Ave (2 mins)"));
        assert!(!text.contains("Driver 1"));
    }

    #[test]
    fn test_failed_group_is_shown_in_place() {
        let mut response = response();
        response.groups[0].result = Err(PlannerError::NoRoute {
            from: "B Ave".to_string(),
            to: "C Rd".to_string(),
        });
        let report = PlanReport::from_response(&response);
        assert_eq!(report.drivers[0].stops, vec![Place::new("B Ave"), Place::new("C Rd")]);
        assert!(report.drivers[0].route.is_empty());
        let text = report.to_text();
        assert!(text.contains("Could not plan this route"));
        assert!(text.contains("  - C Rd\n"));
    }

    #[test]
    fn test_csv_rows() {
        let report = PlanReport::from_response(&response());
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        assert_eq!(
            csv,
            "driver,position,address\n1,0,A St\n1,1,B Ave\n1,2,C Rd\n"
        );
    }

    #[test]
    fn test_json_report() {
        let report = PlanReport::from_response(&response());
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["strategy"], "exact");
        assert_eq!(value["drivers"][0]["drive_minutes"], 5);
        assert_eq!(value["drivers"][0]["route"][2], "C Rd");
        assert!(value["generated_at"].as_str().is_some());
    }
}
