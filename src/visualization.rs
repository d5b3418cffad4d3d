//! SVG plot of a plan.
//!
//! Draws the start, every geocoded stop coloured by driver, and each driver's
//! route in visiting order over longitude/latitude.

use crate::place::Coordinate;
use crate::planner::PlanResponse;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const PALETTE: [&str; 8] = [
    "#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e", "#d35400",
];

/// SVG visualization generator
pub struct Visualizer {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 7.0,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn driver_color(driver: usize) -> &'static str {
    PALETTE[driver.saturating_sub(1) % PALETTE.len()]
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds as (min_lng, max_lng, min_lat, max_lat)
    fn bounds(coords: &[Coordinate]) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for c in coords {
            min_x = min_x.min(c.lng);
            max_x = max_x.max(c.lng);
            min_y = min_y.min(c.lat);
            max_y = max_y.max(c.lat);
        }
        (min_x, max_x, min_y, max_y)
    }

    /// Plot of `response`, or `None` when nothing was geocoded
    pub fn generate_svg(&self, response: &PlanResponse) -> Option<String> {
        let located: Vec<Coordinate> = response.coordinates.iter().flatten().copied().collect();
        if located.is_empty() {
            return None;
        }

        let (min_x, max_x, min_y, max_y) = Self::bounds(&located);
        let span = (max_x - min_x).max(max_y - min_y).max(1e-6);
        let scale = (self.width.min(self.height) - 2.0 * self.margin) / span;
        let transform = |c: &Coordinate| -> (f64, f64) {
            let tx = self.margin + (c.lng - min_x) * scale;
            let ty = self.height - self.margin - (c.lat - min_y) * scale;
            (tx, ty)
        };

        let mut svg = String::new();
        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .start {{ fill: #e74c3c; stroke: #c0392b; stroke-width: 2; }}
    .edge {{ stroke-width: 2; fill: none; }}
    .return {{ stroke-width: 1; stroke-dasharray: 5,5; fill: none; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="25" class="title">Start: {} | Drivers: {} | {}</text>
"#,
            self.margin,
            escape(response.start.as_str()),
            response.groups.len(),
            response.strategy.label()
        ));

        for group in &response.groups {
            let plan = match &group.result {
                Ok(plan) => plan,
                Err(_) => continue,
            };
            let color = driver_color(group.driver);
            let points: Vec<(f64, f64)> = plan
                .order
                .iter()
                .filter_map(|&i| response.coordinates[i].as_ref().map(|c| transform(c)))
                .collect();
            if points.len() > 1 {
                let path: Vec<String> = points
                    .iter()
                    .map(|(x, y)| format!("{:.2},{:.2}", x, y))
                    .collect();
                svg.push_str(&format!(
                    r#"<polyline points="{}" class="edge" stroke="{}"/>
"#,
                    path.join(" "),
                    color
                ));
                if let (Some(first), Some(last)) = (points.first(), points.last()) {
                    svg.push_str(&format!(
                        r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" class="return" stroke="{}"/>
"#,
                        last.0, last.1, first.0, first.1, color
                    ));
                }
            }
        }

        // stops keep the colour of the driver they were assigned to
        for group in &response.groups {
            let color = driver_color(group.driver);
            let positions: Vec<usize> = match &group.result {
                Ok(plan) => plan.order.iter().skip(1).copied().collect(),
                Err(_) => group.stops.clone(),
            };
            for (n, &i) in positions.iter().enumerate() {
                let Some(c) = &response.coordinates[i] else {
                    continue;
                };
                let (x, y) = transform(c);
                let label = if group.result.is_ok() {
                    format!("{}.{}", group.driver, n + 1)
                } else {
                    format!("{}.?", group.driver)
                };
                svg.push_str(&format!(
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"><title>{}</title></circle>
<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"#,
                    x,
                    y,
                    self.node_radius,
                    color,
                    escape(response.places[i].as_str()),
                    x,
                    y - self.node_radius - 3.0,
                    label
                ));
            }
        }

        if let Some(c) = &response.coordinates[0] {
            let (x, y) = transform(c);
            svg.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{}" height="{}" class="start"><title>{}</title></rect>
"#,
                x - self.node_radius,
                y - self.node_radius,
                2.0 * self.node_radius,
                2.0 * self.node_radius,
                escape(response.start.as_str())
            ));
        }

        let legend_y = self.height - 30.0;
        for (n, group) in response.groups.iter().enumerate() {
            let x = self.margin + n as f64 * 90.0;
            let status = if group.result.is_ok() { "" } else { " (failed)" };
            svg.push_str(&format!(
                r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>
<text x="{}" y="{}" class="label">Driver {}{}</text>
"#,
                x,
                legend_y,
                driver_color(group.driver),
                x + 20.0,
                legend_y + 12.0,
                group.driver,
                status
            ));
        }
        if !response.skipped.is_empty() {
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" class="label">{} stop(s) could not be located</text>
"#,
                self.margin,
                legend_y - 10.0,
                response.skipped.len()
            ));
        }

        svg.push_str("</svg>");
        Some(svg)
    }

    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::maps::memory::MemoryMaps;
    use crate::place::Place;
    use crate::planner::{PlanRequest, Planner};

    fn maps() -> MemoryMaps {
        let names = ["Depot & Co", "N1", "S1", "N2", "S2"];
        let durations = (0..names.len())
            .map(|i| (0..names.len()).map(|j| if i == j { 0 } else { 90 }).collect())
            .collect();
        MemoryMaps::from_seconds(&names, durations)
            .with_coordinate("Depot & Co", Coordinate::new(40.0, -75.0))
            .with_coordinate("N1", Coordinate::new(41.00, -75.0))
            .with_coordinate("N2", Coordinate::new(41.01, -75.01))
            .with_coordinate("S1", Coordinate::new(39.00, -75.0))
            .with_coordinate("S2", Coordinate::new(39.01, -74.99))
    }

    #[test]
    fn test_plot_two_drivers() {
        let maps = maps();
        let config = PlannerConfig {
            drivers: 2,
            ..Default::default()
        };
        let stops = ["N1", "S1", "N2", "S2"].iter().map(|&s| Place::new(s)).collect();
        let response = Planner::new(&maps, &config)
            .plan(&PlanRequest::new("Depot & Co", stops))
            .unwrap();

        let svg = Visualizer::new().generate_svg(&response).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("Depot &amp; Co"));
        assert!(svg.contains("Driver 2"));
        assert!(svg.contains(">1.2</text>"));
    }

    #[test]
    fn test_no_plot_without_coordinates() {
        let maps = maps();
        let config = PlannerConfig::default();
        let response = Planner::new(&maps, &config)
            .plan(&PlanRequest::new("N1", vec![Place::new("S1")]))
            .unwrap();
        assert!(Visualizer::new().generate_svg(&response).is_none());
    }
}
