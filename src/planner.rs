//! Route planning pipeline.
//!
//! One call to [`Planner::plan`] is one calculation: validate the request,
//! check the stop count against the mapping service's limits, geocode and
//! cluster stops when there is more than one driver, then for every group
//! fetch travel times, order the stops, and fetch directions. Input and
//! capacity problems that affect the whole request are returned before any
//! request is made to the mapping service. Problems inside one group are
//! kept with that group so the other groups still produce routes.

use crate::config::{OverflowPolicy, PlannerConfig};
use crate::directions::{map_link, render_directions, LegDirections};
use crate::error::{PlannerError, Result};
use crate::maps::{pairwise_matrix, MapsService};
use crate::optimizer::{optimize, Strategy, MAX_EXACT_STOPS};
use crate::partition::{partition, Assignment, Grouping};
use crate::place::{Coordinate, Place};
use crate::route::{Route, TimeEstimate};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// The user's current inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub start: String,
    pub stops: Vec<Place>,
}

impl PlanRequest {
    pub fn new(start: impl Into<String>, stops: Vec<Place>) -> Self {
        PlanRequest {
            start: start.into(),
            stops,
        }
    }

    /// Clear both the start and the stop list
    pub fn reset(&mut self) {
        *self = PlanRequest::default();
    }
}

/// A stop left out of clustering because it could not be geocoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStop {
    /// Position in the combined place list (start is 0)
    pub index: usize,
    pub place: Place,
    pub reason: String,
}

/// A finished route for one driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPlan {
    /// Places in visiting order, start first
    pub ordered: Vec<Place>,
    /// Visiting order as positions in the combined place list
    pub order: Vec<usize>,
    pub route: Route,
    pub estimate: TimeEstimate,
    pub directions: Vec<LegDirections>,
    pub map_link: Option<String>,
    /// Travel times were gathered pair by pair because the group exceeded the
    /// per-request place limit
    pub directions_only: bool,
}

/// Result for one driver's group
#[derive(Debug)]
pub struct GroupOutcome {
    /// 1-based driver number
    pub driver: usize,
    /// Stops assigned to this driver, as positions in the combined place list
    pub stops: Vec<usize>,
    pub result: Result<GroupPlan>,
}

#[derive(Debug)]
pub struct PlanResponse {
    pub start: Place,
    /// Start followed by every stop, in input order
    pub places: Vec<Place>,
    pub strategy: Strategy,
    pub stop_minutes: u32,
    pub groups: Vec<GroupOutcome>,
    pub skipped: Vec<SkippedStop>,
    /// Geocoded positions aligned with `places`, when geocoding ran
    pub coordinates: Vec<Option<Coordinate>>,
    pub generated_at: String,
}

impl PlanResponse {
    pub fn succeeded(&self) -> usize {
        self.groups.iter().filter(|g| g.result.is_ok()).count()
    }
}

pub struct Planner<'a, M: MapsService + ?Sized> {
    maps: &'a M,
    config: &'a PlannerConfig,
    always_geocode: bool,
}

impl<'a, M: MapsService + ?Sized> Planner<'a, M> {
    pub fn new(maps: &'a M, config: &'a PlannerConfig) -> Self {
        Planner {
            maps,
            config,
            always_geocode: false,
        }
    }

    /// Geocode every place even for a single driver (for plotting)
    pub fn always_geocode(mut self, yes: bool) -> Self {
        self.always_geocode = yes;
        self
    }

    fn grouping(&self) -> Grouping {
        match self.config.max_stops_per_group {
            Some(m) => Grouping::MaxStopsPerGroup(m),
            None => Grouping::Drivers(self.config.drivers),
        }
    }

    /// Stops that fit in one matrix request next to the start
    fn stop_cap(&self) -> usize {
        self.maps.max_places().saturating_sub(1).max(1)
    }

    /// The suggestion always exceeds the driver count already in use
    fn capacity_error(&self, places: usize, total_stops: usize, groups: usize) -> PlannerError {
        PlannerError::CapacityExceeded {
            places,
            cap: self.maps.max_places(),
            suggested_drivers: total_stops.div_ceil(self.stop_cap()).max(groups + 1),
        }
    }

    fn progress_bar(&self, len: usize, message: &'static str) -> Option<ProgressBar> {
        if !self.config.show_progress || self.config.parallel {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("{msg:>12} [{bar:30}] {pos}/{len}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(message);
        Some(pb)
    }

    /// Checks that need no external calls
    fn validate(&self, request: &PlanRequest) -> Result<(Place, usize)> {
        self.config.validate()?;
        let start = request.start.trim();
        if start.is_empty() {
            return Err(PlannerError::MissingStart);
        }
        let n = request.stops.len();
        if n == 0 {
            return Err(PlannerError::NoStops);
        }

        let groups = self.grouping().group_count(n);
        if groups > n {
            return Err(PlannerError::InsufficientStops {
                available: n,
                groups,
            });
        }

        if self.config.overflow == OverflowPolicy::Refuse && n > groups * self.stop_cap() {
            return Err(self.capacity_error(n + 1, n, groups));
        }
        if groups == 1 && self.config.strategy == Strategy::Exact && n > MAX_EXACT_STOPS {
            return Err(PlannerError::ExactSearchTooLarge {
                stops: n,
                max: MAX_EXACT_STOPS,
            });
        }
        Ok((Place::new(start), groups))
    }

    fn geocode_all(&self, places: &[Place]) -> Vec<std::result::Result<Coordinate, String>> {
        let pb = self.progress_bar(places.len(), "Geocoding");
        let coords = places
            .iter()
            .map(|place| {
                let result = self.maps.geocode(place).map_err(|e| {
                    let err = PlannerError::Geocode {
                        address: place.to_string(),
                        source: e,
                    };
                    log::warn!("{}", err);
                    err.to_string()
                });
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                result
            })
            .collect();
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        coords
    }

    pub fn plan(&self, request: &PlanRequest) -> Result<PlanResponse> {
        let (start, group_count) = self.validate(request)?;
        let mut places = Vec::with_capacity(request.stops.len() + 1);
        places.push(start.clone());
        places.extend(request.stops.iter().cloned());
        log::info!(
            "Planning {} stops for {} driver(s) with {:?}",
            request.stops.len(),
            group_count,
            self.config.strategy
        );

        let mut skipped = Vec::new();
        let mut coordinates = vec![None; places.len()];
        let assignment = if group_count > 1 || self.always_geocode {
            let geocoded = self.geocode_all(&places);
            let mut located = Vec::with_capacity(request.stops.len());
            for (index, result) in geocoded.into_iter().enumerate() {
                match result {
                    Ok(c) => {
                        coordinates[index] = Some(c);
                        if index > 0 {
                            located.push((index, c));
                        }
                    }
                    Err(reason) if index > 0 && group_count > 1 => skipped.push(SkippedStop {
                        index,
                        place: places[index].clone(),
                        reason,
                    }),
                    Err(_) => {}
                }
            }

            if group_count > 1 {
                partition(
                    &located,
                    self.grouping(),
                    self.config.seed,
                    self.config.kmeans_max_iterations,
                )
                .map_err(|e| with_skipped(e, &skipped))?
            } else {
                Assignment {
                    groups: vec![(1..places.len()).collect()],
                }
            }
        } else {
            Assignment {
                groups: vec![(1..places.len()).collect()],
            }
        };

        let total_stops = request.stops.len();
        let drivers = assignment.len();
        let plan_one = |(i, stops): (usize, &Vec<usize>)| GroupOutcome {
            driver: i + 1,
            stops: stops.clone(),
            result: self.plan_group(&places, stops, total_stops, drivers),
        };
        let groups: Vec<GroupOutcome> = if self.config.parallel {
            assignment.groups.par_iter().enumerate().map(plan_one).collect()
        } else {
            assignment.groups.iter().enumerate().map(plan_one).collect()
        };

        for g in &groups {
            if let Err(e) = &g.result {
                log::warn!("Driver {}: {}", g.driver, e);
            }
        }

        Ok(PlanResponse {
            start,
            places,
            strategy: self.config.strategy,
            stop_minutes: self.config.stop_minutes,
            groups,
            skipped,
            coordinates,
            generated_at: chrono::Local::now().to_rfc3339(),
        })
    }

    /// Order one group's stops after the start and fetch its directions
    fn plan_group(
        &self,
        places: &[Place],
        stops: &[usize],
        total_stops: usize,
        drivers: usize,
    ) -> Result<GroupPlan> {
        if stops.is_empty() {
            return Err(PlannerError::NoStops);
        }
        let directions_only = stops.len() + 1 > self.maps.max_places();
        if directions_only && self.config.overflow == OverflowPolicy::Refuse {
            return Err(self.capacity_error(stops.len() + 1, total_stops, drivers));
        }
        if self.config.strategy == Strategy::Exact && stops.len() > MAX_EXACT_STOPS {
            return Err(PlannerError::ExactSearchTooLarge {
                stops: stops.len(),
                max: MAX_EXACT_STOPS,
            });
        }

        // local index 0 is the start, local i is stops[i - 1]
        let mut local = Vec::with_capacity(stops.len() + 1);
        local.push(places[0].clone());
        local.extend(stops.iter().map(|&s| places[s].clone()));

        let matrix = if directions_only {
            match self.config.overflow {
                OverflowPolicy::Refuse => {
                    return Err(self.capacity_error(local.len(), total_stops, drivers));
                }
                OverflowPolicy::DirectionsOnly => {
                    log::info!(
                        "{} places exceed the per-request limit, fetching travel times pairwise",
                        local.len()
                    );
                    pairwise_matrix(self.maps, &local)
                }
            }
        } else {
            log::debug!("Requesting a {}x{} duration matrix", local.len(), local.len());
            self.maps.duration_matrix(&local)?
        };

        let local_stops: Vec<usize> = (1..local.len()).collect();
        let route = optimize(0, &local_stops, &matrix, self.config.strategy).map_err(|e| match e {
            PlannerError::Unreachable { from, to } => PlannerError::NoRoute {
                from: local[from].to_string(),
                to: local[to].to_string(),
            },
            other => other,
        })?;
        let ordered: Vec<Place> = route.order.iter().map(|&i| local[i].clone()).collect();
        let order: Vec<usize> = route
            .order
            .iter()
            .map(|&i| if i == 0 { 0 } else { stops[i - 1] })
            .collect();
        let estimate = route.estimate(self.config.stop_minutes);

        let pb = self.progress_bar(ordered.len().saturating_sub(1), "Directions");
        let directions = render_directions(self.maps, &ordered, pb.as_ref());
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let map_link = if directions_only { None } else { map_link(&ordered) };

        Ok(GroupPlan {
            ordered,
            order,
            route,
            estimate,
            directions,
            map_link,
            directions_only,
        })
    }
}

/// Name the stops that never reached clustering alongside a partition error
fn with_skipped(err: PlannerError, skipped: &[SkippedStop]) -> PlannerError {
    if skipped.is_empty() {
        return err;
    }
    PlannerError::Unlocated {
        skipped: skipped.iter().map(|s| s.place.to_string()).collect(),
        source: Box::new(err),
    }
}
