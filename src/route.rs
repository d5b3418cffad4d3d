//! Route representation and time estimates.

use crate::error::Result;
use crate::matrix::DurationMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered visit sequence that begins at the start place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Place indices in visiting order, `order[0]` is the start
    pub order: Vec<usize>,
    /// Sum of directed durations along `order`, in seconds
    pub drive_seconds: u64,
    /// Duration from the last stop back to the start; `None` if unreachable
    pub return_seconds: Option<u64>,
    /// Name of the ordering strategy that produced the route
    pub strategy: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of complete orderings evaluated (exact search only)
    pub evaluated: Option<u64>,
}

impl Route {
    /// Build a route from an order, computing its cost against `matrix`.
    /// Fails if any leg of the order is unreachable.
    pub fn from_order(matrix: &DurationMatrix, order: Vec<usize>, strategy: &str) -> Result<Self> {
        let drive_seconds = matrix.route_cost(&order)?;
        let return_seconds = matrix.return_leg(&order);
        if return_seconds.is_none() && order.len() > 1 {
            log::warn!(
                "No drivable return leg from place {} to the start",
                order[order.len() - 1]
            );
        }
        Ok(Route {
            order,
            drive_seconds,
            return_seconds,
            strategy: strategy.to_string(),
            computation_time: 0.0,
            evaluated: None,
        })
    }

    pub fn start(&self) -> Option<usize> {
        self.order.first().copied()
    }

    /// Stops in visiting order, without the start
    pub fn stops(&self) -> &[usize] {
        self.order.get(1..).unwrap_or(&[])
    }

    pub fn last_stop(&self) -> Option<usize> {
        self.stops().last().copied()
    }

    /// True if the route starts at `start` and visits every stop exactly once
    pub fn is_complete(&self, start: usize, stops: &[usize]) -> bool {
        if self.order.len() != stops.len() + 1 || self.order[0] != start {
            return false;
        }
        let visited: HashSet<usize> = self.stops().iter().copied().collect();
        visited.len() == stops.len() && stops.iter().all(|s| visited.contains(s))
    }

    /// Time estimates with a fixed dwell time at every stop
    pub fn estimate(&self, stop_minutes: u32) -> TimeEstimate {
        let stop_seconds = stop_minutes as u64 * 60 * self.stops().len() as u64;
        TimeEstimate {
            drive_seconds: self.drive_seconds,
            total_seconds: self.drive_seconds + stop_seconds,
            return_seconds: self.return_seconds,
            stop_minutes,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Route ({})", self.strategy)?;
        writeln!(f, "  Drive time: {}s", self.drive_seconds)?;
        match self.return_seconds {
            Some(s) => writeln!(f, "  Return leg: {}s", s)?,
            None => writeln!(f, "  Return leg: unreachable")?,
        }
        if let Some(n) = self.evaluated {
            writeln!(f, "  Orderings evaluated: {}", n)?;
        }
        writeln!(f, "  Order: {:?}", self.order)
    }
}

/// Drive, total and return-to-start times for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub drive_seconds: u64,
    /// Drive time plus the dwell time at every stop
    pub total_seconds: u64,
    pub return_seconds: Option<u64>,
    pub stop_minutes: u32,
}

impl TimeEstimate {
    pub fn drive_minutes(&self) -> u64 {
        self.drive_seconds / 60
    }

    pub fn total_minutes(&self) -> u64 {
        self.total_seconds / 60
    }

    pub fn return_minutes(&self) -> Option<u64> {
        self.return_seconds.map(|s| s / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> DurationMatrix {
        DurationMatrix::from_seconds(vec![
            vec![0, 100, 500],
            vec![150, 0, 200],
            vec![100, 300, 0],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_order() {
        let route = Route::from_order(&matrix(), vec![0, 1, 2], "test").unwrap();
        assert_eq!(route.drive_seconds, 300);
        assert_eq!(route.return_seconds, Some(100));
        assert_eq!(route.stops(), &[1, 2]);
        assert_eq!(route.last_stop(), Some(2));
        assert!(route.is_complete(0, &[2, 1]));
        assert!(!route.is_complete(0, &[1]));
    }

    #[test]
    fn test_reversed_route_costs_differ() {
        let m = matrix();
        let forward = Route::from_order(&m, vec![0, 1, 2], "f").unwrap();
        let backward = Route::from_order(&m, vec![0, 2, 1], "b").unwrap();
        assert_ne!(forward.drive_seconds, backward.drive_seconds);
    }

    #[test]
    fn test_estimate_adds_stop_time() {
        let route = Route::from_order(&matrix(), vec![0, 1, 2], "test").unwrap();
        let est = route.estimate(7);
        assert_eq!(est.drive_seconds, 300);
        assert_eq!(est.total_seconds, 300 + 2 * 7 * 60);
        assert_eq!(est.drive_minutes(), 5);
        assert_eq!(est.total_minutes(), 19);
        assert_eq!(est.return_minutes(), Some(1));
    }
}
