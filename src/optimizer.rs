//! Stop ordering.
//!
//! Two strategies share the [`OrderingStrategy`] trait:
//!
//! - [`ExactSearch`] enumerates every permutation of the stops (the start
//!   stays fixed in front) and keeps the cheapest one. It explores up to n!
//!   orderings, so it refuses more than [`MAX_EXACT_STOPS`] stops.
//! - [`FarthestFirst`] sorts the stops by their duration from the start,
//!   farthest first. It is a cheap heuristic with no optimality guarantee.
//!
//! Both are pure functions of the duration matrix.

use crate::error::{PlannerError, Result};
use crate::matrix::DurationMatrix;
use crate::route::Route;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Largest stop count exact search accepts (9! = 362 880 orderings)
pub const MAX_EXACT_STOPS: usize = 9;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Minimum total drive time over all orderings
    #[default]
    Exact,
    /// Descending drive time from the start
    FarthestFirst,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Exact => "Normal Optimized Route",
            Strategy::FarthestFirst => "Farthest First Route",
        }
    }
}

pub trait OrderingStrategy {
    fn order(&self, start: usize, stops: &[usize], matrix: &DurationMatrix) -> Result<Route>;
    fn name(&self) -> &str;
}

/// Order `stops` after `start` using `strategy`
pub fn optimize(
    start: usize,
    stops: &[usize],
    matrix: &DurationMatrix,
    strategy: Strategy,
) -> Result<Route> {
    match strategy {
        Strategy::Exact => ExactSearch::new().order(start, stops, matrix),
        Strategy::FarthestFirst => FarthestFirst.order(start, stops, matrix),
    }
}

/// Reject empty, duplicated, out-of-range stop sets or ones containing the start
fn validate_stops(start: usize, stops: &[usize], matrix: &DurationMatrix) -> Result<()> {
    if stops.is_empty() {
        return Err(PlannerError::NoStops);
    }
    let n = matrix.size();
    if start >= n {
        return Err(PlannerError::InvalidStops(format!(
            "start index {} outside a {}-place matrix",
            start, n
        )));
    }
    let mut seen = HashSet::with_capacity(stops.len());
    for &s in stops {
        if s >= n {
            return Err(PlannerError::InvalidStops(format!(
                "stop index {} outside a {}-place matrix",
                s, n
            )));
        }
        if s == start {
            return Err(PlannerError::InvalidStops(format!(
                "stop {} is the start place",
                s
            )));
        }
        if !seen.insert(s) {
            return Err(PlannerError::InvalidStops(format!("stop {} listed twice", s)));
        }
    }
    Ok(())
}

/// Exhaustive permutation search.
///
/// Orderings are visited in the same sequence as a lexicographic permutation
/// of the positions in `stops`, and a later ordering only replaces the best
/// one when it is strictly cheaper, so ties go to the first ordering seen.
/// Branches whose partial cost already reaches the best total are cut; with
/// non-negative durations that never changes the winner.
pub struct ExactSearch {
    pub max_stops: usize,
}

impl ExactSearch {
    pub fn new() -> Self {
        ExactSearch { max_stops: MAX_EXACT_STOPS }
    }

    /// Every entry a permutation can touch must be reachable:
    /// start to each stop and each ordered pair of stops.
    fn check_reachable(start: usize, stops: &[usize], matrix: &DurationMatrix) -> Result<()> {
        for &s in stops {
            matrix.duration(start, s)?;
            for &t in stops {
                if s != t {
                    matrix.duration(s, t)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for ExactSearch {
    fn default() -> Self {
        Self::new()
    }
}

struct SearchState<'a> {
    matrix: &'a DurationMatrix,
    stops: &'a [usize],
    used: Vec<bool>,
    path: Vec<usize>,
    best: Option<(u64, Vec<usize>)>,
    evaluated: u64,
}

impl SearchState<'_> {
    fn extend(&mut self, partial: u64) -> Result<()> {
        if let Some((best_cost, _)) = &self.best {
            if partial >= *best_cost {
                return Ok(());
            }
        }

        if self.path.len() == self.stops.len() + 1 {
            self.evaluated += 1;
            self.best = Some((partial, self.path.clone()));
            return Ok(());
        }

        let current = self.path[self.path.len() - 1];
        for pos in 0..self.stops.len() {
            if self.used[pos] {
                continue;
            }
            let next = self.stops[pos];
            let leg = self.matrix.duration(current, next)?;
            self.used[pos] = true;
            self.path.push(next);
            self.extend(partial + leg)?;
            self.path.pop();
            self.used[pos] = false;
        }
        Ok(())
    }
}

impl OrderingStrategy for ExactSearch {
    fn order(&self, start: usize, stops: &[usize], matrix: &DurationMatrix) -> Result<Route> {
        let timer = Instant::now();
        validate_stops(start, stops, matrix)?;
        if stops.len() > self.max_stops {
            return Err(PlannerError::ExactSearchTooLarge {
                stops: stops.len(),
                max: self.max_stops,
            });
        }
        Self::check_reachable(start, stops, matrix)?;

        let mut state = SearchState {
            matrix,
            stops,
            used: vec![false; stops.len()],
            path: vec![start],
            best: None,
            evaluated: 0,
        };
        state.extend(0)?;

        let (cost, order) = state.best.ok_or_else(|| {
            PlannerError::InvalidStops("exact search found no ordering".to_string())
        })?;
        log::debug!(
            "Exact search over {} stops: best {}s after {} complete orderings",
            stops.len(),
            cost,
            state.evaluated
        );

        let mut route = Route::from_order(matrix, order, self.name())?;
        route.computation_time = timer.elapsed().as_secs_f64();
        route.evaluated = Some(state.evaluated);
        Ok(route)
    }

    fn name(&self) -> &str {
        "Exact"
    }
}

/// Stops sorted by descending drive time from the start; ties keep input order
pub struct FarthestFirst;

impl OrderingStrategy for FarthestFirst {
    fn order(&self, start: usize, stops: &[usize], matrix: &DurationMatrix) -> Result<Route> {
        let timer = Instant::now();
        validate_stops(start, stops, matrix)?;

        let mut keyed = stops
            .iter()
            .map(|&s| matrix.duration(start, s).map(|d| (s, d)))
            .collect::<Result<Vec<_>>>()?;
        // sort_by is stable
        keyed.sort_by(|a, b| b.1.cmp(&a.1));

        let mut order = Vec::with_capacity(stops.len() + 1);
        order.push(start);
        order.extend(keyed.into_iter().map(|(s, _)| s));

        let mut route = Route::from_order(matrix, order, self.name())?;
        route.computation_time = timer.elapsed().as_secs_f64();
        Ok(route)
    }

    fn name(&self) -> &str {
        "FarthestFirst"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixCell;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn abc() -> DurationMatrix {
        // A=0, B=1, C=2
        DurationMatrix::from_seconds(vec![
            vec![0, 100, 500],
            vec![150, 0, 200],
            vec![100, 300, 0],
        ])
        .unwrap()
    }

    fn random_matrix(rng: &mut ChaCha8Rng, n: usize) -> DurationMatrix {
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { 0 } else { rng.gen_range(60..3600) })
                    .collect()
            })
            .collect();
        DurationMatrix::from_seconds(rows).unwrap()
    }

    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_exact_example() {
        let route = optimize(0, &[1, 2], &abc(), Strategy::Exact).unwrap();
        assert_eq!(route.order, vec![0, 1, 2]);
        assert_eq!(route.drive_seconds, 300);
        assert_eq!(route.return_seconds, Some(100));
    }

    #[test]
    fn test_farthest_first_example() {
        let route = optimize(0, &[1, 2], &abc(), Strategy::FarthestFirst).unwrap();
        assert_eq!(route.order, vec![0, 2, 1]);
        assert_eq!(route.drive_seconds, 800);
    }

    #[test]
    fn test_exact_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for n_stops in 1..=6 {
            for _ in 0..5 {
                let matrix = random_matrix(&mut rng, n_stops + 1);
                let stops: Vec<usize> = (1..=n_stops).collect();
                let route = optimize(0, &stops, &matrix, Strategy::Exact).unwrap();
                assert!(route.is_complete(0, &stops));

                for perm in permutations(&stops) {
                    let mut order = vec![0];
                    order.extend(perm);
                    let cost = matrix.route_cost(&order).unwrap();
                    assert!(route.drive_seconds <= cost);
                }
            }
        }
    }

    #[test]
    fn test_exact_ties_keep_first_permutation() {
        // every ordering costs the same
        let matrix = DurationMatrix::from_seconds(vec![vec![10; 4]; 4]).unwrap();
        let route = optimize(0, &[3, 1, 2], &matrix, Strategy::Exact).unwrap();
        assert_eq!(route.order, vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_exact_with_non_zero_start() {
        let matrix = abc();
        let route = optimize(2, &[0, 1], &matrix, Strategy::Exact).unwrap();
        // C->A->B = 100+100, C->B->A = 300+150
        assert_eq!(route.order, vec![2, 0, 1]);
        assert_eq!(route.drive_seconds, 200);
    }

    #[test]
    fn test_farthest_first_is_stable_descending() {
        let matrix = DurationMatrix::from_seconds(vec![
            vec![0, 300, 100, 300, 900],
            vec![1, 0, 1, 1, 1],
            vec![1, 1, 0, 1, 1],
            vec![1, 1, 1, 0, 1],
            vec![1, 1, 1, 1, 0],
        ])
        .unwrap();
        let route = optimize(0, &[1, 2, 3, 4], &matrix, Strategy::FarthestFirst).unwrap();
        assert_eq!(route.order, vec![0, 4, 1, 3, 2]);

        let route = optimize(0, &[3, 2, 1], &matrix, Strategy::FarthestFirst).unwrap();
        assert_eq!(route.order, vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_unreachable_pair_fails_exact() {
        let mut matrix = abc();
        matrix.set(2, 1, MatrixCell::unreachable("ZERO_RESULTS"));
        // C->B is only used by the losing ordering, still rejected up front
        let err = optimize(0, &[1, 2], &matrix, Strategy::Exact).unwrap_err();
        assert!(matches!(err, PlannerError::Unreachable { from: 2, to: 1 }));
    }

    #[test]
    fn test_unreachable_leg_fails_farthest_first() {
        let mut matrix = abc();
        matrix.set(2, 1, MatrixCell::unreachable("NOT_FOUND"));
        let err = optimize(0, &[1, 2], &matrix, Strategy::FarthestFirst).unwrap_err();
        assert!(matches!(err, PlannerError::Unreachable { from: 2, to: 1 }));
    }

    #[test]
    fn test_unreachable_return_leg_is_not_fatal() {
        let mut matrix = abc();
        matrix.set(2, 0, MatrixCell::unreachable("ZERO_RESULTS"));
        let route = optimize(0, &[1, 2], &matrix, Strategy::Exact).unwrap();
        assert_eq!(route.order, vec![0, 1, 2]);
        assert_eq!(route.return_seconds, None);
    }

    #[test]
    fn test_invalid_stop_sets() {
        let matrix = abc();
        assert!(matches!(
            optimize(0, &[], &matrix, Strategy::Exact),
            Err(PlannerError::NoStops)
        ));
        assert!(matches!(
            optimize(0, &[0, 1], &matrix, Strategy::Exact),
            Err(PlannerError::InvalidStops(_))
        ));
        assert!(matches!(
            optimize(0, &[1, 1], &matrix, Strategy::FarthestFirst),
            Err(PlannerError::InvalidStops(_))
        ));
        assert!(matches!(
            optimize(0, &[7], &matrix, Strategy::Exact),
            Err(PlannerError::InvalidStops(_))
        ));
    }

    #[test]
    fn test_exact_refuses_large_stop_sets() {
        let n = MAX_EXACT_STOPS + 2;
        let matrix = DurationMatrix::from_seconds(vec![vec![1; n]; n]).unwrap();
        let stops: Vec<usize> = (1..n).collect();
        let err = optimize(0, &stops, &matrix, Strategy::Exact).unwrap_err();
        assert!(matches!(err, PlannerError::ExactSearchTooLarge { stops: 10, max: 9 }));

        let route = optimize(0, &stops, &matrix, Strategy::FarthestFirst).unwrap();
        assert!(route.is_complete(0, &stops));
    }

    #[test]
    fn test_single_stop() {
        let route = optimize(0, &[2], &abc(), Strategy::Exact).unwrap();
        assert_eq!(route.order, vec![0, 2]);
        assert_eq!(route.drive_seconds, 500);
        assert_eq!(route.evaluated, Some(1));
    }
}
