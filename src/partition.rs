//! Splitting stops between drivers.
//!
//! Stops are grouped by their geocoded coordinates with seeded k-means. The
//! group count is either the fixed driver count or `ceil(n / cap)` for a
//! per-driver stop cap. The result is deterministic for a given input and
//! seed, and is either exactly that many non-empty groups or an error.

use crate::error::{PlannerError, Result};
use crate::place::Coordinate;
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the number of groups is chosen
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// Exactly this many drivers
    Drivers(usize),
    /// As many drivers as needed so each gets at most this many stops on average
    MaxStopsPerGroup(usize),
}

impl Grouping {
    /// Number of groups for `stop_count` stops
    pub fn group_count(&self, stop_count: usize) -> usize {
        match *self {
            Grouping::Drivers(k) => k,
            Grouping::MaxStopsPerGroup(m) if m > 0 => stop_count.div_ceil(m),
            Grouping::MaxStopsPerGroup(_) => 0,
        }
    }
}

/// Result of partitioning: each group lists stop indices in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub groups: Vec<Vec<usize>>,
}

impl Assignment {
    /// Build from per-point labels. Groups are numbered by first appearance so
    /// the group holding the earliest stop is group 0.
    fn from_labels(stops: &[(usize, Coordinate)], labels: &[usize], k: usize) -> Result<Self> {
        let mut remap = vec![usize::MAX; k];
        let mut next = 0;
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (&(stop, _), &label) in stops.iter().zip(labels) {
            if remap[label] == usize::MAX {
                remap[label] = next;
                next += 1;
            }
            groups[remap[label]].push(stop);
        }
        if next < k {
            return Err(PlannerError::EmptyGroup(format!(
                "{} of {} groups received stops",
                next, k
            )));
        }
        Ok(Assignment { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_of(&self, stop: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(&stop))
    }
}

pub trait Partitioner {
    fn partition(&self, stops: &[(usize, Coordinate)]) -> Result<Assignment>;
    fn name(&self) -> &str;
}

/// Partition with the method implied by `grouping`
pub fn partition(
    stops: &[(usize, Coordinate)],
    grouping: Grouping,
    seed: u64,
    max_iterations: usize,
) -> Result<Assignment> {
    let groups = grouping.group_count(stops.len());
    if let Grouping::MaxStopsPerGroup(m) = grouping {
        log::debug!("{} stops at most {} per driver: {} groups", stops.len(), m, groups);
    }
    KMeansPartitioner {
        groups,
        seed,
        max_iterations,
    }
    .partition(stops)
}

fn check_group_count(stops: &[(usize, Coordinate)], k: usize) -> Result<()> {
    if k == 0 {
        return Err(PlannerError::InvalidConfig(
            "group count must be at least 1".to_string(),
        ));
    }
    if stops.len() < k {
        return Err(PlannerError::InsufficientStops {
            available: stops.len(),
            groups: k,
        });
    }
    let distinct: HashSet<(u64, u64)> = stops
        .iter()
        .map(|(_, c)| (c.lat.to_bits(), c.lng.to_bits()))
        .collect();
    if distinct.len() < k {
        return Err(PlannerError::EmptyGroup(format!(
            "only {} distinct locations for {} groups",
            distinct.len(),
            k
        )));
    }
    Ok(())
}

/// Seeded k-means (k-means++ initialisation) on lat/lng
pub struct KMeansPartitioner {
    pub groups: usize,
    pub seed: u64,
    pub max_iterations: usize,
}

impl KMeansPartitioner {
    pub fn new(groups: usize) -> Self {
        KMeansPartitioner {
            groups,
            seed: 42,
            max_iterations: 300,
        }
    }

    pub fn with_seed(groups: usize, seed: u64) -> Self {
        KMeansPartitioner {
            seed,
            ..Self::new(groups)
        }
    }

    /// Give each empty group the point lying farthest from its own centroid,
    /// taken from a group that keeps at least one other point
    fn fill_empty(&self, stops: &[(usize, Coordinate)], centroids: &Array2<f64>, labels: &mut [usize]) {
        let dist_sq = |i: usize, c: usize| -> f64 {
            stops[i].1.distance_sq(&Coordinate::new(centroids[[c, 0]], centroids[[c, 1]]))
        };
        for empty in 0..self.groups {
            let mut sizes = vec![0usize; self.groups];
            for &l in labels.iter() {
                sizes[l] += 1;
            }
            if sizes[empty] > 0 {
                continue;
            }
            let donor = (0..labels.len())
                .filter(|&i| sizes[labels[i]] > 1)
                .max_by_key(|&i| (OrderedFloat(dist_sq(i, labels[i])), std::cmp::Reverse(i)));
            if let Some(i) = donor {
                log::debug!("Moving point {} into empty group {}", i, empty);
                labels[i] = empty;
            }
        }
    }
}

impl Partitioner for KMeansPartitioner {
    fn partition(&self, stops: &[(usize, Coordinate)]) -> Result<Assignment> {
        check_group_count(stops, self.groups)?;

        let flat: Vec<f64> = stops.iter().flat_map(|(_, c)| [c.lat, c.lng]).collect();
        let observations = Array2::from_shape_vec((stops.len(), 2), flat)
            .map_err(|e| PlannerError::Clustering(e.to_string()))?;
        let dataset = DatasetBase::from(observations);

        let rng = ChaCha8Rng::seed_from_u64(self.seed);
        let model = KMeans::params_with_rng(self.groups, rng)
            .max_n_iterations(self.max_iterations.max(1) as u64)
            .tolerance(1e-9)
            .fit(&dataset)
            .map_err(|e| PlannerError::Clustering(e.to_string()))?;

        let mut labels: Vec<usize> = model.predict(dataset.records()).to_vec();
        self.fill_empty(stops, model.centroids(), &mut labels);
        log::debug!("{} split {} stops into {} groups", self.name(), stops.len(), self.groups);

        Assignment::from_labels(stops, &labels, self.groups)
    }

    fn name(&self) -> &str {
        "KMeans"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::Rng;

    /// Three tight neighbourhoods far apart from each other
    fn neighbourhoods() -> Vec<(usize, Coordinate)> {
        vec![
            (1, Coordinate::new(40.00, -75.00)),
            (2, Coordinate::new(41.00, -73.00)),
            (3, Coordinate::new(40.01, -75.01)),
            (4, Coordinate::new(38.00, -77.00)),
            (5, Coordinate::new(41.01, -73.02)),
            (6, Coordinate::new(38.02, -77.01)),
            (7, Coordinate::new(40.02, -74.99)),
        ]
    }

    fn assert_covers(assignment: &Assignment, stops: &[(usize, Coordinate)]) {
        let mut all: Vec<usize> = assignment.groups.iter().flatten().copied().collect();
        all.sort_unstable();
        let mut expected: Vec<usize> = stops.iter().map(|(s, _)| *s).collect();
        expected.sort_unstable();
        assert_eq!(all, expected);
        assert!(assignment.groups.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_kmeans_finds_neighbourhoods() {
        let stops = neighbourhoods();
        let assignment = partition(&stops, Grouping::Drivers(3), 42, 300).unwrap();
        assert_eq!(assignment.len(), 3);
        assert_covers(&assignment, &stops);
        assert_eq!(
            assignment.groups,
            vec![vec![1, 3, 7], vec![2, 5], vec![4, 6]]
        );
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let stops = neighbourhoods();
        for k in 1..=stops.len() {
            let a = KMeansPartitioner::with_seed(k, 7).partition(&stops).unwrap();
            let b = KMeansPartitioner::with_seed(k, 7).partition(&stops).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.len(), k);
            assert_covers(&a, &stops);
        }
    }

    #[test]
    fn test_kmeans_random_inputs_always_fill_groups() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            let n = rng.gen_range(2..15);
            let stops: Vec<(usize, Coordinate)> = (0..n)
                .map(|i| {
                    (
                        i + 1,
                        Coordinate::new(rng.gen_range(39.0..41.0), rng.gen_range(-76.0..-74.0)),
                    )
                })
                .collect();
            let k = rng.gen_range(1..=n);
            let assignment = KMeansPartitioner::with_seed(k, 42).partition(&stops).unwrap();
            assert_eq!(assignment.len(), k);
            assert_covers(&assignment, &stops);
        }
    }

    #[test]
    fn test_too_few_stops() {
        let stops = &neighbourhoods()[..2];
        let err = partition(stops, Grouping::Drivers(3), 42, 300).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::InsufficientStops { available: 2, groups: 3 }
        ));
    }

    #[test]
    fn test_duplicate_locations_cannot_fill_groups() {
        let same = Coordinate::new(40.0, -75.0);
        let stops = vec![(1, same), (2, same), (3, same)];
        let err = partition(&stops, Grouping::Drivers(2), 42, 300).unwrap_err();
        assert!(matches!(err, PlannerError::EmptyGroup(_)));
    }

    #[test]
    fn test_zero_groups_rejected() {
        let err = partition(&neighbourhoods(), Grouping::Drivers(0), 42, 300).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidConfig(_)));
        let err = partition(&neighbourhoods(), Grouping::MaxStopsPerGroup(0), 42, 300).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidConfig(_)));
    }

    #[test]
    fn test_fill_empty_moves_farthest_point() {
        let stops = vec![
            (1, Coordinate::new(0.0, 0.0)),
            (2, Coordinate::new(0.0, 1.0)),
            (3, Coordinate::new(0.0, 5.0)),
        ];
        let centroids = array![[0.0, 1.0], [9.0, 9.0]];
        let mut labels = vec![0, 0, 0];
        KMeansPartitioner::new(2).fill_empty(&stops, &centroids, &mut labels);
        assert_eq!(labels, vec![0, 0, 1]);
    }

    #[test]
    fn test_cap_sets_kmeans_group_count() {
        let stops = neighbourhoods();
        assert_eq!(Grouping::MaxStopsPerGroup(3).group_count(stops.len()), 3);
        let assignment = partition(&stops, Grouping::MaxStopsPerGroup(3), 42, 300).unwrap();
        assert_eq!(assignment.len(), 3);
        assert_covers(&assignment, &stops);
        assert_eq!(
            assignment.groups,
            vec![vec![1, 3, 7], vec![2, 5], vec![4, 6]]
        );
        assert_eq!(assignment.group_of(6), Some(2));
        assert_eq!(assignment.group_of(99), None);
    }
}
