//! Directed travel-time matrix.
//!
//! Index 0 is the start place and stops follow in input order. Driving times
//! differ by direction, so the matrix is never assumed symmetric. A cell is
//! either a duration in seconds or an explicit unreachable marker carrying the
//! status the mapping service reported for it.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixCell {
    Seconds(u64),
    Unreachable { status: String },
}

impl MatrixCell {
    pub fn unreachable(status: impl Into<String>) -> Self {
        MatrixCell::Unreachable { status: status.into() }
    }

    pub fn seconds(&self) -> Option<u64> {
        match self {
            MatrixCell::Seconds(s) => Some(*s),
            MatrixCell::Unreachable { .. } => None,
        }
    }
}

/// Dense n×n duration matrix stored in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationMatrix {
    cells: Vec<MatrixCell>,
    size: usize,
}

impl DurationMatrix {
    /// Build from rows; every row must have exactly `rows.len()` cells
    pub fn from_rows(rows: Vec<Vec<MatrixCell>>) -> Result<Self> {
        let size = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(PlannerError::InvalidStops(format!(
                "duration matrix row {} has {} cells, expected {}",
                i,
                row.len(),
                size
            )));
        }
        Ok(DurationMatrix {
            cells: rows.into_iter().flatten().collect(),
            size,
        })
    }

    /// Convenience constructor for fully reachable matrices
    pub fn from_seconds(rows: Vec<Vec<u64>>) -> Result<Self> {
        Self::from_rows(
            rows.into_iter()
                .map(|row| row.into_iter().map(MatrixCell::Seconds).collect())
                .collect(),
        )
    }

    /// An all-unreachable matrix of the given size, with zero on the diagonal
    pub fn unknown(size: usize) -> Self {
        let mut cells = vec![MatrixCell::unreachable("NOT_REQUESTED"); size * size];
        for i in 0..size {
            cells[i * size + i] = MatrixCell::Seconds(0);
        }
        DurationMatrix { cells, size }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn cell(&self, from: usize, to: usize) -> &MatrixCell {
        &self.cells[from * self.size + to]
    }

    pub fn set(&mut self, from: usize, to: usize, cell: MatrixCell) {
        self.cells[from * self.size + to] = cell;
    }

    /// Duration from `from` to `to`, or an error naming the unreachable pair
    pub fn duration(&self, from: usize, to: usize) -> Result<u64> {
        if from >= self.size || to >= self.size {
            return Err(PlannerError::InvalidStops(format!(
                "index out of range for a {}-place matrix: {} -> {}",
                self.size, from, to
            )));
        }
        self.cell(from, to)
            .seconds()
            .ok_or(PlannerError::Unreachable { from, to })
    }

    /// Sum of consecutive directed durations along `route` (no return leg)
    pub fn route_cost(&self, route: &[usize]) -> Result<u64> {
        route
            .windows(2)
            .map(|leg| self.duration(leg[0], leg[1]))
            .sum()
    }

    /// Duration from the last place of the route back to its first place
    pub fn return_leg(&self, route: &[usize]) -> Option<u64> {
        match (route.first(), route.last()) {
            (Some(&first), Some(&last)) if route.len() > 1 => {
                self.cell(last, first).seconds()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> DurationMatrix {
        DurationMatrix::from_seconds(vec![
            vec![0, 100, 500],
            vec![150, 0, 200],
            vec![100, 300, 0],
        ])
        .unwrap()
    }

    #[test]
    fn test_route_cost_is_directional() {
        let m = abc();
        assert_eq!(m.route_cost(&[0, 1, 2]).unwrap(), 300);
        assert_eq!(m.route_cost(&[2, 1, 0]).unwrap(), 450);
    }

    #[test]
    fn test_return_leg() {
        let m = abc();
        assert_eq!(m.return_leg(&[0, 1, 2]), Some(100));
        assert_eq!(m.return_leg(&[0, 2, 1]), Some(150));
        assert_eq!(m.return_leg(&[0]), None);
    }

    #[test]
    fn test_unreachable_cell_is_an_error() {
        let m = DurationMatrix::from_rows(vec![
            vec![MatrixCell::Seconds(0), MatrixCell::unreachable("ZERO_RESULTS")],
            vec![MatrixCell::Seconds(10), MatrixCell::Seconds(0)],
        ])
        .unwrap();
        assert!(matches!(
            m.route_cost(&[0, 1]),
            Err(PlannerError::Unreachable { from: 0, to: 1 })
        ));
        assert_eq!(m.route_cost(&[1, 0]).unwrap(), 10);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![0, 1], vec![1]];
        assert!(DurationMatrix::from_seconds(rows).is_err());
    }

    #[test]
    fn test_unknown_matrix() {
        let m = DurationMatrix::unknown(3);
        assert_eq!(m.duration(1, 1).unwrap(), 0);
        assert!(m.duration(0, 1).is_err());
    }
}
