//! Task affinity matrix.
//!
//! A symmetric, nonnegative integer matrix indexed by task id. The diagonal
//! is unused and always reads as zero. Read-only once a scheduling run
//! starts.

use crate::error::{ScheduleError, ScheduleResult};
use crate::types::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityMatrix {
    dimension: usize,
    // Row-major, full square.
    values: Vec<u32>,
}

impl AffinityMatrix {
    /// An all-zero matrix covering task ids `0..dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            values: vec![0; dimension * dimension],
        }
    }

    /// Build from full rows. Rows must be square and symmetric.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> ScheduleResult<Self> {
        let dimension = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dimension) {
            return Err(ScheduleError::InvalidAffinity(format!(
                "row {i} has {} values, expected {dimension}",
                row.len()
            )));
        }

        let mut matrix = Self::new(dimension);
        for (i, row) in rows.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if i != j && rows[j][i] != value {
                    return Err(ScheduleError::InvalidAffinity(format!(
                        "not symmetric at ({i}, {j})"
                    )));
                }
                if i != j {
                    matrix.values[i * dimension + j] = value;
                }
            }
        }
        Ok(matrix)
    }

    /// Parse the tab-separated upper-triangular text format: line `k` holds
    /// the affinities between task `k` and tasks `k+1..`. Blank lines are
    /// skipped.
    pub fn parse_upper_triangle(text: &str) -> ScheduleResult<Self> {
        let lines: Vec<Vec<u32>> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(k, line)| {
                line.split_whitespace()
                    .map(|v| {
                        v.parse::<u32>().map_err(|e| {
                            ScheduleError::InvalidAffinity(format!("line {}: {v:?}: {e}", k + 1))
                        })
                    })
                    .collect()
            })
            .collect::<ScheduleResult<_>>()?;

        let dimension = if lines.is_empty() { 0 } else { lines.len() + 1 };
        let mut matrix = Self::new(dimension);
        for (k, values) in lines.iter().enumerate() {
            let expected = dimension - 1 - k;
            if values.len() != expected {
                return Err(ScheduleError::InvalidAffinity(format!(
                    "line {} has {} values, expected {expected}",
                    k + 1,
                    values.len()
                )));
            }
            for (offset, &value) in values.iter().enumerate() {
                matrix.put(k, k + 1 + offset, value);
            }
        }
        Ok(matrix)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Set the affinity of a pair (both orientations). Diagonal writes and
    /// out-of-range ids are ignored.
    pub fn set(&mut self, a: TaskId, b: TaskId, value: u32) {
        if a.index() < self.dimension && b.index() < self.dimension {
            self.put(a.index(), b.index(), value);
        }
    }

    fn put(&mut self, i: usize, j: usize, value: u32) {
        if i == j {
            return;
        }
        self.values[i * self.dimension + j] = value;
        self.values[j * self.dimension + i] = value;
    }

    /// Affinity between two tasks; zero on the diagonal or out of range.
    pub fn get(&self, a: TaskId, b: TaskId) -> u32 {
        let (i, j) = (a.index(), b.index());
        if i == j || i >= self.dimension || j >= self.dimension {
            return 0;
        }
        self.values[i * self.dimension + j]
    }

    /// Fail unless every task id has a row.
    pub fn ensure_covers<'a>(&self, tasks: impl IntoIterator<Item = &'a TaskId>) -> ScheduleResult<()> {
        match tasks.into_iter().find(|t| t.index() >= self.dimension) {
            Some(task) => Err(ScheduleError::AffinityOutOfRange {
                task: *task,
                dimension: self.dimension,
            }),
            None => Ok(()),
        }
    }
}
