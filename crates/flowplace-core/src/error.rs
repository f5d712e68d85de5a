//! Scheduler error types.

use thiserror::Error;

use crate::types::TaskId;

/// Errors that can occur while building a workload or running a scheduler.
///
/// An oversubscribed workload is not an error: unplaced tasks are reported
/// on the [`ScheduleOutcome`](crate::ScheduleOutcome) instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("invalid workload: {0}")]
    InvalidWorkload(String),

    #[error("affinity matrix of dimension {dimension} does not cover task {task}")]
    AffinityOutOfRange { task: TaskId, dimension: usize },

    #[error("invalid affinity matrix: {0}")]
    InvalidAffinity(String),

    #[error("affinity strategy requires an affinity matrix")]
    MissingAffinity,

    #[error("config error: {0}")]
    Config(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
