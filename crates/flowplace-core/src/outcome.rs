//! Result of a scheduling run and the metrics computed over it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matrix::AffinityMatrix;
use crate::types::{Server, ServerId, TaskId, Workload};

/// A task pinned to a server before affinity-directed placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelPin {
    pub server: ServerId,
    pub task: TaskId,
}

/// Final assignment produced by one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub strategy: String,
    /// Input servers with their final task sets. Slots are the input slots.
    pub servers: Vec<Server>,
    /// Tasks placed by a fallback pass rather than along a local path.
    pub fallback: Vec<TaskId>,
    /// Tasks no server could take.
    pub unplaced: Vec<TaskId>,
    pub kernels: Vec<KernelPin>,
}

/// Tasks left unassigned after every pass. Reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityShortfall {
    pub unplaced: Vec<TaskId>,
}

impl fmt::Display for CapacityShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task(s) could not be placed:", self.unplaced.len())?;
        for task in &self.unplaced {
            write!(f, " {task}")?;
        }
        Ok(())
    }
}

impl ScheduleOutcome {
    pub fn shortfall(&self) -> Option<CapacityShortfall> {
        if self.unplaced.is_empty() {
            None
        } else {
            Some(CapacityShortfall {
                unplaced: self.unplaced.clone(),
            })
        }
    }

    pub fn placed_count(&self) -> usize {
        self.servers.iter().map(|s| s.tasks.len()).sum()
    }

    pub fn server_of(&self, task: TaskId) -> Option<ServerId> {
        self.servers
            .iter()
            .find(|s| s.tasks.contains(&task))
            .map(|s| s.id)
    }

    pub fn kernel_of(&self, server: ServerId) -> Option<TaskId> {
        self.kernels
            .iter()
            .find(|k| k.server == server)
            .map(|k| k.task)
    }

    /// Placements on a server that holds a replica of the task.
    pub fn local_placements(&self, workload: &Workload) -> usize {
        self.servers
            .iter()
            .map(|s| s.tasks.iter().filter(|t| workload.is_local(s.id, **t)).count())
            .sum()
    }

    /// Mean assigned task count per server.
    pub fn mean_load(&self) -> f64 {
        if self.servers.is_empty() {
            return 0.0;
        }
        self.placed_count() as f64 / self.servers.len() as f64
    }

    /// Sum of squared distances between each server's task count and `target`.
    pub fn load_deviation(&self, target: f64) -> f64 {
        self.servers
            .iter()
            .map(|s| {
                let d = s.tasks.len() as f64 - target;
                d * d
            })
            .sum()
    }

    /// Affinity between each kernel and the other tasks on its server.
    pub fn kernel_affinity(&self, matrix: &AffinityMatrix) -> u64 {
        self.kernels
            .iter()
            .filter_map(|k| {
                let server = self.servers.iter().find(|s| s.id == k.server)?;
                Some(
                    server
                        .tasks
                        .iter()
                        .filter(|t| **t != k.task)
                        .map(|t| u64::from(matrix.get(k.task, *t)))
                        .sum::<u64>(),
                )
            })
            .sum()
    }

    /// Affinity over every unordered pair of co-located tasks.
    pub fn co_location_affinity(&self, matrix: &AffinityMatrix) -> u64 {
        let mut total = 0u64;
        for server in &self.servers {
            let tasks: Vec<TaskId> = server.tasks.iter().copied().collect();
            for (i, a) in tasks.iter().enumerate() {
                for b in &tasks[i + 1..] {
                    total += u64::from(matrix.get(*a, *b));
                }
            }
        }
        total
    }
}
