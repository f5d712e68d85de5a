//! flowplace.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ScheduleError, ScheduleResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowplaceConfig {
    pub scheduler: SchedulerConfig,
    pub workload: WorkloadConfig,
}

/// Which placement strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Maximize local placements, most constrained server first.
    #[default]
    Locality,
    /// Keep every placement local while pulling load toward idle servers.
    LoadBalance,
    /// Pin a kernel task per server, then place by affinity to it.
    Affinity,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Locality => "locality",
            Strategy::LoadBalance => "load_balance",
            Strategy::Affinity => "affinity",
        }
    }
}

/// How to choose among servers with equal selection keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First server in workload order.
    #[default]
    InputOrder,
    /// Uniformly among the tied servers, using the run's RNG.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub strategy: Strategy,
    pub tie_break: TieBreak,
    /// Seed for kernel choice, proxy kernels and random tie-breaks.
    pub seed: Option<u64>,
    /// Cap on candidate paths enumerated per affinity round.
    pub max_candidate_paths: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            tie_break: TieBreak::default(),
            seed: None,
            max_candidate_paths: 1024,
        }
    }
}

/// Shape of a generated synthetic workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub servers: u32,
    /// Requested task count; capped at the total slot count.
    pub tasks: u32,
    /// Replicas per task.
    pub replication: u32,
    pub min_slot: u32,
    pub max_slot: u32,
    pub max_affinity: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            servers: 30,
            tasks: 100,
            replication: 2,
            min_slot: 1,
            max_slot: 8,
            max_affinity: 9,
        }
    }
}

impl FlowplaceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FlowplaceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        let s = &self.scheduler;
        let w = &self.workload;
        if s.max_candidate_paths == 0 {
            return Err(ScheduleError::Config(
                "scheduler.max_candidate_paths must be positive".to_string(),
            ));
        }
        if w.servers == 0 {
            return Err(ScheduleError::Config("workload.servers must be positive".to_string()));
        }
        if w.replication == 0 {
            return Err(ScheduleError::Config(
                "workload.replication must be positive".to_string(),
            ));
        }
        if w.min_slot == 0 || w.min_slot > w.max_slot {
            return Err(ScheduleError::Config(format!(
                "workload slot range {}..={} is invalid",
                w.min_slot, w.max_slot
            )));
        }
        Ok(())
    }
}
