pub mod compare;
pub mod config;
pub mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use flowplace_core::{AffinityMatrix, FlowplaceConfig, Strategy};
use flowplace_workload::{GeneratedWorkload, WorkloadGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Locality,
    LoadBalance,
    Affinity,
    /// Locality-blind random placement
    Random,
}

impl StrategyArg {
    /// The engine strategy, or `None` for the random baseline.
    pub fn strategy(self) -> Option<Strategy> {
        match self {
            StrategyArg::Locality => Some(Strategy::Locality),
            StrategyArg::LoadBalance => Some(Strategy::LoadBalance),
            StrategyArg::Affinity => Some(Strategy::Affinity),
            StrategyArg::Random => None,
        }
    }
}

/// Flags shared by every command that builds a workload.
#[derive(Debug, Clone, Default, Args)]
pub struct WorkloadArgs {
    /// Path to a flowplace.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override workload.servers
    #[arg(long)]
    pub servers: Option<u32>,
    /// Override workload.tasks
    #[arg(long)]
    pub tasks: Option<u32>,
    /// RNG seed; overrides scheduler.seed
    #[arg(long)]
    pub seed: Option<u64>,
    /// Upper-triangular affinity file replacing the generated matrix
    #[arg(long)]
    pub affinity_file: Option<PathBuf>,
}

/// A resolved configuration and the workload generated from it.
pub struct Inputs {
    pub config: FlowplaceConfig,
    pub seed: Option<u64>,
    pub generated: GeneratedWorkload,
}

impl Inputs {
    pub fn load(args: &WorkloadArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => FlowplaceConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => FlowplaceConfig::default(),
        };
        if let Some(servers) = args.servers {
            config.workload.servers = servers;
        }
        if let Some(tasks) = args.tasks {
            config.workload.tasks = tasks;
        }
        config.validate()?;

        let seed = args.seed.or(config.scheduler.seed);
        let mut generated = WorkloadGenerator::new(config.workload.clone()).generate(&mut rng_for(seed))?;
        if let Some(path) = &args.affinity_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            generated.affinity = AffinityMatrix::parse_upper_triangle(&text)?;
        }

        info!(
            servers = generated.workload.servers().len(),
            tasks = generated.workload.tasks().len(),
            total_slots = generated.workload.total_slots(),
            seed = ?seed,
            "workload ready"
        );
        Ok(Self {
            config,
            seed,
            generated,
        })
    }

    /// A fresh scheduling RNG; identical for every call when seeded.
    pub fn rng(&self) -> StdRng {
        rng_for(self.seed)
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
