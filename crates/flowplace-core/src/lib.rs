//! flowplace-core: flow-network task placement.
//!
//! Assigns tasks to capacity-bounded servers by repeated augmenting-path
//! search over a residual graph. A server may only receive a task along a
//! path if it holds a data replica of that task; paths may reroute tasks
//! already placed elsewhere.
//!
//! # Components
//!
//! - **`graph`** / **`path`**: residual graph and augmenting-path search
//! - **`locality`**: maximize local placements, most able server first
//! - **`balance`**: local placements, least-loaded server first
//! - **`affinity`**: kernel seeding, then placement by affinity to kernels
//! - **`outcome`**: final assignment, shortfall and metrics
//!
//! # Architecture
//!
//! ```text
//! Workload ──► ResidualGraph ──► Session ◄── strategy (select origin)
//!                                   │            │
//!                                   │       find_path / find_all_paths
//!                                   ▼
//!                            ScheduleOutcome
//! ```

mod ability;
pub mod affinity;
pub mod balance;
pub mod config;
pub mod error;
pub mod graph;
pub mod locality;
pub mod matrix;
pub mod outcome;
pub mod path;
mod session;
pub mod types;

use rand::Rng;

pub use affinity::AffinityScheduler;
pub use balance::LoadBalanceScheduler;
pub use config::{FlowplaceConfig, SchedulerConfig, Strategy, TieBreak, WorkloadConfig};
pub use error::{ScheduleError, ScheduleResult};
pub use graph::{Edge, ResidualGraph};
pub use locality::LocalityScheduler;
pub use matrix::AffinityMatrix;
pub use outcome::{CapacityShortfall, KernelPin, ScheduleOutcome};
pub use path::{AugmentingPath, find_all_paths, find_path};
pub use types::{NodeId, Server, ServerId, TaskId, Workload};

/// Run the strategy named in `config`.
///
/// The affinity strategy requires `affinity`; the others ignore it.
pub fn schedule<R: Rng + ?Sized>(
    config: &SchedulerConfig,
    workload: &Workload,
    affinity: Option<&AffinityMatrix>,
    rng: &mut R,
) -> ScheduleResult<ScheduleOutcome> {
    match config.strategy {
        Strategy::Locality => LocalityScheduler::new(config.clone()).schedule(workload, rng),
        Strategy::LoadBalance => LoadBalanceScheduler::new(config.clone()).schedule(workload, rng),
        Strategy::Affinity => {
            let matrix = affinity.ok_or(ScheduleError::MissingAffinity)?;
            AffinityScheduler::new(config.clone()).schedule(workload, matrix, rng)
        }
    }
}
