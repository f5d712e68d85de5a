//! Synthetic workload generator.

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use flowplace_core::{AffinityMatrix, ScheduleError, ScheduleResult, Server, ServerId, TaskId, Workload, WorkloadConfig};

/// A generated workload and the affinity matrix over its tasks.
#[derive(Debug, Clone)]
pub struct GeneratedWorkload {
    pub workload: Workload,
    pub affinity: AffinityMatrix,
}

/// Builds random workloads from a [`WorkloadConfig`].
#[derive(Debug, Clone, Default)]
pub struct WorkloadGenerator {
    config: WorkloadConfig,
}

impl WorkloadGenerator {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    /// Generate servers `s0..` with uniform random slots, tasks `t0..`
    /// capped at the total slot count, `replication` distinct replica
    /// holders per task and a symmetric random affinity matrix.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> ScheduleResult<GeneratedWorkload> {
        let c = &self.config;
        if c.min_slot == 0 || c.min_slot > c.max_slot {
            return Err(ScheduleError::Config(format!(
                "slot range {}..={} is invalid",
                c.min_slot, c.max_slot
            )));
        }

        let servers: Vec<Server> = (0..c.servers)
            .map(|i| Server::new(ServerId(i), rng.random_range(c.min_slot..=c.max_slot)))
            .collect();
        let total_slots: u64 = servers.iter().map(|s| u64::from(s.slot)).sum();
        let task_count = u64::from(c.tasks).min(total_slots) as u32;
        let tasks: Vec<TaskId> = (0..task_count).map(TaskId).collect();

        let ids: Vec<ServerId> = servers.iter().map(|s| s.id).collect();
        let copies = c.replication.min(c.servers) as usize;
        let mut workload = Workload::new(servers, tasks.clone())?;
        for task in &tasks {
            for server in ids.choose_multiple(rng, copies) {
                workload.add_replica(*server, *task)?;
            }
        }

        let mut affinity = AffinityMatrix::new(tasks.len());
        for (i, a) in tasks.iter().enumerate() {
            for b in &tasks[i + 1..] {
                affinity.set(*a, *b, rng.random_range(0..=c.max_affinity));
            }
        }

        debug!(
            servers = c.servers,
            tasks = task_count,
            total_slots,
            replication = copies,
            "generated workload"
        );
        Ok(GeneratedWorkload { workload, affinity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small() -> WorkloadConfig {
        WorkloadConfig {
            servers: 5,
            tasks: 12,
            replication: 2,
            min_slot: 3,
            max_slot: 4,
            max_affinity: 9,
        }
    }

    #[test]
    fn respects_config_bounds() {
        let generated = WorkloadGenerator::new(small())
            .generate(&mut StdRng::seed_from_u64(1))
            .unwrap();
        let w = &generated.workload;

        assert_eq!(w.servers().len(), 5);
        assert_eq!(w.tasks().len(), 12);
        for server in w.servers() {
            assert!((3..=4).contains(&server.slot));
        }
        for task in w.tasks() {
            let holders = w.servers().iter().filter(|s| w.is_local(s.id, *task)).count();
            assert_eq!(holders, 2, "{task} replica count");
        }
        assert_eq!(generated.affinity.dimension(), 12);
        assert!(generated.affinity.ensure_covers(w.tasks()).is_ok());
    }

    #[test]
    fn task_count_is_capped_by_slots() {
        let config = WorkloadConfig {
            servers: 2,
            tasks: 100,
            min_slot: 3,
            max_slot: 3,
            ..small()
        };
        let generated = WorkloadGenerator::new(config)
            .generate(&mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(generated.workload.tasks().len(), 6);
    }

    #[test]
    fn replication_is_capped_by_servers() {
        let config = WorkloadConfig {
            servers: 1,
            replication: 3,
            ..small()
        };
        let generated = WorkloadGenerator::new(config)
            .generate(&mut StdRng::seed_from_u64(0))
            .unwrap();
        let w = &generated.workload;
        assert!(w.tasks().iter().all(|t| w.is_local(ServerId(0), *t)));
    }

    #[test]
    fn affinity_is_symmetric_and_bounded() {
        let generated = WorkloadGenerator::new(small())
            .generate(&mut StdRng::seed_from_u64(9))
            .unwrap();
        let m = &generated.affinity;
        for a in 0..12 {
            assert_eq!(m.get(TaskId(a), TaskId(a)), 0);
            for b in 0..12 {
                assert_eq!(m.get(TaskId(a), TaskId(b)), m.get(TaskId(b), TaskId(a)));
                assert!(m.get(TaskId(a), TaskId(b)) <= 9);
            }
        }
    }

    #[test]
    fn same_seed_same_workload() {
        let generator = WorkloadGenerator::new(small());
        let a = generator.generate(&mut StdRng::seed_from_u64(5)).unwrap();
        let b = generator.generate(&mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a.workload, b.workload);
        assert_eq!(a.affinity, b.affinity);
    }

    #[test]
    fn rejects_empty_slot_range() {
        let config = WorkloadConfig {
            min_slot: 0,
            ..small()
        };
        let err = WorkloadGenerator::new(config)
            .generate(&mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Config(_)));
    }
}
