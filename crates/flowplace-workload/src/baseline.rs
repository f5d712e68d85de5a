//! Random placement baseline.
//!
//! Ignores locality and affinity entirely: every task goes to a uniformly
//! chosen server with a spare slot. Used to put the flow strategies'
//! metrics in perspective.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use flowplace_core::{KernelPin, ScheduleError, ScheduleOutcome, ScheduleResult, Server, TaskId, Workload};

pub const RANDOM_STRATEGY: &str = "random";

pub struct RandomPlacement;

impl RandomPlacement {
    pub fn assign<R: Rng + ?Sized>(workload: &Workload, rng: &mut R) -> ScheduleResult<ScheduleOutcome> {
        Self::assign_with_pinned(workload, &[], rng)
    }

    /// Place `pinned` first, then every other task at random.
    pub fn assign_with_pinned<R: Rng + ?Sized>(
        workload: &Workload,
        pinned: &[KernelPin],
        rng: &mut R,
    ) -> ScheduleResult<ScheduleOutcome> {
        let mut servers: Vec<Server> = workload
            .servers()
            .iter()
            .map(|s| Server::new(s.id, s.slot).with_load(s.load))
            .collect();
        let mut placed: BTreeSet<TaskId> = BTreeSet::new();

        for pin in pinned {
            if !workload.tasks().contains(&pin.task) || !placed.insert(pin.task) {
                return Err(ScheduleError::InvalidWorkload(format!(
                    "cannot pin {} on {}",
                    pin.task, pin.server
                )));
            }
            let server = servers
                .iter_mut()
                .find(|s| s.id == pin.server && s.spare() > 0)
                .ok_or_else(|| {
                    ScheduleError::InvalidWorkload(format!("no room to pin {} on {}", pin.task, pin.server))
                })?;
            server.tasks.insert(pin.task);
        }

        let mut pending: Vec<TaskId> = workload
            .tasks()
            .iter()
            .copied()
            .filter(|t| !placed.contains(t))
            .collect();
        pending.shuffle(rng);

        let mut unplaced = Vec::new();
        for task in pending {
            let open: Vec<usize> = (0..servers.len()).filter(|i| servers[*i].spare() > 0).collect();
            match open.choose(rng) {
                Some(i) => {
                    servers[*i].tasks.insert(task);
                }
                None => unplaced.push(task),
            }
        }
        unplaced.sort();

        Ok(ScheduleOutcome {
            strategy: RANDOM_STRATEGY.to_string(),
            servers,
            fallback: Vec::new(),
            unplaced,
            kernels: pinned.to_vec(),
        })
    }
}
