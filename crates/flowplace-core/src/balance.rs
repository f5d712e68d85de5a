//! Load-balancing scheduler.
//!
//! Every augmentation starts from the least-loaded server that still has
//! room, so load drifts toward idle servers while every placement stays
//! local. A task pulled off a server by a reroute gives that server its
//! load back. There is no fallback pass; tasks no local path can reach are
//! reported as shortfall.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{SchedulerConfig, Strategy};
use crate::error::ScheduleResult;
use crate::outcome::ScheduleOutcome;
use crate::path::find_path;
use crate::session::{Move, Session, pick_best};
use crate::types::{ServerId, Workload};

#[derive(Debug, Clone, Default)]
pub struct LoadBalanceScheduler {
    config: SchedulerConfig,
}

/// Committed load per server, seeded from the input loads.
struct LoadTable {
    load: BTreeMap<ServerId, u32>,
    slot: BTreeMap<ServerId, u32>,
}

impl LoadTable {
    fn new(workload: &Workload) -> Self {
        Self {
            load: workload.servers().iter().map(|s| (s.id, s.load)).collect(),
            slot: workload.servers().iter().map(|s| (s.id, s.slot)).collect(),
        }
    }

    fn get(&self, server: ServerId) -> u32 {
        self.load.get(&server).copied().unwrap_or(0)
    }

    fn is_saturated(&self, server: ServerId) -> bool {
        self.get(server) >= self.slot.get(&server).copied().unwrap_or(0)
    }

    fn record(&mut self, mv: &Move) {
        if let Some(prev) = mv.from {
            if let Some(load) = self.load.get_mut(&prev) {
                *load = load.saturating_sub(1);
            }
        }
        *self.load.entry(mv.to).or_insert(0) += 1;
    }
}

impl LoadBalanceScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn schedule<R: Rng + ?Sized>(
        &self,
        workload: &Workload,
        rng: &mut R,
    ) -> ScheduleResult<ScheduleOutcome> {
        let mut session = Session::new(workload)?;
        let mut loads = LoadTable::new(workload);
        let mut exhausted: BTreeSet<ServerId> = BTreeSet::new();
        let mut augmentations = 0usize;

        while !session.unassigned().is_empty() {
            let candidates: Vec<_> = session
                .servers()
                .iter()
                .filter(|s| !exhausted.contains(*s))
                .filter(|s| !loads.is_saturated(**s) && session.spare(**s) > 0)
                .map(|s| (*s, Reverse(loads.get(*s))))
                .collect();
            let Some((origin, Reverse(load))) =
                pick_best(candidates, self.config.tie_break, rng)
            else {
                debug!("no unsaturated server left");
                break;
            };

            match find_path(session.graph(), origin) {
                Some(path) => {
                    debug!(server = %origin, load, length = path.len(), "applying augmenting path");
                    session.apply_path(&path, |mv| {
                        if let Some(prev) = mv.from {
                            debug!(task = %mv.task, from = %prev, to = %mv.to, "withdrew task");
                        }
                        loads.record(&mv);
                    })?;
                    augmentations += 1;
                }
                None => {
                    debug!(server = %origin, load, "no augmenting path");
                    exhausted.insert(origin);
                }
            }
        }

        session.verify()?;
        let outcome = session.into_outcome(
            workload,
            Strategy::LoadBalance.label(),
            Some(&loads.load),
        );
        info!(
            strategy = Strategy::LoadBalance.label(),
            placed = outcome.placed_count(),
            augmentations,
            "schedule complete"
        );
        if !outcome.unplaced.is_empty() {
            warn!(
                unplaced = outcome.unplaced.len(),
                "could not place all tasks on a local server"
            );
        }
        Ok(outcome)
    }
}
