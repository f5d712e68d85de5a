//! Affinity-weighted scheduler.
//!
//! Runs in three steps:
//!
//! 1. **Seeding.** A locality run places every task once; each server that
//!    received anything keeps one of its tasks, drawn at random, as a
//!    permanent kernel. Everything else is released.
//! 2. **Saturation.** On a fresh graph without kernel arcs, the
//!    highest-ability server enumerates all its augmenting paths per round
//!    and commits them best-first, where a path is worth the affinity of
//!    each task it places to the receiving server's kernel. A path that
//!    takes tasks away from other servers only commits when it is worth
//!    strictly more than the affinity those servers lose.
//! 3. **Fallback.** Tasks still waiting go to the server with spare room
//!    whose kernel (or a random proxy among its tasks) likes them most.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, trace, warn};

use crate::ability::AbilityTable;
use crate::config::{SchedulerConfig, Strategy};
use crate::error::ScheduleResult;
use crate::locality::LocalityScheduler;
use crate::matrix::AffinityMatrix;
use crate::outcome::ScheduleOutcome;
use crate::path::{AugmentingPath, find_all_paths};
use crate::session::{Move, Session};
use crate::types::{ServerId, TaskId, Workload};

/// Value of a two-arc path onto a server with no anchor yet.
const LOCALITY_VALUE: u64 = 1;

#[derive(Debug, Clone, Default)]
pub struct AffinityScheduler {
    config: SchedulerConfig,
}

/// Scoring reference per server: the pinned kernel, or for kernel-less
/// servers the first task committed to them in this run.
#[derive(Debug, Clone, Default)]
struct Anchors {
    pinned: BTreeMap<ServerId, TaskId>,
    adhoc: BTreeMap<ServerId, TaskId>,
}

impl Anchors {
    fn new(pinned: BTreeMap<ServerId, TaskId>) -> Self {
        Self {
            pinned,
            adhoc: BTreeMap::new(),
        }
    }

    fn get(&self, server: ServerId) -> Option<TaskId> {
        self.pinned
            .get(&server)
            .or_else(|| self.adhoc.get(&server))
            .copied()
    }

    fn record(&mut self, mv: &Move) {
        if let Some(prev) = mv.from {
            if self.adhoc.get(&prev) == Some(&mv.task) {
                self.adhoc.remove(&prev);
            }
        }
        if self.get(mv.to).is_none() {
            self.adhoc.insert(mv.to, mv.task);
        }
    }
}

#[derive(Debug, Default)]
struct RoundStats {
    rounds: usize,
    committed: usize,
    stale: usize,
    rejected: usize,
}

impl AffinityScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn schedule<R: Rng + ?Sized>(
        &self,
        workload: &Workload,
        matrix: &AffinityMatrix,
        rng: &mut R,
    ) -> ScheduleResult<ScheduleOutcome> {
        matrix.ensure_covers(workload.tasks())?;

        let seeded = LocalityScheduler::new(self.config.clone()).schedule(workload, rng)?;
        let kernels = choose_kernels(&seeded, rng);
        debug!(kernels = kernels.len(), "seeded kernels");

        let mut session = Session::new(workload)?;
        for (server, task) in &kernels {
            session.pin(*server, *task)?;
        }

        let kernel_tasks: BTreeSet<TaskId> = kernels.values().copied().collect();
        let preferred = workload
            .replicas()
            .iter()
            .map(|(server, tasks)| (*server, tasks.difference(&kernel_tasks).copied().collect()))
            .collect();
        let mut abilities = AbilityTable::new(preferred, session.slots());
        let mut anchors = Anchors::new(kernels);

        let stats = self.saturate(&mut session, &mut abilities, &mut anchors, matrix, rng)?;
        let fallback = fill_by_affinity(&mut session, matrix, rng)?;
        session.verify()?;

        let outcome = session.into_outcome(workload, Strategy::Affinity.label(), None);
        info!(
            strategy = Strategy::Affinity.label(),
            placed = outcome.placed_count(),
            rounds = stats.rounds,
            committed = stats.committed,
            stale = stats.stale,
            rejected = stats.rejected,
            fallback,
            "schedule complete"
        );
        if !outcome.unplaced.is_empty() {
            warn!(
                unplaced = outcome.unplaced.len(),
                "could not place all tasks, no server with spare room and a kernel"
            );
        }
        Ok(outcome)
    }

    fn saturate<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        abilities: &mut AbilityTable,
        anchors: &mut Anchors,
        matrix: &AffinityMatrix,
        rng: &mut R,
    ) -> ScheduleResult<RoundStats> {
        let none = BTreeSet::new();
        let tie = self.config.tie_break;
        let mut stats = RoundStats::default();
        let mut previous: Option<ServerId> = None;

        while !session.unassigned().is_empty() {
            let mut pick = abilities.select_max(session.servers(), &none, tie, rng);
            if let Some((server, ability)) = pick {
                if Some(server) == previous && ability > 0 {
                    // Same server twice in a row: hand the turn to the next
                    // best. If nobody else has ability left, the loop ends.
                    abilities.set(server, 0);
                    pick = abilities.select_max(session.servers(), &none, tie, rng);
                    abilities.set(server, ability);
                }
            }
            let Some((origin, ability)) = pick.filter(|(_, a)| *a > 0) else {
                break;
            };
            previous = Some(origin);
            stats.rounds += 1;

            let mut candidates: Vec<(u64, AugmentingPath)> =
                find_all_paths(session.graph(), origin, self.config.max_candidate_paths)
                    .into_iter()
                    .map(|path| (path_value(&path, anchors, matrix), path))
                    .collect();
            candidates.sort_by(|a, b| b.0.cmp(&a.0));
            debug!(
                server = %origin,
                ability,
                remaining = abilities.total(),
                candidates = candidates.len(),
                "affinity round"
            );

            let mut committed = 0;
            for (_, path) in &candidates {
                if session.spare(origin) == 0 {
                    break;
                }
                if !session.is_current(path) {
                    trace!(server = %origin, "discarding stale candidate");
                    stats.stale += 1;
                    continue;
                }

                let lost = displaced_value(path, session, anchors, matrix);
                if let Some(lost) = lost {
                    let value = path_value(path, anchors, matrix);
                    if value <= lost {
                        trace!(server = %origin, value, lost, "keeping existing placement");
                        stats.rejected += 1;
                        continue;
                    }
                    debug!(server = %origin, value, lost, "displacing placed tasks");
                }

                session.apply_path(path, |mv| {
                    abilities.record(&mv);
                    anchors.record(&mv);
                })?;
                committed += 1;
            }

            stats.committed += committed;
            if committed == 0 {
                abilities.set(origin, 0);
            }
        }

        Ok(stats)
    }
}

/// One kernel per server that received tasks in `seeded`, drawn uniformly
/// from its tasks.
fn choose_kernels<R: Rng + ?Sized>(
    seeded: &ScheduleOutcome,
    rng: &mut R,
) -> BTreeMap<ServerId, TaskId> {
    let mut kernels = BTreeMap::new();
    for server in &seeded.servers {
        let tasks: Vec<TaskId> = server.tasks.iter().copied().collect();
        if let Some(task) = tasks.choose(rng) {
            kernels.insert(server.id, *task);
        }
    }
    kernels
}

/// Affinity a path adds: each placed task against its new server's anchor.
fn path_value(path: &AugmentingPath, anchors: &Anchors, matrix: &AffinityMatrix) -> u64 {
    if path.len() == 2 {
        if let Some((server, _)) = path.placements().next() {
            if anchors.get(server).is_none() {
                return LOCALITY_VALUE;
            }
        }
    }
    path.placements()
        .map(|(server, task)| {
            anchors
                .get(server)
                .map_or(0, |anchor| u64::from(matrix.get(anchor, task)))
        })
        .sum()
}

/// Affinity lost by taking the path's already-placed tasks off their
/// current servers, or `None` when the path only places waiting tasks.
fn displaced_value(
    path: &AugmentingPath,
    session: &Session,
    anchors: &Anchors,
    matrix: &AffinityMatrix,
) -> Option<u64> {
    let mut displaced = false;
    let mut lost = 0;
    for (_, task) in path.placements() {
        if let Some(holder) = session.holder(task) {
            displaced = true;
            lost += anchors
                .get(holder)
                .map_or(0, |anchor| u64::from(matrix.get(anchor, task)));
        }
    }
    displaced.then_some(lost)
}

/// Place each waiting task on the eligible server with the highest
/// affinity to it. Returns how many were placed.
fn fill_by_affinity<R: Rng + ?Sized>(
    session: &mut Session,
    matrix: &AffinityMatrix,
    rng: &mut R,
) -> ScheduleResult<usize> {
    let pending: Vec<TaskId> = session.unassigned().iter().copied().collect();
    let mut placed = 0;

    for task in pending {
        let mut best: Option<(ServerId, u32)> = None;
        for server in session.servers().to_vec() {
            if session.spare(server) == 0 {
                continue;
            }
            let reference = match session.pinned(server) {
                Some(kernel) => Some(kernel),
                None => session.assigned(server).and_then(|tasks| {
                    let tasks: Vec<TaskId> = tasks.iter().copied().collect();
                    tasks.choose(rng).copied()
                }),
            };
            let Some(reference) = reference else {
                continue;
            };
            let value = matrix.get(reference, task);
            if best.is_none_or(|(_, v)| value > v) {
                best = Some((server, value));
            }
        }

        match best {
            Some((server, value)) => {
                session.place_direct(task, server)?;
                placed += 1;
                debug!(task = %task, server = %server, value, "fallback placement");
            }
            None => trace!(task = %task, "no eligible server"),
        }
    }

    Ok(placed)
}
