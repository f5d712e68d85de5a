//! Per-run scheduling state.
//!
//! A [`Session`] owns the residual graph and the assignment tables of one
//! scheduling run. Strategies drive it by applying augmenting paths and
//! observe each task move through a callback, so the graph and the tables
//! can only change together.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::config::TieBreak;
use crate::error::{ScheduleError, ScheduleResult};
use crate::graph::{Edge, ResidualGraph};
use crate::outcome::{KernelPin, ScheduleOutcome};
use crate::path::AugmentingPath;
use crate::types::{NodeId, Server, ServerId, TaskId, Workload};

/// One task changing hands while a path is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Move {
    pub task: TaskId,
    /// Previous holder when the task is rerouted.
    pub from: Option<ServerId>,
    pub to: ServerId,
}

pub(crate) struct Session {
    graph: ResidualGraph,
    order: Vec<ServerId>,
    /// Effective slots (a pinned kernel occupies one).
    slots: BTreeMap<ServerId, u32>,
    holders: BTreeMap<TaskId, ServerId>,
    assigned: BTreeMap<ServerId, BTreeSet<TaskId>>,
    pinned: BTreeMap<ServerId, TaskId>,
    unassigned: BTreeSet<TaskId>,
    fallback: Vec<TaskId>,
}

impl Session {
    pub fn new(workload: &Workload) -> ScheduleResult<Self> {
        let graph = ResidualGraph::from_workload(workload)?;
        let order: Vec<ServerId> = workload.servers().iter().map(|s| s.id).collect();
        Ok(Self {
            graph,
            slots: workload.servers().iter().map(|s| (s.id, s.slot)).collect(),
            assigned: order.iter().map(|s| (*s, BTreeSet::new())).collect(),
            order,
            holders: BTreeMap::new(),
            pinned: BTreeMap::new(),
            unassigned: workload.tasks().iter().copied().collect(),
            fallback: Vec::new(),
        })
    }

    pub fn graph(&self) -> &ResidualGraph {
        &self.graph
    }

    /// Servers in workload order.
    pub fn servers(&self) -> &[ServerId] {
        &self.order
    }

    pub fn slot(&self, server: ServerId) -> u32 {
        self.slots.get(&server).copied().unwrap_or(0)
    }

    pub fn slots(&self) -> &BTreeMap<ServerId, u32> {
        &self.slots
    }

    pub fn assigned(&self, server: ServerId) -> Option<&BTreeSet<TaskId>> {
        self.assigned.get(&server)
    }

    pub fn spare(&self, server: ServerId) -> u32 {
        let used = self.assigned.get(&server).map_or(0, |set| set.len() as u32);
        self.slot(server).saturating_sub(used)
    }

    pub fn holder(&self, task: TaskId) -> Option<ServerId> {
        self.holders.get(&task).copied()
    }

    pub fn pinned(&self, server: ServerId) -> Option<TaskId> {
        self.pinned.get(&server).copied()
    }

    pub fn unassigned(&self) -> &BTreeSet<TaskId> {
        &self.unassigned
    }

    /// Whether every arc of the path is still present as enumerated.
    pub fn is_current(&self, path: &AugmentingPath) -> bool {
        path.edges().iter().all(|e| self.graph.contains(e))
    }

    /// Commit an augmenting path: move each offered task to its new server
    /// and reverse every arc.
    ///
    /// A rerouted task must still flow into its previous holder; anything
    /// else means the graph and the tables have diverged.
    pub fn apply_path(
        &mut self,
        path: &AugmentingPath,
        mut on_move: impl FnMut(Move),
    ) -> ScheduleResult<()> {
        if !self.is_current(path) {
            return Err(ScheduleError::GraphInconsistency(format!(
                "path from {:?} no longer matches the graph",
                path.origin()
            )));
        }
        for edge in path.edges() {
            if let Some((server, task)) = edge.placement() {
                let from = self.holders.get(&task).copied();
                if let Some(prev) = from {
                    let back = Edge::new(task, prev);
                    if !self.graph.contains(&back) {
                        return Err(ScheduleError::GraphInconsistency(format!(
                            "{task} is held by {prev} but {back} is missing"
                        )));
                    }
                    if let Some(set) = self.assigned.get_mut(&prev) {
                        set.remove(&task);
                    }
                }
                self.holders.insert(task, server);
                self.assigned.entry(server).or_default().insert(task);
                self.unassigned.remove(&task);
                on_move(Move { task, from, to: server });
            }
            self.graph.reverse(edge)?;
        }
        Ok(())
    }

    /// Place an unassigned task outside the flow (fallback pass). The task's
    /// sink arc is flipped so it reads as assigned.
    pub fn place_direct(&mut self, task: TaskId, server: ServerId) -> ScheduleResult<()> {
        if !self.unassigned.contains(&task) {
            return Err(ScheduleError::GraphInconsistency(format!(
                "{task} is not waiting for placement"
            )));
        }
        if self.spare(server) == 0 {
            return Err(ScheduleError::GraphInconsistency(format!(
                "{server} has no spare slot for {task}"
            )));
        }
        self.graph.reverse(&Edge::to_sink(task))?;
        self.holders.insert(task, server);
        self.assigned.entry(server).or_default().insert(task);
        self.unassigned.remove(&task);
        self.fallback.push(task);
        Ok(())
    }

    /// Pin a kernel task on a server: the task leaves the graph and the
    /// unassigned set, and permanently takes one of the server's slots.
    pub fn pin(&mut self, server: ServerId, task: TaskId) -> ScheduleResult<()> {
        if self.pinned.contains_key(&server) {
            return Err(ScheduleError::GraphInconsistency(format!(
                "{server} already has a kernel"
            )));
        }
        let slot = self.slots.get_mut(&server).ok_or_else(|| {
            ScheduleError::GraphInconsistency(format!("cannot pin {task} on unknown {server}"))
        })?;
        *slot = slot.saturating_sub(1);
        self.graph.detach(NodeId::Task(task));
        self.unassigned.remove(&task);
        self.pinned.insert(server, task);
        Ok(())
    }

    /// Re-check the run's invariants: slot bounds, a single holder per
    /// task, and sink arcs agreeing with the assignment table.
    pub fn verify(&self) -> ScheduleResult<()> {
        for server in &self.order {
            let count = self.assigned.get(server).map_or(0, BTreeSet::len) as u32;
            if count > self.slot(*server) {
                return Err(ScheduleError::GraphInconsistency(format!(
                    "{server} holds {count} tasks with {} slots",
                    self.slot(*server)
                )));
            }
        }
        for (task, server) in &self.holders {
            let listed = self.assigned.get(server).is_some_and(|set| set.contains(task));
            if !listed || self.unassigned.contains(task) {
                return Err(ScheduleError::GraphInconsistency(format!(
                    "{task} holder table disagrees with {server}"
                )));
            }
            if self.graph.reaches_sink(*task) {
                return Err(ScheduleError::GraphInconsistency(format!(
                    "{task} is assigned but still flows to the sink"
                )));
            }
        }
        for task in &self.unassigned {
            if !self.graph.reaches_sink(*task) {
                return Err(ScheduleError::GraphInconsistency(format!(
                    "{task} is unassigned but its sink arc is consumed"
                )));
            }
        }
        Ok(())
    }

    /// Write the final assignment back onto the workload's server list.
    pub fn into_outcome(
        self,
        workload: &Workload,
        strategy: &str,
        loads: Option<&BTreeMap<ServerId, u32>>,
    ) -> ScheduleOutcome {
        let servers = workload
            .servers()
            .iter()
            .map(|input| {
                let mut tasks = self.assigned.get(&input.id).cloned().unwrap_or_default();
                if let Some(kernel) = self.pinned.get(&input.id) {
                    tasks.insert(*kernel);
                }
                Server {
                    id: input.id,
                    slot: input.slot,
                    load: loads
                        .and_then(|l| l.get(&input.id).copied())
                        .unwrap_or(input.load),
                    tasks,
                }
            })
            .collect();

        ScheduleOutcome {
            strategy: strategy.to_string(),
            servers,
            fallback: self.fallback,
            unplaced: self.unassigned.into_iter().collect(),
            kernels: self
                .pinned
                .into_iter()
                .map(|(server, task)| KernelPin { server, task })
                .collect(),
        }
    }
}

/// Choose the server with the greatest key, resolving ties per `tie`.
pub(crate) fn pick_best<K, R>(
    candidates: impl IntoIterator<Item = (ServerId, K)>,
    tie: TieBreak,
    rng: &mut R,
) -> Option<(ServerId, K)>
where
    K: Ord + Copy,
    R: Rng + ?Sized,
{
    let mut best: Option<K> = None;
    let mut tied: Vec<ServerId> = Vec::new();
    for (server, key) in candidates {
        match best {
            Some(b) if key < b => {}
            Some(b) if key == b => tied.push(server),
            _ => {
                best = Some(key);
                tied.clear();
                tied.push(server);
            }
        }
    }

    let key = best?;
    let server = match tie {
        TieBreak::InputOrder => tied.first().copied()?,
        TieBreak::Random => tied.choose(rng).copied()?,
    };
    Some((server, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::find_path;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn workload() -> Workload {
        Workload::new(
            vec![Server::new(ServerId(1), 2), Server::new(ServerId(2), 1)],
            vec![TaskId(1), TaskId(2), TaskId(3)],
        )
        .unwrap()
        .with_replicas([
            (ServerId(1), TaskId(1)),
            (ServerId(2), TaskId(1)),
            (ServerId(1), TaskId(2)),
        ])
        .unwrap()
    }

    #[test]
    fn apply_path_records_moves_and_reverses_arcs() {
        let w = workload();
        let mut session = Session::new(&w).unwrap();

        let path = find_path(session.graph(), ServerId(1)).unwrap();
        let mut moves = Vec::new();
        session.apply_path(&path, |mv| moves.push(mv)).unwrap();

        assert_eq!(
            moves,
            vec![Move { task: TaskId(1), from: None, to: ServerId(1) }]
        );
        assert_eq!(session.holder(TaskId(1)), Some(ServerId(1)));
        assert_eq!(session.graph().holder(TaskId(1)), Some(ServerId(1)));
        assert!(!session.unassigned().contains(&TaskId(1)));
        assert_eq!(session.spare(ServerId(1)), 1);
        session.verify().unwrap();
    }

    #[test]
    fn reroute_reports_previous_holder() {
        let w = workload();
        let mut session = Session::new(&w).unwrap();
        let first = find_path(session.graph(), ServerId(1)).unwrap();
        session.apply_path(&first, |_| {}).unwrap();

        let path = find_path(session.graph(), ServerId(2)).unwrap();
        let mut moves = Vec::new();
        session.apply_path(&path, |mv| moves.push(mv)).unwrap();

        assert_eq!(
            moves,
            vec![
                Move { task: TaskId(1), from: Some(ServerId(1)), to: ServerId(2) },
                Move { task: TaskId(2), from: None, to: ServerId(1) },
            ]
        );
        assert_eq!(session.holder(TaskId(1)), Some(ServerId(2)));
        assert_eq!(session.holder(TaskId(2)), Some(ServerId(1)));
        session.verify().unwrap();
    }

    #[test]
    fn stale_path_is_rejected() {
        let w = workload();
        let mut session = Session::new(&w).unwrap();
        let path = find_path(session.graph(), ServerId(1)).unwrap();
        assert!(session.is_current(&path));
        session.apply_path(&path, |_| {}).unwrap();
        assert!(!session.is_current(&path));
        assert!(matches!(
            session.apply_path(&path, |_| {}),
            Err(ScheduleError::GraphInconsistency(_))
        ));
    }

    #[test]
    fn place_direct_flips_sink_arc() {
        let w = workload();
        let mut session = Session::new(&w).unwrap();
        session.place_direct(TaskId(3), ServerId(2)).unwrap();

        assert!(!session.graph().reaches_sink(TaskId(3)));
        assert_eq!(session.spare(ServerId(2)), 0);
        assert!(session.place_direct(TaskId(3), ServerId(1)).is_err());
        assert!(session.place_direct(TaskId(2), ServerId(2)).is_err());
        session.verify().unwrap();

        let outcome = session.into_outcome(&w, "locality", None);
        assert_eq!(outcome.fallback, vec![TaskId(3)]);
    }

    #[test]
    fn pin_takes_a_slot_and_leaves_the_graph() {
        let w = workload();
        let mut session = Session::new(&w).unwrap();
        session.pin(ServerId(1), TaskId(1)).unwrap();

        assert_eq!(session.slot(ServerId(1)), 1);
        assert!(!session.unassigned().contains(&TaskId(1)));
        assert!(session.graph().outgoing(NodeId::Server(ServerId(2))).is_empty());
        assert!(session.pin(ServerId(1), TaskId(2)).is_err());

        let outcome = session.into_outcome(&w, "affinity", None);
        assert!(outcome.servers[0].tasks.contains(&TaskId(1)));
        assert_eq!(outcome.servers[0].slot, 2);
        assert_eq!(outcome.kernels, vec![KernelPin { server: ServerId(1), task: TaskId(1) }]);
    }

    #[test]
    fn pick_best_input_order_takes_first_max() {
        let mut rng = StdRng::seed_from_u64(0);
        let picked = pick_best(
            [(ServerId(1), 2), (ServerId(2), 3), (ServerId(3), 3)],
            TieBreak::InputOrder,
            &mut rng,
        );
        assert_eq!(picked, Some((ServerId(2), 3)));
        let none: Option<(ServerId, u32)> = pick_best([], TieBreak::InputOrder, &mut rng);
        assert_eq!(none, None);
    }

    #[test]
    fn pick_best_random_stays_among_ties() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let (server, key) = pick_best(
                [(ServerId(1), 1), (ServerId(2), 5), (ServerId(3), 5)],
                TieBreak::Random,
                &mut rng,
            )
            .unwrap();
            assert_eq!(key, 5);
            assert!(server == ServerId(2) || server == ServerId(3));
        }
    }
}
