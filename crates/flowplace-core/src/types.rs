//! Domain types: node identities, servers and the workload bundle.
//!
//! A [`Workload`] is the validated input of every scheduler: an ordered
//! server list, an ordered task list and the replica layout (which servers
//! hold a data replica for which tasks). The residual graph is derived from
//! it, so replica edges and preferred-task sets always agree.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};

// ── Identities ─────────────────────────────────────────────────────

/// Identifier of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(pub u32);

/// Identifier of a task. Also the row/column index into an affinity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u32);

impl TaskId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A node of the flow network.
///
/// Ordering is servers first, then tasks, then the sink; the residual graph
/// iterates neighbours in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Server(ServerId),
    Task(TaskId),
    Sink,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Server(id) => id.fmt(f),
            NodeId::Task(id) => id.fmt(f),
            NodeId::Sink => f.write_str("T"),
        }
    }
}

impl From<ServerId> for NodeId {
    fn from(id: ServerId) -> Self {
        NodeId::Server(id)
    }
}

impl From<TaskId> for NodeId {
    fn from(id: TaskId) -> Self {
        NodeId::Task(id)
    }
}

// ── Server ─────────────────────────────────────────────────────────

/// A capacity-bounded server.
///
/// Used both as scheduler input (`tasks` ignored) and as output, where
/// `tasks` holds the final assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    /// Maximum number of concurrently assigned tasks.
    pub slot: u32,
    /// Committed task count. Only the load-balancing strategy updates it.
    pub load: u32,
    pub tasks: BTreeSet<TaskId>,
}

impl Server {
    pub fn new(id: ServerId, slot: u32) -> Self {
        Self {
            id,
            slot,
            load: 0,
            tasks: BTreeSet::new(),
        }
    }

    pub fn with_load(mut self, load: u32) -> Self {
        self.load = load;
        self
    }

    /// Slots not yet taken by assigned tasks.
    pub fn spare(&self) -> u32 {
        self.slot.saturating_sub(self.tasks.len() as u32)
    }
}

// ── Workload ───────────────────────────────────────────────────────

/// Validated scheduler input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    servers: Vec<Server>,
    tasks: Vec<TaskId>,
    replicas: BTreeMap<ServerId, BTreeSet<TaskId>>,
}

impl Workload {
    /// Create a workload with no replicas yet.
    ///
    /// Rejects duplicate ids and zero-slot servers.
    pub fn new(servers: Vec<Server>, tasks: Vec<TaskId>) -> ScheduleResult<Self> {
        let mut seen = BTreeSet::new();
        for server in &servers {
            if !seen.insert(server.id) {
                return Err(ScheduleError::InvalidWorkload(format!(
                    "duplicate server {}",
                    server.id
                )));
            }
            if server.slot == 0 {
                return Err(ScheduleError::InvalidWorkload(format!(
                    "server {} has no slots",
                    server.id
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for task in &tasks {
            if !seen.insert(*task) {
                return Err(ScheduleError::InvalidWorkload(format!("duplicate task {task}")));
            }
        }

        let replicas = servers.iter().map(|s| (s.id, BTreeSet::new())).collect();
        Ok(Self {
            servers,
            tasks,
            replicas,
        })
    }

    /// Record that `server` holds a data replica for `task`.
    pub fn add_replica(&mut self, server: ServerId, task: TaskId) -> ScheduleResult<()> {
        if !self.tasks.contains(&task) {
            return Err(ScheduleError::InvalidWorkload(format!(
                "replica of unknown task {task} on {server}"
            )));
        }
        match self.replicas.get_mut(&server) {
            Some(set) => {
                set.insert(task);
                Ok(())
            }
            None => Err(ScheduleError::InvalidWorkload(format!(
                "replica of {task} on unknown server {server}"
            ))),
        }
    }

    /// Builder form of [`add_replica`](Self::add_replica).
    pub fn with_replicas(
        mut self,
        replicas: impl IntoIterator<Item = (ServerId, TaskId)>,
    ) -> ScheduleResult<Self> {
        for (server, task) in replicas {
            self.add_replica(server, task)?;
        }
        Ok(self)
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    /// Tasks for which `server` holds a replica.
    pub fn preferred(&self, server: ServerId) -> Option<&BTreeSet<TaskId>> {
        self.replicas.get(&server)
    }

    /// Full server → preferred-task mapping.
    pub fn replicas(&self) -> &BTreeMap<ServerId, BTreeSet<TaskId>> {
        &self.replicas
    }

    pub fn is_local(&self, server: ServerId, task: TaskId) -> bool {
        self.replicas
            .get(&server)
            .is_some_and(|set| set.contains(&task))
    }

    pub fn total_slots(&self) -> u64 {
        self.servers.iter().map(|s| u64::from(s.slot)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(slots: &[u32]) -> Vec<Server> {
        slots
            .iter()
            .enumerate()
            .map(|(i, &slot)| Server::new(ServerId(i as u32), slot))
            .collect()
    }

    #[test]
    fn node_ids_display_with_prefixes() {
        assert_eq!(NodeId::Server(ServerId(1)).to_string(), "s1");
        assert_eq!(NodeId::Task(TaskId(3)).to_string(), "t3");
        assert_eq!(NodeId::Sink.to_string(), "T");
    }

    #[test]
    fn node_order_is_servers_tasks_sink() {
        let mut nodes = vec![
            NodeId::Sink,
            NodeId::Task(TaskId(0)),
            NodeId::Server(ServerId(9)),
            NodeId::Server(ServerId(2)),
        ];
        nodes.sort();
        assert_eq!(
            nodes,
            vec![
                NodeId::Server(ServerId(2)),
                NodeId::Server(ServerId(9)),
                NodeId::Task(TaskId(0)),
                NodeId::Sink,
            ]
        );
    }

    #[test]
    fn rejects_duplicate_server() {
        let mut list = servers(&[1, 1]);
        list[1].id = ServerId(0);
        let err = Workload::new(list, vec![]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidWorkload(_)));
    }

    #[test]
    fn rejects_zero_slot() {
        let err = Workload::new(servers(&[2, 0]), vec![]).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::InvalidWorkload("server s1 has no slots".to_string())
        );
    }

    #[test]
    fn rejects_duplicate_task() {
        let err = Workload::new(servers(&[1]), vec![TaskId(1), TaskId(1)]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidWorkload(_)));
    }

    #[test]
    fn replica_must_reference_known_ids() {
        let mut w = Workload::new(servers(&[1]), vec![TaskId(0)]).unwrap();
        assert!(w.add_replica(ServerId(5), TaskId(0)).is_err());
        assert!(w.add_replica(ServerId(0), TaskId(5)).is_err());
        assert!(w.add_replica(ServerId(0), TaskId(0)).is_ok());
        assert!(w.is_local(ServerId(0), TaskId(0)));
    }

    #[test]
    fn totals_and_spare() {
        let w = Workload::new(servers(&[2, 3]), vec![]).unwrap();
        assert_eq!(w.total_slots(), 5);

        let mut s = Server::new(ServerId(0), 2);
        s.tasks.insert(TaskId(0));
        assert_eq!(s.spare(), 1);
    }
}
