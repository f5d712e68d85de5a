//! Residual flow graph.
//!
//! Servers, tasks and a single sink connected by unit-capacity arcs. Each
//! unordered endpoint pair holds at most one arc; consuming its capacity
//! flips the orientation in place (`s→t` becomes `t→s`, `t→T` becomes
//! `T→t`). The absence of an arc in a direction means no residual capacity
//! in that direction.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::{ScheduleError, ScheduleResult};
use crate::types::{NodeId, ServerId, TaskId, Workload};

/// A directed unit-capacity arc. Equality is exact endpoint equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn to_sink(task: TaskId) -> Self {
        Self {
            from: NodeId::Task(task),
            to: NodeId::Sink,
        }
    }

    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }

    /// Orientation-independent slot of this arc.
    fn slot(self) -> (NodeId, NodeId) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }

    /// `(server, task)` when this arc offers a task to a server.
    pub fn placement(self) -> Option<(ServerId, TaskId)> {
        match (self.from, self.to) {
            (NodeId::Server(s), NodeId::Task(t)) => Some((s, t)),
            _ => None,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// The residual graph of one scheduling run.
#[derive(Debug, Clone, Default)]
pub struct ResidualGraph {
    arcs: HashMap<(NodeId, NodeId), Edge>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl ResidualGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial graph: one `server→task` arc per replica and one
    /// `task→sink` arc per task.
    pub fn from_workload(workload: &Workload) -> ScheduleResult<Self> {
        let mut graph = Self::new();
        for (server, tasks) in workload.replicas() {
            for task in tasks {
                graph.insert(Edge::new(*server, *task))?;
            }
        }
        for task in workload.tasks() {
            graph.insert(Edge::to_sink(*task))?;
        }
        Ok(graph)
    }

    /// Add an arc. A second arc on the same endpoint pair, in either
    /// direction, is rejected.
    pub fn insert(&mut self, edge: Edge) -> ScheduleResult<()> {
        let slot = edge.slot();
        if let Some(existing) = self.arcs.get(&slot) {
            return Err(ScheduleError::GraphInconsistency(format!(
                "cannot add {edge}: pair already holds {existing}"
            )));
        }
        self.arcs.insert(slot, edge);
        self.adjacency.entry(edge.from).or_default().insert(edge.to);
        self.adjacency.entry(edge.to).or_default().insert(edge.from);
        Ok(())
    }

    /// Whether the arc exists with exactly this orientation.
    pub fn contains(&self, edge: &Edge) -> bool {
        self.arcs.get(&edge.slot()) == Some(edge)
    }

    /// Consume the arc's capacity by flipping it.
    pub fn reverse(&mut self, edge: &Edge) -> ScheduleResult<()> {
        match self.arcs.get_mut(&edge.slot()) {
            Some(current) if *current == *edge => {
                *current = edge.reversed();
                Ok(())
            }
            Some(current) => Err(ScheduleError::GraphInconsistency(format!(
                "expected {edge}, found {current}"
            ))),
            None => Err(ScheduleError::GraphInconsistency(format!(
                "expected {edge}, found no arc"
            ))),
        }
    }

    /// Arcs leaving `node`, in node order.
    pub fn outgoing(&self, node: NodeId) -> Vec<Edge> {
        let Some(neighbours) = self.adjacency.get(&node) else {
            return Vec::new();
        };
        neighbours
            .iter()
            .filter_map(|other| {
                let edge = Edge { from: node, to: *other };
                self.arcs.get(&edge.slot()).filter(|e| e.from == node).copied()
            })
            .collect()
    }

    /// Remove every arc touching `node`. Returns how many were removed.
    pub fn detach(&mut self, node: NodeId) -> usize {
        let Some(neighbours) = self.adjacency.remove(&node) else {
            return 0;
        };
        for other in &neighbours {
            self.arcs.remove(&Edge { from: node, to: *other }.slot());
            if let Some(set) = self.adjacency.get_mut(other) {
                set.remove(&node);
            }
        }
        neighbours.len()
    }

    /// The server a task currently flows into (`task→server` arc).
    pub fn holder(&self, task: TaskId) -> Option<ServerId> {
        self.outgoing(NodeId::Task(task))
            .into_iter()
            .find_map(|e| match e.to {
                NodeId::Server(s) => Some(s),
                _ => None,
            })
    }

    /// Whether the task's sink arc points away from the sink.
    pub fn reaches_sink(&self, task: TaskId) -> bool {
        self.contains(&Edge::to_sink(task))
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }
}
