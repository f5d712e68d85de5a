//! Augmenting-path search over the residual graph.
//!
//! Both searches are iterative depth-first walks with an explicit frame
//! stack, so stack depth never depends on the longest path. Neither search
//! mutates the graph; the caller applies a path through the session.

use std::collections::HashSet;

use tracing::trace;

use crate::graph::{Edge, ResidualGraph};
use crate::types::{NodeId, ServerId, TaskId};

/// An edge-simple path from a server to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentingPath {
    edges: Vec<Edge>,
}

impl AugmentingPath {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The server the path starts from.
    pub fn origin(&self) -> Option<ServerId> {
        match self.edges.first()?.from {
            NodeId::Server(s) => Some(s),
            _ => None,
        }
    }

    /// `(server, task)` pairs for every `server→task` arc, in path order.
    pub fn placements(&self) -> impl Iterator<Item = (ServerId, TaskId)> + '_ {
        self.edges.iter().filter_map(|e| e.placement())
    }

    /// The unassigned task this path brings into the flow.
    pub fn terminal_task(&self) -> Option<TaskId> {
        match self.edges.last()? {
            Edge {
                from: NodeId::Task(t),
                to: NodeId::Sink,
            } => Some(*t),
            _ => None,
        }
    }
}

/// One DFS level: the arcs leaving a node and the next one to try.
struct Frame {
    edges: Vec<Edge>,
    next: usize,
}

impl Frame {
    fn new(graph: &ResidualGraph, node: NodeId) -> Self {
        Self {
            edges: graph.outgoing(node),
            next: 0,
        }
    }

    fn advance(&mut self) -> Option<Edge> {
        let edge = self.edges.get(self.next).copied();
        self.next += 1;
        edge
    }
}

/// Find the first augmenting path from `source` to the sink.
///
/// Every arc is explored at most once per search, so the search is linear
/// in the graph size and finds a path iff the sink is reachable.
pub fn find_path(graph: &ResidualGraph, source: ServerId) -> Option<AugmentingPath> {
    let mut explored: HashSet<Edge> = HashSet::new();
    let mut path: Vec<Edge> = Vec::new();
    let mut stack = vec![Frame::new(graph, NodeId::Server(source))];

    while let Some(frame) = stack.last_mut() {
        let Some(edge) = frame.advance() else {
            stack.pop();
            path.pop();
            continue;
        };
        if !explored.insert(edge) {
            continue;
        }
        path.push(edge);
        if edge.to == NodeId::Sink {
            return Some(AugmentingPath { edges: path });
        }
        stack.push(Frame::new(graph, edge.to));
    }

    None
}

/// Enumerate every edge-simple augmenting path from `source`, up to `limit`.
///
/// Exploration stops at the sink. Each call returns a fresh collection.
pub fn find_all_paths(graph: &ResidualGraph, source: ServerId, limit: usize) -> Vec<AugmentingPath> {
    let mut found = Vec::new();
    if limit == 0 {
        return found;
    }

    let mut on_path: HashSet<Edge> = HashSet::new();
    let mut path: Vec<Edge> = Vec::new();
    let mut stack = vec![Frame::new(graph, NodeId::Server(source))];

    while let Some(frame) = stack.last_mut() {
        let Some(edge) = frame.advance() else {
            stack.pop();
            if let Some(edge) = path.pop() {
                on_path.remove(&edge);
            }
            continue;
        };
        if on_path.contains(&edge) {
            continue;
        }
        if edge.to == NodeId::Sink {
            let mut edges = path.clone();
            edges.push(edge);
            found.push(AugmentingPath { edges });
            if found.len() >= limit {
                trace!(server = %source, limit, "candidate path limit reached");
                break;
            }
            continue;
        }
        on_path.insert(edge);
        path.push(edge);
        stack.push(Frame::new(graph, edge.to));
    }

    found
}
