//! Per-node visitation bookkeeping for a single fixpoint run.

use crate::analysis::NodeId;
use rustc_hash::FxHashMap;

/// The last value computed at a node, and how many times it was processed.
///
/// A `visited` count of 0 means the node was never processed.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeState<D> {
    domain: Option<D>,
    visited: usize,
}

impl<D> NodeState<D> {
    fn new() -> NodeState<D> {
        NodeState {
            domain: None,
            visited: 0,
        }
    }

    /// The output of the transfer function on the most recent visit.
    pub fn domain(&self) -> Option<&D> {
        self.domain.as_ref()
    }

    pub fn visited(&self) -> usize {
        self.visited
    }
}

/// Visitation state for every node of a run.
///
/// Counters only ever increase.
#[derive(Clone, Debug)]
pub struct VisitTable<D> {
    states: FxHashMap<NodeId, NodeState<D>>,
}

impl<D> VisitTable<D> {
    pub fn new() -> VisitTable<D> {
        VisitTable {
            states: FxHashMap::default(),
        }
    }

    /// How many times `node` has been processed.
    pub fn visited(&self, node: NodeId) -> usize {
        self.states.get(&node).map(|state| state.visited).unwrap_or(0)
    }

    /// Count a visit of `node`, returning the new count.
    pub fn visit(&mut self, node: NodeId) -> usize {
        let state = self.states.entry(node).or_insert_with(NodeState::new);
        state.visited += 1;
        state.visited
    }

    /// Record the output of the transfer function for `node`.
    pub fn record(&mut self, node: NodeId, domain: D) {
        self.states
            .entry(node)
            .or_insert_with(NodeState::new)
            .domain = Some(domain);
    }

    pub fn state(&self, node: NodeId) -> Option<&NodeState<D>> {
        self.states.get(&node)
    }

    /// The sum of every node's visit count.
    pub fn total_visits(&self) -> usize {
        self.states.values().map(|state| state.visited).sum()
    }
}

impl<D> Default for VisitTable<D> {
    fn default() -> VisitTable<D> {
        VisitTable::new()
    }
}
