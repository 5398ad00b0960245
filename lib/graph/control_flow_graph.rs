//! The graph provider boundary consumed by the fixpoint engine.

use crate::graph::{Edge, Graph, NullEdge, NullVertex, Vertex};
use crate::Error;
use serde::{Deserialize, Serialize};

/// Anything the fixpoint engine can iterate over: a set of nodes, identified
/// by `usize`, and a successor relation.
///
/// The engine never mutates a `FlowGraph`.
pub trait FlowGraph {
    /// Every node of the graph, in a fixed enumeration order.
    fn node_ids(&self) -> Vec<usize>;

    /// The immediate successors of `node`.
    fn successor_ids(&self, node: usize) -> Result<Vec<usize>, Error>;

    /// The entry node, if the graph has one.
    fn entry_id(&self) -> Option<usize> {
        None
    }

    fn num_nodes(&self) -> usize {
        self.node_ids().len()
    }
}

impl<V: Vertex, E: Edge> FlowGraph for Graph<V, E> {
    fn node_ids(&self) -> Vec<usize> {
        self.vertex_indices()
    }

    fn successor_ids(&self, node: usize) -> Result<Vec<usize>, Error> {
        self.successor_indices(node)
    }

    fn num_nodes(&self) -> usize {
        self.num_vertices()
    }
}

/// A directed graph of nodes with an optional entry.
///
/// Nodes carry no payload: hosts keep their own instructions or blocks keyed
/// by the node index and consult them from their transfer functions.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ControlFlowGraph {
    // The internal graph used to store our nodes.
    graph: Graph<NullVertex, NullEdge>,
    // The next index to use when creating a node.
    next_index: usize,
    // An optional entry index for the graph.
    entry: Option<usize>,
}

impl ControlFlowGraph {
    pub fn new() -> ControlFlowGraph {
        ControlFlowGraph {
            graph: Graph::new(),
            next_index: 0,
            entry: None,
        }
    }

    /// Creates a new node and returns its index.
    pub fn new_node(&mut self) -> Result<usize, Error> {
        let index = self.next_index;
        self.graph.insert_vertex(NullVertex::new(index))?;
        self.next_index += 1;
        Ok(index)
    }

    /// Creates `count` new nodes and returns their indices.
    pub fn new_nodes(&mut self, count: usize) -> Result<Vec<usize>, Error> {
        (0..count).map(|_| self.new_node()).collect()
    }

    /// Adds an edge from `head` to `tail`.
    pub fn edge(&mut self, head: usize, tail: usize) -> Result<(), Error> {
        self.graph.insert_edge(NullEdge::new(head, tail))
    }

    /// Sets the entry point for this `ControlFlowGraph` to the given node.
    pub fn set_entry(&mut self, entry: usize) -> Result<(), Error> {
        if self.graph.has_vertex(entry) {
            self.entry = Some(entry);
            return Ok(());
        }
        Err(Error::GraphVertexNotFound(entry))
    }

    /// Get the indices of the predecessors of a node.
    pub fn predecessors(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.graph.predecessor_indices(index)
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.num_vertices()
    }
}

impl Default for ControlFlowGraph {
    fn default() -> ControlFlowGraph {
        ControlFlowGraph::new()
    }
}

impl FlowGraph for ControlFlowGraph {
    fn node_ids(&self) -> Vec<usize> {
        self.graph.vertex_indices()
    }

    fn successor_ids(&self, node: usize) -> Result<Vec<usize>, Error> {
        self.graph.successor_indices(node)
    }

    fn entry_id(&self) -> Option<usize> {
        self.entry
    }

    fn num_nodes(&self) -> usize {
        self.graph.num_vertices()
    }
}
