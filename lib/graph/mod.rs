//! Implements a directed graph.
//!
//! Vertices and edges are keyed by `usize` indices, which is what the
//! fixpoint engine uses as node identities. Besides the basic storage this
//! module provides the traversals the scheduling artifacts in
//! [`ordering`](self::ordering) are built from.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::Error;

mod control_flow_graph;
pub mod ordering;

pub use self::control_flow_graph::{ControlFlowGraph, FlowGraph};

pub trait Vertex: Clone + Sync {
    // The index of this vertex.
    fn index(&self) -> usize;
}

pub trait Edge: Clone + Sync {
    /// The index of the head vertex.
    fn head(&self) -> usize;
    /// The index of the tail vertex.
    fn tail(&self) -> usize;
}

/// An empty vertex for creating structures when data is not required
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NullVertex {
    index: usize,
}

impl NullVertex {
    pub fn new(index: usize) -> NullVertex {
        NullVertex { index }
    }
}

impl Vertex for NullVertex {
    fn index(&self) -> usize {
        self.index
    }
}

/// An empty edge for creating structures when data is not required
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NullEdge {
    head: usize,
    tail: usize,
}

impl NullEdge {
    pub fn new(head: usize, tail: usize) -> NullEdge {
        NullEdge { head, tail }
    }
}

impl Edge for NullEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
}

/// A cycle in the graph, identified by the target of a back edge.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Loop {
    header: usize,
    nodes: BTreeSet<usize>,
}

impl Loop {
    pub fn new(header: usize, nodes: BTreeSet<usize>) -> Self {
        Self { header, nodes }
    }

    /// The set of nodes part of this loop
    pub fn nodes(&self) -> &BTreeSet<usize> {
        &self.nodes
    }

    /// The loop header node
    pub fn header(&self) -> usize {
        self.header
    }
}

/// A directed graph.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Default)]
pub struct Graph<V: Vertex, E: Edge> {
    vertices: BTreeMap<usize, V>,
    edges: BTreeMap<(usize, usize), E>,
    successors: BTreeMap<usize, BTreeSet<usize>>,
    predecessors: BTreeMap<usize, BTreeSet<usize>>,
}

impl<V, E> Graph<V, E>
where
    V: Vertex,
    E: Edge,
{
    pub fn new() -> Graph<V, E> {
        Graph {
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            successors: BTreeMap::new(),
            predecessors: BTreeMap::new(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the vertex with the given index exists in this graph
    pub fn has_vertex(&self, index: usize) -> bool {
        self.vertices.contains_key(&index)
    }

    /// Inserts a vertex into the graph.
    /// # Errors
    /// Error if the vertex already exists by index.
    pub fn insert_vertex(&mut self, v: V) -> Result<(), Error> {
        if self.vertices.contains_key(&v.index()) {
            return Err("duplicate vertex index".into());
        }
        self.successors.insert(v.index(), BTreeSet::new());
        self.predecessors.insert(v.index(), BTreeSet::new());
        self.vertices.insert(v.index(), v);
        Ok(())
    }

    /// Inserts an edge into the graph.
    /// # Errors
    /// Error if the edge already exists by indices, or if either end is
    /// missing.
    pub fn insert_edge(&mut self, edge: E) -> Result<(), Error> {
        let (head, tail) = (edge.head(), edge.tail());
        if self.edges.contains_key(&(head, tail)) {
            return Err("duplicate edge".into());
        }
        if !self.vertices.contains_key(&head) {
            return Err(Error::GraphVertexNotFound(head));
        }
        if !self.vertices.contains_key(&tail) {
            return Err(Error::GraphVertexNotFound(tail));
        }

        self.edges.insert((head, tail), edge);
        if let Some(successors) = self.successors.get_mut(&head) {
            successors.insert(tail);
        }
        if let Some(predecessors) = self.predecessors.get_mut(&tail) {
            predecessors.insert(head);
        }

        Ok(())
    }

    /// Returns the indices of all immediate successors of a vertex from the graph.
    pub fn successor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.successors
            .get(&index)
            .map(|successors| successors.iter().cloned().collect())
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Returns the indices of all immediate predecessors of a vertex from the graph.
    pub fn predecessor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.predecessors
            .get(&index)
            .map(|predecessors| predecessors.iter().cloned().collect())
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Returns the indices of all vertices, in ascending order.
    pub fn vertex_indices(&self) -> Vec<usize> {
        self.vertices.keys().cloned().collect()
    }

    /// Computes the set of back edges
    ///
    /// Back edges are the retreating edges of a depth-first search started
    /// at `roots`, then at every vertex not yet reached, in ascending order.
    /// Unlike dominator-based back edges this also breaks every cycle of an
    /// irreducible graph.
    pub fn compute_back_edges(&self, roots: &[usize]) -> Result<BTreeSet<(usize, usize)>, Error> {
        for &root in roots {
            if !self.has_vertex(root) {
                return Err(Error::GraphVertexNotFound(root));
            }
        }

        let mut permanent_marks: FxHashSet<usize> = FxHashSet::default();
        let mut temporary_marks: FxHashSet<usize> = FxHashSet::default();
        let mut back_edges: BTreeSet<(usize, usize)> = BTreeSet::new();

        let vertices = self.vertices.keys().cloned();
        for start in roots.iter().cloned().chain(vertices) {
            if permanent_marks.contains(&start) {
                continue;
            }

            // Each frame is a vertex on the current path and the successors
            // it has left to explore.
            temporary_marks.insert(start);
            let mut stack = vec![(start, self.successors[&start].iter())];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                match frame.1.next().cloned() {
                    Some(successor) => {
                        if temporary_marks.contains(&successor) {
                            back_edges.insert((node, successor));
                        } else if !permanent_marks.contains(&successor) {
                            temporary_marks.insert(successor);
                            stack.push((successor, self.successors[&successor].iter()));
                        }
                    }
                    None => {
                        stack.pop();
                        temporary_marks.remove(&node);
                        permanent_marks.insert(node);
                    }
                }
            }
        }

        Ok(back_edges)
    }

    /// Computes the loops closed by `back_edges`, one per back edge target.
    ///
    /// The body of a loop is its header plus every vertex which reaches the
    /// source of one of the header's back edges without passing through the
    /// header.
    pub fn compute_loops(&self, back_edges: &BTreeSet<(usize, usize)>) -> Result<Vec<Loop>, Error> {
        let mut loops: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for &(tail, header) in back_edges {
            if !self.edges.contains_key(&(tail, header)) {
                return Err(Error::GraphEdgeNotFound(tail, header));
            }

            let nodes = loops.entry(header).or_default();
            let mut queue: Vec<usize> = Vec::new();

            nodes.insert(header);

            if nodes.insert(tail) {
                queue.push(tail);
            }

            while let Some(node) = queue.pop() {
                let predecessors = self
                    .predecessors
                    .get(&node)
                    .ok_or(Error::GraphVertexNotFound(node))?;
                for &predecessor in predecessors {
                    if nodes.insert(predecessor) {
                        queue.push(predecessor);
                    }
                }
            }
        }

        Ok(loops
            .into_iter()
            .map(|(header, nodes)| Loop::new(header, nodes))
            .collect())
    }

    /// Computes the topological ordering of all vertices in the graph
    pub fn compute_topological_ordering(&self) -> Result<Vec<usize>, Error> {
        let mut permanent_marks: FxHashSet<usize> = FxHashSet::default();
        let mut temporary_marks: FxHashSet<usize> = FxHashSet::default();
        let mut order: Vec<usize> = Vec::new();

        for &start in self.vertices.keys().rev() {
            if permanent_marks.contains(&start) {
                continue;
            }

            temporary_marks.insert(start);
            let mut stack = vec![(start, self.successors[&start].iter().rev())];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                match frame.1.next().cloned() {
                    Some(successor) => {
                        if permanent_marks.contains(&successor) {
                            continue;
                        }
                        if temporary_marks.contains(&successor) {
                            return Err("Graph contains a loop".into());
                        }
                        temporary_marks.insert(successor);
                        stack.push((successor, self.successors[&successor].iter().rev()));
                    }
                    None => {
                        stack.pop();
                        temporary_marks.remove(&node);
                        permanent_marks.insert(node);
                        order.push(node);
                    }
                }
            }
        }

        Ok(order.into_iter().rev().collect())
    }

    /// Get a reference to every `Edge` in the `Graph`.
    pub fn edges(&self) -> Vec<&E> {
        self.edges.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Vertex for usize {
        fn index(&self) -> usize {
            *self
        }
    }

    impl Edge for (usize, usize) {
        fn head(&self) -> usize {
            self.0
        }

        fn tail(&self) -> usize {
            self.1
        }
    }

    /**
     *           +--> 3 +-+
     *          /          \
     *         | +--> 4 +--+
     *         |/          |
     *         +           v
     * 1 +---> 2 <-------+ 5
     *         +
     *         |
     *         v
     *         6
     */
    fn create_test_graph() -> Graph<usize, (usize, usize)> {
        let mut graph = Graph::new();

        for vertex in 1..=6 {
            graph.insert_vertex(vertex).unwrap();
        }

        graph.insert_edge((1, 2)).unwrap();
        graph.insert_edge((2, 3)).unwrap();
        graph.insert_edge((2, 4)).unwrap();
        graph.insert_edge((2, 6)).unwrap();
        graph.insert_edge((3, 5)).unwrap();
        graph.insert_edge((4, 5)).unwrap();
        graph.insert_edge((5, 2)).unwrap();

        graph
    }

    #[test]
    fn test_successors() {
        let graph = create_test_graph();

        assert_eq!(graph.successor_indices(2).unwrap(), vec![3, 4, 6]);
        assert!(graph.successor_indices(6).unwrap().is_empty());

        // vertex 7 does not exist
        assert!(graph.successor_indices(7).is_err());
    }

    #[test]
    fn test_predecessors() {
        let graph = create_test_graph();

        assert!(graph.predecessor_indices(1).unwrap().is_empty());
        assert_eq!(graph.predecessor_indices(2).unwrap(), vec![1, 5]);
    }

    #[test]
    fn test_duplicate_insertions_are_rejected() {
        let mut graph = create_test_graph();

        assert!(graph.insert_vertex(1).is_err());
        assert!(graph.insert_edge((1, 2)).is_err());
        assert!(matches!(
            graph.insert_edge((1, 9)),
            Err(Error::GraphVertexNotFound(9))
        ));
    }

    #[test]
    fn test_back_edges() {
        let graph = create_test_graph();

        let back_edges = graph.compute_back_edges(&[1]).unwrap();
        assert_eq!(back_edges, vec![(5, 2)].into_iter().collect());
    }

    #[test]
    fn test_back_edges_of_irreducible_graph() {
        // 1 -> 2, 1 -> 3, 2 <-> 3: no vertex dominates the cycle
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 1..=3 {
            graph.insert_vertex(vertex).unwrap();
        }
        graph.insert_edge((1, 2)).unwrap();
        graph.insert_edge((1, 3)).unwrap();
        graph.insert_edge((2, 3)).unwrap();
        graph.insert_edge((3, 2)).unwrap();

        let back_edges = graph.compute_back_edges(&[1]).unwrap();
        assert_eq!(back_edges.len(), 1);
    }

    #[test]
    fn test_compute_loops() {
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 1..=4 {
            graph.insert_vertex(vertex).unwrap();
        }

        graph.insert_edge((1, 2)).unwrap();
        graph.insert_edge((2, 2)).unwrap(); // self loop
        graph.insert_edge((2, 3)).unwrap();
        graph.insert_edge((3, 1)).unwrap(); // back edge to 1
        graph.insert_edge((3, 4)).unwrap();
        graph.insert_edge((4, 4)).unwrap(); // self loop

        let back_edges = graph.compute_back_edges(&[1]).unwrap();
        assert_eq!(back_edges, vec![(2, 2), (3, 1), (4, 4)].into_iter().collect());

        let loops = graph.compute_loops(&back_edges).unwrap();

        assert_eq!(
            loops,
            vec![
                Loop::new(1, vec![1, 2, 3].into_iter().collect()),
                Loop::new(2, vec![2].into_iter().collect()),
                Loop::new(4, vec![4].into_iter().collect()),
            ]
        );
    }

    #[test]
    fn test_compute_loops_rejects_unknown_edges() {
        let graph = create_test_graph();

        let back_edges = vec![(6, 1)].into_iter().collect();
        assert!(matches!(
            graph.compute_loops(&back_edges),
            Err(Error::GraphEdgeNotFound(6, 1))
        ));
    }

    #[test]
    fn test_topological_ordering_should_return_error_for_cyclic_graph() {
        let graph = create_test_graph();
        assert!(graph.compute_topological_ordering().is_err());
    }

    #[test]
    fn test_topological_ordering() {
        // ---> 1 +---> 2 +-+-> 3 +---> 4
        //      +          /      \     /\
        //      |         /        \    |
        //      +-----> 5 +---> 6 +-+-> 7
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 1..=7 {
            graph.insert_vertex(vertex).unwrap();
        }

        graph.insert_edge((1, 2)).unwrap();
        graph.insert_edge((2, 5)).unwrap();
        graph.insert_edge((2, 3)).unwrap();
        graph.insert_edge((3, 4)).unwrap();
        graph.insert_edge((3, 7)).unwrap();
        graph.insert_edge((5, 3)).unwrap();
        graph.insert_edge((5, 6)).unwrap();
        graph.insert_edge((6, 7)).unwrap();
        graph.insert_edge((7, 4)).unwrap();

        let order = graph.compute_topological_ordering().unwrap();
        let position = |v: usize| order.iter().position(|&o| o == v).unwrap();

        assert_eq!(order.len(), 7);
        for edge in graph.edges() {
            assert!(position(edge.0) < position(edge.1));
        }
    }

    #[test]
    fn test_traversals_of_a_long_chain() {
        let length = 100_000;
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 0..length {
            graph.insert_vertex(vertex).unwrap();
        }
        for vertex in 1..length {
            graph.insert_edge((vertex - 1, vertex)).unwrap();
        }
        graph.insert_edge((length - 1, 0)).unwrap();

        let back_edges = graph.compute_back_edges(&[0]).unwrap();
        assert_eq!(back_edges, vec![(length - 1, 0)].into_iter().collect());

        let loops = graph.compute_loops(&back_edges).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].nodes().len(), length);

        assert!(graph.compute_topological_ordering().is_err());
    }

    #[test]
    fn test_topological_ordering_of_a_long_chain() {
        let length = 100_000;
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 0..length {
            graph.insert_vertex(vertex).unwrap();
        }
        // edges point downwards, so the search from the highest vertex walks
        // the whole chain
        for vertex in 1..length {
            graph.insert_edge((vertex, vertex - 1)).unwrap();
        }

        let order = graph.compute_topological_ordering().unwrap();
        assert_eq!(order, (0..length).rev().collect::<Vec<usize>>());
    }
}
