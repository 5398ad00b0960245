//! Scheduling artifacts for fixpoint iteration over cyclic graphs.
//!
//! * [`WeakTopologicalOrdering`] is Bourdoncle's hierarchical ordering: a
//!   topological order of the strongly connected components, recursively
//!   decomposed, where each component is entered through its head.
//! * [`WeakPartialOrdering`] keeps only the partial order: the acyclic
//!   scheduling graph left once back edges are removed, the back edges
//!   themselves, and the members of the component each back edge closes.
//!
//! Neither is required by the worklist iterator, which is correct under any
//! fair schedule, but both reduce the number of revisits (and so the number
//! of widenings) when used to prioritise the worklist.

use crate::graph::{FlowGraph, Graph, NullEdge, NullVertex};
use crate::Error;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// An element of a weak topological ordering.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum WtoComponent {
    Vertex(usize),
    Component {
        head: usize,
        components: Vec<WtoComponent>,
    },
}

impl WtoComponent {
    /// The first node of this component in iteration order.
    pub fn head(&self) -> usize {
        match *self {
            WtoComponent::Vertex(vertex) => vertex,
            WtoComponent::Component { head, .. } => head,
        }
    }

    fn flatten_into(&self, order: &mut Vec<usize>) {
        match *self {
            WtoComponent::Vertex(vertex) => order.push(vertex),
            WtoComponent::Component {
                head,
                ref components,
            } => {
                order.push(head);
                for component in components {
                    component.flatten_into(order);
                }
            }
        }
    }
}

impl fmt::Display for WtoComponent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            WtoComponent::Vertex(vertex) => write!(f, "{}", vertex),
            WtoComponent::Component {
                head,
                ref components,
            } => {
                write!(f, "({}", head)?;
                for component in components {
                    write!(f, " {}", component)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Bourdoncle's weak topological ordering of a graph.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WeakTopologicalOrdering {
    components: Vec<WtoComponent>,
}

// Depth-first numbering state for Bourdoncle's algorithm. A number of 0
// marks an unvisited vertex, `usize::MAX` a vertex already placed.
struct WtoBuilder<'g, G: FlowGraph> {
    graph: &'g G,
    dfn: FxHashMap<usize, usize>,
    stack: Vec<usize>,
    num: usize,
}

// A suspended step of the depth-first search. `Visit` numbers a vertex and
// explores its successors; a `Visit` whose vertex turns out to head a loop is
// replaced by a `Component` which orders the loop body. Both hand `head` back
// to the `Visit` below them once they finish.
enum Frame {
    Visit {
        vertex: usize,
        successors: Vec<usize>,
        position: usize,
        head: usize,
        is_loop: bool,
    },
    Component {
        vertex: usize,
        successors: Vec<usize>,
        position: usize,
        head: usize,
    },
}

impl<'g, G: FlowGraph> WtoBuilder<'g, G> {
    fn dfn(&self, vertex: usize) -> usize {
        self.dfn.get(&vertex).cloned().unwrap_or(0)
    }

    fn enter(&mut self, vertex: usize) -> Result<Frame, Error> {
        self.stack.push(vertex);
        self.num += 1;
        self.dfn.insert(vertex, self.num);
        Ok(Frame::Visit {
            vertex,
            successors: self.graph.successor_ids(vertex)?,
            position: 0,
            head: self.num,
            is_loop: false,
        })
    }

    /// Orders everything reachable from `root` which is not placed yet.
    fn visit(&mut self, root: usize) -> Result<VecDeque<WtoComponent>, Error> {
        let mut frames = vec![self.enter(root)?];
        // The partition of each open component, innermost last.
        let mut partitions = vec![VecDeque::new()];

        while let Some(frame) = frames.last_mut() {
            let mut next = None;
            match frame {
                Frame::Visit {
                    successors,
                    position,
                    head,
                    is_loop,
                    ..
                } => {
                    while let Some(&successor) = successors.get(*position) {
                        *position += 1;
                        match self.dfn(successor) {
                            0 => {
                                next = Some(successor);
                                break;
                            }
                            number => {
                                if number <= *head {
                                    *head = number;
                                    *is_loop = true;
                                }
                            }
                        }
                    }
                }
                Frame::Component {
                    successors,
                    position,
                    ..
                } => {
                    while let Some(&successor) = successors.get(*position) {
                        *position += 1;
                        if self.dfn(successor) == 0 {
                            next = Some(successor);
                            break;
                        }
                    }
                }
            }

            match next {
                Some(successor) => {
                    let frame = self.enter(successor)?;
                    frames.push(frame);
                }
                None => {
                    let frame = frames.pop().ok_or("WTO frame underflow")?;
                    self.finish(frame, &mut frames, &mut partitions)?;
                }
            }
        }

        partitions.pop().ok_or_else(|| "WTO partition underflow".into())
    }

    fn finish(
        &mut self,
        frame: Frame,
        frames: &mut Vec<Frame>,
        partitions: &mut Vec<VecDeque<WtoComponent>>,
    ) -> Result<(), Error> {
        let head = match frame {
            Frame::Visit {
                vertex,
                head,
                is_loop,
                ..
            } => {
                if head == self.dfn(vertex) {
                    self.dfn.insert(vertex, usize::MAX);
                    let mut element = self.stack.pop().ok_or("WTO stack underflow")?;
                    if is_loop {
                        while element != vertex {
                            self.dfn.insert(element, 0);
                            element = self.stack.pop().ok_or("WTO stack underflow")?;
                        }
                        partitions.push(VecDeque::new());
                        frames.push(Frame::Component {
                            vertex,
                            successors: self.graph.successor_ids(vertex)?,
                            position: 0,
                            head,
                        });
                        return Ok(());
                    }
                    partitions
                        .last_mut()
                        .ok_or("WTO partition underflow")?
                        .push_front(WtoComponent::Vertex(vertex));
                }
                head
            }
            Frame::Component { vertex, head, .. } => {
                let components = partitions.pop().ok_or("WTO partition underflow")?;
                partitions
                    .last_mut()
                    .ok_or("WTO partition underflow")?
                    .push_front(WtoComponent::Component {
                        head: vertex,
                        components: components.into_iter().collect(),
                    });
                head
            }
        };

        if let Some(Frame::Visit {
            head: parent_head,
            is_loop,
            ..
        }) = frames.last_mut()
        {
            if head <= *parent_head {
                *parent_head = head;
                *is_loop = true;
            }
        }

        Ok(())
    }
}

impl WeakTopologicalOrdering {
    /// Computes the weak topological ordering of `graph`.
    ///
    /// The search starts at the graph's entry when it has one. Nodes not
    /// reachable from the entry are ordered afterwards, by ascending index.
    pub fn new<G: FlowGraph>(graph: &G) -> Result<WeakTopologicalOrdering, Error> {
        let mut builder = WtoBuilder {
            graph,
            dfn: FxHashMap::default(),
            stack: Vec::new(),
            num: 0,
        };

        let mut components = Vec::new();
        let roots = graph.entry_id().into_iter().chain(graph.node_ids());
        for root in roots {
            if builder.dfn(root) == 0 {
                components.extend(builder.visit(root)?);
            }
        }

        Ok(WeakTopologicalOrdering { components })
    }

    /// The top-level components, in iteration order.
    pub fn components(&self) -> &[WtoComponent] {
        &self.components
    }

    /// Every node, heads before the bodies of their components.
    pub fn flatten(&self) -> Vec<usize> {
        let mut order = Vec::new();
        for component in &self.components {
            component.flatten_into(&mut order);
        }
        order
    }

    /// The heads of every (possibly nested) component.
    pub fn heads(&self) -> BTreeSet<usize> {
        fn collect(components: &[WtoComponent], heads: &mut BTreeSet<usize>) {
            for component in components {
                if let WtoComponent::Component { head, components } = component {
                    heads.insert(*head);
                    collect(components, heads);
                }
            }
        }
        let mut heads = BTreeSet::new();
        collect(&self.components, &mut heads);
        heads
    }
}

impl fmt::Display for WeakTopologicalOrdering {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let components = self
            .components
            .iter()
            .map(|component| component.to_string())
            .collect::<Vec<String>>();
        write!(f, "{}", components.join(" "))
    }
}

/// A weak partial ordering: the acyclic part of a graph plus the components
/// closed by its back edges.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WeakPartialOrdering {
    order: Vec<usize>,
    back_edges: BTreeSet<(usize, usize)>,
    components: BTreeMap<usize, BTreeSet<usize>>,
}

impl WeakPartialOrdering {
    /// Computes the weak partial ordering of `graph`.
    pub fn new<G: FlowGraph>(graph: &G) -> Result<WeakPartialOrdering, Error> {
        let mut copy: Graph<NullVertex, NullEdge> = Graph::new();
        let nodes = graph.node_ids();
        for &node in &nodes {
            copy.insert_vertex(NullVertex::new(node))?;
        }
        for &node in &nodes {
            for successor in graph.successor_ids(node)? {
                copy.insert_edge(NullEdge::new(node, successor))?;
            }
        }

        let roots: Vec<usize> = graph.entry_id().into_iter().collect();
        let back_edges = copy.compute_back_edges(&roots)?;

        let components = copy
            .compute_loops(&back_edges)?
            .into_iter()
            .map(|l| (l.header(), l.nodes().clone()))
            .collect();

        let mut forward: Graph<NullVertex, NullEdge> = Graph::new();
        for &node in &nodes {
            forward.insert_vertex(NullVertex::new(node))?;
        }
        for edge in copy.edges() {
            if !back_edges.contains(&(edge.head, edge.tail)) {
                forward.insert_edge(edge.clone())?;
            }
        }
        let order = forward.compute_topological_ordering()?;

        Ok(WeakPartialOrdering {
            order,
            back_edges,
            components,
        })
    }

    /// A linear extension of the scheduling order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// The edges removed to make the scheduling graph acyclic.
    pub fn back_edges(&self) -> &BTreeSet<(usize, usize)> {
        &self.back_edges
    }

    /// The targets of back edges.
    pub fn heads(&self) -> BTreeSet<usize> {
        self.components.keys().cloned().collect()
    }

    /// The members of the component headed by `head`, head included.
    pub fn component(&self, head: usize) -> Option<&BTreeSet<usize>> {
        self.components.get(&head)
    }
}
