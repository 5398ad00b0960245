//! Per-method graph artifacts, computed once and shared between analyses.

use crate::graph::ordering::{WeakPartialOrdering, WeakTopologicalOrdering};
use crate::graph::FlowGraph;
use crate::Error;
use dashmap::DashMap;
use log::debug;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// Builds the control flow graph of a method.
///
/// Builders must be pure: two calls for the same method produce
/// interchangeable graphs. The cache relies on this when two threads race to
/// populate the same entry.
pub trait MethodGraphBuilder: Send + Sync {
    type Method: Clone + Eq + Hash + Display + Send + Sync;
    type Graph: FlowGraph + Send + Sync;

    fn build_graph(&self, method: &Self::Method) -> Result<Self::Graph, Error>;

    fn build_wto(
        &self,
        _method: &Self::Method,
        graph: &Self::Graph,
    ) -> Result<WeakTopologicalOrdering, Error> {
        WeakTopologicalOrdering::new(graph)
    }

    fn build_wpo(
        &self,
        _method: &Self::Method,
        graph: &Self::Graph,
    ) -> Result<WeakPartialOrdering, Error> {
        WeakPartialOrdering::new(graph)
    }
}

/// Graphs, weak topological orderings and weak partial orderings keyed by
/// method.
///
/// Entries are never evicted. Artifacts are built outside of any lock; when
/// two threads race on the same method, the first inserted artifact wins and
/// the other is dropped.
pub struct MethodGraphCache<B: MethodGraphBuilder> {
    builder: B,
    graphs: DashMap<B::Method, Arc<B::Graph>>,
    wtos: DashMap<B::Method, Arc<WeakTopologicalOrdering>>,
    wpos: DashMap<B::Method, Arc<WeakPartialOrdering>>,
}

impl<B: MethodGraphBuilder> MethodGraphCache<B> {
    pub fn new(builder: B) -> MethodGraphCache<B> {
        MethodGraphCache {
            builder,
            graphs: DashMap::new(),
            wtos: DashMap::new(),
            wpos: DashMap::new(),
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Get the graph of `method`, building it if this is the first request.
    pub fn get_or_compute_graph(&self, method: &B::Method) -> Result<Arc<B::Graph>, Error> {
        if let Some(graph) = self.graphs.get(method) {
            return Ok(Arc::clone(graph.value()));
        }

        debug!("building graph for {}", method);
        let graph = Arc::new(self.builder.build_graph(method)?);
        Ok(Arc::clone(
            self.graphs.entry(method.clone()).or_insert(graph).value(),
        ))
    }

    /// Get the weak topological ordering of `method`'s graph.
    pub fn get_or_compute_wto(
        &self,
        method: &B::Method,
    ) -> Result<Arc<WeakTopologicalOrdering>, Error> {
        if let Some(wto) = self.wtos.get(method) {
            return Ok(Arc::clone(wto.value()));
        }

        let graph = self.get_or_compute_graph(method)?;
        debug!("building wto for {}", method);
        let wto = Arc::new(self.builder.build_wto(method, &graph)?);
        Ok(Arc::clone(
            self.wtos.entry(method.clone()).or_insert(wto).value(),
        ))
    }

    /// Get the weak partial ordering of `method`'s graph.
    pub fn get_or_compute_wpo(
        &self,
        method: &B::Method,
    ) -> Result<Arc<WeakPartialOrdering>, Error> {
        if let Some(wpo) = self.wpos.get(method) {
            return Ok(Arc::clone(wpo.value()));
        }

        let graph = self.get_or_compute_graph(method)?;
        debug!("building wpo for {}", method);
        let wpo = Arc::new(self.builder.build_wpo(method, &graph)?);
        Ok(Arc::clone(
            self.wpos.entry(method.clone()).or_insert(wpo).value(),
        ))
    }

    /// Whether the graph of `method` has been built.
    pub fn contains(&self, method: &B::Method) -> bool {
        self.graphs.contains_key(method)
    }

    /// The number of methods with a cached graph.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
