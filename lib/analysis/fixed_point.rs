//! The worklist fixpoint iterator.
//!
//! Every node starts on the worklist. Processing a node applies the transfer
//! function to the current environment and pushes the result into each
//! successor's binding, with `join` while the successor has been visited
//! fewer than `max_join_iterations` times and with `widen` afterwards.
//! Successors whose binding changed are queued again. The run ends when the
//! worklist drains, and fails when a node is visited more than
//! `max_widen_iterations` times.

use crate::analysis::observer::{FixpointObserver, LogObserver};
use crate::analysis::{Domain, Environment, IteratorPolicy, NodeId, TransferFunction, VisitTable};
use crate::graph::ordering::WeakTopologicalOrdering;
use crate::graph::FlowGraph;
use crate::Error;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

const ANONYMOUS_METHOD: &str = "<anonymous>";

/// The order in which pending nodes are processed.
///
/// Any schedule reaches a fixpoint; a good one reaches it in fewer steps.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Schedule {
    /// First in, first out, seeded in the graph's enumeration order.
    #[default]
    Fifo,
    /// Lowest rank first, the rank of a node being its position in the
    /// given order. Nodes missing from the order come last.
    Ordered(Vec<NodeId>),
}

impl Schedule {
    /// Prioritise nodes by their position in a weak topological ordering.
    pub fn from_wto(wto: &WeakTopologicalOrdering) -> Schedule {
        Schedule::Ordered(wto.flatten())
    }
}

enum WorkList {
    Fifo(VecDeque<NodeId>),
    Ordered {
        heap: BinaryHeap<Reverse<(usize, NodeId)>>,
        rank: FxHashMap<NodeId, usize>,
    },
}

struct PendingWorkList {
    list: WorkList,
    pending: FxHashSet<NodeId>,
}

impl PendingWorkList {
    fn new(schedule: &Schedule) -> PendingWorkList {
        let list = match *schedule {
            Schedule::Fifo => WorkList::Fifo(VecDeque::new()),
            Schedule::Ordered(ref order) => WorkList::Ordered {
                heap: BinaryHeap::new(),
                rank: order
                    .iter()
                    .enumerate()
                    .map(|(rank, node)| (*node, rank))
                    .collect(),
            },
        };
        PendingWorkList {
            list,
            pending: FxHashSet::default(),
        }
    }

    fn push(&mut self, node: NodeId) {
        if !self.pending.insert(node) {
            return;
        }
        match self.list {
            WorkList::Fifo(ref mut queue) => queue.push_back(node),
            WorkList::Ordered {
                ref mut heap,
                ref rank,
            } => {
                let rank = rank.get(&node).cloned().unwrap_or(usize::MAX);
                heap.push(Reverse((rank, node)));
            }
        }
    }

    fn pop(&mut self) -> Option<NodeId> {
        let node = match self.list {
            WorkList::Fifo(ref mut queue) => queue.pop_front(),
            WorkList::Ordered { ref mut heap, .. } => heap.pop().map(|Reverse((_, node))| node),
        }?;
        self.pending.remove(&node);
        Some(node)
    }
}

/// The result of a successful run.
#[derive(Clone, Debug)]
pub struct Fixpoint<D: Domain> {
    environment: Environment<D>,
    visits: VisitTable<D>,
    steps: usize,
}

impl<D: Domain> Fixpoint<D> {
    /// The stable environment.
    pub fn environment(&self) -> &Environment<D> {
        &self.environment
    }

    /// How often each node was processed, and its last output.
    pub fn visits(&self) -> &VisitTable<D> {
        &self.visits
    }

    /// The number of transfer function applications.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn into_environment(self) -> Environment<D> {
        self.environment
    }
}

/// Drives a transfer function over a graph to a fixpoint.
///
/// A run is single-threaded and owns its environment. It consumes the
/// iterator, so the environment of a failed run can never be observed.
pub struct WorkListFixpointIterator<'a, G, T, D: Domain> {
    graph: &'a G,
    transfer: &'a T,
    policy: IteratorPolicy,
    environment: Environment<D>,
    seed: D,
    method: String,
    schedule: Schedule,
    observer: Box<dyn FixpointObserver<D> + 'a>,
}

impl<'a, G, T, D> WorkListFixpointIterator<'a, G, T, D>
where
    G: FlowGraph,
    T: TransferFunction<D>,
    D: Domain + 'a,
{
    /// Create an iterator.
    ///
    /// * `environment` - The starting environment. Usually empty, but hosts
    ///   may pre-bind, for example, the input of the entry node.
    /// * `seed` - The value an unbound successor is combined from when it is
    ///   first reached, usually `D::bottom`.
    pub fn new(
        graph: &'a G,
        transfer: &'a T,
        policy: IteratorPolicy,
        environment: Environment<D>,
        seed: D,
    ) -> WorkListFixpointIterator<'a, G, T, D> {
        WorkListFixpointIterator {
            graph,
            transfer,
            policy,
            environment,
            seed,
            method: ANONYMOUS_METHOD.to_string(),
            schedule: Schedule::Fifo,
            observer: Box::new(LogObserver),
        }
    }

    /// Name the method being analysed, for diagnostics.
    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_observer<O: FixpointObserver<D> + 'a>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Run to a fixpoint and return the stable environment.
    pub fn run(self) -> Result<Environment<D>, Error> {
        self.solve().map(Fixpoint::into_environment)
    }

    /// Run to a fixpoint and return the environment with run statistics.
    ///
    /// # Errors
    /// * `Error::NonConvergence` when a node is visited more than
    ///   `max_widen_iterations` times. The guard is checked as soon as the
    ///   visit is counted, before the transfer function runs.
    /// * Any error of the transfer function, or of the graph when a successor
    ///   is not one of its nodes.
    pub fn solve(self) -> Result<Fixpoint<D>, Error> {
        let WorkListFixpointIterator {
            graph,
            transfer,
            policy,
            mut environment,
            seed,
            method,
            schedule,
            mut observer,
        } = self;

        let nodes = graph.node_ids();
        let node_set: FxHashSet<NodeId> = nodes.iter().cloned().collect();

        // Fetch every successor list once, so we don't have to look them up
        // all the time.
        let mut successors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for &node in &nodes {
            let node_successors = graph.successor_ids(node)?;
            if let Some(missing) = node_successors.iter().find(|s| !node_set.contains(s)) {
                return Err(Error::GraphVertexNotFound(*missing));
            }
            successors.insert(node, node_successors);
        }

        let mut visits = VisitTable::new();
        let mut steps = 0;

        if environment.is_bottom() {
            debug!("{}: environment is bottom before iteration", method);
            return Ok(Fixpoint {
                environment,
                visits,
                steps,
            });
        }

        let mut worklist = PendingWorkList::new(&schedule);
        for &node in &nodes {
            worklist.push(node);
        }

        while let Some(node) = worklist.pop() {
            let visited = visits.visit(node);
            if policy.exceeded(visited) {
                debug!(
                    "{}: node {} exceeded {} visits",
                    method,
                    node,
                    policy.max_widen_iterations()
                );
                return Err(Error::NonConvergence {
                    method,
                    node,
                    visited,
                    limit: policy.max_widen_iterations(),
                });
            }

            steps += 1;
            let out = transfer.analyze(node, &environment)?;
            observer.node_processed(&method, node, visited, &out);

            for &successor in &successors[&node] {
                let old = environment
                    .binding(successor)
                    .cloned()
                    .unwrap_or_else(|| seed.clone());

                let widen = policy.use_widen(visits.visited(successor));
                let updated = if widen {
                    old.widen(&out)
                } else {
                    old.join(&out)
                };

                if updated == old {
                    continue;
                }

                if widen {
                    observer.widened(&method, successor, &old, &updated);
                } else {
                    observer.joined(&method, successor, &old, &updated);
                }

                environment.set(successor, updated);
                if environment.is_bottom() {
                    observer.bottom_reached(&method, successor);
                    debug!("{}: environment collapsed to bottom at {}", method, successor);
                    visits.record(node, out);
                    return Ok(Fixpoint {
                        environment,
                        visits,
                        steps,
                    });
                }

                worklist.push(successor);
            }

            visits.record(node, out);
        }

        debug!("{}: fixpoint reached after {} steps", method, steps);

        Ok(Fixpoint {
            environment,
            visits,
            steps,
        })
    }
}

/// Compute a fixpoint with the default policy, starting from an empty
/// environment and seeding successors with bottom.
pub fn fixed_point<G, T, D>(graph: &G, transfer: &T, kind: D::Kind) -> Result<Environment<D>, Error>
where
    G: FlowGraph,
    T: TransferFunction<D>,
    D: Domain,
{
    let seed = D::bottom(&kind);
    WorkListFixpointIterator::new(
        graph,
        transfer,
        IteratorPolicy::default(),
        Environment::new(kind),
        seed,
    )
    .run()
}
