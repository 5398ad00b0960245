//! Configuration and shared state for analysing many methods.

use crate::analysis::cache::{MethodGraphBuilder, MethodGraphCache};
use crate::analysis::call_context::{CallContext, CallContextHolder, CallContextScope};
use crate::analysis::fixed_point::{Schedule, WorkListFixpointIterator};
use crate::analysis::{AnalysisOptions, Domain, Environment, IteratorPolicy, NodeId, TransferFunction};
use crate::graph::ordering::{WeakPartialOrdering, WeakTopologicalOrdering};
use crate::Error;
use dashmap::DashMap;
use log::debug;
use rayon::prelude::*;
use std::any::Any;
use std::sync::Arc;

/// Receives diagnostics from analyses built on top of the engine.
///
/// The engine itself never reports anything.
pub trait Checker: Send + Sync {
    fn report(&self, method: &str, node: NodeId, message: &str);
}

/// Drops every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullChecker;

impl Checker for NullChecker {
    fn report(&self, _: &str, _: NodeId, _: &str) {}
}

/// Decides which callees an interprocedural analysis descends into.
pub trait MethodFilter<M>: Send + Sync {
    fn accept(&self, method: &M) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl<M> MethodFilter<M> for AcceptAll {
    fn accept(&self, _: &M) -> bool {
        true
    }
}

impl<M, F> MethodFilter<M> for F
where
    F: Fn(&M) -> bool + Send + Sync,
{
    fn accept(&self, method: &M) -> bool {
        self(method)
    }
}

/// Creates the summary of a method under a calling context.
///
/// Summaries are opaque to the engine; `AnalysisContext::summary` downcasts
/// them to the type the caller asks for.
pub trait SummaryFactory<M>: Send + Sync {
    fn create(&self, method: &M, signature: &str) -> Result<Arc<dyn Any + Send + Sync>, Error>;
}

type Summaries<M> = DashMap<(M, String), Arc<dyn Any + Send + Sync>>;

/// Everything the analyses of one run share: the iteration policy, the
/// collaborators, the interprocedural bounds and the method graph cache.
///
/// The configuration is fixed once the context is built. Only the caches grow.
pub struct AnalysisContext<B: MethodGraphBuilder> {
    policy: IteratorPolicy,
    checker: Arc<dyn Checker>,
    method_filter: Arc<dyn MethodFilter<B::Method>>,
    summary_factory: Option<Arc<dyn SummaryFactory<B::Method>>>,
    max_recursion_depth: Option<usize>,
    call_string_length: usize,
    cache: MethodGraphCache<B>,
    summaries: Summaries<B::Method>,
}

impl<B: MethodGraphBuilder> AnalysisContext<B>
where
    B::Method: 'static,
{
    /// Create a context with the default options.
    pub fn new(builder: B) -> AnalysisContext<B> {
        AnalysisContext::from_options(builder, &AnalysisOptions::default())
    }

    pub fn from_options(builder: B, options: &AnalysisOptions) -> AnalysisContext<B> {
        AnalysisContext {
            policy: options.policy(),
            checker: Arc::new(NullChecker),
            method_filter: Arc::new(AcceptAll),
            summary_factory: None,
            max_recursion_depth: options.max_recursion_depth(),
            call_string_length: options.call_string_length(),
            cache: MethodGraphCache::new(builder),
            summaries: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: IteratorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_checker<C: Checker + 'static>(mut self, checker: C) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    pub fn with_method_filter<F: MethodFilter<B::Method> + 'static>(mut self, filter: F) -> Self {
        self.method_filter = Arc::new(filter);
        self
    }

    pub fn with_summary_factory<F: SummaryFactory<B::Method> + 'static>(
        mut self,
        factory: F,
    ) -> Self {
        self.summary_factory = Some(Arc::new(factory));
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = Some(depth);
        self
    }

    pub fn with_call_string_length(mut self, k: usize) -> Self {
        self.call_string_length = k;
        self
    }

    pub fn policy(&self) -> IteratorPolicy {
        self.policy
    }

    pub fn checker(&self) -> &dyn Checker {
        self.checker.as_ref()
    }

    pub fn max_recursion_depth(&self) -> Option<usize> {
        self.max_recursion_depth
    }

    pub fn call_string_length(&self) -> usize {
        self.call_string_length
    }

    pub fn cache(&self) -> &MethodGraphCache<B> {
        &self.cache
    }

    pub fn graph(&self, method: &B::Method) -> Result<Arc<B::Graph>, Error> {
        self.cache.get_or_compute_graph(method)
    }

    pub fn wto(&self, method: &B::Method) -> Result<Arc<WeakTopologicalOrdering>, Error> {
        self.cache.get_or_compute_wto(method)
    }

    pub fn wpo(&self, method: &B::Method) -> Result<Arc<WeakPartialOrdering>, Error> {
        self.cache.get_or_compute_wpo(method)
    }

    /// Compute the fixpoint of `transfer` over the graph of `method`.
    ///
    /// The run starts from an empty environment over `kind`, and unbound
    /// successors are combined from `seed`.
    pub fn analyze<T, D>(
        &self,
        method: &B::Method,
        transfer: &T,
        seed: D,
        kind: D::Kind,
    ) -> Result<Environment<D>, Error>
    where
        T: TransferFunction<D>,
        D: Domain,
    {
        self.run(method, transfer, seed, kind, Schedule::Fifo)
    }

    /// As `analyze`, processing nodes in the weak topological order of the
    /// method's graph.
    pub fn analyze_ordered<T, D>(
        &self,
        method: &B::Method,
        transfer: &T,
        seed: D,
        kind: D::Kind,
    ) -> Result<Environment<D>, Error>
    where
        T: TransferFunction<D>,
        D: Domain,
    {
        let wto = self.wto(method)?;
        self.run(method, transfer, seed, kind, Schedule::from_wto(&wto))
    }

    fn run<T, D>(
        &self,
        method: &B::Method,
        transfer: &T,
        seed: D,
        kind: D::Kind,
        schedule: Schedule,
    ) -> Result<Environment<D>, Error>
    where
        T: TransferFunction<D>,
        D: Domain,
    {
        let graph = self.graph(method)?;
        let result = WorkListFixpointIterator::new(
            graph.as_ref(),
            transfer,
            self.policy,
            Environment::new(kind),
            seed,
        )
        .with_method(method.to_string())
        .with_schedule(schedule)
        .run();

        if let Err(ref e) = result {
            debug!("analysis of {} failed: {}", method, e);
        }
        result
    }

    /// Analyse independent methods in parallel.
    ///
    /// `transfer_for` creates the transfer function of each method. Every run
    /// owns its environment; only the graph cache is shared. Results come
    /// back in the order of `methods`.
    pub fn par_analyze<F, T, D>(
        &self,
        methods: &[B::Method],
        seed: &D,
        kind: &D::Kind,
        transfer_for: F,
    ) -> Vec<(B::Method, Result<Environment<D>, Error>)>
    where
        F: Fn(&B::Method) -> T + Sync,
        T: TransferFunction<D>,
        D: Domain + Send + Sync,
        D::Kind: Send + Sync,
    {
        methods
            .par_iter()
            .map(|method| {
                let transfer = transfer_for(method);
                let result = self.analyze(method, &transfer, seed.clone(), kind.clone());
                (method.clone(), result)
            })
            .collect()
    }

    /// Whether an interprocedural analysis should descend into `callee`
    /// under `call_context`.
    pub fn should_expand<A>(&self, callee: &B::Method, call_context: &CallContext<A>) -> bool {
        if !self.method_filter.accept(callee) {
            return false;
        }
        match self.max_recursion_depth {
            Some(max) => call_context.depth() < max,
            None => true,
        }
    }

    /// Follow a call edge out of `caller`, analysed under `call_context`.
    ///
    /// Returns the callee's context, with the signature bounded by the
    /// configured call string length, and a scope making it the thread's
    /// current context until dropped.
    pub fn enter_call<A: Clone + 'static>(
        &self,
        call_context: &CallContext<A>,
        caller: &B::Method,
        actual_args: Option<Vec<A>>,
    ) -> (CallContext<A>, CallContextScope) {
        let callee_context =
            call_context.push(caller.to_string(), self.call_string_length, actual_args);
        let scope = CallContextHolder::set(callee_context.clone());
        (callee_context, scope)
    }

    /// The summary of `method` under the context `signature`, created on
    /// first request.
    ///
    /// Returns `None` when no summary factory is configured.
    ///
    /// # Errors
    /// * Any error of the factory.
    /// * `Error::Analysis` when the summary is not an `S`.
    pub fn summary<S: Any + Send + Sync>(
        &self,
        method: &B::Method,
        signature: &str,
    ) -> Result<Option<Arc<S>>, Error> {
        let factory = match self.summary_factory {
            Some(ref factory) => factory,
            None => return Ok(None),
        };

        let key = (method.clone(), signature.to_string());
        let summary = match self.summaries.get(&key) {
            Some(summary) => Arc::clone(summary.value()),
            None => {
                let summary = factory.create(method, signature)?;
                Arc::clone(self.summaries.entry(key).or_insert(summary).value())
            }
        };

        summary.downcast::<S>().map(Some).map_err(|_| {
            Error::Analysis(format!(
                "summary of {} [{}] has an unexpected type",
                method, signature
            ))
        })
    }
}
