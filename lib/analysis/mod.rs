//! The fixpoint engine: abstract domains, environments, the worklist
//! iterator, and the shared state of interprocedural analyses.

pub mod cache;
pub mod call_context;
pub mod context;
mod domain;
mod environment;
pub mod fixed_point;
mod node_state;
pub mod observer;
mod policy;
mod transfer;

#[cfg(test)]
mod test_lattice;

/// Identifies a node of the graph being analysed.
pub type NodeId = usize;

pub use self::cache::{MethodGraphBuilder, MethodGraphCache};
pub use self::call_context::{
    build_k_cfa_signature, CallContext, CallContextHolder, CallContextScope,
};
pub use self::context::{
    AcceptAll, AnalysisContext, Checker, MethodFilter, NullChecker, SummaryFactory,
};
pub use self::domain::Domain;
pub use self::environment::{Environment, EnvironmentKind};
pub use self::fixed_point::{fixed_point, Fixpoint, Schedule, WorkListFixpointIterator};
pub use self::node_state::{NodeState, VisitTable};
pub use self::observer::{FixpointObserver, LogObserver, NullObserver};
pub use self::policy::{AnalysisOptions, AnalysisOptionsBuilder, IteratorPolicy};
pub use self::transfer::TransferFunction;
