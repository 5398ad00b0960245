//! Diagnostic hooks into a fixpoint run.
//!
//! Observers see every intermediate value but have no way to influence the
//! run.

use crate::analysis::{Domain, NodeId};
use log::trace;

/// Receives the events of a fixpoint run. Every hook defaults to a no-op.
pub trait FixpointObserver<D: Domain> {
    /// `node` was processed for the `visited`th time and produced `domain`.
    fn node_processed(&mut self, _method: &str, _node: NodeId, _visited: usize, _domain: &D) {}

    /// The value bound to `node` changed through `join`.
    fn joined(&mut self, _method: &str, _node: NodeId, _before: &D, _after: &D) {}

    /// The value bound to `node` changed through `widen`.
    fn widened(&mut self, _method: &str, _node: NodeId, _before: &D, _after: &D) {}

    /// Binding `node` collapsed the environment to bottom.
    fn bottom_reached(&mut self, _method: &str, _node: NodeId) {}
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl<D: Domain> FixpointObserver<D> for NullObserver {}

/// Emits every event as a `trace` log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl<D: Domain> FixpointObserver<D> for LogObserver {
    fn node_processed(&mut self, method: &str, node: NodeId, visited: usize, domain: &D) {
        trace!("{}: node={} visited={} out={:?}", method, node, visited, domain);
    }

    fn joined(&mut self, method: &str, node: NodeId, before: &D, after: &D) {
        trace!("{}: join node={} {:?} -> {:?}", method, node, before, after);
    }

    fn widened(&mut self, method: &str, node: NodeId, before: &D, after: &D) {
        trace!("{}: widen node={} {:?} -> {:?}", method, node, before, after);
    }

    fn bottom_reached(&mut self, method: &str, node: NodeId) {
        trace!("{}: node={} is bottom, environment collapsed", method, node);
    }
}
