use crate::analysis::{Domain, Environment, NodeId};
use crate::Error;

/// The per-node step of an analysis.
pub trait TransferFunction<D: Domain> {
    /// Given the current environment, compute the value flowing out of
    /// `node`.
    ///
    /// The result must depend only on `node` and what `environment` already
    /// encodes, or different schedules will reach different results. An
    /// `Err` aborts the run; hosts wanting cancellation check their flag here
    /// and return `Error::Interrupted`.
    fn analyze(&self, node: NodeId, environment: &Environment<D>) -> Result<D, Error>;
}

impl<D, F> TransferFunction<D> for F
where
    D: Domain,
    F: Fn(NodeId, &Environment<D>) -> Result<D, Error>,
{
    fn analyze(&self, node: NodeId, environment: &Environment<D>) -> Result<D, Error> {
        self(node, environment)
    }
}
