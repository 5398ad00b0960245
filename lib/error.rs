use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Fixpoint did not converge for `{method}`: node {node} visited {visited} times (limit {limit})")]
    NonConvergence {
        method: String,
        node: usize,
        visited: usize,
        limit: usize,
    },
    #[error("Invalid iterator policy: max_widen_iterations ({widen}) < max_join_iterations ({join})")]
    InvalidIteratorPolicy { join: usize, widen: usize },
    #[error("The graph vertex was not found: {0}")]
    GraphVertexNotFound(usize),
    #[error("The graph edge was not found: {0} -> {1}")]
    GraphEdgeNotFound(usize, usize),
    #[error("The control flow graph has no entry")]
    GraphEntryNotFound,
    #[error("Analysis of `{0}` was interrupted")]
    Interrupted(String),
    #[error("Analysis error: {0}")]
    Analysis(String),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

impl Error {
    /// Returns true if this error was raised by the non-convergence guard.
    pub fn is_non_convergence(&self) -> bool {
        matches!(self, Error::NonConvergence { .. })
    }
}
