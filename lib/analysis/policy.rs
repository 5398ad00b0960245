//! Iteration limits and the options an analysis context is configured with.

use crate::Error;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_JOIN_ITERATIONS: usize = 10;
const DEFAULT_MAX_WIDEN_ITERATIONS: usize = 10;
const DEFAULT_CALL_STRING_LENGTH: usize = 1;

/// When to stop joining and start widening, and when to give up.
///
/// A successor visited fewer than `max_join_iterations` times is updated with
/// `join`, otherwise with `widen`. A node whose visit count exceeds
/// `max_widen_iterations` fails the run.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "RawIteratorPolicy")]
pub struct IteratorPolicy {
    max_join_iterations: usize,
    max_widen_iterations: usize,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawIteratorPolicy {
    max_join_iterations: usize,
    max_widen_iterations: usize,
}

impl Default for RawIteratorPolicy {
    fn default() -> RawIteratorPolicy {
        RawIteratorPolicy {
            max_join_iterations: DEFAULT_MAX_JOIN_ITERATIONS,
            max_widen_iterations: DEFAULT_MAX_WIDEN_ITERATIONS,
        }
    }
}

impl TryFrom<RawIteratorPolicy> for IteratorPolicy {
    type Error = Error;

    fn try_from(raw: RawIteratorPolicy) -> Result<IteratorPolicy, Error> {
        IteratorPolicy::new(raw.max_join_iterations, raw.max_widen_iterations)
    }
}

impl IteratorPolicy {
    /// Create a new policy.
    ///
    /// # Errors
    /// `Error::InvalidIteratorPolicy` if `max_widen_iterations` is smaller
    /// than `max_join_iterations`.
    pub fn new(
        max_join_iterations: usize,
        max_widen_iterations: usize,
    ) -> Result<IteratorPolicy, Error> {
        if max_widen_iterations < max_join_iterations {
            return Err(Error::InvalidIteratorPolicy {
                join: max_join_iterations,
                widen: max_widen_iterations,
            });
        }
        Ok(IteratorPolicy {
            max_join_iterations,
            max_widen_iterations,
        })
    }

    pub fn max_join_iterations(&self) -> usize {
        self.max_join_iterations
    }

    pub fn max_widen_iterations(&self) -> usize {
        self.max_widen_iterations
    }

    /// Whether a successor visited `visited` times is updated with `widen`.
    pub fn use_widen(&self, visited: usize) -> bool {
        visited >= self.max_join_iterations
    }

    /// Whether a node visited `visited` times exceeds the budget.
    pub fn exceeded(&self, visited: usize) -> bool {
        visited > self.max_widen_iterations
    }
}

impl Default for IteratorPolicy {
    fn default() -> IteratorPolicy {
        IteratorPolicy {
            max_join_iterations: DEFAULT_MAX_JOIN_ITERATIONS,
            max_widen_iterations: DEFAULT_MAX_WIDEN_ITERATIONS,
        }
    }
}

/// Options an `AnalysisContext` is created with.
///
/// Deserialises from JSON; every field is optional.
///
/// ```json
/// {
///     "policy": { "max_join_iterations": 3, "max_widen_iterations": 12 },
///     "max_recursion_depth": 8,
///     "call_string_length": 2
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AnalysisOptions {
    policy: IteratorPolicy,
    max_recursion_depth: Option<usize>,
    call_string_length: usize,
}

impl Default for AnalysisOptions {
    fn default() -> AnalysisOptions {
        AnalysisOptions {
            policy: IteratorPolicy::default(),
            max_recursion_depth: None,
            call_string_length: DEFAULT_CALL_STRING_LENGTH,
        }
    }
}

impl AnalysisOptions {
    /// Create a new set of options with the default settings.
    pub fn new() -> AnalysisOptions {
        AnalysisOptions::default()
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<AnalysisOptions, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// The iteration limits of every fixpoint run.
    pub fn policy(&self) -> IteratorPolicy {
        self.policy
    }

    /// How deep an interprocedural call chain may grow, if bounded.
    pub fn max_recursion_depth(&self) -> Option<usize> {
        self.max_recursion_depth
    }

    /// The `k` of the k-CFA call strings.
    pub fn call_string_length(&self) -> usize {
        self.call_string_length
    }
}

/// Create your options with the builder pattern.
pub struct AnalysisOptionsBuilder {
    options: AnalysisOptions,
}

impl AnalysisOptionsBuilder {
    pub fn new() -> AnalysisOptionsBuilder {
        AnalysisOptionsBuilder {
            options: AnalysisOptions::default(),
        }
    }

    pub fn policy(mut self, policy: IteratorPolicy) -> AnalysisOptionsBuilder {
        self.options.policy = policy;
        self
    }

    pub fn max_recursion_depth(mut self, depth: usize) -> AnalysisOptionsBuilder {
        self.options.max_recursion_depth = Some(depth);
        self
    }

    pub fn call_string_length(mut self, k: usize) -> AnalysisOptionsBuilder {
        self.options.call_string_length = k;
        self
    }

    pub fn build(self) -> AnalysisOptions {
        self.options
    }
}

impl Default for AnalysisOptionsBuilder {
    fn default() -> AnalysisOptionsBuilder {
        AnalysisOptionsBuilder::new()
    }
}
