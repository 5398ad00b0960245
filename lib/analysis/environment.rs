//! The store mapping graph nodes to abstract values.

use crate::analysis::Domain;
use crate::analysis::NodeId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The overall state of an `Environment`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum EnvironmentKind {
    /// No information yet.
    Top,
    /// Unreachable, or a contradiction was derived.
    Bot,
    /// At least one explicit binding exists.
    Val,
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EnvironmentKind::Top => write!(f, "TOP"),
            EnvironmentKind::Bot => write!(f, "BOT"),
            EnvironmentKind::Val => write!(f, "VAL"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Bindings<D> {
    Top,
    Bottom,
    Values(FxHashMap<NodeId, D>),
}

/// Maps graph nodes to domain values.
///
/// Unbound nodes answer `D::top`. Binding any node to bottom collapses the
/// whole environment to `Bottom`, which absorbs every later `set`.
#[derive(Clone, Debug, PartialEq)]
pub struct Environment<D: Domain> {
    kind: D::Kind,
    bindings: Bindings<D>,
}

impl<D: Domain> Environment<D> {
    /// Create a new, `Top`, environment over the domain family `kind`.
    pub fn new(kind: D::Kind) -> Environment<D> {
        Environment {
            kind,
            bindings: Bindings::Top,
        }
    }

    /// The domain family this environment materialises values for.
    pub fn domain_kind(&self) -> &D::Kind {
        &self.kind
    }

    pub fn kind(&self) -> EnvironmentKind {
        match self.bindings {
            Bindings::Top => EnvironmentKind::Top,
            Bindings::Bottom => EnvironmentKind::Bot,
            Bindings::Values(_) => EnvironmentKind::Val,
        }
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self.bindings, Bindings::Bottom)
    }

    /// Retrieve the value of `node`.
    ///
    /// Returns `None` once the environment is `Bottom`: nothing further can
    /// be derived from it.
    pub fn get(&self, node: NodeId) -> Option<D> {
        match self.bindings {
            Bindings::Top => Some(D::top(&self.kind)),
            Bindings::Bottom => None,
            Bindings::Values(ref values) => Some(
                values
                    .get(&node)
                    .cloned()
                    .unwrap_or_else(|| D::top(&self.kind)),
            ),
        }
    }

    /// Retrieve the explicit binding of `node`, if there is one.
    pub fn binding(&self, node: NodeId) -> Option<&D> {
        match self.bindings {
            Bindings::Values(ref values) => values.get(&node),
            Bindings::Top | Bindings::Bottom => None,
        }
    }

    /// Bind `node` to `value`.
    pub fn set(&mut self, node: NodeId, value: D) -> &mut Self {
        if self.is_bottom() {
            return self;
        }
        if value.is_bottom() {
            self.bindings = Bindings::Bottom;
            return self;
        }
        match self.bindings {
            Bindings::Values(ref mut values) => {
                values.insert(node, value);
            }
            Bindings::Top | Bindings::Bottom => {
                let mut values = FxHashMap::default();
                values.insert(node, value);
                self.bindings = Bindings::Values(values);
            }
        }
        self
    }

    /// Drop every binding, returning to `Top`.
    pub fn reset(&mut self) {
        self.bindings = Bindings::Top;
    }

    /// The number of explicit bindings.
    pub fn size(&self) -> usize {
        match self.bindings {
            Bindings::Values(ref values) => values.len(),
            Bindings::Top | Bindings::Bottom => 0,
        }
    }

    /// Iterate over the explicit bindings, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &D)> {
        let values = match self.bindings {
            Bindings::Values(ref values) => Some(values),
            Bindings::Top | Bindings::Bottom => None,
        };
        values
            .into_iter()
            .flat_map(|values| values.iter().map(|(node, value)| (*node, value)))
    }
}
