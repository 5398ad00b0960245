//! Abstractions/traits for an Abstract Domain

use std::fmt::Debug;

/// A lattice element the fixpoint engine computes over.
///
/// Implementations are trusted to be total and monotone. `widen` must
/// dominate `join` (`a.widen(b) ⊒ a.join(b)`) and must make every widening
/// chain stabilise after finitely many steps; the engine does not check
/// either property, and violating them is reported only indirectly, by the
/// non-convergence guard of the iterator.
pub trait Domain: Clone + Debug + PartialEq {
    /// Identifies the family of lattice elements, so a store can materialise
    /// top and bottom for nodes it has never touched (for example the bit
    /// width of a machine value).
    type Kind: Clone + Debug + PartialEq;

    /// The greatest element.
    fn top(kind: &Self::Kind) -> Self;

    /// The least element.
    fn bottom(kind: &Self::Kind) -> Self;

    /// Returns true if this element is the least element.
    fn is_bottom(&self) -> bool;

    /// Least upper bound of this element and `other`.
    fn join(&self, other: &Self) -> Self;

    /// Extrapolates this element with `other`.
    fn widen(&self, other: &Self) -> Self;

    /// Partial order induced by `join`.
    fn leq(&self, other: &Self) -> bool {
        self.join(other) == *other
    }
}
