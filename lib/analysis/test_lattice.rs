//! Small lattices used across the tests.

use crate::analysis::Domain;
use proptest::prelude::*;

/// The flat constant lattice.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Flat {
    Top,
    Const(i64),
    Bottom,
}

impl Domain for Flat {
    type Kind = ();

    fn top(_: &()) -> Flat {
        Flat::Top
    }

    fn bottom(_: &()) -> Flat {
        Flat::Bottom
    }

    fn is_bottom(&self) -> bool {
        *self == Flat::Bottom
    }

    fn join(&self, other: &Flat) -> Flat {
        match (self, other) {
            (Flat::Bottom, _) => other.clone(),
            (_, Flat::Bottom) => self.clone(),
            (Flat::Const(lhs), Flat::Const(rhs)) if lhs == rhs => self.clone(),
            _ => Flat::Top,
        }
    }

    fn widen(&self, other: &Flat) -> Flat {
        self.join(other)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl Bound {
    fn add(self, n: i64) -> Bound {
        match self {
            Bound::Finite(value) => Bound::Finite(value.saturating_add(n)),
            infinite => infinite,
        }
    }
}

/// Integer intervals, widening unstable bounds to infinity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Interval {
    Bottom,
    Range(Bound, Bound),
}

impl Interval {
    pub fn constant(value: i64) -> Interval {
        Interval::Range(Bound::Finite(value), Bound::Finite(value))
    }

    pub fn add(self, n: i64) -> Interval {
        match self {
            Interval::Bottom => Interval::Bottom,
            Interval::Range(lo, hi) => Interval::Range(lo.add(n), hi.add(n)),
        }
    }
}

impl Domain for Interval {
    type Kind = ();

    fn top(_: &()) -> Interval {
        Interval::Range(Bound::NegInf, Bound::PosInf)
    }

    fn bottom(_: &()) -> Interval {
        Interval::Bottom
    }

    fn is_bottom(&self) -> bool {
        *self == Interval::Bottom
    }

    fn join(&self, other: &Interval) -> Interval {
        match (*self, *other) {
            (Interval::Bottom, _) => *other,
            (_, Interval::Bottom) => *self,
            (Interval::Range(lo, hi), Interval::Range(other_lo, other_hi)) => {
                Interval::Range(lo.min(other_lo), hi.max(other_hi))
            }
        }
    }

    fn widen(&self, other: &Interval) -> Interval {
        match (*self, *other) {
            (Interval::Bottom, _) => *other,
            (_, Interval::Bottom) => *self,
            (Interval::Range(lo, hi), Interval::Range(other_lo, other_hi)) => {
                let lo = if other_lo < lo { Bound::NegInf } else { lo };
                let hi = if other_hi > hi { Bound::PosInf } else { hi };
                Interval::Range(lo, hi)
            }
        }
    }
}

/// A lattice whose widening never stabilises: every widen produces a new,
/// strictly greater, level.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Runaway {
    Bottom,
    Level(u64),
}

impl Runaway {
    fn level(self) -> u64 {
        match self {
            Runaway::Bottom => 0,
            Runaway::Level(level) => level,
        }
    }

    pub fn next(self) -> Runaway {
        Runaway::Level(self.level() + 1)
    }
}

impl Domain for Runaway {
    type Kind = ();

    fn top(_: &()) -> Runaway {
        Runaway::Level(u64::MAX)
    }

    fn bottom(_: &()) -> Runaway {
        Runaway::Bottom
    }

    fn is_bottom(&self) -> bool {
        *self == Runaway::Bottom
    }

    fn join(&self, other: &Runaway) -> Runaway {
        if self.level() >= other.level() {
            *self
        } else {
            *other
        }
    }

    fn widen(&self, other: &Runaway) -> Runaway {
        Runaway::Level(self.level().max(other.level()) + 1)
    }
}

fn flat() -> impl Strategy<Value = Flat> {
    prop_oneof![
        Just(Flat::Top),
        Just(Flat::Bottom),
        (-3i64..3).prop_map(Flat::Const),
    ]
}

fn bound() -> impl Strategy<Value = Bound> {
    prop_oneof![
        Just(Bound::NegInf),
        Just(Bound::PosInf),
        (-20i64..20).prop_map(Bound::Finite),
    ]
}

fn interval() -> impl Strategy<Value = Interval> {
    prop_oneof![
        1 => Just(Interval::Bottom),
        4 => (bound(), bound()).prop_map(|(a, b)| Interval::Range(a.min(b), a.max(b))),
    ]
}

fn check_laws<D: Domain>(a: &D, b: &D) -> Result<(), TestCaseError> {
    let joined = a.join(b);
    prop_assert_eq!(a.join(a), a.clone());
    prop_assert_eq!(joined.join(b), joined.clone());
    prop_assert_eq!(&joined, &b.join(a));
    prop_assert!(a.leq(&joined));
    prop_assert!(b.leq(&joined));
    prop_assert!(joined.leq(&a.widen(b)));
    Ok(())
}

proptest! {
    #[test]
    fn flat_lattice_laws(a in flat(), b in flat()) {
        check_laws(&a, &b)?;
    }

    #[test]
    fn interval_lattice_laws(a in interval(), b in interval()) {
        check_laws(&a, &b)?;
    }

    #[test]
    fn interval_widening_is_idempotent(a in interval(), b in interval()) {
        let widened = a.widen(&b);
        prop_assert_eq!(widened.widen(&b), widened);
    }
}

#[test]
fn bottom_is_the_join_identity() {
    assert_eq!(Flat::Bottom.join(&Flat::Const(2)), Flat::Const(2));
    assert_eq!(
        Interval::constant(3).join(&Interval::Bottom),
        Interval::constant(3)
    );
    assert!(Flat::bottom(&()).leq(&Flat::top(&())));
}

#[test]
fn interval_widening_jumps_to_infinity() {
    let widened = Interval::constant(0).widen(&Interval::constant(1));

    assert_eq!(
        widened,
        Interval::Range(Bound::Finite(0), Bound::PosInf)
    );
}
