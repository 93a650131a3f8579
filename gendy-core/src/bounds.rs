//! Range corrections for random walks.
//!
//! Both corrections run exactly one pass: a step that overshoots by more than the
//! width of the range is *not* folded back again. Breakpoint walkers rely on this,
//! so the occasional out-of-range value after a large Cauchy step is expected.

use num_traits::Float;

/// Jump to the opposite bound when `x` leaves `[lb, ub]`.
#[inline]
pub fn wrap<T: Float>(x: T, lb: T, ub: T) -> T {
    if x > ub { lb } else if x < lb { ub } else { x }
}

/// Reflect `x` once about the bound it crossed.
#[inline]
pub fn mirror<T: Float>(x: T, lb: T, ub: T) -> T {
    if x > ub {
        ub - (x - ub)
    } else if x < lb {
        lb + (lb - x)
    } else {
        x
    }
}

/// Which correction a walker applies after each step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BoundPolicy {
    #[default]
    Wrap,
    Mirror,
}

impl BoundPolicy {
    /// `true` selects mirroring, `false` wrapping.
    #[inline]
    pub fn from_mirroring(mirroring: bool) -> Self {
        if mirroring { Self::Mirror } else { Self::Wrap }
    }

    #[inline]
    pub fn apply<T: Float>(self, x: T, lb: T, ub: T) -> T {
        match self {
            Self::Wrap => wrap(x, lb, ub),
            Self::Mirror => mirror(x, lb, ub),
        }
    }
}
