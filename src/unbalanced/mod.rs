//! Unbalanced k-d trees built with the sliding-midpoint rule.
//!
//! Subtrees differ in size, so children cannot be found by position
//! arithmetic: the left child is the next node in the array and an explicit
//! field locates the right child. Three layouts share one build rule:
//! [`MidpointTree`] (reference), [`MidpointTreeOpt`] (packed nodes, hot-path
//! specialisations), and [`ExplicitBoundsTree`] (per-node cell extents).

mod explicit;
mod midpoint;
mod midpoint_opt;

pub use explicit::ExplicitBoundsTree;
pub use midpoint::MidpointTree;
pub use midpoint_opt::MidpointTreeOpt;

use crate::cloud::CloudView;
use crate::r#type::Scalar;
use crate::select;


/// Sentinel for "no right child" in the explicit-link layouts.
pub(crate) const INVALID_CHILD: u32 = u32::MAX;

/// A chosen split: dimension, cut value, and how many points go left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Cut<N> {
    pub(crate) dim: usize,
    pub(crate) value: N,
    pub(crate) left_count: usize,
}

/// Pick a sliding-midpoint cut for the cell `[min_values, max_values]` and
/// partition `indices` around it.
///
/// The cut is proposed at the midpoint of the longest cell side. If every
/// point lies on one side of it, the cut slides to the extremum of the
/// occupied side so that at least one point is isolated; neither subset is
/// ever empty. On return, `indices[..left_count]` hold coordinates `<= cut`
/// and `indices[left_count..]` hold coordinates `>= cut` along the cut
/// dimension.
pub(crate) fn sliding_midpoint<N: Scalar>(
    cloud: &CloudView<N>,
    indices: &mut [u32],
    min_values: &[N],
    max_values: &[N],
) -> Cut<N> {
    let count = indices.len();
    debug_assert!(count >= 2);

    let cd = select::widest_extent(min_values, max_values);
    let two = N::one() + N::one();
    let ideal = (min_values[cd] + max_values[cd]) / two;
    let (lo, hi) = select::bounds_along(cloud, indices, cd);
    let value = if ideal < lo {
        lo
    } else if ideal > hi {
        hi
    } else {
        ideal
    };

    let (br1, br2) = partition3(cloud, indices, cd, value);

    // br1 and br2 bracket the run of points equal to the cut; any split
    // inside the run respects the left <= cut <= right invariant, so take
    // the one closest to the middle, or isolate a single point when the cut
    // slid to an extremum.
    let left_count = if ideal < lo {
        1
    } else if ideal > hi {
        count - 1
    } else if br1 > count / 2 {
        br1
    } else if br2 < count / 2 {
        br2
    } else {
        count / 2
    };
    debug_assert!(left_count >= 1 && left_count < count);
    debug_assert!((br1..=br2).contains(&left_count));

    Cut {
        dim: cd,
        value,
        left_count,
    }
}

/// Three-way partition of `indices` along `d`: returns `(br1, br2)` such
/// that `[..br1]` is `< value`, `[br1..br2]` is `== value`, and `[br2..]` is
/// `> value`.
fn partition3<N: Scalar>(
    cloud: &CloudView<N>,
    indices: &mut [u32],
    d: usize,
    value: N,
) -> (usize, usize) {
    let mut br1 = 0;
    for i in 0..indices.len() {
        if cloud.coord(indices[i] as usize, d) < value {
            indices.swap(i, br1);
            br1 += 1;
        }
    }
    let mut br2 = br1;
    for i in br1..indices.len() {
        if cloud.coord(indices[i] as usize, d) == value {
            indices.swap(i, br2);
            br2 += 1;
        }
    }
    (br1, br2)
}
