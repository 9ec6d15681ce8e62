//! Build-time utilities: single-axis selection and spread scans over a
//! working array of cloud indices.

use std::cmp::Ordering;

use crate::cloud::CloudView;
use crate::r#type::Scalar;

/// Order two cloud points along one dimension, falling back to the index so
/// the order is total and builds are deterministic.
#[inline]
fn cmp_along<N: Scalar>(cloud: &CloudView<N>, d: usize, a: u32, b: u32) -> Ordering {
    // We don't allow NaN. This should only panic on NaN.
    cloud
        .coord(a as usize, d)
        .partial_cmp(&cloud.coord(b as usize, d))
        .unwrap()
        .then_with(|| a.cmp(&b))
}

/// Reorder `indices` so the entry at `n` is the one a full (coordinate,
/// index) sort along `d` would place there, with smaller entries before it
/// and larger after.
pub(crate) fn select_nth_by_dim<N: Scalar>(
    cloud: &CloudView<N>,
    indices: &mut [u32],
    n: usize,
    d: usize,
) {
    indices.select_nth_unstable_by(n, |&a, &b| cmp_along(cloud, d, a, b));
}

/// Minimum and maximum coordinate of a point subset along one dimension,
/// computed in a single pass.
pub(crate) fn bounds_along<N: Scalar>(cloud: &CloudView<N>, indices: &[u32], d: usize) -> (N, N) {
    let mut lo = N::infinity();
    let mut hi = N::neg_infinity();
    for &index in indices {
        let v = cloud.coord(index as usize, d);
        if v < lo {
            lo = v;
        }
        if v > hi {
            hi = v;
        }
    }
    (lo, hi)
}

/// Dimension of largest spread over a point subset; ties resolve toward the
/// lower dimension number.
pub(crate) fn widest_dim<N: Scalar>(cloud: &CloudView<N>, indices: &[u32]) -> usize {
    let mut best = 0;
    let mut best_spread = N::neg_infinity();
    for d in 0..cloud.dim() {
        let (lo, hi) = bounds_along(cloud, indices, d);
        let spread = hi - lo;
        if spread > best_spread {
            best_spread = spread;
            best = d;
        }
    }
    best
}

/// Longest side of an axis-aligned cell; ties resolve toward the lower
/// dimension number.
pub(crate) fn widest_extent<N: Scalar>(min_values: &[N], max_values: &[N]) -> usize {
    debug_assert_eq!(min_values.len(), max_values.len());
    let mut best = 0;
    let mut best_extent = N::neg_infinity();
    for (d, (&lo, &hi)) in min_values.iter().zip(max_values).enumerate() {
        let extent = hi - lo;
        if extent > best_extent {
            best_extent = extent;
            best = d;
        }
    }
    best
}
