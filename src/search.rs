//! The common search interface: option flags, visit statistics, the
//! [`NearestNeighbor`] capability trait, and the [`SearchKind`] factory.

use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::balanced::{LeafTree, NodeTreePq, NodeTreeStack};
use crate::brute::BruteForceSearch;
use crate::cloud::CloudView;
use crate::error::{KnnIndexError, Result};
use crate::heap::{CandidateHeap, CandidateVec};
use crate::r#type::Scalar;
use crate::unbalanced::{ExplicitBoundsTree, MidpointTree, MidpointTreeOpt};

/// Bit-mask options for a single query.
///
/// Combine with `|`. Unrecognised bits are rejected at query time with
/// [`KnnIndexError::UnknownFlags`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFlags(u32);

impl SearchFlags {
    /// Allow a cloud point at squared distance zero from the query to appear
    /// in the result. When unset, every such point is skipped.
    pub const ALLOW_SELF_MATCH: SearchFlags = SearchFlags(1);

    /// Order results by ascending squared distance (ties by ascending
    /// index). When unset, result order is unspecified but stable within a
    /// call.
    pub const SORT_RESULTS: SearchFlags = SearchFlags(2);

    const KNOWN: u32 = 0x3;

    /// No options set.
    pub const fn empty() -> Self {
        SearchFlags(0)
    }

    /// The raw bit mask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Reconstruct from a raw bit mask. Unknown bits are kept and reported
    /// as an error by the next query using this value.
    pub const fn from_bits(bits: u32) -> Self {
        SearchFlags(bits)
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: SearchFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn check_known(self) -> Result<()> {
        let unknown = self.0 & !Self::KNOWN;
        if unknown != 0 {
            return Err(KnnIndexError::UnknownFlags(unknown));
        }
        Ok(())
    }
}

impl BitOr for SearchFlags {
    type Output = SearchFlags;

    fn bitor(self, rhs: Self) -> Self {
        SearchFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SearchFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SearchFlags {
    type Output = SearchFlags;

    fn bitand(self, rhs: Self) -> Self {
        SearchFlags(self.0 & rhs.0)
    }
}

/// Per-index visit counters.
///
/// A visit is one point-distance evaluation. Counters are updated with
/// relaxed atomic operations; under concurrent queries
/// `last_query_visits` reflects one of the racing queries (last writer
/// wins) and the two counters may transiently disagree.
#[derive(Debug, Default)]
pub struct Statistics {
    last_query_visit_count: AtomicUsize,
    total_visit_count: AtomicUsize,
}

impl Statistics {
    /// Visits performed by the most recently completed query.
    pub fn last_query_visits(&self) -> usize {
        self.last_query_visit_count.load(Ordering::Relaxed)
    }

    /// Visits accumulated over every query since construction.
    pub fn total_visits(&self) -> usize {
        self.total_visit_count.load(Ordering::Relaxed)
    }

    pub(crate) fn record(&self, visits: usize) {
        self.last_query_visit_count.store(visits, Ordering::Relaxed);
        self.total_visit_count.fetch_add(visits, Ordering::Relaxed);
    }
}

/// k-nearest-neighbour search over a built index.
///
/// Implementations are immutable after construction; concurrent calls on a
/// shared reference are safe. Results are cloud column indices; searches are
/// in squared Euclidean distance throughout.
pub trait NearestNeighbor<N: Scalar> {
    /// The dimensionality of the indexed cloud.
    fn dim(&self) -> usize;

    /// The number of points in the indexed cloud.
    fn num_points(&self) -> usize;

    /// Access the visit counters of this index.
    fn statistics(&self) -> &Statistics;

    /// The `k` cloud points closest to `query`, within the approximation
    /// factor `epsilon`.
    ///
    /// With `epsilon = 0` the result is exact. With `epsilon > 0` every
    /// returned index `i` satisfies
    /// `dist²(query, cloud[i]) <= (1 + epsilon)² · d*²` where `d*²` is the
    /// exact k-th smallest squared distance.
    ///
    /// If `ALLOW_SELF_MATCH` is unset and fewer than `k` points lie at
    /// non-zero distance, trailing result slots hold
    /// [`INVALID_INDEX`][crate::heap::INVALID_INDEX].
    ///
    /// ## Errors
    ///
    /// - If `query.len()` differs from the cloud dimension.
    /// - If `k < 1` or `k` exceeds the number of points.
    /// - If `epsilon` is negative.
    /// - If `flags` carries unrecognised bits.
    ///
    /// A failed query does not touch the index or its statistics.
    fn knn(&self, query: &[N], k: usize, epsilon: N, flags: SearchFlags) -> Result<Vec<u32>>;

    /// One [`knn`][NearestNeighbor::knn] per column of a column-major query
    /// batch; the result holds `k` indices per column, in column order.
    fn knn_batch(&self, queries: &[N], k: usize, epsilon: N, flags: SearchFlags) -> Result<Vec<u32>> {
        let dim = self.dim();
        if queries.len() % dim != 0 {
            return Err(KnnIndexError::ShapeMismatch {
                len: queries.len(),
                dim,
            });
        }
        validate_params(self.num_points(), k, epsilon, flags)?;
        let mut out = Vec::with_capacity(k * (queries.len() / dim));
        for query in queries.chunks_exact(dim) {
            out.extend_from_slice(&self.knn(query, k, epsilon, flags)?);
        }
        Ok(out)
    }
}

/// Index variant selector for [`create_searcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Linear scan over every point; the correctness oracle.
    BruteForce,
    /// Balanced tree, one point per node, best-first priority-queue search.
    BalancedNodesPq,
    /// Balanced tree, one point per node, depth-first stack search.
    BalancedNodesStack,
    /// Balanced tree, points in leaves, depth-first stack search.
    BalancedLeaves {
        /// Split on the axis of largest spread instead of cycling axes.
        balance_variance: bool,
    },
    /// Sliding-midpoint tree, implicit cell bounds, reference layout.
    Midpoint,
    /// Sliding-midpoint tree, packed nodes, linear candidate container.
    MidpointLinearHeap,
    /// Sliding-midpoint tree, packed nodes, binary-heap candidate container.
    MidpointTreeHeap,
    /// Sliding-midpoint tree storing per-node cell extents.
    MidpointExplicitBounds,
}

/// Build the searcher selected by `kind` over `cloud`.
///
/// The returned trait object suits clients picking a variant at runtime; use
/// the concrete types directly to keep dispatch static.
pub fn create_searcher<'a, N: Scalar>(
    cloud: CloudView<'a, N>,
    kind: SearchKind,
) -> Box<dyn NearestNeighbor<N> + Send + Sync + 'a> {
    match kind {
        SearchKind::BruteForce => Box::new(BruteForceSearch::new(cloud)),
        SearchKind::BalancedNodesPq => Box::new(NodeTreePq::new(cloud)),
        SearchKind::BalancedNodesStack => Box::new(NodeTreeStack::new(cloud)),
        SearchKind::BalancedLeaves { balance_variance } => {
            Box::new(LeafTree::new(cloud, balance_variance))
        }
        SearchKind::Midpoint => Box::new(MidpointTree::new(cloud)),
        SearchKind::MidpointLinearHeap => {
            Box::new(MidpointTreeOpt::<N, CandidateVec<N>>::new(cloud))
        }
        SearchKind::MidpointTreeHeap => {
            Box::new(MidpointTreeOpt::<N, CandidateHeap<N>>::new(cloud))
        }
        SearchKind::MidpointExplicitBounds => Box::new(ExplicitBoundsTree::new(cloud)),
    }
}

pub(crate) fn validate_params<N: Scalar>(
    count: usize,
    k: usize,
    epsilon: N,
    flags: SearchFlags,
) -> Result<()> {
    flags.check_known()?;
    if k < 1 || k > count {
        return Err(KnnIndexError::InvalidK { k, count });
    }
    if epsilon < N::zero() {
        return Err(KnnIndexError::NegativeEpsilon);
    }
    Ok(())
}

pub(crate) fn validate_query<N: Scalar>(
    dim: usize,
    count: usize,
    query: &[N],
    k: usize,
    epsilon: N,
    flags: SearchFlags,
) -> Result<()> {
    if query.len() != dim {
        return Err(KnnIndexError::DimensionMismatch {
            expected: dim,
            actual: query.len(),
        });
    }
    validate_params(count, k, epsilon, flags)
}

/// The squared pruning scale `(1 + epsilon)²` applied to subtree lower
/// bounds: a far subtree is visited only while
/// `bound · (1 + epsilon)² < current k-th candidate distance`.
#[inline]
pub(crate) fn max_error2<N: Scalar>(epsilon: N) -> N {
    let e = N::one() + epsilon;
    e * e
}

/// Whether a candidate at squared distance `d2` may enter the result under
/// the self-match flag. Candidates at squared distance exactly zero are only
/// admissible when self-matching is allowed; any non-zero distance, however
/// small, is a genuine neighbour.
#[inline]
pub(crate) fn admissible<N: Scalar>(d2: N, allow_self_match: bool) -> bool {
    allow_self_match || d2 > N::zero()
}
