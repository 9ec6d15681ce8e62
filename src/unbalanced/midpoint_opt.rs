//! Optimised sliding-midpoint k-d tree.
//!
//! Behaviourally identical to [`MidpointTree`][crate::unbalanced::MidpointTree];
//! the differences are representational, driven by the query inner loop:
//!
//! - packed plain-struct nodes instead of an enum; a leaf caches the offset
//!   of its point's first coordinate so the distance evaluation reads the
//!   cloud buffer directly,
//! - the self-match test is a const-generic parameter of the recursion, so
//!   the zero-distance branch folds out of the hot path,
//! - the candidate container is a type parameter, chosen at construction,
//! - `knn_batch` reuses one container and one offset vector across columns.

use std::marker::PhantomData;

use tinyvec::TinyVec;

use crate::cloud::{sq_dist, CloudView};
use crate::error::{KnnIndexError, Result};
use crate::heap::{CandidateHeap, Candidates, INVALID_INDEX};
use crate::r#type::Scalar;
use crate::search::{
    max_error2, validate_params, validate_query, NearestNeighbor, SearchFlags, Statistics,
};
use crate::unbalanced::{sliding_midpoint, INVALID_CHILD};

/// A packed node. `right_child == INVALID_CHILD` marks a leaf, whose `dim`
/// field holds the cloud index and whose `pt_off` caches the position of the
/// point's first coordinate in the cloud buffer. Splits leave `pt_off`
/// unused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Node<N> {
    pub(crate) dim: u32,
    pub(crate) right_child: u32,
    pub(crate) cut: N,
    pub(crate) pt_off: u32,
}

/// Unbalanced sliding-midpoint k-d tree, packed layout, generic over the
/// candidate container `H`.
#[derive(Debug)]
pub struct MidpointTreeOpt<'a, N: Scalar, H: Candidates<N> = CandidateHeap<N>> {
    pub(crate) cloud: CloudView<'a, N>,
    pub(crate) nodes: Vec<Node<N>>,
    statistics: Statistics,
    candidates: PhantomData<fn() -> H>,
}

impl<'a, N: Scalar, H: Candidates<N>> MidpointTreeOpt<'a, N, H> {
    pub fn new(cloud: CloudView<'a, N>) -> Self {
        let count = cloud.count();
        let mut indices: Vec<u32> = (0..count as u32).collect();
        let mut nodes = Vec::with_capacity(2 * count - 1);
        let mut min_values = cloud.min_bound().to_vec();
        let mut max_values = cloud.max_bound().to_vec();
        Self::build_nodes(&cloud, &mut indices, &mut min_values, &mut max_values, &mut nodes);
        Self {
            cloud,
            nodes,
            statistics: Statistics::default(),
            candidates: PhantomData,
        }
    }

    fn build_nodes(
        cloud: &CloudView<N>,
        indices: &mut [u32],
        min_values: &mut [N],
        max_values: &mut [N],
        nodes: &mut Vec<Node<N>>,
    ) -> u32 {
        if indices.len() == 1 {
            let index = indices[0];
            let pos = nodes.len() as u32;
            nodes.push(Node {
                dim: index,
                right_child: INVALID_CHILD,
                cut: N::zero(),
                pt_off: index * cloud.dim() as u32,
            });
            return pos;
        }

        let cut = sliding_midpoint(cloud, indices, min_values, max_values);
        let pos = nodes.len() as u32;
        nodes.push(Node {
            dim: cut.dim as u32,
            right_child: INVALID_CHILD,
            cut: cut.value,
            pt_off: 0,
        });

        let (left, right) = indices.split_at_mut(cut.left_count);

        let old_max = max_values[cut.dim];
        max_values[cut.dim] = cut.value;
        Self::build_nodes(cloud, left, min_values, max_values, nodes);
        max_values[cut.dim] = old_max;

        let old_min = min_values[cut.dim];
        min_values[cut.dim] = cut.value;
        let right_pos = Self::build_nodes(cloud, right, min_values, max_values, nodes);
        min_values[cut.dim] = old_min;

        nodes[pos as usize].right_child = right_pos;
        pos
    }

    fn recurse_knn<const ALLOW_SELF_MATCH: bool>(
        &self,
        query: &[N],
        pos: u32,
        rd: N,
        heap: &mut H,
        off: &mut [N],
        max_err2: N,
        visits: &mut usize,
    ) {
        let node = self.nodes[pos as usize];
        if node.right_child == INVALID_CHILD {
            let start = node.pt_off as usize;
            let point = &self.cloud.coords()[start..start + query.len()];
            let d2 = sq_dist(query, point);
            if ALLOW_SELF_MATCH || d2 > N::zero() {
                heap.insert(d2, node.dim);
            }
            *visits += 1;
            return;
        }

        let cd = node.dim as usize;
        let dist_to_cut = query[cd] - node.cut;
        let (near, far) = if dist_to_cut > N::zero() {
            (node.right_child, pos + 1)
        } else {
            (pos + 1, node.right_child)
        };
        self.recurse_knn::<ALLOW_SELF_MATCH>(query, near, rd, heap, off, max_err2, visits);

        let old_off = off[cd];
        let new_rd = rd - old_off * old_off + dist_to_cut * dist_to_cut;
        if new_rd * max_err2 < heap.head_dist() {
            off[cd] = dist_to_cut;
            self.recurse_knn::<ALLOW_SELF_MATCH>(query, far, new_rd, heap, off, max_err2, visits);
            off[cd] = old_off;
        }
    }

    /// One column's search against a caller-provided container and offset
    /// vector; both must be in their reset state.
    fn search_into(
        &self,
        query: &[N],
        allow_self_match: bool,
        max_err2: N,
        heap: &mut H,
        off: &mut [N],
    ) -> usize {
        let mut visits = 0;
        if allow_self_match {
            self.recurse_knn::<true>(query, 0, N::zero(), heap, off, max_err2, &mut visits);
        } else {
            self.recurse_knn::<false>(query, 0, N::zero(), heap, off, max_err2, &mut visits);
        }
        visits
    }
}

impl<N: Scalar, H: Candidates<N>> NearestNeighbor<N> for MidpointTreeOpt<'_, N, H> {
    fn dim(&self) -> usize {
        self.cloud.dim()
    }

    fn num_points(&self) -> usize {
        self.cloud.count()
    }

    fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    fn knn(&self, query: &[N], k: usize, epsilon: N, flags: SearchFlags) -> Result<Vec<u32>> {
        validate_query(self.cloud.dim(), self.cloud.count(), query, k, epsilon, flags)?;
        let allow_self_match = flags.contains(SearchFlags::ALLOW_SELF_MATCH);
        let max_err2 = max_error2(epsilon);

        let mut heap = H::with_capacity(k);
        let mut off: TinyVec<[N; 8]> = TinyVec::new();
        off.resize(self.cloud.dim(), N::zero());
        let visits = self.search_into(query, allow_self_match, max_err2, &mut heap, &mut off);
        self.statistics.record(visits);

        let mut out = vec![INVALID_INDEX; k];
        heap.write_indices(&mut out, flags.contains(SearchFlags::SORT_RESULTS));
        Ok(out)
    }

    /// Batched search reusing one candidate container and one offset vector
    /// across all columns.
    fn knn_batch(&self, queries: &[N], k: usize, epsilon: N, flags: SearchFlags) -> Result<Vec<u32>> {
        let dim = self.cloud.dim();
        if queries.len() % dim != 0 {
            return Err(KnnIndexError::ShapeMismatch {
                len: queries.len(),
                dim,
            });
        }
        validate_params(self.cloud.count(), k, epsilon, flags)?;
        let allow_self_match = flags.contains(SearchFlags::ALLOW_SELF_MATCH);
        let sort_results = flags.contains(SearchFlags::SORT_RESULTS);
        let max_err2 = max_error2(epsilon);

        let mut heap = H::with_capacity(k);
        let mut off: TinyVec<[N; 8]> = TinyVec::new();
        off.resize(dim, N::zero());

        let mut out = vec![INVALID_INDEX; k * (queries.len() / dim)];
        for (column, query) in queries.chunks_exact(dim).enumerate() {
            let visits = self.search_into(query, allow_self_match, max_err2, &mut heap, &mut off);
            self.statistics.record(visits);
            heap.write_indices(&mut out[column * k..(column + 1) * k], sort_results);
            // The recursion restores every offset it writes, so only the
            // container needs a reset between columns.
            heap.reset();
        }
        Ok(out)
    }
}
