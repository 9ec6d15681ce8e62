//! Sliding-midpoint k-d tree storing the cell extent along each node's own
//! split dimension.
//!
//! The stored bounds let the search compute the distance to a far half-cell
//! directly, so no offset vector is carried; the price is a larger node.

use crate::cloud::{sq_dist, CloudView};
use crate::error::Result;
use crate::heap::{CandidateHeap, Candidates, INVALID_INDEX};
use crate::r#type::Scalar;
use crate::search::{
    admissible, max_error2, validate_query, NearestNeighbor, SearchFlags, Statistics,
};
use crate::unbalanced::{sliding_midpoint, INVALID_CHILD};

/// A node of the flat tree. `dim >= 0` splits on that dimension at `cut`,
/// with `low`/`high` the cell extent along it; `dim < 0` is a leaf holding
/// cloud index `(-dim - 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Node<N> {
    pub(crate) dim: i32,
    pub(crate) right_child: u32,
    pub(crate) cut: N,
    pub(crate) low: N,
    pub(crate) high: N,
}

/// Unbalanced sliding-midpoint k-d tree with explicit per-node cell bounds.
#[derive(Debug)]
pub struct ExplicitBoundsTree<'a, N: Scalar> {
    pub(crate) cloud: CloudView<'a, N>,
    pub(crate) nodes: Vec<Node<N>>,
    statistics: Statistics,
}

impl<'a, N: Scalar> ExplicitBoundsTree<'a, N> {
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
            let pos = nodes.len() as u32;
            nodes.push(Node {
                dim: -(indices[0] as i32) - 1,
                right_child: INVALID_CHILD,
                cut: N::zero(),
                low: N::zero(),
                high: N::zero(),
            });
            return pos;
        }

        let cut = sliding_midpoint(cloud, indices, min_values, max_values);
        let pos = nodes.len() as u32;
        nodes.push(Node {
            dim: cut.dim as i32,
            right_child: INVALID_CHILD,
            cut: cut.value,
            low: min_values[cut.dim],
            high: max_values[cut.dim],
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

    #[allow(clippy::too_many_arguments)]
    fn recurse_knn(
        &self,
        query: &[N],
        pos: u32,
        rd: N,
        heap: &mut CandidateHeap<N>,
        max_err2: N,
        allow_self_match: bool,
        visits: &mut usize,
    ) {
        let node = self.nodes[pos as usize];
        if node.dim < 0 {
            let index = (-node.dim - 1) as u32;
            let d2 = sq_dist(query, self.cloud.point(index as usize));
            if admissible(d2, allow_self_match) {
                heap.insert(d2, index);
            }
            *visits += 1;
            return;
        }

        let cd = node.dim as usize;
        let cut_diff = query[cd] - node.cut;
        if cut_diff < N::zero() {
            // Query on the low side: near child first, then bound the high
            // half-cell from the stored extent.
            self.recurse_knn(query, pos + 1, rd, heap, max_err2, allow_self_match, visits);
            let mut box_diff = node.low - query[cd];
            if box_diff < N::zero() {
                box_diff = N::zero();
            }
            let new_rd = rd - box_diff * box_diff + cut_diff * cut_diff;
            if new_rd * max_err2 < heap.head_dist() {
                self.recurse_knn(
                    query,
                    node.right_child,
                    new_rd,
                    heap,
                    max_err2,
                    allow_self_match,
                    visits,
                );
            }
        } else {
            self.recurse_knn(
                query,
                node.right_child,
                rd,
                heap,
                max_err2,
                allow_self_match,
                visits,
            );
            let mut box_diff = query[cd] - node.high;
            if box_diff < N::zero() {
                box_diff = N::zero();
            }
            let new_rd = rd - box_diff * box_diff + cut_diff * cut_diff;
            if new_rd * max_err2 < heap.head_dist() {
                self.recurse_knn(query, pos + 1, new_rd, heap, max_err2, allow_self_match, visits);
            }
        }
    }
}

impl<N: Scalar> NearestNeighbor<N> for ExplicitBoundsTree<'_, N> {
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

        let mut heap = CandidateHeap::with_capacity(k);
        let mut visits = 0;
        self.recurse_knn(
            query,
            0,
            N::zero(),
            &mut heap,
            max_err2,
            allow_self_match,
            &mut visits,
        );
        self.statistics.record(visits);

        let mut out = vec![INVALID_INDEX; k];
        heap.write_indices(&mut out, flags.contains(SearchFlags::SORT_RESULTS));
        Ok(out)
    }
}
