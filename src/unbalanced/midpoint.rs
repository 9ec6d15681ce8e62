//! Sliding-midpoint k-d tree with implicit cell bounds, reference layout.
//!
//! Cell extents are re-derived during descent from the split dimension and
//! cut value; nodes store nothing but the split itself (or the point index
//! at a leaf).

use tinyvec::TinyVec;

use crate::cloud::{sq_dist, CloudView};
use crate::error::Result;
use crate::heap::{CandidateHeap, Candidates, INVALID_INDEX};
use crate::r#type::Scalar;
use crate::search::{
    admissible, max_error2, validate_query, NearestNeighbor, SearchFlags, Statistics,
};
use crate::unbalanced::{sliding_midpoint, INVALID_CHILD};

/// A node of the flat tree; the left child of a split is always the next
/// node in the array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Node<N> {
    Split { dim: u32, cut: N, right: u32 },
    Leaf { index: u32 },
}

/// Unbalanced sliding-midpoint k-d tree with implicit bounds, searched
/// depth-first with the incremental offset vector.
#[derive(Debug)]
pub struct MidpointTree<'a, N: Scalar> {
    pub(crate) cloud: CloudView<'a, N>,
    pub(crate) nodes: Vec<Node<N>>,
    statistics: Statistics,
}

impl<'a, N: Scalar> MidpointTree<'a, N> {
    pub fn new(cloud: CloudView<'a, N>) -> Self {
        let count = cloud.count();
        let mut indices: Vec<u32> = (0..count as u32).collect();
        // One leaf per point and one split per internal node.
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
            nodes.push(Node::Leaf { index: indices[0] });
            return pos;
        }

        let cut = sliding_midpoint(cloud, indices, min_values, max_values);
        let pos = nodes.len() as u32;
        nodes.push(Node::Split {
            dim: cut.dim as u32,
            cut: cut.value,
            right: INVALID_CHILD,
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

        if let Node::Split { right, .. } = &mut nodes[pos as usize] {
            *right = right_pos;
        }
        pos
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse_knn(
        &self,
        query: &[N],
        pos: u32,
        rd: N,
        heap: &mut CandidateHeap<N>,
        off: &mut [N],
        max_err2: N,
        allow_self_match: bool,
        visits: &mut usize,
    ) {
        match self.nodes[pos as usize] {
            Node::Leaf { index } => {
                let d2 = sq_dist(query, self.cloud.point(index as usize));
                if admissible(d2, allow_self_match) {
                    heap.insert(d2, index);
                }
                *visits += 1;
            }
            Node::Split { dim, cut, right } => {
                let cd = dim as usize;
                let dist_to_cut = query[cd] - cut;
                let (near, far) = if dist_to_cut > N::zero() {
                    (right, pos + 1)
                } else {
                    (pos + 1, right)
                };
                self.recurse_knn(query, near, rd, heap, off, max_err2, allow_self_match, visits);

                let old_off = off[cd];
                let new_rd = rd - old_off * old_off + dist_to_cut * dist_to_cut;
                if new_rd * max_err2 < heap.head_dist() {
                    off[cd] = dist_to_cut;
                    self.recurse_knn(query, far, new_rd, heap, off, max_err2, allow_self_match, visits);
                    off[cd] = old_off;
                }
            }
        }
    }
}

impl<N: Scalar> NearestNeighbor<N> for MidpointTree<'_, N> {
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
        let mut off: TinyVec<[N; 8]> = TinyVec::new();
        off.resize(self.cloud.dim(), N::zero());
        let mut visits = 0;
        self.recurse_knn(
            query,
            0,
            N::zero(),
            &mut heap,
            &mut off,
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
