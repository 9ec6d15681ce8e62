//! Balanced k-d tree with points stored in leaves only; internal nodes carry
//! just the split dimension and cut value.

use tinyvec::TinyVec;

use crate::cloud::{sq_dist, CloudView};
use crate::error::Result;
use crate::heap::{CandidateHeap, Candidates, INVALID_INDEX};
use crate::r#type::Scalar;
use crate::search::{
    admissible, max_error2, validate_query, NearestNeighbor, SearchFlags, Statistics,
};
use crate::select;

/// One slot of the implicit heap layout.
///
/// `dim >= 0` splits on that dimension at `cut`; `dim <= -2` is a leaf
/// holding cloud index `(-dim - 2)`; `dim == -1` marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Node<N> {
    pub(crate) dim: i32,
    pub(crate) cut: N,
}

const UNUSED: i32 = -1;

/// Length of the implicit heap array enclosing a median-split tree with
/// `count` leaves.
fn tree_size(count: usize) -> usize {
    if count == 1 {
        return 1;
    }
    let mut size = 1;
    while size < count {
        size <<= 1;
    }
    2 * size - 1
}

/// Balanced points-in-leaves k-d tree, searched depth-first with the
/// incremental offset vector.
#[derive(Debug)]
pub struct LeafTree<'a, N: Scalar> {
    pub(crate) cloud: CloudView<'a, N>,
    pub(crate) nodes: Vec<Node<N>>,
    statistics: Statistics,
}

impl<'a, N: Scalar> LeafTree<'a, N> {
    /// Build over `cloud`. With `balance_variance` the split axis is the one
    /// of largest spread in the subset; otherwise axes are cycled by depth.
    pub fn new(cloud: CloudView<'a, N>, balance_variance: bool) -> Self {
        let count = cloud.count();
        let mut indices: Vec<u32> = (0..count as u32).collect();
        let mut nodes = vec![
            Node {
                dim: UNUSED,
                cut: N::zero()
            };
            tree_size(count)
        ];
        Self::build_nodes(&cloud, &mut indices, 0, 0, balance_variance, &mut nodes);
        Self {
            cloud,
            nodes,
            statistics: Statistics::default(),
        }
    }

    fn build_nodes(
        cloud: &CloudView<N>,
        indices: &mut [u32],
        pos: usize,
        depth: usize,
        balance_variance: bool,
        nodes: &mut [Node<N>],
    ) {
        if indices.len() == 1 {
            nodes[pos] = Node {
                dim: -2 - indices[0] as i32,
                cut: N::zero(),
            };
            return;
        }

        let d = if balance_variance {
            select::widest_dim(cloud, indices)
        } else {
            depth % cloud.dim()
        };
        let m = indices.len() / 2;
        select::select_nth_by_dim(cloud, indices, m, d);
        let cut = cloud.coord(indices[m] as usize, d);
        nodes[pos] = Node {
            dim: d as i32,
            cut,
        };

        let (left, right) = indices.split_at_mut(m);
        Self::build_nodes(cloud, left, 2 * pos + 1, depth + 1, balance_variance, nodes);
        Self::build_nodes(cloud, right, 2 * pos + 2, depth + 1, balance_variance, nodes);
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse_knn(
        &self,
        query: &[N],
        pos: usize,
        rd: N,
        heap: &mut CandidateHeap<N>,
        off: &mut [N],
        max_err2: N,
        allow_self_match: bool,
        visits: &mut usize,
    ) {
        let node = self.nodes[pos];
        debug_assert!(node.dim != UNUSED);
        if node.dim < 0 {
            let index = (-node.dim - 2) as u32;
            let d2 = sq_dist(query, self.cloud.point(index as usize));
            if admissible(d2, allow_self_match) {
                heap.insert(d2, index);
            }
            *visits += 1;
            return;
        }

        let cd = node.dim as usize;
        let old_off = off[cd];
        let new_off = query[cd] - node.cut;
        // Internal nodes always have both subtrees populated, so no unused
        // slot can be reached from here.
        let (near, far) = if new_off > N::zero() {
            (2 * pos + 2, 2 * pos + 1)
        } else {
            (2 * pos + 1, 2 * pos + 2)
        };
        self.recurse_knn(query, near, rd, heap, off, max_err2, allow_self_match, visits);
        let new_rd = rd - old_off * old_off + new_off * new_off;
        if new_rd * max_err2 < heap.head_dist() {
            off[cd] = new_off;
            self.recurse_knn(query, far, new_rd, heap, off, max_err2, allow_self_match, visits);
            off[cd] = old_off;
        }
    }
}

impl<N: Scalar> NearestNeighbor<N> for LeafTree<'_, N> {
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
