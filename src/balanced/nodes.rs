//! Balanced k-d tree with one cloud point stored at every node, plus its two
//! search strategies: best-first priority-queue descent and depth-first
//! stack descent with the incremental-offset bound.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

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
/// `dim >= 0` splits on that dimension at the stored point's coordinate;
/// `dim == -1` is a leaf; `dim == -2` marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) dim: i32,
    pub(crate) index: u32,
}

const LEAF: i32 = -1;
const UNUSED: i32 = -2;

/// The shared node array of both points-in-nodes searchers.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct NodeTree {
    pub(crate) nodes: Vec<Node>,
}

/// Length of the implicit heap array enclosing a median-split tree of
/// `count` points.
fn tree_size(count: usize) -> usize {
    let mut size = 1;
    while size < count + 1 {
        size <<= 1;
    }
    size - 1
}

impl NodeTree {
    fn build<N: Scalar>(cloud: &CloudView<N>) -> Self {
        let count = cloud.count();
        let mut indices: Vec<u32> = (0..count as u32).collect();
        let mut nodes = vec![
            Node {
                dim: UNUSED,
                index: 0
            };
            tree_size(count)
        ];
        Self::build_nodes(cloud, &mut indices, 0, &mut nodes);
        NodeTree { nodes }
    }

    fn build_nodes<N: Scalar>(
        cloud: &CloudView<N>,
        indices: &mut [u32],
        pos: usize,
        nodes: &mut [Node],
    ) {
        if indices.len() == 1 {
            nodes[pos] = Node {
                dim: LEAF,
                index: indices[0],
            };
            return;
        }

        // Median split on the axis of largest spread; the median point stays
        // at this position, the halves fill the two subtrees.
        let d = select::widest_dim(cloud, indices);
        let m = indices.len() / 2;
        select::select_nth_by_dim(cloud, indices, m, d);
        nodes[pos] = Node {
            dim: d as i32,
            index: indices[m],
        };

        let (left, rest) = indices.split_at_mut(m);
        Self::build_nodes(cloud, left, 2 * pos + 1, nodes);
        let right = &mut rest[1..];
        if !right.is_empty() {
            Self::build_nodes(cloud, right, 2 * pos + 2, nodes);
        }
    }

    /// The node at `pos`, unless out of the array or an unused slot.
    #[inline]
    fn get(&self, pos: usize) -> Option<Node> {
        self.nodes.get(pos).copied().filter(|n| n.dim != UNUSED)
    }
}

/// A subtree on the best-first frontier, ordered by its lower-bound distance
/// to the query. Carries the per-dimension offsets realising that bound so
/// the descent can keep updating it incrementally.
#[derive(Debug, Clone)]
struct SearchElement<N: Scalar> {
    min_dist: N,
    pos: u32,
    off: TinyVec<[N; 8]>,
}

impl<N: Scalar> PartialEq for SearchElement<N> {
    fn eq(&self, other: &Self) -> bool {
        self.min_dist == other.min_dist && self.pos == other.pos
    }
}

impl<N: Scalar> Eq for SearchElement<N> {}

impl<N: Scalar> Ord for SearchElement<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // We don't allow NaN. This should only panic on NaN.
        self.min_dist
            .partial_cmp(&other.min_dist)
            .unwrap()
            .then_with(|| self.pos.cmp(&other.pos))
    }
}

impl<N: Scalar> PartialOrd for SearchElement<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Balanced points-in-nodes k-d tree searched with a best-first priority
/// queue over subtree lower bounds.
#[derive(Debug)]
pub struct NodeTreePq<'a, N: Scalar> {
    pub(crate) cloud: CloudView<'a, N>,
    pub(crate) tree: NodeTree,
    statistics: Statistics,
}

impl<'a, N: Scalar> NodeTreePq<'a, N> {
    pub fn new(cloud: CloudView<'a, N>) -> Self {
        let tree = NodeTree::build(&cloud);
        Self {
            cloud,
            tree,
            statistics: Statistics::default(),
        }
    }
}

impl<N: Scalar> NearestNeighbor<N> for NodeTreePq<'_, N> {
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
        let mut queue = BinaryHeap::new();
        let mut visits = 0;
        let mut root_off: TinyVec<[N; 8]> = TinyVec::new();
        root_off.resize(self.cloud.dim(), N::zero());
        queue.push(Reverse(SearchElement {
            min_dist: N::zero(),
            pos: 0,
            off: root_off,
        }));

        while let Some(Reverse(element)) = queue.pop() {
            // The frontier is best-first: once the most promising subtree is
            // outside the pruning radius, every remaining one is too.
            if element.min_dist * max_err2 >= heap.head_dist() {
                break;
            }
            // Walk the near side of this subtree. The bound and offsets only
            // change toward a far child, which goes back on the frontier
            // with its cumulative bound updated by the one-add-one-subtract
            // trick.
            let rd = element.min_dist;
            let off = element.off;
            let mut pos = element.pos as usize;
            loop {
                let node = self.tree.nodes[pos];
                debug_assert!(node.dim != UNUSED);
                let point_index = node.index as usize;
                let d2 = sq_dist(query, self.cloud.point(point_index));
                if admissible(d2, allow_self_match) {
                    heap.insert(d2, node.index);
                }
                visits += 1;
                if node.dim < 0 {
                    break;
                }

                let cd = node.dim as usize;
                let old_off = off[cd];
                let new_off = query[cd] - self.cloud.coord(point_index, cd);
                let (near, far) = if new_off > N::zero() {
                    (2 * pos + 2, 2 * pos + 1)
                } else {
                    (2 * pos + 1, 2 * pos + 2)
                };
                let far_rd = rd - old_off * old_off + new_off * new_off;
                if self.tree.get(far).is_some() && far_rd * max_err2 < heap.head_dist() {
                    let mut far_off = off.clone();
                    far_off[cd] = new_off;
                    queue.push(Reverse(SearchElement {
                        min_dist: far_rd,
                        pos: far as u32,
                        off: far_off,
                    }));
                }
                if self.tree.get(near).is_none() {
                    break;
                }
                pos = near;
            }
        }
        self.statistics.record(visits);

        let mut out = vec![INVALID_INDEX; k];
        heap.write_indices(&mut out, flags.contains(SearchFlags::SORT_RESULTS));
        Ok(out)
    }
}

/// Balanced points-in-nodes k-d tree searched depth-first, carrying the
/// incremental offset vector.
#[derive(Debug)]
pub struct NodeTreeStack<'a, N: Scalar> {
    pub(crate) cloud: CloudView<'a, N>,
    pub(crate) tree: NodeTree,
    statistics: Statistics,
}

impl<'a, N: Scalar> NodeTreeStack<'a, N> {
    pub fn new(cloud: CloudView<'a, N>) -> Self {
        let tree = NodeTree::build(&cloud);
        Self {
            cloud,
            tree,
            statistics: Statistics::default(),
        }
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
        let node = self.tree.nodes[pos];
        debug_assert!(node.dim != UNUSED);
        let point_index = node.index as usize;
        let d2 = sq_dist(query, self.cloud.point(point_index));
        if admissible(d2, allow_self_match) {
            heap.insert(d2, node.index);
        }
        *visits += 1;
        if node.dim < 0 {
            return;
        }

        let cd = node.dim as usize;
        let old_off = off[cd];
        let new_off = query[cd] - self.cloud.coord(point_index, cd);
        let (near, far) = if new_off > N::zero() {
            (2 * pos + 2, 2 * pos + 1)
        } else {
            (2 * pos + 1, 2 * pos + 2)
        };
        if self.tree.get(near).is_some() {
            self.recurse_knn(query, near, rd, heap, off, max_err2, allow_self_match, visits);
        }
        // One add and one subtract turn the cell bound of this node into the
        // bound of the far child.
        let new_rd = rd - old_off * old_off + new_off * new_off;
        if new_rd * max_err2 < heap.head_dist() && self.tree.get(far).is_some() {
            off[cd] = new_off;
            self.recurse_knn(query, far, new_rd, heap, off, max_err2, allow_self_match, visits);
            off[cd] = old_off;
        }
    }
}

impl<N: Scalar> NearestNeighbor<N> for NodeTreeStack<'_, N> {
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
