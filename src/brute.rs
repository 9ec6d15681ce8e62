//! Linear-scan nearest-neighbour search, the correctness oracle for the tree
//! variants.

use crate::cloud::{sq_dist, CloudView};
use crate::error::Result;
use crate::heap::{CandidateHeap, Candidates, INVALID_INDEX};
use crate::r#type::Scalar;
use crate::search::{admissible, validate_query, NearestNeighbor, SearchFlags, Statistics};

/// Brute-force searcher: evaluates every cloud point on every query.
#[derive(Debug)]
pub struct BruteForceSearch<'a, N: Scalar> {
    pub(crate) cloud: CloudView<'a, N>,
    statistics: Statistics,
}

impl<'a, N: Scalar> BruteForceSearch<'a, N> {
    pub fn new(cloud: CloudView<'a, N>) -> Self {
        Self {
            cloud,
            statistics: Statistics::default(),
        }
    }
}

impl<N: Scalar> NearestNeighbor<N> for BruteForceSearch<'_, N> {
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

        let mut heap = CandidateHeap::with_capacity(k);
        for index in 0..self.cloud.count() {
            let d2 = sq_dist(query, self.cloud.point(index));
            if admissible(d2, allow_self_match) {
                heap.insert(d2, index as u32);
            }
        }
        self.statistics.record(self.cloud.count());

        let mut out = vec![INVALID_INDEX; k];
        heap.write_indices(&mut out, flags.contains(SearchFlags::SORT_RESULTS));
        Ok(out)
    }
}
