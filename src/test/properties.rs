//! Invariants that hold for every searcher variant, checked against the
//! brute-force oracle on random clouds.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{collinear_cloud, random_query, tree_kinds, uniform_cloud};
use crate::cloud::{sq_dist, CloudView};
use crate::heap::INVALID_INDEX;
use crate::r#type::Scalar;
use crate::search::{create_searcher, NearestNeighbor, SearchFlags, SearchKind};

fn sorted_distances<N: Scalar>(cloud: &CloudView<N>, query: &[N], indices: &[u32]) -> Vec<N> {
    indices
        .iter()
        .map(|&i| {
            assert_ne!(i, INVALID_INDEX);
            sq_dist(query, cloud.point(i as usize))
        })
        .collect()
}

/// Exactness: with epsilon = 0 every variant returns the same sorted
/// squared-distance vector as the oracle, bit for bit.
fn matches_oracle<N: Scalar>(coords: &[N], dim: usize, k: usize, queries: usize, seed: u64) {
    let cloud = CloudView::try_new(coords, dim).unwrap();
    let oracle = create_searcher(cloud.clone(), SearchKind::BruteForce);
    let searchers: Vec<_> = tree_kinds()
        .into_iter()
        .map(|kind| (kind, create_searcher(cloud.clone(), kind)))
        .collect();

    let mut rng = StdRng::seed_from_u64(seed ^ 0x9e3779b9);
    for _ in 0..queries {
        let query = random_query::<N>(dim, &mut rng);
        let expected = oracle
            .knn(&query, k, N::zero(), SearchFlags::SORT_RESULTS)
            .unwrap();
        let expected_dists = sorted_distances(&cloud, &query, &expected);

        for (kind, searcher) in &searchers {
            let result = searcher
                .knn(&query, k, N::zero(), SearchFlags::SORT_RESULTS)
                .unwrap();
            let dists = sorted_distances(&cloud, &query, &result);
            assert_eq!(dists, expected_dists, "distance mismatch for {kind:?}");

            let mut unique = result.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), k, "duplicate indices for {kind:?}");
        }
    }
}

#[test]
fn matches_oracle_on_uniform_cloud() {
    let coords = uniform_cloud::<f64>(1000, 3, 42);
    matches_oracle(&coords, 3, 10, 50, 42);
}

#[test]
fn matches_oracle_on_collinear_cloud() {
    // Points on a 3-D line segment: the sliding-midpoint rule must still
    // terminate and stay correct.
    let coords = collinear_cloud(1000, 7);
    matches_oracle(&coords, 3, 10, 50, 7);
}

#[test]
fn matches_oracle_in_f32() {
    let coords = uniform_cloud::<f32>(500, 2, 11);
    matches_oracle(&coords, 2, 5, 30, 11);
}

#[test]
fn matches_oracle_in_high_dimension() {
    // Past eight dimensions the offset vector spills its inline storage.
    let coords = uniform_cloud::<f64>(300, 10, 23);
    matches_oracle(&coords, 10, 4, 20, 23);
}

#[test]
fn matches_oracle_at_k_equals_n() {
    let coords = uniform_cloud::<f64>(64, 3, 5);
    matches_oracle(&coords, 3, 64, 10, 5);
}

#[test]
fn sort_flag_orders_results() {
    let coords = uniform_cloud::<f64>(200, 3, 3);
    let cloud = CloudView::try_new(&coords, 3).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);
        let query = random_query::<f64>(3, &mut rng);

        let sorted = searcher
            .knn(&query, 8, 0., SearchFlags::SORT_RESULTS)
            .unwrap();
        let dists = sorted_distances(&cloud, &query, &sorted);
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));

        // Without the flag the same multiset comes back, in container order.
        let mut unsorted = searcher.knn(&query, 8, 0., SearchFlags::empty()).unwrap();
        let mut sorted_copy = sorted.clone();
        unsorted.sort_unstable();
        sorted_copy.sort_unstable();
        assert_eq!(unsorted, sorted_copy);
    }
}

#[test]
fn approximate_search_respects_the_bound() {
    // 10000 points in 7-D, epsilon = 0.5: every returned squared distance
    // is within (1 + 0.5)^2 of the exact k-th, and the trees visit fewer
    // points than the oracle's full scan.
    let coords = uniform_cloud::<f64>(10000, 7, 99);
    let cloud = CloudView::try_new(&coords, 7).unwrap();
    let query: Vec<f64> = vec![0.3, 0.7, 0.1, 0.5, 0.9, 0.2, 0.6];
    let k = 5;

    let oracle = create_searcher(cloud.clone(), SearchKind::BruteForce);
    let exact = oracle
        .knn(&query, k, 0., SearchFlags::SORT_RESULTS)
        .unwrap();
    let exact_kth = *sorted_distances(&cloud, &query, &exact).last().unwrap();
    assert_eq!(oracle.statistics().last_query_visits(), 10000);

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);
        let result = searcher
            .knn(&query, k, 0.5, SearchFlags::SORT_RESULTS)
            .unwrap();
        let bound = 2.25 * exact_kth;
        for d2 in sorted_distances(&cloud, &query, &result) {
            assert!(d2 <= bound, "{kind:?}: {d2} > {bound}");
        }
        assert!(
            searcher.statistics().last_query_visits() < 10000,
            "{kind:?} visited the whole cloud"
        );
    }
}

#[test]
fn visit_counters_accumulate() {
    let coords = uniform_cloud::<f64>(500, 3, 17);
    let cloud = CloudView::try_new(&coords, 3).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);
        let mut expected_total = 0;
        for _ in 0..5 {
            let query = random_query::<f64>(3, &mut rng);
            let before = searcher.statistics().total_visits();
            searcher.knn(&query, 3, 0., SearchFlags::empty()).unwrap();
            let last = searcher.statistics().last_query_visits();
            assert!(last > 0);
            assert_eq!(searcher.statistics().total_visits(), before + last);
            expected_total += last;
        }
        assert_eq!(searcher.statistics().total_visits(), expected_total);
    }
}

#[test]
fn batch_equals_per_column_queries() {
    let coords = uniform_cloud::<f64>(400, 3, 29);
    let cloud = CloudView::try_new(&coords, 3).unwrap();
    let queries = uniform_cloud::<f64>(20, 3, 31);
    let k = 4;

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);
        let batch = searcher
            .knn_batch(&queries, k, 0., SearchFlags::SORT_RESULTS)
            .unwrap();
        assert_eq!(batch.len(), k * 20);

        for (column, query) in queries.chunks_exact(3).enumerate() {
            let single = searcher
                .knn(query, k, 0., SearchFlags::SORT_RESULTS)
                .unwrap();
            assert_eq!(&batch[column * k..(column + 1) * k], &single[..], "{kind:?}");
        }
    }
}

#[test]
fn batch_rejects_misshapen_input() {
    let coords = uniform_cloud::<f64>(50, 3, 1);
    let cloud = CloudView::try_new(&coords, 3).unwrap();

    for kind in [SearchKind::BalancedNodesStack, SearchKind::MidpointLinearHeap] {
        let searcher = create_searcher(cloud.clone(), kind);
        assert!(searcher
            .knn_batch(&[0.; 4], 1, 0., SearchFlags::empty())
            .is_err());
        assert!(searcher
            .knn_batch(&[0.; 6], 0, 0., SearchFlags::empty())
            .is_err());
    }
}

#[test]
fn self_match_flag_on_cloud_points() {
    let coords = uniform_cloud::<f64>(300, 3, 41);
    let cloud = CloudView::try_new(&coords, 3).unwrap();

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);
        // Query a cloud point directly.
        let query = cloud.point(123).to_vec();

        let with_self = searcher
            .knn(
                &query,
                3,
                0.,
                SearchFlags::SORT_RESULTS | SearchFlags::ALLOW_SELF_MATCH,
            )
            .unwrap();
        assert_eq!(with_self[0], 123, "{kind:?}");

        let without_self = searcher
            .knn(&query, 3, 0., SearchFlags::SORT_RESULTS)
            .unwrap();
        assert!(!without_self.contains(&123), "{kind:?}");
    }
}

#[test]
fn coincident_points_are_all_skipped() {
    // Three coincident points plus two distinct ones pin the self-match
    // policy: without the flag every zero-distance candidate is skipped,
    // and result slots past the admissible points stay invalid.
    let coords: Vec<f64> = vec![1., 1., 1., 1., 1., 1., 2., 2., 3., 3.];
    let cloud = CloudView::try_new(&coords, 2).unwrap();

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);

        let without_self = searcher
            .knn(&[1., 1.], 3, 0., SearchFlags::SORT_RESULTS)
            .unwrap();
        assert_eq!(without_self, vec![3, 4, INVALID_INDEX], "{kind:?}");

        let with_self = searcher
            .knn(
                &[1., 1.],
                3,
                0.,
                SearchFlags::SORT_RESULTS | SearchFlags::ALLOW_SELF_MATCH,
            )
            .unwrap();
        assert_eq!(with_self, vec![0, 1, 2], "{kind:?}");
    }
}

#[test]
fn sub_epsilon_neighbours_are_not_self_matches() {
    // Only a squared distance of exactly zero counts as a self-match: a
    // point closer than machine epsilon but not coincident is a genuine
    // neighbour and must be returned even with self-matching off.
    let coords: Vec<f64> = vec![0., 0., 1., 1., 2., 2.];
    let cloud = CloudView::try_new(&coords, 2).unwrap();

    let mut kinds = vec![SearchKind::BruteForce];
    kinds.extend(tree_kinds());
    for kind in kinds {
        let searcher = create_searcher(cloud.clone(), kind);

        // Squared distance to point 0 is 1e-20, far below f64::EPSILON.
        let nearly = searcher
            .knn(&[1e-10, 0.], 2, 0., SearchFlags::SORT_RESULTS)
            .unwrap();
        assert_eq!(nearly, vec![0, 1], "{kind:?}");

        // An exact zero is still skipped.
        let exact = searcher
            .knn(&[0., 0.], 2, 0., SearchFlags::SORT_RESULTS)
            .unwrap();
        assert_eq!(exact, vec![1, 2], "{kind:?}");
    }
}

#[test]
fn invalid_queries_error_and_leave_the_index_intact() {
    let coords = uniform_cloud::<f64>(100, 3, 53);
    let cloud = CloudView::try_new(&coords, 3).unwrap();

    for kind in tree_kinds() {
        let searcher = create_searcher(cloud.clone(), kind);
        assert!(searcher.knn(&[0.; 2], 1, 0., SearchFlags::empty()).is_err());
        assert!(searcher.knn(&[0.; 3], 0, 0., SearchFlags::empty()).is_err());
        assert!(searcher.knn(&[0.; 3], 101, 0., SearchFlags::empty()).is_err());
        assert!(searcher.knn(&[0.; 3], 1, -0.1, SearchFlags::empty()).is_err());
        assert!(searcher
            .knn(&[0.; 3], 1, 0., SearchFlags::from_bits(0x8))
            .is_err());
        assert_eq!(searcher.statistics().last_query_visits(), 0);
        assert_eq!(searcher.statistics().total_visits(), 0);

        // The index still answers correctly afterwards.
        assert!(searcher.knn(&[0.5; 3], 1, 0., SearchFlags::empty()).is_ok());
    }
}
