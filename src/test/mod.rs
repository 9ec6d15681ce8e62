//! Cross-variant properties and end-to-end scenarios.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::r#type::Scalar;
use crate::search::SearchKind;

mod properties;

/// Every tree variant; the brute-force searcher is their oracle.
pub(crate) fn tree_kinds() -> Vec<SearchKind> {
    vec![
        SearchKind::BalancedNodesPq,
        SearchKind::BalancedNodesStack,
        SearchKind::BalancedLeaves {
            balance_variance: true,
        },
        SearchKind::BalancedLeaves {
            balance_variance: false,
        },
        SearchKind::Midpoint,
        SearchKind::MidpointLinearHeap,
        SearchKind::MidpointTreeHeap,
        SearchKind::MidpointExplicitBounds,
    ]
}

/// `count` points drawn uniformly from the unit cube, column-major.
pub(crate) fn uniform_cloud<N: Scalar>(count: usize, dim: usize, seed: u64) -> Vec<N> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count * dim)
        .map(|_| N::from(rng.gen::<f64>()).unwrap())
        .collect()
}

/// `count` points on a 3-D line segment, a degenerate distribution.
pub(crate) fn collinear_cloud(count: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut coords = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let t: f64 = rng.gen();
        coords.extend_from_slice(&[0.5 + t, 2. * t, 3. * t - 1.]);
    }
    coords
}

pub(crate) fn random_query<N: Scalar>(dim: usize, rng: &mut StdRng) -> Vec<N> {
    (0..dim)
        .map(|_| N::from(rng.gen::<f64>()).unwrap())
        .collect()
}
