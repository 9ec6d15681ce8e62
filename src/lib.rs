//! Exact and ε-approximate k-nearest-neighbour search over static point
//! clouds.
//!
//! ## Creation
//!
//! Wrap a column-major coordinate buffer (one point per column) in a
//! [`CloudView`], then build a searcher over it: either a concrete type such
//! as [`unbalanced::MidpointTree`], or via [`create_searcher`] with a
//! [`SearchKind`] tag. The cloud is borrowed, not copied, and the index is
//! immutable after construction; concurrent queries need no external
//! synchronisation.
//!
//! ## Search
//!
//! Every searcher implements [`NearestNeighbor`]: [`knn`][NearestNeighbor::knn]
//! for a single query and [`knn_batch`][NearestNeighbor::knn_batch] for a
//! column-major batch. Distances are squared Euclidean throughout; an
//! `epsilon > 0` trades exactness for fewer visited points.
//!
//! ## Example
//!
//! ```
//! use knn_index::{create_searcher, CloudView, NearestNeighbor, SearchFlags, SearchKind};
//!
//! // Five 2-D points, one per column.
//! let coords: Vec<f64> = vec![0., 0., 1., 0., 0., 1., 1., 1., 2., 2.];
//! let cloud = CloudView::try_new(&coords, 2).unwrap();
//!
//! let tree = create_searcher(cloud, SearchKind::MidpointLinearHeap);
//! let neighbors = tree
//!     .knn(&[0.1, 0.1], 3, 0., SearchFlags::SORT_RESULTS)
//!     .unwrap();
//! assert_eq!(neighbors, vec![0, 1, 2]);
//! ```

pub mod balanced;
pub mod brute;
pub mod cloud;
pub mod error;
pub mod heap;
pub mod search;
mod select;
pub mod r#type;
pub mod unbalanced;

pub use brute::BruteForceSearch;
pub use cloud::CloudView;
pub use error::KnnIndexError;
pub use heap::{CandidateHeap, CandidateVec, Candidates, INVALID_INDEX};
pub use search::{create_searcher, NearestNeighbor, SearchFlags, SearchKind, Statistics};
pub use r#type::Scalar;

#[cfg(test)]
pub(crate) mod test;
