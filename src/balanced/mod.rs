//! Balanced k-d trees laid out as implicit binary heaps.
//!
//! Nodes live in a flat array pre-sized to the enclosing power-of-two shape;
//! children are found by position arithmetic (`2p + 1`, `2p + 2`) instead of
//! stored links, halving per-node memory. Two node layouts are provided: one
//! point per node ([`NodeTreePq`], [`NodeTreeStack`]) and points in leaves
//! only ([`LeafTree`]).

mod leaves;
mod nodes;

pub use leaves::LeafTree;
pub use nodes::{NodeTreePq, NodeTreeStack};
