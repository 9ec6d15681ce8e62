use std::fmt::Debug;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum KnnIndexError {
    #[error("Point cloud has no points.")]
    EmptyCloud,

    #[error("Point cloud must have at least one dimension.")]
    ZeroDimension,

    #[error("Coordinate buffer of length {len} is not a multiple of dimension {dim}.")]
    ShapeMismatch { len: usize, dim: usize },

    #[error("Query has {actual} rows when the cloud has {expected}.")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("k = {k} is out of range for a cloud of {count} points.")]
    InvalidK { k: usize, count: usize },

    #[error("Approximation factor epsilon must be non-negative.")]
    NegativeEpsilon,

    #[error("Unrecognised search option bits: {0:#x}.")]
    UnknownFlags(u32),

    #[error("Buffer cast error: {0}")]
    Cast(String),
}

pub type Result<T> = std::result::Result<T, KnnIndexError>;
