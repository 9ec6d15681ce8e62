use std::fmt::Debug;

use num_traits::{Float, NumCast};

/// Coordinate scalar for clouds and queries.
///
/// Implemented for `f32` and `f64`. Note that float `NaN` is not supported:
/// build and search assume coordinates are totally ordered and may panic on
/// NaN.
pub trait Scalar:
    Float + NumCast + Debug + Default + Send + Sync + bytemuck::Pod + 'static
{
    /// The number of bytes per element
    const BYTES_PER_ELEMENT: usize;
}

impl Scalar for f32 {
    const BYTES_PER_ELEMENT: usize = 4;
}

impl Scalar for f64 {
    const BYTES_PER_ELEMENT: usize = 8;
}
