//! An immutable view onto a column-major point cloud.
//!
//! A cloud is a D×N matrix of scalars with one point per column, scalars
//! contiguous along a column. The view borrows the coordinate buffer; callers
//! must keep the buffer alive for as long as any index built over it.

use bytemuck::try_cast_slice;

use crate::error::{KnnIndexError, Result};
use crate::r#type::Scalar;

/// A borrowed D×N column-major point cloud plus its axis-aligned bounding
/// box.
///
/// The bounding box is computed once at construction:
/// `min_bound[d] <= coords[i*dim + d] <= max_bound[d]` for every point `i`
/// and dimension `d`.
#[derive(Debug, Clone)]
pub struct CloudView<'a, N: Scalar> {
    coords: &'a [N],
    dim: usize,
    count: usize,
    min_bound: Vec<N>,
    max_bound: Vec<N>,
}

impl<'a, N: Scalar> CloudView<'a, N> {
    /// Create a view over `coords`, interpreted as `coords.len() / dim`
    /// points of `dim` scalars each.
    ///
    /// ## Errors
    ///
    /// - If `dim` is zero.
    /// - If `coords` is empty.
    /// - If `coords.len()` is not a multiple of `dim`.
    pub fn try_new(coords: &'a [N], dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(KnnIndexError::ZeroDimension);
        }
        if coords.is_empty() {
            return Err(KnnIndexError::EmptyCloud);
        }
        if coords.len() % dim != 0 {
            return Err(KnnIndexError::ShapeMismatch {
                len: coords.len(),
                dim,
            });
        }

        let count = coords.len() / dim;
        let mut min_bound = vec![N::infinity(); dim];
        let mut max_bound = vec![N::neg_infinity(); dim];
        for point in coords.chunks_exact(dim) {
            for (d, &v) in point.iter().enumerate() {
                if v < min_bound[d] {
                    min_bound[d] = v;
                }
                if v > max_bound[d] {
                    max_bound[d] = v;
                }
            }
        }

        Ok(Self {
            coords,
            dim,
            count,
            min_bound,
            max_bound,
        })
    }

    /// Create a view over an external byte buffer, for clouds handed across
    /// FFI or read from disk by the caller.
    pub fn try_from_bytes(data: &'a [u8], dim: usize) -> Result<Self> {
        let coords =
            try_cast_slice(data).map_err(|err| KnnIndexError::Cast(format!("{err:?}")))?;
        Self::try_new(coords, dim)
    }

    /// The full coordinate buffer.
    #[inline]
    pub fn coords(&self) -> &'a [N] {
        self.coords
    }

    /// The number of rows (dimensions) of the cloud.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The number of points (columns) of the cloud.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// The coordinates of point `index`.
    #[inline]
    pub fn point(&self, index: usize) -> &'a [N] {
        &self.coords[index * self.dim..(index + 1) * self.dim]
    }

    /// A single coordinate of point `index` along dimension `d`.
    #[inline]
    pub fn coord(&self, index: usize, d: usize) -> N {
        self.coords[index * self.dim + d]
    }

    /// Component-wise minimum over all points.
    #[inline]
    pub fn min_bound(&self) -> &[N] {
        &self.min_bound
    }

    /// Component-wise maximum over all points.
    #[inline]
    pub fn max_bound(&self) -> &[N] {
        &self.max_bound
    }
}

/// Squared Euclidean distance between two points of equal dimension.
///
/// Accumulates in dimension order so every searcher computes bit-identical
/// distances for the same pair.
#[inline]
pub(crate) fn sq_dist<N: Scalar>(a: &[N], b: &[N]) -> N {
    debug_assert_eq!(a.len(), b.len());
    let mut acc = N::zero();
    for (&av, &bv) in a.iter().zip(b) {
        let diff = av - bv;
        acc = acc + diff * diff;
    }
    acc
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn computes_bounds() {
        let coords: Vec<f64> = vec![0., 0., 1., 0., 0., 1., 1., 1., 2., -3.];
        let cloud = CloudView::try_new(&coords, 2).unwrap();

        assert_eq!(cloud.dim(), 2);
        assert_eq!(cloud.count(), 5);
        assert_eq!(cloud.min_bound(), &[0., -3.]);
        assert_eq!(cloud.max_bound(), &[2., 1.]);
        assert_eq!(cloud.point(4), &[2., -3.]);
        assert_eq!(cloud.coord(1, 0), 1.);
    }

    #[test]
    fn rejects_bad_shapes() {
        let coords: Vec<f64> = vec![1., 2., 3.];
        assert!(matches!(
            CloudView::try_new(&coords, 0),
            Err(KnnIndexError::ZeroDimension)
        ));
        assert!(matches!(
            CloudView::<f64>::try_new(&[], 2),
            Err(KnnIndexError::EmptyCloud)
        ));
        assert!(matches!(
            CloudView::try_new(&coords, 2),
            Err(KnnIndexError::ShapeMismatch { len: 3, dim: 2 })
        ));
    }

    #[test]
    fn from_bytes_round_trip() {
        let coords: Vec<f32> = vec![1., 2., 3., 4., 5., 6.];
        let bytes = bytemuck::cast_slice::<f32, u8>(&coords);
        let cloud = CloudView::<f32>::try_from_bytes(bytes, 3).unwrap();
        assert_eq!(cloud.count(), 2);
        assert_eq!(cloud.point(1), &[4., 5., 6.]);
    }

    #[test]
    fn sq_dist_is_squared_euclidean() {
        assert_eq!(sq_dist::<f64>(&[0., 0.], &[3., 4.]), 25.);
        assert_eq!(sq_dist::<f64>(&[1., 2., 3.], &[1., 2., 3.]), 0.);
    }
}
