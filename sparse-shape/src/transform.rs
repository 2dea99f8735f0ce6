//! The outer-product size-decomposition scaffold: the product-of-tile-sizes
//! tensor has rank `dim` and would cost O(∏ N_d) to materialize directly, so
//! it's represented by its rank-1 factors (`size_vectors`) and only expanded
//! to full rank when an operation actually needs it.
//!
//! Expansion is divide-and-conquer: split the dimension list in half,
//! recursively expand each half, then combine the two halves with a plain
//! elementwise outer product. The recursion floor (`dim == 1`) returns the
//! single transformed vector directly, so a 1-D shape takes exactly the same
//! path as the leaf of a multi-dimensional one.
//!
//! `tile_norms`/`size_vectors` are kept as [`ndarray`] types at the crate
//! boundary (the corpus's dense-tensor container of choice), but every
//! combination here goes through a flat row-major `Vec<T>`, since `ArrayD`'s
//! `.iter()` always walks logical order regardless of memory layout. These
//! conversions hold even across `perm`'s axis reordering.

use ndarray::{Array1, ArrayD, IxDyn};
use num_traits::Float;
use tracing::trace;

/// A per-dimension transform applied to a tile-size vector before it enters
/// the outer-product scaffold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transform {
    /// Leaves sizes unchanged (used to de-normalize: multiply back by N).
    Noop,
    /// `1/N` per entry (used to normalize).
    Inv,
    /// `1/sqrt(N)` per entry (used by `add(scalar)`, where a constant's
    /// Frobenius norm over an N-element tile is `v * sqrt(N)`).
    InvSqrt,
    /// `sqrt(N)` per entry (used by `mult`'s size compensation, where a
    /// pointwise product tile's norm scales with `sqrt(N)` rather than `N`).
    Sqrt,
}

impl Transform {
    fn apply<T: Float>(self, x: T) -> T {
        match self {
            Transform::Noop => x,
            Transform::Inv => T::one() / x,
            Transform::InvSqrt => T::one() / x.sqrt(),
            Transform::Sqrt => x.sqrt(),
        }
    }
}

/// Applies `transform` to every entry of every size vector, returning plain
/// `Vec<T>`s ready for [`outer_product_tensor`].
pub(crate) fn transform_vectors<T: Float>(
    size_vectors: &[Array1<T>],
    transform: Transform,
) -> Vec<Vec<T>> {
    size_vectors
        .iter()
        .map(|v| v.iter().map(|&x| transform.apply(x)).collect())
        .collect()
}

/// Builds the full-rank outer product of `vectors` via divide-and-conquer,
/// returning a dense tensor whose axis `d` has length `vectors[d].len()`.
pub(crate) fn outer_product_tensor<T: Float>(vectors: &[Vec<T>]) -> ArrayD<T> {
    let (shape, data) = combine(vectors);
    ArrayD::from_shape_vec(IxDyn(&shape), data)
        .expect("outer product shape and flattened data length always agree")
}

fn combine<T: Float>(vectors: &[Vec<T>]) -> (Vec<usize>, Vec<T>) {
    match vectors.len() {
        0 => (vec![], vec![T::one()]),
        1 => (vec![vectors[0].len()], vectors[0].clone()),
        n => {
            let mid = n / 2;
            let (mut left_shape, left_data) = combine(&vectors[..mid]);
            let (right_shape, right_data) = combine(&vectors[mid..]);
            left_shape.extend_from_slice(&right_shape);
            let mut data = Vec::with_capacity(left_data.len() * right_data.len());
            for &l in &left_data {
                for &r in &right_data {
                    data.push(l * r);
                }
            }
            (left_shape, data)
        }
    }
}

/// Converts a dense tensor to its shape plus a flat row-major copy of its
/// entries.
pub(crate) fn to_flat<T: Clone>(a: &ArrayD<T>) -> (Vec<usize>, Vec<T>) {
    (a.shape().to_vec(), a.iter().cloned().collect())
}

/// Rebuilds a dense tensor from a shape plus flat row-major data.
pub(crate) fn from_flat<T>(shape: Vec<usize>, data: Vec<T>) -> ArrayD<T> {
    ArrayD::from_shape_vec(IxDyn(&shape), data)
        .expect("shape and flattened data length always agree by construction")
}

/// Row-major strides for a given shape, used by permutation reindexing.
pub(crate) fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let n = shape.len();
    let mut strides = vec![1usize; n];
    for d in (0..n.saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Reindexes `data` (shape `shape`) so that the new tensor's axis `i` pulls
/// from the old tensor's axis `axes[i]`: `new[idx] = old[idx composed with axes]`.
pub(crate) fn permute_flat<T: Clone>(
    data: &[T],
    shape: &[usize],
    axes: &[usize],
) -> (Vec<usize>, Vec<T>) {
    let ndim = shape.len();
    let new_shape: Vec<usize> = (0..ndim).map(|i| shape[axes[i]]).collect();
    let old_strides = row_major_strides(shape);
    let total: usize = shape.iter().product();
    let mut new_data = Vec::with_capacity(total);
    let mut idx = vec![0usize; ndim];
    for _ in 0..total {
        let mut old_offset = 0usize;
        for (new_axis, &old_axis) in axes.iter().enumerate() {
            old_offset += idx[new_axis] * old_strides[old_axis];
        }
        new_data.push(data[old_offset].clone());
        for d in (0..ndim).rev() {
            idx[d] += 1;
            if idx[d] < new_shape[d] {
                break;
            }
            idx[d] = 0;
        }
    }
    (new_shape, new_data)
}

/// Zeroes every entry strictly below `threshold`.
pub(crate) fn hard_zero<T: Float>(data: &mut [T], threshold: T) {
    let mut pruned = 0usize;
    for x in data.iter_mut() {
        if *x < threshold {
            *x = T::zero();
            pruned += 1;
        }
    }
    if pruned > 0 {
        trace!(pruned, total = data.len(), "hard-zeroed tiles below threshold");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_single_vector_matches_direct_transform() {
        let v: Array1<f64> = Array1::from(vec![2.0, 4.0, 8.0]);
        let transformed = transform_vectors(std::slice::from_ref(&v), Transform::Inv);
        let tensor = outer_product_tensor(&transformed);
        assert_eq!(tensor.shape(), &[3]);
        let direct: Vec<f64> = v.iter().map(|&x| 1.0 / x).collect();
        assert_eq!(tensor.iter().copied().collect::<Vec<_>>(), direct);
    }

    #[test]
    fn outer_product_of_two_vectors() {
        let a: Array1<f64> = Array1::from(vec![1.0, 2.0]);
        let b: Array1<f64> = Array1::from(vec![3.0, 4.0]);
        let transformed = transform_vectors(&[a, b], Transform::Noop);
        let tensor = outer_product_tensor(&transformed);
        assert_eq!(tensor.shape(), &[2, 2]);
        assert_eq!(tensor[[0, 0]], 3.0);
        assert_eq!(tensor[[0, 1]], 4.0);
        assert_eq!(tensor[[1, 0]], 6.0);
        assert_eq!(tensor[[1, 1]], 8.0);
    }

    #[test]
    fn permute_flat_swaps_axes() {
        // shape [2, 3], row-major data 0..6, swap the two axes.
        let data: Vec<i32> = (0..6).collect();
        let (new_shape, new_data) = permute_flat(&data, &[2, 3], &[1, 0]);
        assert_eq!(new_shape, vec![3, 2]);
        // old[i, j] = i*3 + j; new[j, i] = old[i, j]
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(new_data[j * 2 + i], data[i * 3 + j]);
            }
        }
    }

    #[test]
    fn hard_zero_clears_only_below_threshold() {
        let mut data = vec![0.10_f64, 0.06, 0.01];
        hard_zero(&mut data, 0.1);
        assert_eq!(data, vec![0.10, 0.0, 0.0]);
    }
}
