//! `SparseShape<T>`: a dense tensor of normalized per-tile Frobenius norms,
//! approximating where a distributed block-sparse tensor's nonzero mass
//! lives without materializing the tensor itself.

use std::fmt;
use std::ops::AddAssign;

use ndarray::{Array1, ArrayD, IxDyn};
use num_traits::{Float, NumCast, ToPrimitive};

use substrate::all_reduce::AllReduceSum;

use crate::config::ShapeConfig;
use crate::error::ShapeError;
use crate::gemm::GemmHelper;
use crate::permutation::Permutation;
use crate::transform::{
    from_flat, hard_zero, outer_product_tensor, permute_flat, to_flat, transform_vectors,
    Transform,
};

/// A dense tensor of normalized per-tile norms (`‖A_{i...}‖ / ∏ N_d`) plus
/// the rank-1 tile-size vectors needed to de-normalize on demand.
/// Immutable after construction; every operation returns a new value.
#[derive(Debug, Clone)]
pub struct SparseShape<T> {
    tile_norms: ArrayD<T>,
    size_vectors: Vec<Array1<T>>,
}

fn threshold_as<T: NumCast>(config: &ShapeConfig) -> T {
    T::from(config.threshold()).expect("configured threshold fits the shape's numeric type")
}

fn validate_inputs<T: Float>(
    norms: &ArrayD<T>,
    size_vectors: &[Array1<T>],
) -> Result<(), ShapeError> {
    if norms.ndim() != size_vectors.len() {
        return Err(ShapeError::MismatchedRange(format!(
            "norm tensor rank {} does not match {} size vectors",
            norms.ndim(),
            size_vectors.len()
        )));
    }
    for (d, sv) in size_vectors.iter().enumerate() {
        if sv.len() != norms.shape()[d] {
            return Err(ShapeError::MismatchedRange(format!(
                "size vector {d} has length {} but axis {d} has extent {}",
                sv.len(),
                norms.shape()[d]
            )));
        }
    }
    for &x in norms.iter() {
        if x < T::zero() {
            return Err(ShapeError::NegativeNorm(x.to_f64().unwrap_or(f64::NAN)));
        }
    }
    Ok(())
}

impl<T: Float + NumCast + AddAssign> SparseShape<T> {
    /// Builds a shape from a raw (un-normalized) norm tensor and its tile
    /// size vectors, normalizing and threshold-pruning it.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if the rank of `raw_norms`
    /// doesn't match `size_vectors`, or a size vector's length doesn't match
    /// its axis extent. Returns [`ShapeError::NegativeNorm`] if any entry of
    /// `raw_norms` is negative.
    pub fn new(
        raw_norms: ArrayD<T>,
        size_vectors: Vec<Array1<T>>,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        validate_inputs(&raw_norms, &size_vectors)?;
        Ok(normalize(raw_norms, size_vectors, config))
    }

    /// Builds a shape directly from an already-normalized, already-pruned
    /// norm tensor, used internally by operations that have already
    /// produced normalized, pruned data. No normalization is applied;
    /// callers are responsible for having done that themselves.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] or [`ShapeError::NegativeNorm`]
    /// under the same conditions as [`Self::new`].
    pub fn from_precomputed_norms(
        tile_norms: ArrayD<T>,
        size_vectors: Vec<Array1<T>>,
    ) -> Result<Self, ShapeError> {
        validate_inputs(&tile_norms, &size_vectors)?;
        Ok(Self {
            tile_norms,
            size_vectors,
        })
    }

    /// Builds a shape the way [`Self::new`] does, but first all-reduce-sums
    /// `raw_norms` across the process group.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::new`], plus
    /// [`ShapeError::CollectiveFailed`] if the all-reduce itself fails.
    pub fn collective(
        raw_norms: ArrayD<T>,
        size_vectors: Vec<Array1<T>>,
        all_reduce: &impl AllReduceSum<T>,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        validate_inputs(&raw_norms, &size_vectors)?;
        let (shape, mut flat) = to_flat(&raw_norms);
        all_reduce.all_reduce_sum(&mut flat)?;
        let reduced = from_flat(shape, flat);
        Ok(normalize(reduced, size_vectors, config))
    }

    /// The number of axes.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.tile_norms.ndim()
    }

    /// Whether this shape has zero tiles along some axis. Every operation
    /// other than construction is undefined on an empty shape; callers
    /// must check this themselves first.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.tile_norms.len() == 0
    }

    /// The underlying normalized norm tensor.
    #[must_use]
    pub fn data(&self) -> &ArrayD<T> {
        &self.tile_norms
    }

    /// The per-dimension tile-size vectors.
    #[must_use]
    pub fn size_vectors(&self) -> &[Array1<T>] {
        &self.size_vectors
    }

    /// Checks that this shape's tile-grid range matches `range`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if it doesn't.
    pub fn validate(&self, range: &[usize]) -> Result<(), ShapeError> {
        if self.tile_norms.shape() != range {
            return Err(ShapeError::MismatchedRange(format!(
                "shape {:?} does not match expected range {:?}",
                self.tile_norms.shape(),
                range
            )));
        }
        Ok(())
    }

    /// Whether tile `index` has been hard-zeroed. `is_zero(i)` implies
    /// `data()[i] == 0` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if `index`'s rank doesn't
    /// match [`Self::dim`] or is out of bounds on some axis.
    pub fn is_zero(&self, index: &[usize]) -> Result<bool, ShapeError> {
        if index.len() != self.dim() {
            return Err(ShapeError::MismatchedRange(format!(
                "index rank {} does not match shape dim {}",
                index.len(),
                self.dim()
            )));
        }
        for (d, &i) in index.iter().enumerate() {
            if i >= self.tile_norms.shape()[d] {
                return Err(ShapeError::MismatchedRange(format!(
                    "index {i} out of range on axis {d} (extent {})",
                    self.tile_norms.shape()[d]
                )));
            }
        }
        Ok(self.tile_norms[IxDyn(index)] == T::zero())
    }

    /// The raw count of hard-zeroed tiles. Resolves the "sparsity()"
    /// ambiguity by exposing the count directly rather than a mixed
    /// count/fraction method.
    #[must_use]
    pub fn zero_tile_count(&self) -> usize {
        self.tile_norms.iter().filter(|&&x| x == T::zero()).count()
    }

    /// The fraction of tiles that are hard-zeroed, `0.0` on an empty shape.
    #[must_use]
    pub fn zero_fraction(&self) -> f64 {
        let total = self.tile_norms.len();
        if total == 0 {
            return 0.0;
        }
        self.zero_tile_count().to_f64().unwrap_or(0.0) / total.to_f64().unwrap_or(1.0)
    }

    /// Returns a new shape with axes permuted by `p`: `result[p[d]] = this[d]`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if `p`'s dimension doesn't
    /// match [`Self::dim`].
    pub fn perm(&self, p: &Permutation) -> Result<Self, ShapeError> {
        if p.dim() != self.dim() {
            return Err(ShapeError::MismatchedRange(format!(
                "permutation over {} axes does not match shape dim {}",
                p.dim(),
                self.dim()
            )));
        }
        let inv = p.inverse();
        let axes: Vec<usize> = (0..self.dim()).map(|j| inv.apply(j)).collect();
        let (shape, data) = to_flat(&self.tile_norms);
        let (new_shape, new_data) = permute_flat(&data, &shape, &axes);

        let mut new_size_vectors: Vec<Array1<T>> = (0..self.dim())
            .map(|_| Array1::from(vec![]))
            .collect();
        for d in 0..self.dim() {
            new_size_vectors[p.apply(d)] = self.size_vectors[d].clone();
        }
        Ok(Self {
            tile_norms: from_flat(new_shape, new_data),
            size_vectors: new_size_vectors,
        })
    }

    /// Multiplies every norm by `|alpha|`, hard-zeroing anything that falls
    /// below `config`'s threshold.
    pub fn scale(&self, alpha: T, config: &ShapeConfig) -> Self {
        self.scale_impl(alpha, config)
    }

    /// Fused scale-then-permute.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] under the same condition as
    /// [`Self::perm`].
    pub fn scale_perm(
        &self,
        alpha: T,
        p: &Permutation,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        self.scale_impl(alpha, config).perm(p)
    }

    fn scale_impl(&self, alpha: T, config: &ShapeConfig) -> Self {
        let abs_alpha = alpha.abs();
        let (shape, mut data) = to_flat(&self.tile_norms);
        for x in data.iter_mut() {
            *x = *x * abs_alpha;
        }
        hard_zero(&mut data, threshold_as(config));
        Self {
            tile_norms: from_flat(shape, data),
            size_vectors: self.size_vectors.clone(),
        }
    }

    /// Entrywise sum of norms: a conservative upper bound on `‖a + b‖`,
    /// since the true norm satisfies the triangle inequality `‖a+b‖ ≤
    /// ‖a‖+‖b‖`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if `self` and `other` don't
    /// share the same tile-grid shape.
    pub fn add(&self, other: &Self, config: &ShapeConfig) -> Result<Self, ShapeError> {
        self.add_scale_impl(other, T::one(), config)
    }

    /// Fused `scale(add(self, other), alpha)`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add`].
    pub fn add_scale(&self, other: &Self, alpha: T, config: &ShapeConfig) -> Result<Self, ShapeError> {
        self.add_scale_impl(other, alpha, config)
    }

    /// Fused `scale(add(self, other), alpha)` then `perm(p)`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add`] and [`Self::perm`].
    pub fn add_scale_perm(
        &self,
        other: &Self,
        alpha: T,
        p: &Permutation,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        self.add_scale_impl(other, alpha, config)?.perm(p)
    }

    fn add_scale_impl(&self, other: &Self, alpha: T, config: &ShapeConfig) -> Result<Self, ShapeError> {
        if self.tile_norms.shape() != other.tile_norms.shape() {
            return Err(ShapeError::MismatchedRange(format!(
                "add: shapes {:?} and {:?} differ",
                self.tile_norms.shape(),
                other.tile_norms.shape()
            )));
        }
        let (shape, a_data) = to_flat(&self.tile_norms);
        let (_, b_data) = to_flat(&other.tile_norms);
        let abs_alpha = alpha.abs();
        let mut data: Vec<T> = a_data
            .iter()
            .zip(b_data.iter())
            .map(|(&a, &b)| (a + b) * abs_alpha)
            .collect();
        hard_zero(&mut data, threshold_as(config));
        Ok(Self {
            tile_norms: from_flat(shape, data),
            size_vectors: self.size_vectors.clone(),
        })
    }

    /// Adds an elementwise constant `v` to the underlying (de-normalized)
    /// tensor. In normalized space this contributes `|v| / sqrt(∏ N_d)`,
    /// since a constant `v` spread over an `N`-element tile has Frobenius
    /// norm `v·sqrt(N)`.
    pub fn add_scalar(&self, v: T, config: &ShapeConfig) -> Self {
        let correction = outer_product_tensor(&transform_vectors(&self.size_vectors, Transform::InvSqrt));
        let (shape, mut data) = to_flat(&self.tile_norms);
        let (_, corr_data) = to_flat(&correction);
        let abs_v = v.abs();
        for (x, c) in data.iter_mut().zip(corr_data.iter()) {
            *x = *x + abs_v * *c;
        }
        hard_zero(&mut data, threshold_as(config));
        Self {
            tile_norms: from_flat(shape, data),
            size_vectors: self.size_vectors.clone(),
        }
    }

    /// Defined as [`Self::add`]: subtraction can only add magnitude
    /// uncertainty to a conservative shape estimate, so this shape algebra
    /// folds it into the same upper-bound path rather than tracking
    /// cancellation. An intentional over-approximation, not an oversight.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add`].
    pub fn subt(&self, other: &Self, config: &ShapeConfig) -> Result<Self, ShapeError> {
        self.add(other, config)
    }

    /// Entrywise product of tile norms, compensated for the fact that a
    /// pointwise-product tile's norm scales with `sqrt(N)` rather than `N`,
    /// then threshold-pruned.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if `self` and `other` don't
    /// share the same tile-grid shape, or under the same condition as
    /// [`Self::perm`] if `p` is given.
    pub fn mult(
        &self,
        other: &Self,
        alpha: Option<T>,
        p: Option<&Permutation>,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        if self.tile_norms.shape() != other.tile_norms.shape() {
            return Err(ShapeError::MismatchedRange(format!(
                "mult: shapes {:?} and {:?} differ",
                self.tile_norms.shape(),
                other.tile_norms.shape()
            )));
        }
        let (shape, a_data) = to_flat(&self.tile_norms);
        let (_, b_data) = to_flat(&other.tile_norms);
        let sqrt_sizes = outer_product_tensor(&transform_vectors(&self.size_vectors, Transform::Sqrt));
        let (_, sqrt_data) = to_flat(&sqrt_sizes);
        let abs_alpha = alpha.map_or(T::one(), Float::abs);
        let mut data: Vec<T> = a_data
            .iter()
            .zip(b_data.iter())
            .zip(sqrt_data.iter())
            .map(|((&a, &b), &s)| abs_alpha * a * b * s)
            .collect();
        hard_zero(&mut data, threshold_as(config));
        let result = Self {
            tile_norms: from_flat(shape, data),
            size_vectors: self.size_vectors.clone(),
        };
        match p {
            Some(p) => result.perm(p),
            None => Ok(result),
        }
    }

    /// Shape-level GEMM: produces a norm estimate for
    /// every output tile of a contraction described by `helper`. When the
    /// contraction has no contracted axes (`K == 0`), falls back to a
    /// direct elementwise outer product scaled by `alpha`.
    ///
    /// Assumes `self`'s axes are ordered `[outer..., inner...]` and
    /// `other`'s `[inner..., outer...]`, matching `helper`'s begin/end
    /// ranges directly with no separate flattening permutation.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MismatchedRange`] if `self`'s rank doesn't
    /// match `helper.left_rank()`, or `other`'s doesn't match
    /// `helper.right_rank()`.
    pub fn gemm(
        &self,
        other: &Self,
        alpha: T,
        helper: &dyn GemmHelper,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        if self.dim() != helper.left_rank() {
            return Err(ShapeError::MismatchedRange(format!(
                "left operand rank {} does not match helper's left_rank {}",
                self.dim(),
                helper.left_rank()
            )));
        }
        if other.dim() != helper.right_rank() {
            return Err(ShapeError::MismatchedRange(format!(
                "right operand rank {} does not match helper's right_rank {}",
                other.dim(),
                helper.right_rank()
            )));
        }

        let left_range: Vec<usize> = self.tile_norms.shape().to_vec();
        let right_range: Vec<usize> = other.tile_norms.shape().to_vec();
        let (mut m, mut n, mut k) = (0usize, 0usize, 0usize);
        helper.compute_matrix_sizes(&mut m, &mut n, &mut k, &left_range, &right_range);

        let left_outer_sizes = &self.size_vectors[helper.left_outer_begin()..helper.left_outer_end()];
        let right_outer_sizes = &other.size_vectors[helper.right_outer_begin()..helper.right_outer_end()];
        let threshold = threshold_as::<T>(config);

        if helper.num_contract_ranks() == 0 {
            let (_, a_data) = to_flat(&self.tile_norms);
            let (_, b_data) = to_flat(&other.tile_norms);
            let mut data = vec![T::zero(); m * n];
            for i in 0..m {
                for j in 0..n {
                    data[i * n + j] = alpha * a_data[i] * b_data[j];
                }
            }
            hard_zero(&mut data, threshold);
            let result_size_vectors: Vec<Array1<T>> = left_outer_sizes
                .iter()
                .chain(right_outer_sizes.iter())
                .cloned()
                .collect();
            return Ok(Self {
                tile_norms: from_flat(vec![m, n], data),
                size_vectors: result_size_vectors,
            });
        }

        let left_inner_sizes = &self.size_vectors[helper.left_inner_begin()..helper.left_inner_end()];
        let right_inner_sizes = &other.size_vectors[helper.right_inner_begin()..helper.right_inner_end()];

        let left_k_scale = outer_product_tensor(&transform_vectors(left_inner_sizes, Transform::Noop));
        let right_k_scale = outer_product_tensor(&transform_vectors(right_inner_sizes, Transform::Noop));
        let (_, left_scale_flat) = to_flat(&left_k_scale);
        let (_, right_scale_flat) = to_flat(&right_k_scale);

        let (_, left_flat) = to_flat(&self.tile_norms);
        let (_, right_flat) = to_flat(&other.tile_norms);

        let mut left_scaled = vec![T::zero(); m * k];
        for i in 0..m {
            for kk in 0..k {
                left_scaled[i * k + kk] = left_flat[i * k + kk] * left_scale_flat[kk];
            }
        }
        let mut right_scaled = vec![T::zero(); k * n];
        for kk in 0..k {
            for j in 0..n {
                right_scaled[kk * n + j] = right_flat[kk * n + j] * right_scale_flat[kk];
            }
        }

        let mut data = vec![T::zero(); m * n];
        for i in 0..m {
            for j in 0..n {
                let mut acc = T::zero();
                for kk in 0..k {
                    acc = acc + left_scaled[i * k + kk] * right_scaled[kk * n + j];
                }
                data[i * n + j] = alpha * acc;
            }
        }
        hard_zero(&mut data, threshold);

        let result_size_vectors: Vec<Array1<T>> = left_outer_sizes
            .iter()
            .chain(right_outer_sizes.iter())
            .cloned()
            .collect();
        Ok(Self {
            tile_norms: from_flat(vec![m, n], data),
            size_vectors: result_size_vectors,
        })
    }
}

fn normalize<T: Float + NumCast>(
    raw_norms: ArrayD<T>,
    size_vectors: Vec<Array1<T>>,
    config: &ShapeConfig,
) -> SparseShape<T> {
    let inv_sizes = outer_product_tensor(&transform_vectors(&size_vectors, Transform::Inv));
    let (shape, raw_data) = to_flat(&raw_norms);
    let (_, inv_data) = to_flat(&inv_sizes);
    let mut data: Vec<T> = raw_data
        .iter()
        .zip(inv_data.iter())
        .map(|(&r, &s)| r * s)
        .collect();
    hard_zero(&mut data, threshold_as(config));
    SparseShape {
        tile_norms: from_flat(shape, data),
        size_vectors,
    }
}

impl<T: Float + NumCast + AddAssign> fmt::Display for SparseShape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SparseShape(dim={}, tiles={}, zero_tiles={})",
            self.dim(),
            self.tile_norms.len(),
            self.zero_tile_count(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemm::AxisGemmHelper;

    fn config(threshold: f64) -> ShapeConfig {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        ShapeConfig::new(threshold).unwrap()
    }

    fn shape_1d(norms: Vec<f64>, sizes: Vec<f64>, cfg: &ShapeConfig) -> SparseShape<f64> {
        let raw = ArrayD::from_shape_vec(IxDyn(&[norms.len()]), norms).unwrap();
        SparseShape::new(raw, vec![Array1::from(sizes)], cfg).unwrap()
    }

    #[test]
    fn scale_and_threshold_matches_worked_example() {
        let cfg = config(0.1);
        // raw norms [0.5, 0.3, 0.05] over tiles of size 10 -> normalized
        // [0.05, 0.03, 0.005].
        let shape = shape_1d(vec![0.5, 0.3, 0.05], vec![10.0, 10.0, 10.0], &cfg);
        assert_eq!(shape.data().iter().copied().collect::<Vec<_>>(), vec![0.05, 0.03, 0.005]);

        let scaled = shape.scale(2.0, &cfg);
        // [0.10, 0.06, 0.01] -> hard-zero below 0.1 -> [0.10, 0, 0].
        assert_eq!(scaled.data().iter().copied().collect::<Vec<_>>(), vec![0.10, 0.0, 0.0]);
    }

    #[test]
    fn add_is_a_triangle_inequality_upper_bound() {
        let cfg = config(0.0 + 1e-9);
        let a = SparseShape::from_precomputed_norms(
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.2, 0.0]).unwrap(),
            vec![Array1::from(vec![1.0, 1.0])],
        )
        .unwrap();
        let b = SparseShape::from_precomputed_norms(
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.0, 0.3]).unwrap(),
            vec![Array1::from(vec![1.0, 1.0])],
        )
        .unwrap();
        let summed = a.add(&b, &cfg).unwrap();
        assert_eq!(summed.data().iter().copied().collect::<Vec<_>>(), vec![0.2, 0.3]);
        assert!(!summed.is_zero(&[0]).unwrap());
        assert!(!summed.is_zero(&[1]).unwrap());
    }

    #[test]
    fn gemm_outer_product_special_case() {
        let cfg = config(f64::MIN_POSITIVE);
        let left = SparseShape::from_precomputed_norms(
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 2.0]).unwrap(),
            vec![Array1::from(vec![1.0, 1.0])],
        )
        .unwrap();
        let right = SparseShape::from_precomputed_norms(
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![3.0, 4.0]).unwrap(),
            vec![Array1::from(vec![1.0, 1.0])],
        )
        .unwrap();
        let helper = AxisGemmHelper::new(1, 0, 1);
        let result = left.gemm(&right, 1.0, &helper, &cfg).unwrap();
        assert_eq!(result.data().shape(), &[2, 2]);
        assert_eq!(
            result.data().iter().copied().collect::<Vec<_>>(),
            vec![3.0, 4.0, 6.0, 8.0]
        );
    }

    #[test]
    fn perm_then_inverse_perm_round_trips() {
        let cfg = config(1e-9);
        let raw = ArrayD::from_shape_vec(IxDyn(&[2, 3]), (0..6).map(f64::from).collect()).unwrap();
        let shape = SparseShape::new(
            raw,
            vec![Array1::from(vec![1.0, 1.0]), Array1::from(vec![1.0, 1.0, 1.0])],
            &cfg,
        )
        .unwrap();
        let p = Permutation::new(vec![1, 0]).unwrap();
        let round_tripped = shape.perm(&p).unwrap().perm(&p.inverse()).unwrap();
        assert_eq!(round_tripped.data().shape(), shape.data().shape());
        assert_eq!(
            round_tripped.data().iter().copied().collect::<Vec<_>>(),
            shape.data().iter().copied().collect::<Vec<_>>()
        );
    }

    #[test]
    fn scale_by_zero_clears_everything() {
        let cfg = config(1e-9);
        let shape = shape_1d(vec![1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0], &cfg);
        let zeroed = shape.scale(0.0, &cfg);
        assert_eq!(zeroed.zero_tile_count(), 3);
    }

    #[test]
    fn scale_by_one_is_identity() {
        let cfg = config(1e-9);
        let shape = shape_1d(vec![1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0], &cfg);
        let same = shape.scale(1.0, &cfg);
        assert_eq!(
            same.data().iter().copied().collect::<Vec<_>>(),
            shape.data().iter().copied().collect::<Vec<_>>()
        );
    }

    #[test]
    fn all_zero_shape_reports_every_tile_zero() {
        let cfg = config(1e-9);
        let shape = shape_1d(vec![0.0, 0.0], vec![1.0, 1.0], &cfg);
        for i in 0..2 {
            assert!(shape.is_zero(&[i]).unwrap());
        }
        assert_eq!(shape.zero_tile_count(), 2);
        assert_eq!(shape.zero_fraction(), 1.0);
    }

    #[test]
    fn one_dimensional_shape_takes_the_recursion_floor_path() {
        // A 1-D shape's normalization goes through the dim==1 floor of the
        // outer-product scaffold; this should agree exactly with directly
        // dividing by the size vector.
        let cfg = config(0.0 + 1e-12);
        let raw = ArrayD::from_shape_vec(IxDyn(&[3]), vec![2.0, 4.0, 6.0]).unwrap();
        let sizes = vec![2.0, 4.0, 3.0];
        let shape = SparseShape::new(raw, vec![Array1::from(sizes.clone())], &cfg).unwrap();
        let expected: Vec<f64> = vec![2.0 / 2.0, 4.0 / 4.0, 6.0 / 3.0];
        assert_eq!(shape.data().iter().copied().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn mismatched_ranges_are_rejected() {
        let cfg = config(1e-9);
        let raw = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 2.0]).unwrap();
        let err = SparseShape::new(raw, vec![Array1::from(vec![1.0, 1.0, 1.0])], &cfg).unwrap_err();
        assert!(matches!(err, ShapeError::MismatchedRange(_)));
    }

    #[test]
    fn negative_norms_are_rejected() {
        let cfg = config(1e-9);
        let raw = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, -1.0]).unwrap();
        let err = SparseShape::new(raw, vec![Array1::from(vec![1.0, 1.0])], &cfg).unwrap_err();
        assert!(matches!(err, ShapeError::NegativeNorm(_)));
    }
}
