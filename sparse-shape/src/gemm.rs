//! `GemmHelper`: describes a contraction's index partition to
//! [`crate::SparseShape::gemm`].
//!
//! The shape engine never inspects a contraction's axis layout itself; it
//! asks a `GemmHelper` for the boundaries and lets the caller (who already
//! knows which axes of which operand are being contracted) supply them.

/// Describes how a contraction's axes split into left/right outer axes and
/// contracted (inner) axes, and how to compute the resulting matrix sizes
/// and output range.
pub trait GemmHelper {
    /// How many axes are contracted away.
    fn num_contract_ranks(&self) -> usize;
    /// The rank of the result (left outer rank + right outer rank).
    fn result_rank(&self) -> usize;
    /// The rank of the left operand.
    fn left_rank(&self) -> usize;
    /// The rank of the right operand.
    fn right_rank(&self) -> usize;
    /// First outer axis of the left operand.
    fn left_outer_begin(&self) -> usize;
    /// One past the last outer axis of the left operand.
    fn left_outer_end(&self) -> usize;
    /// First outer axis of the right operand.
    fn right_outer_begin(&self) -> usize;
    /// One past the last outer axis of the right operand.
    fn right_outer_end(&self) -> usize;
    /// First contracted axis of the left operand.
    fn left_inner_begin(&self) -> usize;
    /// One past the last contracted axis of the left operand.
    fn left_inner_end(&self) -> usize;
    /// First contracted axis of the right operand.
    fn right_inner_begin(&self) -> usize;
    /// One past the last contracted axis of the right operand.
    fn right_inner_end(&self) -> usize;

    /// Builds the result's tile-grid range (one extent per result axis) out
    /// of the left and right operands' tile-grid ranges.
    fn make_result_range(&self, left_range: &[usize], right_range: &[usize]) -> Vec<usize>;

    /// Computes `M` (product of left outer extents), `N` (product of right
    /// outer extents), and `K` (product of contracted extents) for the
    /// operand ranges given.
    fn compute_matrix_sizes(
        &self,
        m: &mut usize,
        n: &mut usize,
        k: &mut usize,
        left_range: &[usize],
        right_range: &[usize],
    );
}

/// A [`GemmHelper`] for the common case of contiguous axis ranges: the left
/// operand's axes are `[outer..., inner...]` and the right operand's are
/// `[inner..., outer...]`, so flattening to `(M, K)` and `(K, N)` matrices
/// needs no permutation step first.
#[derive(Debug, Clone, Copy)]
pub struct AxisGemmHelper {
    left_outer_rank: usize,
    contract_rank: usize,
    right_outer_rank: usize,
}

impl AxisGemmHelper {
    /// Builds a helper for a contraction with `left_outer_rank` uncontracted
    /// left axes, `contract_rank` contracted axes, and `right_outer_rank`
    /// uncontracted right axes.
    #[must_use]
    pub fn new(left_outer_rank: usize, contract_rank: usize, right_outer_rank: usize) -> Self {
        Self {
            left_outer_rank,
            contract_rank,
            right_outer_rank,
        }
    }
}

impl GemmHelper for AxisGemmHelper {
    fn num_contract_ranks(&self) -> usize {
        self.contract_rank
    }

    fn result_rank(&self) -> usize {
        self.left_outer_rank + self.right_outer_rank
    }

    fn left_rank(&self) -> usize {
        self.left_outer_rank + self.contract_rank
    }

    fn right_rank(&self) -> usize {
        self.contract_rank + self.right_outer_rank
    }

    fn left_outer_begin(&self) -> usize {
        0
    }

    fn left_outer_end(&self) -> usize {
        self.left_outer_rank
    }

    fn right_outer_begin(&self) -> usize {
        self.contract_rank
    }

    fn right_outer_end(&self) -> usize {
        self.contract_rank + self.right_outer_rank
    }

    fn left_inner_begin(&self) -> usize {
        self.left_outer_rank
    }

    fn left_inner_end(&self) -> usize {
        self.left_outer_rank + self.contract_rank
    }

    fn right_inner_begin(&self) -> usize {
        0
    }

    fn right_inner_end(&self) -> usize {
        self.contract_rank
    }

    fn make_result_range(&self, left_range: &[usize], right_range: &[usize]) -> Vec<usize> {
        let mut range = left_range[self.left_outer_begin()..self.left_outer_end()].to_vec();
        range.extend_from_slice(&right_range[self.right_outer_begin()..self.right_outer_end()]);
        range
    }

    fn compute_matrix_sizes(
        &self,
        m: &mut usize,
        n: &mut usize,
        k: &mut usize,
        left_range: &[usize],
        right_range: &[usize],
    ) {
        *m = left_range[self.left_outer_begin()..self.left_outer_end()]
            .iter()
            .product();
        *k = left_range[self.left_inner_begin()..self.left_inner_end()]
            .iter()
            .product();
        *n = right_range[self.right_outer_begin()..self.right_outer_end()]
            .iter()
            .product();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_product_helper_has_zero_contract_rank() {
        let helper = AxisGemmHelper::new(1, 0, 1);
        assert_eq!(helper.num_contract_ranks(), 0);
        assert_eq!(helper.result_rank(), 2);
    }

    #[test]
    fn matrix_sizes_match_ranges() {
        let helper = AxisGemmHelper::new(2, 1, 1);
        let left_range = [2, 3, 4]; // outer(2,3), inner(4)
        let right_range = [4, 5]; // inner(4), outer(5)
        let (mut m, mut n, mut k) = (0, 0, 0);
        helper.compute_matrix_sizes(&mut m, &mut n, &mut k, &left_range, &right_range);
        assert_eq!((m, n, k), (6, 5, 4));
    }
}
