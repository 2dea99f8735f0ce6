//! Collective process-wide sum, as consumed by `sparse-shape`'s collective
//! constructor.

use crate::error::SubstrateError;

/// A collective operation that leaves every participating process holding
/// the sum of per-process contributions to `data`.
pub trait AllReduceSum<T> {
    /// Sums `data` element-wise across all processes in the group, in
    /// place.
    ///
    /// # Errors
    ///
    /// Returns [`SubstrateError::CollectiveFailed`] if the collective could
    /// not complete (e.g. a peer process disappeared mid-reduction).
    fn all_reduce_sum(&self, data: &mut [T]) -> Result<(), SubstrateError>;
}
