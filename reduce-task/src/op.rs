//! Operator contracts: what a reduction needs from the function it folds
//! with. Expressed as two capability traits rather than one overloaded
//! `op(...)` signature, since the single-argument and paired-argument
//! shapes genuinely take different inputs.

/// A commutative-monoid-ish operator folding one value per argument into a
/// running result.
///
/// `identity` must produce a value such that folding it with any other
/// result via `combine` is a no-op; callers building a [`crate::ReduceTask`]
/// over zero arguments get `finalize(identity())` as the whole answer.
pub trait SingleArgOp: Send + Sync {
    /// The type produced by each argument's future.
    type Value: Send + 'static;
    /// The running (and final, pre-`finalize`) result type.
    type Output: Send + Clone + 'static;

    /// A fresh, empty result.
    fn identity(&self) -> Self::Output;

    /// Merges two independently-accumulated results into `result`.
    fn combine(&self, result: &mut Self::Output, other: Self::Output);

    /// Folds one argument's value into `result`.
    fn reduce(&self, result: &mut Self::Output, arg: Self::Value);

    /// Folds two arguments into `result` at once. Implementations that have
    /// a cheaper fused path for exactly two arguments (e.g. a single SIMD
    /// accumulate instead of two scalar ones) should override this; the
    /// default just calls [`Self::reduce`] twice.
    fn reduce_two(&self, result: &mut Self::Output, a: Self::Value, b: Self::Value) {
        self.reduce(result, a);
        self.reduce(result, b);
    }

    /// Post-processes the fully-reduced result before it is handed to the
    /// caller. The default is the identity transform.
    fn finalize(&self, result: Self::Output) -> Self::Output {
        result
    }
}

/// Like [`SingleArgOp`], but each argument contributes a pair of
/// independently-arriving values (for example the left and right operand of
/// a per-tile dot product feeding a running sum).
pub trait PairArgOp: Send + Sync {
    /// The left half of each argument pair.
    type Left: Send + 'static;
    /// The right half of each argument pair.
    type Right: Send + 'static;
    /// The running (and final, pre-`finalize`) result type.
    type Output: Send + Clone + 'static;

    /// A fresh, empty result.
    fn identity(&self) -> Self::Output;

    /// Merges two independently-accumulated results into `result`.
    fn combine(&self, result: &mut Self::Output, other: Self::Output);

    /// Folds one argument pair into `result`.
    fn reduce_pair(&self, result: &mut Self::Output, left: Self::Left, right: Self::Right);

    /// Fused two-pair fold; override for a cheaper combined path. The
    /// default calls [`Self::reduce_pair`] twice.
    fn reduce_two_pairs(
        &self,
        result: &mut Self::Output,
        l1: Self::Left,
        r1: Self::Right,
        l2: Self::Left,
        r2: Self::Right,
    ) {
        self.reduce_pair(result, l1, r1);
        self.reduce_pair(result, l2, r2);
    }

    /// Post-processes the fully-reduced result before it is handed to the
    /// caller. The default is the identity transform.
    fn finalize(&self, result: Self::Output) -> Self::Output {
        result
    }
}
