//! Reduction operators.
//!
//! A reduction operator is an identity value plus a fold function that is
//! commutative and associative over the values tasks contribute. The
//! runtime relies on that to fold concurrent contributions in whatever
//! order they finish.

use std::fmt;

use snap_core::ReductionId;

/// Id of the built-in sum operator.
pub const SUM_REDUCTION_ID: ReductionId = ReductionId(1);
/// Id of the built-in product operator.
pub const PROD_REDUCTION_ID: ReductionId = ReductionId(2);
/// Id of the built-in maximum operator.
pub const MAX_REDUCTION_ID: ReductionId = ReductionId(3);
/// Id of the built-in minimum operator.
pub const MIN_REDUCTION_ID: ReductionId = ReductionId(4);

/// Binary fold applied element-wise.
pub type FoldFn = fn(f64, f64) -> f64;

/// A registered reduction operator.
#[derive(Clone, Copy)]
pub struct ReductionOp {
    id: ReductionId,
    name: &'static str,
    identity: f64,
    fold: FoldFn,
}

impl ReductionOp {
    /// Define an operator. `fold` must be commutative and associative, and
    /// `identity` must satisfy `fold(identity, x) == x`.
    pub const fn new(id: ReductionId, name: &'static str, identity: f64, fold: FoldFn) -> Self {
        Self {
            id,
            name,
            identity,
            fold,
        }
    }

    /// Operator id.
    pub fn id(&self) -> ReductionId {
        self.id
    }

    /// Operator name for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Identity element; reduce-mode regions start filled with it.
    pub fn identity(&self) -> f64 {
        self.identity
    }

    /// Combine an accumulated value with a contribution.
    pub fn apply(&self, acc: f64, value: f64) -> f64 {
        (self.fold)(acc, value)
    }

    /// Whether `other` is this operator: same id, name, identity bits and
    /// fold function.
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.identity.to_bits() == other.identity.to_bits()
            && std::ptr::fn_addr_eq(self.fold, other.fold)
    }

    /// Fold `src` element-wise into `dst`.
    pub fn fold_into(&self, dst: &mut [f64], src: &[f64]) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = (self.fold)(*d, s);
        }
    }
}

impl fmt::Debug for ReductionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReductionOp")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("identity", &self.identity)
            .finish()
    }
}

fn sum(a: f64, b: f64) -> f64 {
    a + b
}

fn prod(a: f64, b: f64) -> f64 {
    a * b
}

fn max(a: f64, b: f64) -> f64 {
    a.max(b)
}

fn min(a: f64, b: f64) -> f64 {
    a.min(b)
}

/// Operators every registry starts with.
pub fn builtin_reductions() -> [ReductionOp; 4] {
    [
        ReductionOp::new(SUM_REDUCTION_ID, "sum", 0.0, sum),
        ReductionOp::new(PROD_REDUCTION_ID, "prod", 1.0, prod),
        ReductionOp::new(MAX_REDUCTION_ID, "max", f64::NEG_INFINITY, max),
        ReductionOp::new(MIN_REDUCTION_ID, "min", f64::INFINITY, min),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn builtin_ids_are_distinct() {
        let ops = builtin_reductions();
        for (i, a) in ops.iter().enumerate() {
            for b in &ops[i + 1..] {
                assert_ne!(a.id(), b.id());
            }
        }
    }

    #[test]
    fn fold_into_is_elementwise() {
        let [sum, _, max, _] = builtin_reductions();
        let mut dst = vec![1.0, 5.0];
        sum.fold_into(&mut dst, &[2.0, 3.0]);
        assert_eq!(dst, vec![3.0, 8.0]);
        max.fold_into(&mut dst, &[10.0, 0.0]);
        assert_eq!(dst, vec![10.0, 8.0]);
    }

    proptest! {
        #[test]
        fn identity_is_neutral(x in -1.0e6f64..1.0e6) {
            for op in builtin_reductions() {
                prop_assert_eq!(op.apply(op.identity(), x), x);
            }
        }

        #[test]
        fn integer_sums_commute(a in -1000i32..1000, b in -1000i32..1000) {
            let [sum, ..] = builtin_reductions();
            prop_assert_eq!(sum.apply(a as f64, b as f64), sum.apply(b as f64, a as f64));
        }
    }
}
