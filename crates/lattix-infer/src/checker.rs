//! Structural compatibility procedure
//!
//! The walk over two types is deliberately shallow: every nested comparison is
//! routed back through [`CheckerCallbacks`], so the solver can intercept the
//! sub-constraint, peel off its own type variables and re-enter the procedure
//! for what remains. Deficiencies (constructor clashes, refused captures) are
//! reported through callbacks too, never panicked on.

use crate::types::{Ty, TyArg, Variance};

/// How the caller wants nested comparisons and deficiencies handled.
pub trait CheckerCallbacks {
    /// Nested invariant position: the two types must be equal.
    fn assert_equal_types(&mut self, a: &Ty, b: &Ty);
    /// Nested covariant position: `sub` must be a subtype of `sup`.
    fn assert_subtype(&mut self, sub: &Ty, sup: &Ty);
    /// Top-level equality of head constructors; `false` means the caller
    /// recorded a mismatch and the walk must stop.
    fn assert_equal_constructors(&mut self, a: &Ty, b: &Ty) -> bool;
    /// A projected argument met an un-projected `variable` slot; returns
    /// whether the caller handled it by capturing the projection.
    fn capture(&mut self, variable: &Ty, projected: &TyArg) -> bool;
    /// No way to relate the two types structurally.
    fn no_corresponding_supertype(&mut self, sub: &Ty, sup: &Ty);
}

pub fn equal_types(cb: &mut dyn CheckerCallbacks, a: &Ty, b: &Ty) {
    if a.is_dont_care() || b.is_dont_care() {
        return;
    }
    if a.nullable != b.nullable {
        cb.no_corresponding_supertype(a, b);
        return;
    }
    if !cb.assert_equal_constructors(a, b) {
        return;
    }
    if a.args.len() != b.args.len() {
        cb.no_corresponding_supertype(a, b);
        return;
    }
    for (left, right) in a.args.iter().zip(&b.args) {
        if left.variance == right.variance {
            cb.assert_equal_types(&left.ty, &right.ty);
        } else if right.is_projected() && left.variance == Variance::Invariant {
            if !cb.capture(&left.ty, right) {
                cb.no_corresponding_supertype(a, b);
            }
        } else if left.is_projected() && right.variance == Variance::Invariant {
            if !cb.capture(&right.ty, left) {
                cb.no_corresponding_supertype(a, b);
            }
        } else {
            cb.no_corresponding_supertype(a, b);
        }
    }
}

pub fn is_subtype_of(cb: &mut dyn CheckerCallbacks, sub: &Ty, sup: &Ty) {
    if sub.is_dont_care() || sup.is_dont_care() {
        return;
    }
    if sup.is_nullable_any() || (sup.is_any() && !sub.nullable) {
        return;
    }
    if sub.nullable && !sup.nullable {
        cb.no_corresponding_supertype(sub, sup);
        return;
    }
    // No class hierarchy is modeled here beyond the top type; a subtype
    // relation between distinct constructors has no corresponding supertype.
    if sub.ctor != sup.ctor || sub.args.len() != sup.args.len() {
        cb.no_corresponding_supertype(sub, sup);
        return;
    }
    for (below, above) in sub.args.iter().zip(&sup.args) {
        match (below.variance, above.variance) {
            (Variance::Invariant, Variance::Invariant) => {
                cb.assert_equal_types(&below.ty, &above.ty);
            }
            (Variance::Covariant | Variance::Invariant, Variance::Covariant) => {
                cb.assert_subtype(&below.ty, &above.ty);
            }
            (Variance::Contravariant | Variance::Invariant, Variance::Contravariant) => {
                cb.assert_subtype(&above.ty, &below.ty);
            }
            (Variance::Covariant | Variance::Contravariant, Variance::Invariant) => {
                if !cb.capture(&above.ty, below) {
                    cb.no_corresponding_supertype(sub, sup);
                }
            }
            _ => cb.no_corresponding_supertype(sub, sup),
        }
    }
}

/// Plain boolean subtype test with no variables and no capture, used when
/// checking whether a candidate value satisfies accumulated upper bounds.
pub fn satisfies(sub: &Ty, sup: &Ty) -> bool {
    let mut satisfier = Satisfier { ok: true };
    is_subtype_of(&mut satisfier, sub, sup);
    satisfier.ok
}

struct Satisfier {
    ok: bool,
}

impl CheckerCallbacks for Satisfier {
    fn assert_equal_types(&mut self, a: &Ty, b: &Ty) {
        if a != b {
            self.ok = false;
        }
    }

    fn assert_subtype(&mut self, sub: &Ty, sup: &Ty) {
        if self.ok {
            is_subtype_of(self, sub, sup);
        }
    }

    fn assert_equal_constructors(&mut self, a: &Ty, b: &Ty) -> bool {
        let equal = a.ctor == b.ctor;
        self.ok &= equal;
        equal
    }

    fn capture(&mut self, _variable: &Ty, _projected: &TyArg) -> bool {
        false
    }

    fn no_corresponding_supertype(&mut self, _sub: &Ty, _sup: &Ty) {
        self.ok = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Ty {
        Ty::class("Int", vec![])
    }

    fn list_of(arg: TyArg) -> Ty {
        Ty::class("List", vec![arg])
    }

    #[test]
    fn everything_satisfies_the_top_type() {
        assert!(satisfies(&int(), &Ty::any()));
        assert!(satisfies(&int().with_nullable(true), &Ty::nullable_any()));
        assert!(!satisfies(&int().with_nullable(true), &Ty::any()));
    }

    #[test]
    fn nullability_must_not_widen() {
        assert!(satisfies(&int(), &int().with_nullable(true)));
        assert!(!satisfies(&int().with_nullable(true), &int()));
    }

    #[test]
    fn invariant_arguments_require_equality() {
        let list_int = list_of(TyArg::invariant(int()));
        let list_str = list_of(TyArg::invariant(Ty::class("String", vec![])));
        assert!(satisfies(&list_int, &list_int));
        assert!(!satisfies(&list_int, &list_str));
    }

    #[test]
    fn covariant_arguments_widen_to_the_top_type() {
        let list_int = list_of(TyArg::new(Variance::Covariant, int()));
        let list_any = list_of(TyArg::new(Variance::Covariant, Ty::any()));
        assert!(satisfies(&list_int, &list_any));
        assert!(!satisfies(&list_any, &list_int));
    }

    #[test]
    fn distinct_constructors_do_not_relate() {
        assert!(!satisfies(&int(), &Ty::class("String", vec![])));
    }
}
