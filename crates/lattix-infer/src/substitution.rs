//! Applying a solved variable mapping back onto types

use indexmap::IndexMap;

use crate::types::{Ty, TyArg, TyCtor, TypeVarId, Variance};

/// A variable-to-type mapping produced by a solved (or partially solved)
/// constraint system.
#[derive(Debug, Clone, Default)]
pub struct TypeSubstitution {
    map: IndexMap<TypeVarId, Ty>,
    approximate_captured_types: bool,
}

impl TypeSubstitution {
    pub fn new(map: IndexMap<TypeVarId, Ty>) -> Self {
        Self {
            map,
            approximate_captured_types: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Mark this substitution as eligible to approximate previously captured
    /// projections back to ordinary types when applied.
    pub fn with_captured_approximation(mut self) -> Self {
        self.approximate_captured_types = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, var: TypeVarId) -> Option<&Ty> {
        self.map.get(&var)
    }

    /// Substitute recursively through a type. Nullability of a replaced
    /// variable occurrence is carried over onto the replacement. Replacements
    /// must not mention mapped variables themselves.
    pub fn apply(&self, ty: &Ty) -> Ty {
        match &ty.ctor {
            TyCtor::Var(id) => match self.map.get(id) {
                Some(replacement) => {
                    let mut out = self.apply(replacement);
                    out.nullable |= ty.nullable;
                    out
                }
                None => ty.clone(),
            },
            TyCtor::Captured(arg) if self.approximate_captured_types => {
                // Approximate to the upper projection: an out-capture becomes
                // the projected type itself, an in-capture widens to the top.
                let mut out = match arg.variance {
                    Variance::Contravariant => Ty::nullable_any(),
                    _ => self.apply(&arg.ty),
                };
                out.nullable |= ty.nullable;
                out
            }
            _ => Ty {
                ctor: ty.ctor.clone(),
                args: ty
                    .args
                    .iter()
                    .map(|arg| TyArg::new(arg.variance, self.apply(&arg.ty)))
                    .collect(),
                nullable: ty.nullable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Ty {
        Ty::class("Int", vec![])
    }

    #[test]
    fn applies_through_nested_arguments() {
        let t = TypeVarId(0);
        let mut map = IndexMap::new();
        map.insert(t, int());
        let subst = TypeSubstitution::new(map);

        let list_of_t = Ty::class("List", vec![TyArg::invariant(Ty::var_ref(t))]);
        let applied = subst.apply(&list_of_t);
        assert_eq!(applied, Ty::class("List", vec![TyArg::invariant(int())]));
    }

    #[test]
    fn nullable_variable_occurrence_keeps_nullability() {
        let t = TypeVarId(0);
        let mut map = IndexMap::new();
        map.insert(t, int());
        let subst = TypeSubstitution::new(map);

        let applied = subst.apply(&Ty::var_ref(t).with_nullable(true));
        assert!(applied.nullable);
    }

    #[test]
    fn captured_types_approximate_only_when_flagged() {
        let captured = Ty::captured(TyArg::new(Variance::Covariant, int()));

        let plain = TypeSubstitution::empty();
        assert_eq!(plain.apply(&captured), captured);

        let approximating = TypeSubstitution::empty().with_captured_approximation();
        assert_eq!(approximating.apply(&captured), int());

        let in_capture = Ty::captured(TyArg::new(Variance::Contravariant, int()));
        assert_eq!(approximating.apply(&in_capture), Ty::nullable_any());
    }

    #[test]
    fn unmapped_variables_are_left_alone() {
        let subst = TypeSubstitution::empty();
        let t = Ty::var_ref(TypeVarId(3));
        assert_eq!(subst.apply(&t), t);
    }
}
