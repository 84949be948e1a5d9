//! Per-variable bound accumulation and resolution

use serde::{Deserialize, Serialize};

use crate::checker;
use crate::position::ConstraintPosition;
use crate::types::{Ty, TypeVarId, Variance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundKind {
    Upper,
    Lower,
    Exact,
}

impl BoundKind {
    /// The kind seen from the other side of a subtype constraint.
    pub fn reverse(self) -> BoundKind {
        match self {
            BoundKind::Upper => BoundKind::Lower,
            BoundKind::Lower => BoundKind::Upper,
            BoundKind::Exact => BoundKind::Exact,
        }
    }
}

/// One recorded bound on a type variable.
///
/// `is_pure` marks bounds free of other registered variables; only those may
/// seed a resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub ty: Ty,
    pub kind: BoundKind,
    pub position: ConstraintPosition,
    pub is_pure: bool,
}

/// The accumulating bound set of one registered variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBounds {
    pub var: TypeVarId,
    /// Directional hint from the variable's declaration site.
    pub variance: Variance,
    bounds: Vec<Bound>,
}

impl TypeBounds {
    pub fn new(var: TypeVarId, variance: Variance) -> Self {
        Self {
            var,
            variance,
            bounds: vec![],
        }
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Record a bound unless an equal `(type, kind, position)` triple is
    /// already present. Returns whether the set changed.
    pub fn add_bound(&mut self, bound: Bound) -> bool {
        let duplicate = self.bounds.iter().any(|existing| {
            existing.ty == bound.ty
                && existing.kind == bound.kind
                && existing.position == bound.position
        });
        if duplicate {
            return false;
        }
        self.bounds.push(bound);
        true
    }

    /// Rebuild the set under a variable rename and a per-bound filter/map,
    /// preserving duplicate suppression.
    pub fn transform(
        &self,
        var: TypeVarId,
        mut f: impl FnMut(&Bound) -> Option<Bound>,
    ) -> TypeBounds {
        let mut out = TypeBounds::new(var, self.variance);
        for bound in &self.bounds {
            if let Some(mapped) = f(bound) {
                out.add_bound(mapped);
            }
        }
        out
    }

    /// Candidate resolved values, from pure bounds only: exact bounds are
    /// preferred, then lower bounds, then the upper-bound types themselves. A
    /// candidate counts only if it satisfies every pure upper and exact bound;
    /// when no candidate does, all candidate types are surfaced together so
    /// the caller sees the conflict. Distinctness is structural type
    /// equality, ignoring origin positions.
    pub fn resolved_values(&self) -> Vec<&Ty> {
        let pure = |kind: BoundKind| {
            self.bounds
                .iter()
                .filter(move |b| b.is_pure && b.kind == kind)
                .map(|b| &b.ty)
        };

        let exact = distinct(pure(BoundKind::Exact));
        let lowers = distinct(pure(BoundKind::Lower));
        let uppers = distinct(pure(BoundKind::Upper));

        let admissible = |candidate: &&Ty| {
            uppers.iter().all(|upper| checker::satisfies(candidate, upper))
                && exact.iter().all(|e| e == candidate)
        };
        let tier = if !exact.is_empty() {
            &exact
        } else if !lowers.is_empty() {
            &lowers
        } else {
            &uppers
        };
        let satisfying: Vec<&Ty> = tier.iter().copied().filter(admissible).collect();
        if !satisfying.is_empty() {
            return satisfying;
        }

        distinct(exact.into_iter().chain(lowers).chain(uppers))
    }

    /// The single unambiguous value, if there is exactly one candidate and it
    /// carries no unresolved placeholder anywhere inside.
    pub fn value(&self) -> Option<&Ty> {
        match self.resolved_values().as_slice() {
            [single]
                if !single.is_uninferred()
                    && !single.contains(&|ty: &Ty| ty.is_dont_care()) =>
            {
                Some(single)
            }
            _ => None,
        }
    }
}

fn distinct<'a>(tys: impl Iterator<Item = &'a Ty>) -> Vec<&'a Ty> {
    let mut out: Vec<&Ty> = vec![];
    for ty in tys {
        if !out.contains(&ty) {
            out.push(ty);
        }
    }
    out
}
