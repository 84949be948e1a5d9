//! Incremental constraint collection and solving
//!
//! A [`ConstraintSystem`] is fed subtype/equality constraints by an inference
//! driver, decomposes each one recursively through the structural checker,
//! narrows per-variable bound sets and answers status/substitution queries at
//! any point. Recoverable problems accumulate as [`ConstraintError`]s; nothing
//! here aborts.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::bounds::{Bound, BoundKind, TypeBounds};
use crate::checker::{self, CheckerCallbacks};
use crate::error::ConstraintError;
use crate::position::ConstraintPosition;
use crate::substitution::TypeSubstitution;
use crate::types::{Ty, TyArg, TyCtor, TypeVarId, Variance};

/// Relation kind of an incoming constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Subtype,
    Equal,
}

/// Registration record for one type variable.
#[derive(Debug, Clone)]
pub struct TypeVarSpec {
    pub id: TypeVarId,
    /// Directional hint from the declaration site.
    pub variance: Variance,
    pub upper_bounds: Vec<Ty>,
}

impl TypeVarSpec {
    pub fn unbounded(id: TypeVarId) -> Self {
        Self {
            id,
            variance: Variance::Invariant,
            upper_bounds: vec![],
        }
    }
}

#[derive(Debug, Clone)]
struct VarState {
    declared_upper_bounds: Vec<Ty>,
    bounds: TypeBounds,
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem {
    vars: IndexMap<TypeVarId, VarState>,
    errors: Vec<ConstraintError>,
}

impl ConstraintSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the variable set. Each declared upper bound (other than the trivial
    /// nullable top type) becomes an Upper constraint tagged with its bound
    /// index; purity is judged against the full registered set, so the whole
    /// batch is inserted before any bound is recorded.
    pub fn register_type_variables(&mut self, specs: impl IntoIterator<Item = TypeVarSpec>) {
        let specs: Vec<TypeVarSpec> = specs.into_iter().collect();
        for spec in &specs {
            self.vars.insert(
                spec.id,
                VarState {
                    declared_upper_bounds: spec.upper_bounds.clone(),
                    bounds: TypeBounds::new(spec.id, spec.variance),
                },
            );
        }
        debug!(count = specs.len(), "registered type variables");
        for spec in specs {
            for (index, upper) in spec.upper_bounds.into_iter().enumerate() {
                if upper.is_nullable_any() {
                    continue;
                }
                self.add_bound(
                    spec.id,
                    upper,
                    BoundKind::Upper,
                    ConstraintPosition::TypeBound { index },
                );
            }
        }
    }

    /// `constraining <: subject`.
    pub fn add_subtype_constraint(
        &mut self,
        constraining: &Ty,
        subject: &Ty,
        position: ConstraintPosition,
    ) {
        self.do_add_constraint(ConstraintKind::Subtype, constraining, subject, &position, 0);
    }

    /// `subject <: constraining`. A don't-care constraining type stands for
    /// "no expected type" and is dropped without note.
    pub fn add_supertype_constraint(
        &mut self,
        constraining: &Ty,
        subject: &Ty,
        position: ConstraintPosition,
    ) {
        if constraining.is_dont_care() {
            return;
        }
        self.do_add_constraint(ConstraintKind::Subtype, subject, constraining, &position, 0);
    }

    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        sub: &Ty,
        sup: &Ty,
        position: ConstraintPosition,
    ) {
        self.do_add_constraint(kind, sub, sup, &position, 0);
    }

    pub fn is_my_type_variable(&self, ty: &Ty) -> bool {
        self.registered_var(ty).is_some()
    }

    pub fn type_variables(&self) -> impl Iterator<Item = TypeVarId> + '_ {
        self.vars.keys().copied()
    }

    pub fn type_bounds(&self, var: TypeVarId) -> Option<&TypeBounds> {
        self.vars.get(&var).map(|state| &state.bounds)
    }

    pub fn errors(&self) -> &[ConstraintError] {
        &self.errors
    }

    pub fn status(&self) -> SystemStatus<'_> {
        SystemStatus { system: self }
    }

    /// Resolve every variable, standing in the hard "uninferred" marker for
    /// anything without an unambiguous value.
    pub fn resulting_substitution(&self) -> TypeSubstitution {
        self.substitution(Ty::uninferred)
    }

    /// Like [`resulting_substitution`](Self::resulting_substitution) but
    /// unresolved variables become the soft don't-care placeholder.
    pub fn current_substitution(&self) -> TypeSubstitution {
        self.substitution(|_| Ty::dont_care())
    }

    pub fn copy(&self) -> Self {
        self.rebuilt(&|var| var, &|_| true)
    }

    /// A new system keeping only constraints (and errors) whose position
    /// passes `keep`.
    pub fn filter_constraints(&self, keep: impl Fn(&ConstraintPosition) -> bool) -> Self {
        self.rebuilt(&|var| var, &keep)
    }

    /// A new system with every constraint attributable to `origin` removed.
    pub fn filter_constraints_out(&self, origin: &ConstraintPosition) -> Self {
        self.filter_constraints(|position| !position.derived_from(origin))
    }

    pub fn without_weak_constraints(&self) -> Self {
        self.filter_constraints(|position| position.has_only_strong_constraints())
    }

    /// A new system with every variable renamed through `rename`; used to
    /// re-home a solved call onto fresh variables.
    pub fn substitute_type_variables(&self, rename: impl Fn(TypeVarId) -> TypeVarId) -> Self {
        self.rebuilt(&rename, &|_| true)
    }

    fn registered_var(&self, ty: &Ty) -> Option<TypeVarId> {
        ty.type_var().filter(|var| self.vars.contains_key(var))
    }

    fn is_pure(&self, ty: &Ty) -> bool {
        !ty.contains(&|nested: &Ty| {
            nested
                .type_var()
                .is_some_and(|var| self.vars.contains_key(&var))
        })
    }

    fn add_bound(&mut self, var: TypeVarId, ty: Ty, kind: BoundKind, position: ConstraintPosition) {
        if ty.is_dont_care() || ty.is_uninferred() {
            return;
        }
        if ty.is_error() {
            self.errors
                .push(ConstraintError::ErrorInConstrainingType { position });
            return;
        }
        let is_pure = self.is_pure(&ty);
        if let Some(state) = self.vars.get_mut(&var) {
            let added = state.bounds.add_bound(Bound {
                ty,
                kind,
                position,
                is_pure,
            });
            if added {
                trace!(?var, ?kind, "recorded bound");
            }
        }
    }

    fn do_add_constraint(
        &mut self,
        kind: ConstraintKind,
        sub: &Ty,
        sup: &Ty,
        position: &ConstraintPosition,
        depth: u32,
    ) {
        if sub.is_dont_care() || sup.is_dont_care() || sub.is_uninferred() || sup.is_uninferred() {
            return;
        }
        if sub.is_error() || sup.is_error() {
            self.errors.push(ConstraintError::ErrorInConstrainingType {
                position: position.clone(),
            });
            return;
        }

        if let TyCtor::FunctionPlaceholder { declared_params } = &sub.ctor {
            // Against one of our own variables the arity is still unknowable;
            // the constraint is meaningless until the variable resolves.
            if self.is_my_type_variable(sup) {
                return;
            }
            if sup.is_function() {
                let materialized = materialize_placeholder(declared_params, sup);
                self.do_add_constraint(kind, &materialized, sup, position, depth);
                return;
            }
        }

        match (self.registered_var(sub), self.registered_var(sup)) {
            (Some(_), Some(_)) => {
                // A variable-to-variable constraint bounds both sides.
                let (sub_kind, sup_kind) = match kind {
                    ConstraintKind::Equal => (BoundKind::Exact, BoundKind::Exact),
                    ConstraintKind::Subtype => (BoundKind::Upper, BoundKind::Upper.reverse()),
                };
                self.generate_type_parameter_constraint(sub, sup, sub_kind, position);
                self.generate_type_parameter_constraint(sup, sub, sup_kind, position);
            }
            (Some(_), None) => {
                let bound_kind = match kind {
                    ConstraintKind::Equal => BoundKind::Exact,
                    ConstraintKind::Subtype => BoundKind::Upper,
                };
                self.generate_type_parameter_constraint(sub, sup, bound_kind, position);
            }
            (None, Some(_)) => {
                let bound_kind = match kind {
                    ConstraintKind::Equal => BoundKind::Exact,
                    ConstraintKind::Subtype => BoundKind::Lower,
                };
                self.generate_type_parameter_constraint(sup, sub, bound_kind, position);
            }
            (None, None) => {
                // Nullability mismatches are reported elsewhere by the
                // caller; the system is solved regardless, so strip it before
                // every structural comparison, nested ones included.
                let (left, right) = (sub.not_nullable(), sup.not_nullable());
                let mut ctx = ConstraintContext {
                    system: self,
                    position: position.clone(),
                    depth,
                };
                match kind {
                    ConstraintKind::Equal => checker::equal_types(&mut ctx, &left, &right),
                    ConstraintKind::Subtype => checker::is_subtype_of(&mut ctx, &left, &right),
                }
            }
        }
    }

    /// Record a bound on the variable heading `parameter_ty`, splitting on
    /// nullability: `T? = Int?` narrows to `T >: Int` and `T <: Int?`.
    fn generate_type_parameter_constraint(
        &mut self,
        parameter_ty: &Ty,
        constraining: &Ty,
        kind: BoundKind,
        position: &ConstraintPosition,
    ) {
        let Some(var) = self.registered_var(parameter_ty) else {
            return;
        };
        if !parameter_ty.nullable || !constraining.nullable {
            self.add_bound(var, constraining.clone(), kind, position.clone());
            return;
        }
        if matches!(kind, BoundKind::Exact | BoundKind::Lower) {
            self.add_bound(var, constraining.not_nullable(), BoundKind::Lower, position.clone());
        }
        if matches!(kind, BoundKind::Exact | BoundKind::Upper) {
            self.add_bound(var, constraining.clone(), BoundKind::Upper, position.clone());
        }
    }

    /// Capture a projected argument as an opaque exact bound on `variable_ty`.
    /// Returns whether the request was handled here.
    fn capture(
        &mut self,
        variable_ty: &Ty,
        projected: &TyArg,
        position: &ConstraintPosition,
        depth: u32,
    ) -> bool {
        let Some(var) = self.registered_var(variable_ty) else {
            return false;
        };
        if !position.capture_allowed() {
            return false;
        }
        let refused = projected.variance == Variance::Contravariant
            && self.vars.get(&var).is_some_and(|state| {
                !state
                    .declared_upper_bounds
                    .iter()
                    .all(|upper| upper.is_nullable_any())
            });
        if refused {
            self.errors.push(ConstraintError::CannotCapture {
                position: position.clone(),
                variable: var,
            });
            return true;
        }
        if depth > 0 {
            // A nested capture is unsound to rely on, but capturing anyway
            // keeps the system solvable for diagnostics.
            self.errors.push(ConstraintError::CannotCapture {
                position: position.clone(),
                variable: var,
            });
        }
        // The bound lands on the non-null variable, so a nullable occurrence
        // sheds the projection's nullability first.
        let projected = if variable_ty.nullable {
            TyArg::new(projected.variance, projected.ty.not_nullable())
        } else {
            projected.clone()
        };
        self.add_bound(var, Ty::captured(projected), BoundKind::Exact, position.clone());
        true
    }

    fn substitution(&self, default: impl Fn(TypeVarId) -> Ty) -> TypeSubstitution {
        let mut map = IndexMap::new();
        for (id, state) in &self.vars {
            let ty = state
                .bounds
                .value()
                .cloned()
                .unwrap_or_else(|| default(*id));
            map.insert(*id, ty);
        }
        TypeSubstitution::new(map).with_captured_approximation()
    }

    fn rebuilt(
        &self,
        rename: &impl Fn(TypeVarId) -> TypeVarId,
        keep: &impl Fn(&ConstraintPosition) -> bool,
    ) -> ConstraintSystem {
        let mut vars = IndexMap::new();
        for (id, state) in &self.vars {
            let new_id = rename(*id);
            vars.insert(
                new_id,
                VarState {
                    declared_upper_bounds: state
                        .declared_upper_bounds
                        .iter()
                        .map(|ty| ty.map_vars(rename))
                        .collect(),
                    bounds: state.bounds.transform(new_id, |bound| {
                        keep(&bound.position).then(|| Bound {
                            ty: bound.ty.map_vars(rename),
                            kind: bound.kind,
                            position: bound.position.clone(),
                            is_pure: bound.is_pure,
                        })
                    }),
                },
            );
        }
        let errors = self
            .errors
            .iter()
            .filter(|error| keep(error.position()))
            .map(|error| error.map_vars(rename))
            .collect();
        ConstraintSystem { vars, errors }
    }
}

/// Give an arity-less function literal the shape its expected type fixes:
/// explicitly declared parameter types are kept, everything else defaults to
/// don't-care.
fn materialize_placeholder(declared_params: &[Ty], shape: &Ty) -> Ty {
    let is_extension = match shape.ctor {
        TyCtor::Function { is_extension } => is_extension,
        _ => false,
    };
    let param_count = shape.args.len().saturating_sub(1);
    let params = (0..param_count)
        .map(|index| {
            declared_params
                .get(index)
                .cloned()
                .unwrap_or_else(Ty::dont_care)
        })
        .collect();
    Ty::function(is_extension, params, Ty::dont_care())
}

/// Re-enters the owning system for every nested comparison the structural
/// checker delegates back, tracking recursion depth across the boundary.
struct ConstraintContext<'a> {
    system: &'a mut ConstraintSystem,
    position: ConstraintPosition,
    depth: u32,
}

impl CheckerCallbacks for ConstraintContext<'_> {
    fn assert_equal_types(&mut self, a: &Ty, b: &Ty) {
        self.system
            .do_add_constraint(ConstraintKind::Equal, a, b, &self.position, self.depth + 1);
    }

    fn assert_subtype(&mut self, sub: &Ty, sup: &Ty) {
        self.system.do_add_constraint(
            ConstraintKind::Subtype,
            sub,
            sup,
            &self.position,
            self.depth + 1,
        );
    }

    fn assert_equal_constructors(&mut self, a: &Ty, b: &Ty) -> bool {
        if a.ctor == b.ctor {
            return true;
        }
        self.system
            .errors
            .push(ConstraintError::TypeConstructorMismatch {
                position: self.position.clone(),
            });
        false
    }

    fn capture(&mut self, variable: &Ty, projected: &TyArg) -> bool {
        self.system
            .capture(variable, projected, &self.position, self.depth)
    }

    fn no_corresponding_supertype(&mut self, _sub: &Ty, _sup: &Ty) {
        self.system
            .errors
            .push(ConstraintError::TypeConstructorMismatch {
                position: self.position.clone(),
            });
    }
}

/// Computed view over a system's health; every call re-derives from the
/// current bounds and error list.
pub struct SystemStatus<'a> {
    system: &'a ConstraintSystem,
}

impl SystemStatus<'_> {
    pub fn is_successful(&self) -> bool {
        !self.has_contradiction() && !self.has_unknown_parameters()
    }

    pub fn has_contradiction(&self) -> bool {
        self.has_type_constructor_mismatch()
            || self.has_conflicting_constraints()
            || self.has_cannot_capture_error()
    }

    /// Some variable admits more than one simultaneously required value.
    pub fn has_conflicting_constraints(&self) -> bool {
        self.system
            .vars
            .values()
            .any(|state| state.bounds.resolved_values().len() > 1)
    }

    /// Some variable accumulated no bounds at all.
    pub fn has_unknown_parameters(&self) -> bool {
        self.system
            .vars
            .values()
            .any(|state| state.bounds.is_empty())
    }

    pub fn has_type_constructor_mismatch(&self) -> bool {
        self.system
            .errors
            .iter()
            .any(|e| matches!(e, ConstraintError::TypeConstructorMismatch { .. }))
    }

    pub fn has_error_in_constraining_types(&self) -> bool {
        self.system
            .errors
            .iter()
            .any(|e| matches!(e, ConstraintError::ErrorInConstrainingType { .. }))
    }

    pub fn has_cannot_capture_error(&self) -> bool {
        self.system
            .errors
            .iter()
            .any(|e| matches!(e, ConstraintError::CannotCapture { .. }))
    }

    /// The system fails as-is but succeeds once weak (expected-type)
    /// constraints are dropped.
    pub fn has_violated_upper_bound(&self) -> bool {
        if self.is_successful() {
            return false;
        }
        self.system.without_weak_constraints().status().is_successful()
    }

    /// All recorded errors trace back to `origin`, or removing the
    /// constraints from `origin` alone restores success.
    pub fn has_only_errors_from_position(&self, origin: &ConstraintPosition) -> bool {
        if self.is_successful() {
            return false;
        }
        let errors = &self.system.errors;
        if !errors.is_empty() && errors.iter().all(|e| e.position().derived_from(origin)) {
            return true;
        }
        self.system.filter_constraints_out(origin).status().is_successful()
    }
}
