//! Structural type model observed by the solver
//!
//! This is the minimal surface the constraint machinery needs: named class
//! constructors with (possibly projected) arguments, type-variable references,
//! function shapes, captured projections and the error/placeholder family.
//! The AST-level type representation of a frontend maps into this model at the
//! inference boundary.

use serde::{Deserialize, Serialize};

/// Identifier of a registered type variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeVarId(pub u32);

/// Use-site projection of a type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variance {
    Invariant,
    Covariant,
    Contravariant,
}

/// A type argument together with its projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TyArg {
    pub variance: Variance,
    pub ty: Ty,
}

impl TyArg {
    pub fn new(variance: Variance, ty: Ty) -> Self {
        Self { variance, ty }
    }

    pub fn invariant(ty: Ty) -> Self {
        Self::new(Variance::Invariant, ty)
    }

    pub fn is_projected(&self) -> bool {
        self.variance != Variance::Invariant
    }
}

/// Head constructor of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TyCtor {
    /// A nominal class or interface.
    Class(String),
    /// Reference to a type variable (registered or foreign).
    Var(TypeVarId),
    /// A function shape; arguments are `[receiver,] params.., return`.
    Function { is_extension: bool },
    /// An unannotated lambda whose arity is not yet known. Holds whatever
    /// parameter types were declared explicitly.
    FunctionPlaceholder { declared_params: Vec<Ty> },
    /// A projection captured into a fresh opaque type.
    Captured(Box<TyArg>),
    /// Unrecoverable error type coming from the frontend.
    Error,
    /// Hard "could not infer" marker for a specific variable.
    Uninferred(TypeVarId),
    /// Soft "no information" placeholder, absorbed without diagnostics.
    DontCare,
}

/// A structural type: head constructor, arguments, top-level nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ty {
    pub ctor: TyCtor,
    pub args: Vec<TyArg>,
    pub nullable: bool,
}

pub const ANY: &str = "Any";

impl Ty {
    pub fn new(ctor: TyCtor, args: Vec<TyArg>) -> Self {
        Self {
            ctor,
            args,
            nullable: false,
        }
    }

    pub fn class(name: impl Into<String>, args: Vec<TyArg>) -> Self {
        Self::new(TyCtor::Class(name.into()), args)
    }

    pub fn var_ref(id: TypeVarId) -> Self {
        Self::new(TyCtor::Var(id), vec![])
    }

    /// The universal top type for non-null values.
    pub fn any() -> Self {
        Self::class(ANY, vec![])
    }

    /// The universal top type.
    pub fn nullable_any() -> Self {
        Self::any().with_nullable(true)
    }

    /// A function type; the return type is always the last argument and the
    /// receiver, when present, the first.
    pub fn function(is_extension: bool, params: Vec<Ty>, ret: Ty) -> Self {
        let args = params
            .into_iter()
            .chain(std::iter::once(ret))
            .map(TyArg::invariant)
            .collect();
        Self::new(TyCtor::Function { is_extension }, args)
    }

    pub fn function_placeholder(declared_params: Vec<Ty>) -> Self {
        Self::new(TyCtor::FunctionPlaceholder { declared_params }, vec![])
    }

    pub fn error() -> Self {
        Self::new(TyCtor::Error, vec![])
    }

    pub fn uninferred(var: TypeVarId) -> Self {
        Self::new(TyCtor::Uninferred(var), vec![])
    }

    pub fn dont_care() -> Self {
        Self::new(TyCtor::DontCare, vec![])
    }

    pub fn captured(arg: TyArg) -> Self {
        Self::new(TyCtor::Captured(Box::new(arg)), vec![])
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn not_nullable(&self) -> Self {
        self.clone().with_nullable(false)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.ctor, TyCtor::Error)
    }

    pub fn is_uninferred(&self) -> bool {
        matches!(self.ctor, TyCtor::Uninferred(_))
    }

    pub fn is_dont_care(&self) -> bool {
        matches!(self.ctor, TyCtor::DontCare)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.ctor, TyCtor::Function { .. })
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.ctor, TyCtor::FunctionPlaceholder { .. })
    }

    pub fn is_any(&self) -> bool {
        !self.nullable && self.is_any_constructor()
    }

    pub fn is_nullable_any(&self) -> bool {
        self.nullable && self.is_any_constructor()
    }

    fn is_any_constructor(&self) -> bool {
        matches!(&self.ctor, TyCtor::Class(name) if name == ANY) && self.args.is_empty()
    }

    /// The variable this type references directly, if its head is one.
    pub fn type_var(&self) -> Option<TypeVarId> {
        match self.ctor {
            TyCtor::Var(id) => Some(id),
            _ => None,
        }
    }

    /// Whether `pred` holds for this type or any type nested inside it.
    pub fn contains(&self, pred: &impl Fn(&Ty) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        if self.args.iter().any(|arg| arg.ty.contains(pred)) {
            return true;
        }
        match &self.ctor {
            TyCtor::Captured(arg) => arg.ty.contains(pred),
            TyCtor::FunctionPlaceholder { declared_params } => {
                declared_params.iter().any(|p| p.contains(pred))
            }
            _ => false,
        }
    }

    /// Rebuild this type with every variable reference renamed through `f`.
    pub fn map_vars(&self, f: &impl Fn(TypeVarId) -> TypeVarId) -> Ty {
        let ctor = match &self.ctor {
            TyCtor::Var(id) => TyCtor::Var(f(*id)),
            TyCtor::Uninferred(id) => TyCtor::Uninferred(f(*id)),
            TyCtor::Captured(arg) => TyCtor::Captured(Box::new(TyArg::new(
                arg.variance,
                arg.ty.map_vars(f),
            ))),
            TyCtor::FunctionPlaceholder { declared_params } => TyCtor::FunctionPlaceholder {
                declared_params: declared_params.iter().map(|p| p.map_vars(f)).collect(),
            },
            other => other.clone(),
        };
        Ty {
            ctor,
            args: self
                .args
                .iter()
                .map(|arg| TyArg::new(arg.variance, arg.ty.map_vars(f)))
                .collect(),
            nullable: self.nullable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_descends_into_arguments_and_captures() {
        let t = TypeVarId(0);
        let list_of_t = Ty::class("List", vec![TyArg::invariant(Ty::var_ref(t))]);
        assert!(list_of_t.contains(&|ty: &Ty| ty.type_var() == Some(t)));

        let captured = Ty::captured(TyArg::new(Variance::Covariant, Ty::var_ref(t)));
        assert!(captured.contains(&|ty: &Ty| ty.type_var() == Some(t)));

        let plain = Ty::class("List", vec![TyArg::invariant(Ty::class("Int", vec![]))]);
        assert!(!plain.contains(&|ty: &Ty| ty.type_var() == Some(t)));
    }

    #[test]
    fn any_predicates_respect_nullability() {
        assert!(Ty::any().is_any());
        assert!(!Ty::any().is_nullable_any());
        assert!(Ty::nullable_any().is_nullable_any());
        assert!(!Ty::class("Any", vec![TyArg::invariant(Ty::any())]).is_any());
    }

    #[test]
    fn map_vars_renames_nested_references() {
        let a = TypeVarId(1);
        let b = TypeVarId(7);
        let ty = Ty::class("Map", vec![
            TyArg::invariant(Ty::var_ref(a)),
            TyArg::new(Variance::Covariant, Ty::var_ref(a).with_nullable(true)),
        ]);
        let renamed = ty.map_vars(&|id| if id == a { b } else { id });
        assert_eq!(renamed.args[0].ty.type_var(), Some(b));
        assert_eq!(renamed.args[1].ty.type_var(), Some(b));
        assert!(renamed.args[1].ty.nullable);
    }
}
