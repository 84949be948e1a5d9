//! Type-constraint collection and solving.
//!
//! An inference driver registers the type variables of a call, feeds in
//! subtype/equality constraints as it walks arguments and expected types, and
//! finally asks for a [`TypeSubstitution`] resolving every variable (or an
//! explicit error placeholder where resolution failed). Constraints decompose
//! recursively through a structural compatibility [`checker`], which calls
//! back into the system for nested comparisons.
//!
//! ```
//! use lattix_infer::{ConstraintPosition, ConstraintSystem, Ty, TypeVarId, TypeVarSpec};
//!
//! let t = TypeVarId(0);
//! let mut system = ConstraintSystem::new();
//! system.register_type_variables([TypeVarSpec::unbounded(t)]);
//! system.add_subtype_constraint(
//!     &Ty::class("String", vec![]),
//!     &Ty::var_ref(t),
//!     ConstraintPosition::Parameter { index: 0 },
//! );
//! assert!(system.status().is_successful());
//! assert_eq!(
//!     system.resulting_substitution().get(t),
//!     Some(&Ty::class("String", vec![])),
//! );
//! ```

pub mod bounds;
pub mod checker;
pub mod error;
pub mod position;
pub mod substitution;
pub mod system;
pub mod types;

pub use bounds::{Bound, BoundKind, TypeBounds};
pub use error::ConstraintError;
pub use position::ConstraintPosition;
pub use substitution::TypeSubstitution;
pub use system::{ConstraintKind, ConstraintSystem, SystemStatus, TypeVarSpec};
pub use types::{Ty, TyArg, TyCtor, TypeVarId, Variance};
