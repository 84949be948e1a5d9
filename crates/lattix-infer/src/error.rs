//! Accumulated solver diagnostics
//!
//! Solver errors are recoverable: they are pushed onto an ordered list and
//! never stop processing of later constraints. The list is only ever filtered
//! when deriving a sub-system.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::ConstraintPosition;
use crate::types::TypeVarId;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConstraintError {
    /// Two types with incompatible head constructors were required to relate.
    #[error("incompatible type constructors at {position:?}")]
    TypeConstructorMismatch { position: ConstraintPosition },

    /// A constraining type was itself erroneous; the constraint is dropped.
    #[error("error type in constraint at {position:?}")]
    ErrorInConstrainingType { position: ConstraintPosition },

    /// A projection could not be soundly captured for the variable.
    #[error("cannot capture projection for variable {variable:?} at {position:?}")]
    CannotCapture {
        position: ConstraintPosition,
        variable: TypeVarId,
    },
}

impl ConstraintError {
    pub fn position(&self) -> &ConstraintPosition {
        match self {
            ConstraintError::TypeConstructorMismatch { position }
            | ConstraintError::ErrorInConstrainingType { position }
            | ConstraintError::CannotCapture { position, .. } => position,
        }
    }

    /// Rebuild with variable references renamed, for derived systems.
    pub fn map_vars(&self, f: &impl Fn(TypeVarId) -> TypeVarId) -> ConstraintError {
        match self {
            ConstraintError::CannotCapture { position, variable } => {
                ConstraintError::CannotCapture {
                    position: position.clone(),
                    variable: f(*variable),
                }
            }
            other => other.clone(),
        }
    }
}
