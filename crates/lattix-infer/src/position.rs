//! Constraint origin tags
//!
//! Every recorded bound and error carries the position it came from. Positions
//! drive diagnostics, the weak/strong split (expected-type constraints are the
//! soft ones) and the decision whether a wildcard capture is permitted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintPosition {
    /// A declared upper bound of the variable itself.
    TypeBound { index: usize },
    Receiver,
    Parameter { index: usize },
    ExpectedType,
    /// Synthetic constraints for special function literals.
    SpecialFunction,
    /// Aggregation of several origins, produced when systems are combined.
    Compound(Vec<ConstraintPosition>),
}

impl ConstraintPosition {
    /// Expected-type constraints are weak: they may be dropped wholesale to
    /// see whether the rest of the system is satisfiable.
    pub fn is_strong(&self) -> bool {
        match self {
            ConstraintPosition::ExpectedType => false,
            ConstraintPosition::Compound(parts) => parts.iter().any(|p| p.is_strong()),
            _ => true,
        }
    }

    pub fn has_only_strong_constraints(&self) -> bool {
        match self {
            ConstraintPosition::Compound(parts) => {
                parts.iter().all(|p| p.has_only_strong_constraints())
            }
            _ => self.is_strong(),
        }
    }

    /// Captures are sound only where an actual argument value flows in.
    pub fn capture_allowed(&self) -> bool {
        match self {
            ConstraintPosition::Receiver | ConstraintPosition::Parameter { .. } => true,
            ConstraintPosition::Compound(parts) => parts.iter().all(|p| p.capture_allowed()),
            _ => false,
        }
    }

    /// Whether this position is `origin` or aggregates it.
    pub fn derived_from(&self, origin: &ConstraintPosition) -> bool {
        if self == origin {
            return true;
        }
        match self {
            ConstraintPosition::Compound(parts) => parts.iter().any(|p| p.derived_from(origin)),
            _ => false,
        }
    }
}
