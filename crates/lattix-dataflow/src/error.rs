//! Error type for the fixpoint analyzer

use thiserror::Error;

/// Failures raised during frame manipulation or fixpoint analysis.
///
/// All of these are fatal for the current `analyze()` run: the analyzer never
/// returns a partial result as valid.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Legacy subroutine-call instructions are a dialect this engine does not
    /// support; their presence is a configuration error detected before any
    /// propagation happens.
    #[error("subroutine instruction at index {index} is not supported")]
    SubroutinesUnsupported { index: usize },

    /// A transfer function failed; the offending instruction index is attached
    /// for diagnostics and the analysis is aborted.
    #[error("error at instruction {index}")]
    AtInstruction {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("control flow edge to {target} is out of bounds ({len} instructions)")]
    TargetOutOfBounds { target: usize, len: usize },

    #[error("operand stack overflow (max depth {max_stack})")]
    StackOverflow { max_stack: usize },

    #[error("pop from an empty operand stack")]
    StackUnderflow,

    #[error("cannot merge operand stacks of depths {left} and {right}")]
    StackDepthMismatch { left: usize, right: usize },

    #[error("local slot {index} is out of bounds ({len} slots)")]
    LocalOutOfBounds { index: usize, len: usize },

    #[error("{required} parameter slots do not fit in {max_locals} declared locals")]
    ParametersExceedLocals { required: usize, max_locals: usize },
}
