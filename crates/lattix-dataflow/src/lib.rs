//! Worklist-based abstract interpretation over a method's instruction list
//!
//! This crate implements a dataflow fixpoint engine with:
//! - Per-instruction frames (local slots + operand stack + return slot)
//! - A pluggable [`Interpreter`] supplying the abstract value domain
//! - Normal, branch, switch and exception-handler edge propagation
//! - Edge-visitation hooks for pruning individual control-flow edges
//!
//! The engine knows nothing about any concrete instruction set; callers
//! classify their opcodes through the [`Instruction`] trait and the engine
//! drives the transfer functions to a fixpoint.

mod analyzer;
mod error;
mod frame;
mod interpreter;
mod method;

pub use analyzer::{AllEdges, EdgePolicy, MethodAnalyzer};
pub use error::AnalyzerError;
pub use frame::Frame;
pub use interpreter::Interpreter;
pub use method::{DeclaredType, InsnKind, Instruction, Method, TryCatchSpan};
