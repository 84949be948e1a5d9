//! The analyzed procedure and its instruction classification
//!
//! The concrete instruction representation and its decoder are external
//! collaborators; the engine only observes a stable integer indexing and the
//! opcode classification exposed through [`Instruction::kind`].

use smallvec::SmallVec;

/// How an instruction participates in control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsnKind {
    /// Structural marker (label, line info, frame hint) with no abstract effect.
    Marker,
    /// Conditional or unconditional branch to an explicit target index.
    Branch { target: usize, conditional: bool },
    /// Multi-way dispatch (table- or lookup-style).
    Switch {
        targets: SmallVec<[usize; 4]>,
        default: usize,
    },
    /// Procedure return (value or void). No fallthrough edge.
    Return,
    /// Throw. No fallthrough edge; exception edges still apply.
    Throw,
    /// Legacy subroutine call/return. Rejected up front.
    Subroutine,
    /// Any other instruction: falls through to the next index.
    Op,
}

/// Classification surface the instruction decoder must provide.
pub trait Instruction {
    fn kind(&self) -> InsnKind;
}

/// Declared slot types, as seen by the entry-frame seeding logic.
pub trait DeclaredType {
    /// Wide types occupy two consecutive local slots; the second is left
    /// unbound.
    fn is_wide(&self) -> bool {
        false
    }
}

/// One row of the procedure's exception table: instructions in
/// `[start, end)` are protected, control may transfer to `handler` with a
/// single exception value on the stack.
#[derive(Debug, Clone)]
pub struct TryCatchSpan<T> {
    pub start: usize,
    pub end: usize,
    pub handler: usize,
    /// `None` means "catch anything": the universal throwable type.
    pub filter: Option<T>,
}

/// A procedure to analyze: instruction sequence, slot layout and exception
/// ranges. Immutable for the duration of one analysis run.
#[derive(Debug, Clone)]
pub struct Method<T, I> {
    pub instructions: Vec<I>,
    pub max_locals: usize,
    pub max_stack: usize,
    /// `None` for static-context procedures; otherwise bound to slot 0.
    pub receiver: Option<T>,
    pub param_types: Vec<T>,
    /// `None` for void.
    pub return_type: Option<T>,
    pub try_catch_spans: Vec<TryCatchSpan<T>>,
}

impl<T, I: Instruction> Method<T, I> {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
