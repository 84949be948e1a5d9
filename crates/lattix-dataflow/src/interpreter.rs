//! The pluggable abstract-value domain

use crate::frame::Frame;
use crate::method::DeclaredType;

/// Abstract semantics supplied by the caller.
///
/// The analyzer owns all frames; an interpreter must not retain references
/// beyond a single [`transfer`](Interpreter::transfer) call.
pub trait Interpreter {
    /// Abstract values forming a finite-height lattice under
    /// [`merge_values`](Interpreter::merge_values).
    type Value: Clone + PartialEq;
    /// Declared parameter/local/exception types.
    type SlotType: DeclaredType;
    /// The instruction representation this interpreter executes.
    type Insn;

    /// Produce the abstract value for a declared type; `None` stands for an
    /// unbound slot (uninitialized local, second half of a wide value).
    fn new_value(&mut self, ty: Option<&Self::SlotType>) -> Self::Value;

    /// The value pushed on an exceptional edge. `None` means the handler is
    /// unfiltered and catches the universal throwable type.
    fn exception_value(&mut self, filter: Option<&Self::SlotType>) -> Self::Value;

    /// Execute one instruction's transfer function against `frame`.
    ///
    /// Failures abort the whole analysis; the analyzer re-wraps them with the
    /// offending instruction index.
    fn transfer(&mut self, insn: &Self::Insn, frame: &mut Frame<Self::Value>) -> anyhow::Result<()>;

    /// Join two abstract values. Must be monotone: repeated merging converges.
    fn merge_values(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
}
