//! Abstract machine state at one program point

use crate::error::AnalyzerError;
use crate::interpreter::Interpreter;

/// Local-variable slots, a bounded operand stack and a return slot.
///
/// Frames are value containers owned exclusively by the analyzer; "merge in
/// place" computes new slot values and replaces them, so no state is ever
/// shared between program points.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<V> {
    locals: Vec<V>,
    stack: Vec<V>,
    max_stack: usize,
    ret: Option<V>,
}

impl<V: Clone + PartialEq> Frame<V> {
    pub fn new(locals: Vec<V>, max_stack: usize) -> Self {
        Self {
            locals,
            stack: Vec::with_capacity(max_stack),
            max_stack,
            ret: None,
        }
    }

    pub fn num_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn local(&self, index: usize) -> Result<&V, AnalyzerError> {
        self.locals.get(index).ok_or(AnalyzerError::LocalOutOfBounds {
            index,
            len: self.locals.len(),
        })
    }

    pub fn set_local(&mut self, index: usize, value: V) -> Result<(), AnalyzerError> {
        let len = self.locals.len();
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AnalyzerError::LocalOutOfBounds { index, len }),
        }
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[V] {
        &self.stack
    }

    pub fn push(&mut self, value: V) -> Result<(), AnalyzerError> {
        if self.stack.len() >= self.max_stack {
            return Err(AnalyzerError::StackOverflow {
                max_stack: self.max_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<V, AnalyzerError> {
        self.stack.pop().ok_or(AnalyzerError::StackUnderflow)
    }

    pub fn peek(&self) -> Option<&V> {
        self.stack.last()
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    pub fn return_slot(&self) -> Option<&V> {
        self.ret.as_ref()
    }

    pub fn set_return(&mut self, value: Option<V>) {
        self.ret = value;
    }

    /// Reinitialize this frame from `src`, keeping the allocation.
    pub fn copy_from(&mut self, src: &Frame<V>) {
        self.locals.clear();
        self.locals.extend_from_slice(&src.locals);
        self.stack.clear();
        self.stack.extend_from_slice(&src.stack);
        self.max_stack = src.max_stack;
        self.ret = src.ret.clone();
    }

    /// Merge `other` into this frame through the interpreter's join operator.
    ///
    /// Returns whether any slot changed. Frames reaching the same program
    /// point must agree on operand stack depth.
    pub fn merge<I>(&mut self, other: &Frame<V>, interpreter: &I) -> Result<bool, AnalyzerError>
    where
        I: Interpreter<Value = V>,
    {
        if self.stack.len() != other.stack.len() {
            return Err(AnalyzerError::StackDepthMismatch {
                left: self.stack.len(),
                right: other.stack.len(),
            });
        }

        let mut changed = false;
        for (slot, incoming) in self.locals.iter_mut().zip(&other.locals) {
            let merged = interpreter.merge_values(slot, incoming);
            if merged != *slot {
                *slot = merged;
                changed = true;
            }
        }
        for (slot, incoming) in self.stack.iter_mut().zip(&other.stack) {
            let merged = interpreter.merge_values(slot, incoming);
            if merged != *slot {
                *slot = merged;
                changed = true;
            }
        }
        if let (Some(slot), Some(incoming)) = (self.ret.as_mut(), other.ret.as_ref()) {
            let merged = interpreter.merge_values(slot, incoming);
            if merged != *slot {
                *slot = merged;
                changed = true;
            }
        }
        Ok(changed)
    }
}
