//! Worklist-based fixpoint computation over a method's instructions

use crate::error::AnalyzerError;
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use crate::method::{DeclaredType, InsnKind, Instruction, Method};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// Per-edge veto hooks.
///
/// Returning `false` skips merging that one edge; the surrounding control flow
/// still generates its other edges. Used to prune unreachable or uninteresting
/// paths.
pub trait EdgePolicy {
    fn visit_edge(&mut self, insn: usize, successor: usize) -> bool {
        let _ = (insn, successor);
        true
    }

    fn visit_exception_edge(&mut self, insn: usize, handler: usize) -> bool {
        let _ = (insn, handler);
        true
    }
}

/// The default policy: every edge is propagated.
pub struct AllEdges;

impl EdgePolicy for AllEdges {}

/// Computes, for every instruction index, the join of all abstract states
/// flowing into it — the least fixpoint under the interpreter's merge.
///
/// The analyzer owns exclusive mutable access to its frame arena and handler
/// map for the duration of [`analyze`](MethodAnalyzer::analyze); the method
/// itself is borrowed immutably for the whole run.
pub struct MethodAnalyzer<'m, P, E = AllEdges>
where
    P: Interpreter,
    P::Insn: Instruction,
    E: EdgePolicy,
{
    method: &'m Method<P::SlotType, P::Insn>,
    interpreter: P,
    policy: E,
    frames: Vec<Option<Frame<P::Value>>>,
    handlers: Vec<SmallVec<[usize; 2]>>,
    queued: Vec<bool>,
    queue: Vec<usize>,
}

impl<'m, P> MethodAnalyzer<'m, P, AllEdges>
where
    P: Interpreter,
    P::Insn: Instruction,
{
    pub fn new(method: &'m Method<P::SlotType, P::Insn>, interpreter: P) -> Self {
        Self::with_policy(method, interpreter, AllEdges)
    }
}

impl<'m, P, E> MethodAnalyzer<'m, P, E>
where
    P: Interpreter,
    P::Insn: Instruction,
    E: EdgePolicy,
{
    pub fn with_policy(method: &'m Method<P::SlotType, P::Insn>, interpreter: P, policy: E) -> Self {
        let n = method.len();
        Self {
            method,
            interpreter,
            policy,
            frames: (0..n).map(|_| None).collect(),
            handlers: vec![SmallVec::new(); n],
            queued: vec![false; n],
            queue: Vec::with_capacity(n),
        }
    }

    /// Run the fixpoint. One entry per instruction index: `None` for
    /// unreached instructions, otherwise the merged incoming state.
    pub fn analyze(&mut self) -> Result<&[Option<Frame<P::Value>>], AnalyzerError> {
        let n = self.method.len();
        if n == 0 {
            return Ok(&self.frames);
        }

        self.check_assertions()?;
        self.compute_handlers();
        self.seed_entry()?;

        debug!(instructions = n, "starting fixpoint analysis");

        let mut current = Frame::new(Vec::new(), self.method.max_stack);

        while let Some(insn) = self.queue.pop() {
            self.queued[insn] = false;
            let f = match &self.frames[insn] {
                Some(f) => f.clone(),
                None => continue,
            };

            let kind = self.method.instructions[insn].kind();
            match kind {
                InsnKind::Marker => {
                    // No abstract effect: the stored frame flows through.
                    self.propagate(insn, insn + 1, &f)?;
                }
                InsnKind::Subroutine => {
                    return Err(AnalyzerError::SubroutinesUnsupported { index: insn });
                }
                _ => {
                    current.copy_from(&f);
                    self.interpreter
                        .transfer(&self.method.instructions[insn], &mut current)
                        .map_err(|source| AnalyzerError::AtInstruction { index: insn, source })?;

                    match kind {
                        InsnKind::Branch { target, conditional } => {
                            if conditional {
                                self.propagate(insn, insn + 1, &current)?;
                            }
                            self.propagate(insn, target, &current)?;
                        }
                        InsnKind::Switch { ref targets, default } => {
                            self.propagate(insn, default, &current)?;
                            for &target in targets {
                                self.propagate(insn, target, &current)?;
                            }
                        }
                        InsnKind::Op => {
                            self.propagate(insn, insn + 1, &current)?;
                        }
                        // No fallthrough edge out of a return or a throw.
                        // Markers and subroutines are consumed by the outer
                        // match and never reach this dispatch.
                        InsnKind::Return
                        | InsnKind::Throw
                        | InsnKind::Marker
                        | InsnKind::Subroutine => {}
                    }
                }
            }

            // Exceptional successors see the pre-transfer state with the
            // operand stack replaced by the single exception value.
            let spans = self.handlers[insn].clone();
            for span_index in spans {
                let span = &self.method.try_catch_spans[span_index];
                if !self.policy.visit_exception_edge(insn, span.handler) {
                    continue;
                }
                let mut handler_frame = f.clone();
                handler_frame.clear_stack();
                let exn = self.interpreter.exception_value(span.filter.as_ref());
                handler_frame.push(exn)?;
                self.merge_edge(span.handler, &handler_frame)?;
            }
        }

        Ok(&self.frames)
    }

    /// The merged frame at `index`, or `None` if unreached (or not yet
    /// analyzed).
    pub fn frame_at(&self, index: usize) -> Option<&Frame<P::Value>> {
        self.frames.get(index).and_then(|f| f.as_ref())
    }

    pub fn into_frames(self) -> Vec<Option<Frame<P::Value>>> {
        self.frames
    }

    pub fn interpreter(&self) -> &P {
        &self.interpreter
    }

    fn check_assertions(&self) -> Result<(), AnalyzerError> {
        for (index, insn) in self.method.instructions.iter().enumerate() {
            if matches!(insn.kind(), InsnKind::Subroutine) {
                return Err(AnalyzerError::SubroutinesUnsupported { index });
            }
        }
        Ok(())
    }

    fn compute_handlers(&mut self) {
        let n = self.method.len();
        for (span_index, span) in self.method.try_catch_spans.iter().enumerate() {
            for covered in span.start..span.end.min(n) {
                self.handlers[covered].push(span_index);
            }
        }
    }

    /// Bind slot 0 to the receiver (when present), subsequent slots to the
    /// declared parameters (wide ones consume an extra unbound slot), and
    /// leave the rest unbound; seed instruction 0 with the result.
    fn seed_entry(&mut self) -> Result<(), AnalyzerError> {
        let mut locals = Vec::with_capacity(self.method.max_locals);
        if let Some(receiver) = &self.method.receiver {
            locals.push(self.interpreter.new_value(Some(receiver)));
        }
        for param in &self.method.param_types {
            locals.push(self.interpreter.new_value(Some(param)));
            if param.is_wide() {
                locals.push(self.interpreter.new_value(None));
            }
        }
        if locals.len() > self.method.max_locals {
            return Err(AnalyzerError::ParametersExceedLocals {
                required: locals.len(),
                max_locals: self.method.max_locals,
            });
        }
        while locals.len() < self.method.max_locals {
            locals.push(self.interpreter.new_value(None));
        }

        let mut entry = Frame::new(locals, self.method.max_stack);
        let ret = self
            .method
            .return_type
            .as_ref()
            .map(|ty| self.interpreter.new_value(Some(ty)));
        entry.set_return(ret);

        self.merge_edge(0, &entry)
    }

    fn propagate(&mut self, insn: usize, successor: usize, frame: &Frame<P::Value>) -> Result<(), AnalyzerError> {
        if self.policy.visit_edge(insn, successor) {
            self.merge_edge(successor, frame)?;
        }
        Ok(())
    }

    fn merge_edge(&mut self, target: usize, frame: &Frame<P::Value>) -> Result<(), AnalyzerError> {
        if target >= self.frames.len() {
            return Err(AnalyzerError::TargetOutOfBounds {
                target,
                len: self.frames.len(),
            });
        }
        let changed = match &mut self.frames[target] {
            slot @ None => {
                *slot = Some(frame.clone());
                true
            }
            Some(existing) => existing.merge(frame, &self.interpreter)?,
        };
        if changed && !self.queued[target] {
            self.queued[target] = true;
            self.queue.push(target);
            trace!(target, "frame changed, instruction re-queued");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{DeclaredType, TryCatchSpan};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Val {
        Uninit,
        Int,
        Ref,
        Conflict,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum SlotTy {
        Int,
        Long,
        Ref,
    }

    impl DeclaredType for SlotTy {
        fn is_wide(&self) -> bool {
            matches!(self, SlotTy::Long)
        }
    }

    #[derive(Debug, Clone)]
    enum TestInsn {
        Label,
        Const,
        ConstRef,
        Add,
        Load(usize),
        Store(usize),
        Pop,
        Goto(usize),
        IfGoto(usize),
        Switch(Vec<usize>, usize),
        Return,
        Throw,
        Jsr,
    }

    impl Instruction for TestInsn {
        fn kind(&self) -> InsnKind {
            match self {
                TestInsn::Label => InsnKind::Marker,
                TestInsn::Goto(target) => InsnKind::Branch {
                    target: *target,
                    conditional: false,
                },
                TestInsn::IfGoto(target) => InsnKind::Branch {
                    target: *target,
                    conditional: true,
                },
                TestInsn::Switch(targets, default) => InsnKind::Switch {
                    targets: targets.iter().copied().collect(),
                    default: *default,
                },
                TestInsn::Return => InsnKind::Return,
                TestInsn::Throw => InsnKind::Throw,
                TestInsn::Jsr => InsnKind::Subroutine,
                _ => InsnKind::Op,
            }
        }
    }

    struct TestInterp;

    impl Interpreter for TestInterp {
        type Value = Val;
        type SlotType = SlotTy;
        type Insn = TestInsn;

        fn new_value(&mut self, ty: Option<&SlotTy>) -> Val {
            match ty {
                Some(SlotTy::Int) | Some(SlotTy::Long) => Val::Int,
                Some(SlotTy::Ref) => Val::Ref,
                None => Val::Uninit,
            }
        }

        fn exception_value(&mut self, _filter: Option<&SlotTy>) -> Val {
            Val::Ref
        }

        fn transfer(&mut self, insn: &TestInsn, frame: &mut Frame<Val>) -> anyhow::Result<()> {
            match insn {
                TestInsn::Const => frame.push(Val::Int)?,
                TestInsn::ConstRef => frame.push(Val::Ref)?,
                TestInsn::Add => {
                    frame.pop()?;
                    frame.pop()?;
                    frame.push(Val::Int)?;
                }
                TestInsn::Load(i) => {
                    let v = *frame.local(*i)?;
                    frame.push(v)?;
                }
                TestInsn::Store(i) => {
                    let v = frame.pop()?;
                    frame.set_local(*i, v)?;
                }
                TestInsn::Pop | TestInsn::IfGoto(_) | TestInsn::Switch(..) => {
                    frame.pop()?;
                }
                _ => {}
            }
            Ok(())
        }

        fn merge_values(&self, a: &Val, b: &Val) -> Val {
            if a == b {
                *a
            } else {
                Val::Conflict
            }
        }
    }

    fn method(instructions: Vec<TestInsn>, max_locals: usize, max_stack: usize) -> Method<SlotTy, TestInsn> {
        Method {
            instructions,
            max_locals,
            max_stack,
            receiver: None,
            param_types: vec![],
            return_type: None,
            try_catch_spans: vec![],
        }
    }

    #[test]
    fn straight_line_produces_one_frame_per_instruction() {
        let m = method(
            vec![TestInsn::Const, TestInsn::Const, TestInsn::Add, TestInsn::Return],
            0,
            2,
        );
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        let frames = analyzer.analyze().unwrap();

        let depths: Vec<usize> = frames.iter().map(|f| f.as_ref().unwrap().stack_len()).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
    }

    #[test]
    fn diamond_join_merges_both_arms() {
        // 0 Const / 1 IfGoto 4 / 2 Const / 3 Goto 5 / 4 ConstRef / 5 Store 0 / 6 Return
        let m = method(
            vec![
                TestInsn::Const,
                TestInsn::IfGoto(4),
                TestInsn::Const,
                TestInsn::Goto(5),
                TestInsn::ConstRef,
                TestInsn::Store(0),
                TestInsn::Return,
            ],
            1,
            2,
        );
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        // Int from one arm, Ref from the other: the join point sees the lub.
        let join = analyzer.frame_at(5).unwrap();
        assert_eq!(join.peek(), Some(&Val::Conflict));
        let after = analyzer.frame_at(6).unwrap();
        assert_eq!(*after.local(0).unwrap(), Val::Conflict);
    }

    #[test]
    fn unconditional_jump_has_no_fallthrough() {
        let m = method(
            vec![TestInsn::Const, TestInsn::Goto(3), TestInsn::Const, TestInsn::Return],
            0,
            2,
        );
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        assert!(analyzer.frame_at(2).is_none());
        assert!(analyzer.frame_at(3).is_some());
    }

    #[test]
    fn switch_reaches_every_case_and_default() {
        let m = method(
            vec![
                TestInsn::Const,
                TestInsn::Switch(vec![3, 4], 5),
                TestInsn::Return,
                TestInsn::Return,
                TestInsn::Return,
                TestInsn::Return,
            ],
            0,
            1,
        );
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        for target in [3, 4, 5] {
            assert!(analyzer.frame_at(target).is_some(), "case {target} unreached");
        }
        assert!(analyzer.frame_at(2).is_none());
    }

    #[test]
    fn exception_edge_carries_exactly_one_stack_value() {
        let mut m = method(
            vec![
                TestInsn::Const,
                TestInsn::Const,
                TestInsn::Pop,
                TestInsn::Pop,
                TestInsn::Return,
                TestInsn::Store(0),
                TestInsn::Return,
            ],
            1,
            3,
        );
        m.try_catch_spans.push(TryCatchSpan {
            start: 0,
            end: 2,
            handler: 5,
            filter: None,
        });
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        // The covered instructions have stack depths 0 and 1; the handler
        // always sees depth 1 with the exception value on top.
        let handler = analyzer.frame_at(5).unwrap();
        assert_eq!(handler.stack_len(), 1);
        assert_eq!(handler.peek(), Some(&Val::Ref));
    }

    #[test]
    fn subroutines_are_rejected_before_any_work() {
        let m = method(vec![TestInsn::Const, TestInsn::Jsr, TestInsn::Return], 0, 1);
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        let err = analyzer.analyze().unwrap_err();

        assert!(matches!(err, AnalyzerError::SubroutinesUnsupported { index: 1 }));
        assert!(analyzer.frame_at(0).is_none());
    }

    #[test]
    fn unreachable_code_has_no_frame() {
        let m = method(vec![TestInsn::Return, TestInsn::Const, TestInsn::Return], 0, 1);
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        assert!(analyzer.frame_at(0).is_some());
        assert!(analyzer.frame_at(1).is_none());
        assert!(analyzer.frame_at(2).is_none());
    }

    #[test]
    fn entry_frame_lays_out_receiver_params_and_wide_slots() {
        let m = Method {
            instructions: vec![TestInsn::Return],
            max_locals: 5,
            max_stack: 0,
            receiver: Some(SlotTy::Ref),
            param_types: vec![SlotTy::Int, SlotTy::Long],
            return_type: Some(SlotTy::Int),
            try_catch_spans: vec![],
        };
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        let entry = analyzer.frame_at(0).unwrap();
        assert_eq!(*entry.local(0).unwrap(), Val::Ref);
        assert_eq!(*entry.local(1).unwrap(), Val::Int);
        // Wide param occupies two slots, the second unbound.
        assert_eq!(*entry.local(2).unwrap(), Val::Int);
        assert_eq!(*entry.local(3).unwrap(), Val::Uninit);
        assert_eq!(*entry.local(4).unwrap(), Val::Uninit);
        assert_eq!(entry.return_slot(), Some(&Val::Int));
    }

    #[test]
    fn marker_propagates_stored_frame_unchanged() {
        let m = method(vec![TestInsn::Const, TestInsn::Label, TestInsn::Return], 0, 1);
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        let before = analyzer.frame_at(1).unwrap();
        let after = analyzer.frame_at(2).unwrap();
        assert_eq!(before, after);
    }

    struct VetoEdge {
        from: usize,
        to: usize,
    }

    impl EdgePolicy for VetoEdge {
        fn visit_edge(&mut self, insn: usize, successor: usize) -> bool {
            !(insn == self.from && successor == self.to)
        }
    }

    #[test]
    fn vetoed_edge_is_not_merged_but_others_still_flow() {
        let m = method(
            vec![TestInsn::Const, TestInsn::IfGoto(3), TestInsn::Return, TestInsn::Return],
            0,
            1,
        );
        let mut analyzer = MethodAnalyzer::with_policy(&m, TestInterp, VetoEdge { from: 1, to: 3 });
        analyzer.analyze().unwrap();

        assert!(analyzer.frame_at(2).is_some());
        assert!(analyzer.frame_at(3).is_none());
    }

    #[test]
    fn transfer_failure_reports_instruction_index() {
        // Add on an empty stack underflows inside the transfer function.
        let m = method(vec![TestInsn::Add, TestInsn::Return], 0, 1);
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        let err = analyzer.analyze().unwrap_err();

        assert!(matches!(err, AnalyzerError::AtInstruction { index: 0, .. }));
    }

    #[test]
    fn loop_reaches_fixpoint() {
        // 0 Const / 1 Store 0 / 2 Load 0 / 3 IfGoto 2 / 4 Return
        let m = method(
            vec![
                TestInsn::Const,
                TestInsn::Store(0),
                TestInsn::Load(0),
                TestInsn::IfGoto(2),
                TestInsn::Return,
            ],
            1,
            1,
        );
        let mut analyzer = MethodAnalyzer::new(&m, TestInterp);
        analyzer.analyze().unwrap();

        for index in 0..5 {
            assert!(analyzer.frame_at(index).is_some(), "instruction {index} unreached");
        }
        assert_eq!(*analyzer.frame_at(4).unwrap().local(0).unwrap(), Val::Int);
    }
}
