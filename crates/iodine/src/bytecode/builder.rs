//! Builder for emitting instructions during compilation.
//!
//! `CodeBuilder` appends instructions to a method body, tracks the source
//! location they belong to, and resolves forward jumps by patching.

use super::{code::Instruction, op::Opcode};
use crate::ast::CodeLoc;

/// Placeholder operand written for jumps whose target is not yet known.
const UNPATCHED: u32 = u32::MAX;

/// A forward jump waiting for its target.
///
/// Must be resolved with [`CodeBuilder::patch_jump`] or
/// [`CodeBuilder::patch_jump_to`] before [`CodeBuilder::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "jump labels must be patched"]
pub struct JumpLabel(usize);

/// Builder for emitting instructions into a method body.
///
/// # Usage
///
/// ```ignore
/// let mut builder = CodeBuilder::new();
/// builder.set_location(loc);
/// builder.emit(Opcode::LoadTrue);
/// let skip = builder.emit_jump(Opcode::JumpIfFalse);
/// builder.emit(Opcode::LoadNull);
/// builder.patch_jump(skip);
/// let body = builder.build();
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<Instruction>,
    /// Location stamped onto subsequently emitted instructions.
    location: CodeLoc,
    /// Running operand stack depth, used to assert balanced statement code in tests.
    stack_depth: i32,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_location(&mut self, loc: CodeLoc) {
        self.location = loc;
    }

    #[must_use]
    pub fn location(&self) -> CodeLoc {
        self.location
    }

    /// Emits an instruction whose operand is unused.
    pub fn emit(&mut self, op: Opcode) {
        self.emit_arg(op, 0);
    }

    /// Emits an instruction with an operand and records its stack effect.
    pub fn emit_arg(&mut self, op: Opcode, arg: u32) {
        self.code.push(Instruction::new(op, arg, self.location));
        self.stack_depth += match op.stack_effect() {
            Some(effect) => effect,
            None => Self::variable_effect(op, arg),
        };
    }

    /// Emits a jump with a placeholder target, returning the label to patch.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        debug_assert!(op.is_jump(), "{op} is not a jump");
        let label = JumpLabel(self.code.len());
        self.emit_arg(op, UNPATCHED);
        label
    }

    /// Emits a jump to an already known (usually backward) target.
    pub fn emit_jump_to(&mut self, op: Opcode, target: u32) {
        debug_assert!(op.is_jump(), "{op} is not a jump");
        self.emit_arg(op, target);
    }

    /// Points a pending jump at the next instruction to be emitted.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = self.current_offset();
        self.patch_jump_to(label, target);
    }

    pub fn patch_jump_to(&mut self, label: JumpLabel, target: u32) {
        let instr = &mut self.code[label.0];
        debug_assert_eq!(instr.arg, UNPATCHED, "jump at {} patched twice", label.0);
        instr.arg = target;
    }

    /// Index the next emitted instruction will occupy.
    #[must_use]
    pub fn current_offset(&self) -> u32 {
        u32::try_from(self.code.len()).unwrap_or(UNPATCHED)
    }

    #[must_use]
    pub fn stack_depth(&self) -> i32 {
        self.stack_depth
    }

    /// Adjusts the tracked depth for code paths the linear scan cannot see,
    /// such as the value left by a taken `NullCoalesce`.
    pub fn adjust_stack(&mut self, delta: i32) {
        self.stack_depth += delta;
    }

    /// Finalizes the body. Every jump must have been patched.
    #[must_use]
    pub fn build(self) -> Vec<Instruction> {
        debug_assert!(
            self.code.iter().all(|i| !i.op.is_jump() || i.arg != UNPATCHED),
            "unpatched jump left in method body"
        );
        self.code
    }

    fn variable_effect(op: Opcode, arg: u32) -> i32 {
        let n = i32::try_from(arg).unwrap_or(i32::MAX);
        match op {
            // callee + args -> result
            Opcode::Invoke => -n,
            // base + args -> nothing
            Opcode::InvokeSuper => -n - 1,
            Opcode::BuildList | Opcode::BuildTuple => 1 - n,
            Opcode::BuildHash => 1 - 2 * n,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn forward_jump_is_patched_to_next_instruction() {
        let mut builder = CodeBuilder::new();
        builder.emit(Opcode::LoadTrue);
        let skip = builder.emit_jump(Opcode::JumpIfFalse);
        builder.emit(Opcode::LoadNull);
        builder.emit(Opcode::Pop);
        builder.patch_jump(skip);
        builder.emit(Opcode::Nop);

        let code = builder.build();
        assert_eq!(code[1].op, Opcode::JumpIfFalse);
        assert_eq!(code[1].arg, 4);
    }

    #[test]
    fn backward_jump_uses_recorded_offset() {
        let mut builder = CodeBuilder::new();
        builder.emit(Opcode::Nop);
        let top = builder.current_offset();
        builder.emit(Opcode::LoadFalse);
        builder.emit_jump_to(Opcode::JumpIfTrue, top);

        let code = builder.build();
        assert_eq!(code[2].arg, 1);
    }

    #[test]
    fn stack_depth_tracks_variable_effects() {
        let mut builder = CodeBuilder::new();
        builder.emit_arg(Opcode::LoadConst, 0);
        builder.emit_arg(Opcode::LoadConst, 1);
        builder.emit_arg(Opcode::LoadConst, 2);
        builder.emit_arg(Opcode::BuildList, 3);
        assert_eq!(builder.stack_depth(), 1);

        builder.emit_arg(Opcode::LoadGlobal, 3);
        builder.emit_arg(Opcode::Invoke, 1);
        assert_eq!(builder.stack_depth(), 1);

        builder.emit(Opcode::Dup3);
        assert_eq!(builder.stack_depth(), 3);
    }

    #[test]
    fn location_is_stamped_on_instructions() {
        let mut builder = CodeBuilder::new();
        builder.set_location(CodeLoc::new(3, 7));
        builder.emit(Opcode::LoadNull);

        let code = builder.build();
        assert_eq!(code[0].loc, CodeLoc::new(3, 7));
    }
}
