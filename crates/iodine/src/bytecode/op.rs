//! Opcode vocabulary shared by the compiler and the VM.
//!
//! Every instruction carries a single `u32` operand whose meaning depends on the
//! opcode: a constant-pool index, an absolute jump target, a local slot, an
//! argument count, or an operator tag. Opcodes that ignore the operand are
//! emitted with `0`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr, IntoStaticStr};

/// The bytecode instruction tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    /// Pops right then left, pushes `left <op> right`. Operand: [`BinaryOp`] tag.
    BinOp,
    /// Pops one value, pushes the result. Operand: [`UnaryOp`] tag.
    UnaryOp,
    Pop,
    /// Pops once and pushes two copies.
    Dup,
    /// Pops once and pushes three copies.
    Dup3,
    /// Operand: constant-pool index.
    LoadConst,
    LoadNull,
    LoadSelf,
    LoadTrue,
    LoadFalse,
    /// Operand: local slot.
    LoadLocal,
    /// Pops the value to store. Operand: local slot.
    StoreLocal,
    /// Operand: constant-pool index of the name.
    LoadGlobal,
    /// Operand: constant-pool index of the name.
    StoreGlobal,
    /// Pops the target. Operand: constant-pool index of the attribute name.
    LoadAttribute,
    /// Pops the target then the value. Operand: constant-pool index of the attribute name.
    StoreAttribute,
    /// Pops the index then the target.
    LoadIndex,
    /// Pops the index, the target, then the value.
    StoreIndex,
    /// Pops the callee then `operand` arguments. Operand: argument count.
    Invoke,
    /// Pops a base class then `operand` arguments and runs the base constructor
    /// against the current receiver. Pushes nothing.
    InvokeSuper,
    /// Ends the current method; the top of the operand stack is the return value.
    Return,
    /// Pops the condition. Operand: absolute instruction index.
    JumpIfTrue,
    /// Pops the condition. Operand: absolute instruction index.
    JumpIfFalse,
    /// Operand: absolute instruction index.
    Jump,
    /// Operand: element count.
    BuildList,
    /// Operand: element count.
    BuildTuple,
    /// Operand: number of key/value pairs.
    BuildHash,
    /// Pops a method and captures the executing frame's locals.
    BuildClosure,
    /// Pops an iterable and pushes an iterator over it.
    GetIter,
    IterGetNext,
    /// Pushes `true` while elements remain.
    IterMoveNext,
    IterReset,
    /// Pops an exception and raises it.
    Raise,
    /// Operand: absolute instruction index of the handler.
    PushExceptionHandler,
    PopExceptionHandler,
    LoadException,
    /// Pops the type then the value, pushes a bool.
    InstanceOf,
    /// Pops the type then the value, pushes the value or null.
    DynamicCast,
    /// Leaves a non-null top in place and jumps, otherwise pops it. Operand: absolute instruction index.
    NullCoalesce,
    /// Operand: constant-pool index of the module name.
    Import,
    /// Pops a tuple of names. Operand: constant-pool index of the module name.
    ImportFrom,
    /// Operand: constant-pool index of the module name.
    ImportAll,
}

impl Opcode {
    /// Net operand stack effect for opcodes whose effect does not depend on the operand.
    ///
    /// Returns `None` for `Invoke`, `InvokeSuper` and the `Build*` family.
    #[must_use]
    pub const fn stack_effect(self) -> Option<i32> {
        let effect = match self {
            Self::Nop
            | Self::UnaryOp
            | Self::LoadAttribute
            | Self::Return
            | Self::Jump
            | Self::BuildClosure
            | Self::GetIter
            | Self::IterGetNext
            | Self::IterMoveNext
            | Self::PushExceptionHandler
            | Self::PopExceptionHandler
            | Self::Import
            | Self::ImportAll => 0,
            Self::Dup
            | Self::LoadConst
            | Self::LoadNull
            | Self::LoadSelf
            | Self::LoadTrue
            | Self::LoadFalse
            | Self::LoadLocal
            | Self::LoadGlobal
            | Self::LoadException => 1,
            Self::Dup3 => 2,
            Self::BinOp
            | Self::Pop
            | Self::StoreLocal
            | Self::StoreGlobal
            | Self::LoadIndex
            | Self::JumpIfTrue
            | Self::JumpIfFalse
            | Self::IterReset
            | Self::Raise
            | Self::InstanceOf
            | Self::DynamicCast
            | Self::ImportFrom => -1,
            Self::StoreAttribute => -2,
            Self::StoreIndex => -3,
            // conditional: -1 when the jump is not taken
            Self::NullCoalesce => -1,
            Self::Invoke | Self::InvokeSuper | Self::BuildList | Self::BuildTuple | Self::BuildHash => return None,
        };
        Some(effect)
    }

    /// Whether the operand is an absolute jump target that needs patching.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Self::Jump | Self::JumpIfTrue | Self::JumpIfFalse | Self::PushExceptionHandler | Self::NullCoalesce
        )
    }
}

/// Binary operator tags carried by `BinOp`.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, FromRepr, Serialize, Deserialize,
)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LeftShift,
    RightShift,
    And,
    Or,
    Xor,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqu,
    GreaterThanOrEqu,
    BoolAnd,
    BoolOr,
}

impl BinaryOp {
    /// Source-level spelling, used in error messages.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanOrEqu => "<=",
            Self::GreaterThanOrEqu => ">=",
            Self::BoolAnd => "&&",
            Self::BoolOr => "||",
        }
    }

    /// Name of the method an instance defines to overload this operator.
    #[must_use]
    pub const fn overload_name(self) -> Option<&'static str> {
        Some(match self {
            Self::Add => "__add__",
            Self::Sub => "__sub__",
            Self::Mul => "__mul__",
            Self::Div => "__div__",
            Self::Mod => "__mod__",
            Self::LeftShift => "__lshift__",
            Self::RightShift => "__rshift__",
            Self::And => "__and__",
            Self::Or => "__or__",
            Self::Xor => "__xor__",
            Self::Equals => "__equals__",
            Self::NotEquals => "__notEquals__",
            Self::LessThan => "__lt__",
            Self::GreaterThan => "__gt__",
            Self::LessThanOrEqu => "__lte__",
            Self::GreaterThanOrEqu => "__gte__",
            Self::BoolAnd | Self::BoolOr => return None,
        })
    }
}

/// Unary operator tags carried by `UnaryOp`.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, FromRepr, Serialize, Deserialize,
)]
pub enum UnaryOp {
    Negate,
    /// Bitwise complement.
    Not,
    BoolNot,
}

impl UnaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "~",
            Self::BoolNot => "!",
        }
    }

    #[must_use]
    pub const fn overload_name(self) -> &'static str {
        match self {
            Self::Negate => "__negate__",
            Self::Not => "__invert__",
            Self::BoolNot => "__not__",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn operator_tags_round_trip_through_operand() {
        for op in [BinaryOp::Add, BinaryOp::GreaterThanOrEqu, BinaryOp::BoolOr] {
            assert_eq!(BinaryOp::from_repr(op as u8), Some(op));
        }
        assert_eq!(UnaryOp::from_repr(UnaryOp::BoolNot as u8), Some(UnaryOp::BoolNot));
        assert_eq!(BinaryOp::from_repr(200), None);
    }

    #[test]
    fn opcode_names_parse() {
        assert_eq!(Opcode::from_str("InvokeSuper"), Ok(Opcode::InvokeSuper));
        assert_eq!(Opcode::Dup3.to_string(), "Dup3");
    }
}
