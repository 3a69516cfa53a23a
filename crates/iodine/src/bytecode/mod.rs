//! Bytecode compiler and virtual machine.
//!
//! # Module Structure
//!
//! - `op` - Opcode and operator tag definitions
//! - `code` - Instructions and compiled methods
//! - `builder` - CodeBuilder for emitting instructions during compilation
//! - `compiler` - AST to bytecode compiler
//! - `vm` - Virtual machine for bytecode execution

pub use builder::{CodeBuilder, JumpLabel};
pub use code::{Instruction, Method};
pub use compiler::compile_module;
pub use op::{BinaryOp, Opcode, UnaryOp};
pub use vm::Vm;

mod builder;
mod code;
mod compiler;
mod op;
mod vm;
