//! Compiled code containers: instructions and methods.

use std::{
    fmt,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

use super::op::Opcode;
use crate::{ast::CodeLoc, types::Module};

/// A single emitted instruction. Immutable once the owning method is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub arg: u32,
    pub loc: CodeLoc,
}

impl Instruction {
    #[must_use]
    pub const fn new(op: Opcode, arg: u32, loc: CodeLoc) -> Self {
        Self { op, arg, loc }
    }
}

/// A compiled callable body.
///
/// Methods are frozen once the compiler finishes them: jump targets are
/// final, and the parameter map lists slots in declaration order
/// (positional parameters, then the variadic tuple, then the keyword map).
pub struct Method {
    pub(crate) module: Weak<Module>,
    pub(crate) name: String,
    pub(crate) is_instance_method: bool,
    pub(crate) parameters: IndexMap<String, usize>,
    /// Number of positional parameters.
    pub(crate) arity: usize,
    pub(crate) local_count: usize,
    pub(crate) variadic: bool,
    pub(crate) accepts_keyword_args: bool,
    pub(crate) body: Vec<Instruction>,
}

impl Method {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_instance_method(&self) -> bool {
        self.is_instance_method
    }

    #[must_use]
    pub fn parameters(&self) -> &IndexMap<String, usize> {
        &self.parameters
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[must_use]
    pub fn local_count(&self) -> usize {
        self.local_count
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    #[must_use]
    pub fn accepts_keyword_args(&self) -> bool {
        self.accepts_keyword_args
    }

    #[must_use]
    pub fn body(&self) -> &[Instruction] {
        &self.body
    }

    /// The owning module, if it is still alive.
    #[must_use]
    pub fn module(&self) -> Option<Rc<Module>> {
        self.module.upgrade()
    }

    /// Opcodes of the body without operands, handy for asserting on emitted shapes.
    #[must_use]
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.body.iter().map(|i| i.op).collect()
    }

    /// Human-readable listing, one instruction per line.
    #[must_use]
    pub fn disassemble(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for (ip, instr) in self.body.iter().enumerate() {
            // writing into a String cannot fail
            let _ = writeln!(out, "{ip:4} {:<22} {}", instr.op, instr.arg);
        }
        out
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("local_count", &self.local_count)
            .field("len", &self.body.len())
            .finish_non_exhaustive()
    }
}
