//! Bytecode compiler backend and stack virtual machine for the Iodine
//! scripting language.
//!
//! A front end hands over a parsed [`ast::CompilationUnit`];
//! [`compile_module`] turns it into a [`Module`] of compiled methods and
//! [`Engine`] (or a bare [`Vm`]) executes it. Exceptions that escape every
//! handler surface as [`UncaughtException`].
#![expect(clippy::cast_possible_truncation, reason = "operands are u32 by construction")]
#![expect(clippy::cast_possible_wrap, reason = "hash values are reinterpreted as Int")]
#![expect(clippy::needless_pass_by_value, reason = "native signatures pass values consistently")]
#![expect(clippy::unnecessary_wraps, reason = "native signatures are uniform")]
#![expect(clippy::float_cmp, reason = "Iodine equality compares floats exactly")]

pub mod analysis;
pub mod ast;
mod builtins;
mod bytecode;
mod compile_error;
mod exception_private;
mod exception_public;
mod io;
pub mod loader;
mod object;
mod resource;
mod run;
pub mod symbol;
pub mod tracer;
pub mod types;
mod value;

pub use crate::{
    builtins::builtin_names,
    bytecode::{BinaryOp, CodeBuilder, Instruction, JumpLabel, Method, Opcode, UnaryOp, Vm, compile_module},
    compile_error::{CompileError, CompileErrorKind, ErrorLog},
    exception_private::{ExcType, Exception, RunError, RunResult},
    exception_public::{TraceFrame, UncaughtException},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    loader::{ModuleLoader, NoModules, RegistryLoader},
    object::{InvalidInputError, Object},
    resource::{DEFAULT_MAX_NATIVE_DEPTH, DEFAULT_MAX_RECURSION_DEPTH, MAX_DATA_RECURSION_DEPTH, VmConfig},
    run::Engine,
    tracer::{NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent, VmTracer},
    types::Module,
    value::{Value, format_float},
};
