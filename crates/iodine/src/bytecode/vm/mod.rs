//! Bytecode virtual machine.
//!
//! Every [`Frame`] has a private operand stack. Calls from one bytecode method
//! to another push a frame onto the running dispatch loop; only natives and
//! protocol hooks (operator overloads, `toString`, iteration methods, module
//! initializers) start a nested loop, and those nest at most
//! [`VmConfig::max_native_depth`] deep. Exception handlers live on one VM-wide
//! stack that records the frame depth, resume address and operand stack height
//! of every `try`. Raising pops the nearest handler, drops every frame above
//! its owner and resumes the owner at the handler address; a nested loop whose
//! entry frame was dropped returns [`RunError::Unwound`] without executing
//! anything else.

mod attr;
mod binary;
mod call;
mod collections;
mod exceptions;
mod import;

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use ahash::AHashMap;

use super::{
    code::{Instruction, Method},
    op::{BinaryOp, Opcode, UnaryOp},
};
use crate::{
    builtins,
    exception_private::{ExcType, Exception, RunError, RunResult},
    exception_public::UncaughtException,
    io::{PrintWriter, StdPrint},
    loader::{ModuleLoader, NoModules},
    resource::VmConfig,
    tracer::{NoopTracer, VmTracer},
    types::{ArgValues, Class, Closure, Module},
    value::Value,
};

/// An entry of the handler stack, pushed by `PushExceptionHandler`.
#[derive(Debug, Clone, Copy)]
struct ExceptionHandler {
    /// Number of frames on the call stack when the handler was pushed; the
    /// owning frame is the last of them.
    frame_depth: usize,
    handler_ip: usize,
    stack_height: usize,
}

/// Activation record of one method invocation.
#[derive(Debug)]
pub(crate) struct Frame {
    method: Rc<Method>,
    module: Rc<Module>,
    receiver: Option<Value>,
    /// Shared with closures created while this frame runs.
    locals: Rc<RefCell<Vec<Value>>>,
    stack: RefCell<Vec<Value>>,
    ip: Cell<usize>,
    /// Class whose constructor this frame runs; target of base linking by `InvokeSuper`.
    owner: Option<Rc<Class>>,
    returns: FrameReturn,
}

/// What a finished frame hands to its caller's operand stack.
#[derive(Debug)]
pub(crate) enum FrameReturn {
    /// The value left on top of the frame's stack.
    Value,
    /// A fixed value, the new instance for a constructor.
    Instance(Value),
    /// Nothing, for base constructors run by `InvokeSuper`.
    Discard,
}

impl Frame {
    fn push(&self, value: Value) {
        self.stack.borrow_mut().push(value);
    }

    fn pop(&self) -> RunResult<Value> {
        self.stack
            .borrow_mut()
            .pop()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    fn peek(&self) -> RunResult<Value> {
        self.stack
            .borrow()
            .last()
            .cloned()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    /// Pops `count` values, returned in push order.
    fn pop_n(&self, count: usize) -> RunResult<ArgValues> {
        let mut stack = self.stack.borrow_mut();
        let Some(start) = stack.len().checked_sub(count) else {
            return Err(RunError::internal("operand stack underflow"));
        };
        Ok(stack.drain(start..).collect())
    }

    fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    fn constant(&self, index: usize) -> RunResult<Value> {
        self.module
            .constant(index)
            .cloned()
            .ok_or_else(|| RunError::internal(format!("constant index {index} out of range")))
    }

    /// A constant that must be a string, such as a global or attribute name.
    fn name(&self, index: usize) -> RunResult<Rc<str>> {
        match self.constant(index)? {
            Value::Str(name) => Ok(name),
            other => Err(RunError::internal(format!("expected a name constant, found {}", other.repr()))),
        }
    }

    fn jump(&self, target: usize) {
        self.ip.set(target);
    }
}

/// The virtual machine: call stack, handler stack, ambient globals and module cache.
#[derive(Debug)]
pub struct Vm {
    frames: Vec<Rc<Frame>>,
    handlers: Vec<ExceptionHandler>,
    globals: AHashMap<String, Value>,
    /// The exception being handled, read by `LoadException`.
    current_exception: Option<Rc<Exception>>,
    modules: AHashMap<String, Rc<Module>>,
    loader: Box<dyn ModuleLoader>,
    print: Box<dyn PrintWriter>,
    tracer: Box<dyn VmTracer>,
    config: VmConfig,
    /// Exception that escaped every handler during the current top-level call.
    uncaught: Option<Rc<Exception>>,
    /// Dispatch loops currently running on the host stack.
    native_depth: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl Vm {
    /// Creates a VM with the built-in globals installed, printing to stdout,
    /// no importable modules and no tracing.
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        let mut globals = AHashMap::new();
        builtins::install(&mut globals);
        Self {
            frames: Vec::new(),
            handlers: Vec::new(),
            globals,
            current_exception: None,
            modules: AHashMap::new(),
            loader: Box::new(NoModules),
            print: Box::new(StdPrint),
            tracer: Box::new(NoopTracer),
            config,
            uncaught: None,
            native_depth: 0,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    #[must_use]
    pub fn with_print(mut self, print: impl PrintWriter + 'static) -> Self {
        self.print = Box::new(print);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: impl VmTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Looks up an ambient global such as `print` or a value a program stored
    /// with `StoreGlobal`.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// A module that has been run or imported.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<Rc<Module>> {
        self.modules.get(name).cloned()
    }

    pub(crate) fn print_writer(&mut self) -> &mut dyn PrintWriter {
        self.print.as_mut()
    }

    /// Runs a module's top-level code and caches it under its name.
    ///
    /// Returns the initializer's result (usually null).
    pub fn run_module(&mut self, module: &Rc<Module>) -> Result<Value, UncaughtException> {
        self.modules.insert(module.name().to_owned(), module.clone());
        let initializer = module.initializer().clone();
        self.top_level(|vm| vm.invoke_method(&initializer, None, ArgValues::new(), None, None))
    }

    /// Calls any callable value from the host.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, UncaughtException> {
        self.top_level(|vm| vm.call_value(callee, args.into()))
    }

    /// Runs `body` as an outermost call and converts an escaping exception
    /// into the host-facing form.
    fn top_level(&mut self, body: impl FnOnce(&mut Self) -> RunResult<Value>) -> Result<Value, UncaughtException> {
        self.uncaught = None;
        let result = body(self);
        let exc = match result {
            Ok(value) => return Ok(value),
            Err(RunError::Exc(exc)) => {
                // raised before any frame could handle it, e.g. a bad argument count
                if !exc.has_trace() {
                    exc.set_trace(self.capture_trace());
                }
                self.tracer.on_raise(exc.exc_type(), false);
                exc
            }
            Err(RunError::Unwound) => self.uncaught.take().unwrap_or_else(|| {
                Rc::new(Exception::new(
                    ExcType::RuntimeError,
                    "execution unwound without an exception",
                ))
            }),
        };
        self.frames.clear();
        self.handlers.clear();
        self.current_exception = None;
        Err(UncaughtException::from(exc.as_ref()))
    }

    /// Runs the frame on top of the call stack until it returns.
    ///
    /// Frames pushed by `Invoke` while it runs are executed by this same loop.
    /// If an exception unwinds past the entry frame the loop stops with
    /// [`RunError::Unwound`].
    fn run_frames(&mut self) -> RunResult<Value> {
        let base = self.frames.len();
        loop {
            if self.frames.len() < base {
                return Err(RunError::Unwound);
            }
            let Some(frame) = self.frames.last().cloned() else {
                return Err(RunError::Unwound);
            };
            let ip = frame.ip.get();
            let Some(&instr) = frame.method.body.get(ip) else {
                let result = self.finish_frame(&frame);
                if self.frames.len() < base {
                    return Ok(result.unwrap_or(Value::Null));
                }
                if let (Some(value), Some(caller)) = (result, self.frames.last()) {
                    caller.push(value);
                }
                continue;
            };
            frame.ip.set(ip + 1);
            self.tracer
                .on_instruction(ip, instr.op, frame.depth(), self.frames.len());
            match self.execute(&frame, instr) {
                Ok(()) | Err(RunError::Unwound) => {}
                Err(RunError::Exc(exc)) => self.raise(exc),
            }
        }
    }

    /// Pops a completed frame and returns what its caller receives.
    fn finish_frame(&mut self, frame: &Frame) -> Option<Value> {
        let result = frame.stack.borrow_mut().pop().unwrap_or(Value::Null);
        self.frames.pop();
        let depth = self.frames.len();
        // handlers left behind by a frame that returned from inside a `try`
        while self.handlers.last().is_some_and(|h| h.frame_depth > depth) {
            self.handlers.pop();
        }
        self.tracer.on_return(depth);
        match &frame.returns {
            FrameReturn::Value => Some(result),
            FrameReturn::Instance(instance) => Some(instance.clone()),
            FrameReturn::Discard => None,
        }
    }

    fn execute(&mut self, frame: &Rc<Frame>, instr: Instruction) -> RunResult<()> {
        let arg = instr.arg as usize;
        match instr.op {
            Opcode::Nop => {}
            Opcode::BinOp => {
                let op = u8::try_from(instr.arg)
                    .ok()
                    .and_then(BinaryOp::from_repr)
                    .ok_or_else(|| RunError::internal(format!("invalid binary operator tag {arg}")))?;
                let right = frame.pop()?;
                let left = frame.pop()?;
                let result = self.binary_op(op, left, right)?;
                frame.push(result);
            }
            Opcode::UnaryOp => {
                let op = u8::try_from(instr.arg)
                    .ok()
                    .and_then(UnaryOp::from_repr)
                    .ok_or_else(|| RunError::internal(format!("invalid unary operator tag {arg}")))?;
                let operand = frame.pop()?;
                let result = self.unary_op(op, operand)?;
                frame.push(result);
            }
            Opcode::Pop => {
                frame.pop()?;
            }
            Opcode::Dup => frame.push(frame.peek()?),
            Opcode::Dup3 => {
                let top = frame.peek()?;
                frame.push(top.clone());
                frame.push(top);
            }
            Opcode::LoadConst => frame.push(frame.constant(arg)?),
            Opcode::LoadNull => frame.push(Value::Null),
            Opcode::LoadSelf => frame.push(frame.receiver.clone().unwrap_or(Value::Null)),
            Opcode::LoadTrue => frame.push(Value::Bool(true)),
            Opcode::LoadFalse => frame.push(Value::Bool(false)),
            Opcode::LoadLocal => {
                let value = frame
                    .locals
                    .borrow()
                    .get(arg)
                    .cloned()
                    .ok_or_else(|| RunError::internal(format!("local slot {arg} out of range")))?;
                frame.push(value);
            }
            Opcode::StoreLocal => {
                let value = frame.pop()?;
                let mut locals = frame.locals.borrow_mut();
                if locals.len() <= arg {
                    locals.resize(arg + 1, Value::Null);
                }
                locals[arg] = value;
            }
            Opcode::LoadGlobal => {
                let value = self.load_global(frame, &frame.name(arg)?)?;
                frame.push(value);
            }
            Opcode::StoreGlobal => {
                let value = frame.pop()?;
                self.store_global(frame, &frame.name(arg)?, value);
            }
            Opcode::LoadAttribute => {
                let target = frame.pop()?;
                let value = self.load_attribute(&target, &frame.name(arg)?)?;
                frame.push(value);
            }
            Opcode::StoreAttribute => {
                let target = frame.pop()?;
                let value = frame.pop()?;
                self.store_attribute(&target, &frame.name(arg)?, value)?;
            }
            Opcode::LoadIndex => {
                let index = frame.pop()?;
                let target = frame.pop()?;
                let value = self.load_index(&target, index)?;
                frame.push(value);
            }
            Opcode::StoreIndex => {
                let index = frame.pop()?;
                let target = frame.pop()?;
                let value = frame.pop()?;
                self.store_index(&target, index, value)?;
            }
            Opcode::Invoke => {
                let callee = frame.pop()?;
                let args = frame.pop_n(arg)?;
                self.call_from_frame(frame, &callee, args)?;
            }
            Opcode::InvokeSuper => {
                let base = frame.pop()?;
                let args = frame.pop_n(arg)?;
                self.invoke_super(frame, base, args)?;
            }
            Opcode::Return => frame.jump(usize::MAX),
            Opcode::JumpIfTrue => {
                if frame.pop()?.is_truthy() {
                    frame.jump(arg);
                }
            }
            Opcode::JumpIfFalse => {
                if !frame.pop()?.is_truthy() {
                    frame.jump(arg);
                }
            }
            Opcode::Jump => frame.jump(arg),
            Opcode::BuildList => {
                let items = frame.pop_n(arg)?;
                frame.push(Value::new_list(items.into_vec()));
            }
            Opcode::BuildTuple => {
                let items = frame.pop_n(arg)?;
                frame.push(Value::new_tuple(items.into_vec()));
            }
            Opcode::BuildHash => {
                let items = frame.pop_n(arg * 2)?;
                frame.push(Self::build_hash(items)?);
            }
            Opcode::BuildClosure => {
                let Value::Method(method) = frame.pop()? else {
                    return Err(RunError::internal("BuildClosure expects a method"));
                };
                self.tracer.on_closure(method.local_count());
                let closure = Closure::new(method, frame.locals.clone(), frame.receiver.clone());
                frame.push(Value::Closure(Rc::new(closure)));
            }
            Opcode::GetIter => {
                let iterable = frame.pop()?;
                let iter = self.get_iter(iterable)?;
                frame.push(iter);
            }
            Opcode::IterGetNext => {
                let iter = frame.pop()?;
                let value = self.iter_current(&iter)?;
                frame.push(value);
            }
            Opcode::IterMoveNext => {
                let iter = frame.pop()?;
                let more = self.iter_move_next(&iter)?;
                frame.push(Value::Bool(more));
            }
            Opcode::IterReset => {
                let iter = frame.pop()?;
                self.iter_reset(&iter)?;
            }
            Opcode::Raise => {
                let value = frame.pop()?;
                return Err(RunError::Exc(self.exception_from(value)?));
            }
            Opcode::PushExceptionHandler => self.push_handler(frame, arg),
            Opcode::PopExceptionHandler => self.pop_handler(),
            Opcode::LoadException => frame.push(self.load_exception()),
            Opcode::InstanceOf => {
                let ty = frame.pop()?;
                let value = frame.pop()?;
                frame.push(Value::Bool(Self::instance_of(&value, &ty)?));
            }
            Opcode::DynamicCast => {
                let ty = frame.pop()?;
                let value = frame.pop()?;
                let cast = if Self::instance_of(&value, &ty)? { value } else { Value::Null };
                frame.push(cast);
            }
            Opcode::NullCoalesce => {
                if frame.peek()?.is_null() {
                    frame.pop()?;
                } else {
                    frame.jump(arg);
                }
            }
            Opcode::Import => self.import(frame, &frame.name(arg)?)?,
            Opcode::ImportFrom => {
                let names = frame.pop()?;
                self.import_from(frame, &frame.name(arg)?, &names)?;
            }
            Opcode::ImportAll => self.import_all(frame, &frame.name(arg)?)?,
        }
        Ok(())
    }
}
