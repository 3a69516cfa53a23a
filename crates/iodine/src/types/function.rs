use std::{cell::RefCell, fmt, rc::Rc};

use smallvec::SmallVec;

use crate::{
    bytecode::{Method, Vm},
    exception_private::RunResult,
    value::Value,
};

/// Arguments of a single call. Most calls pass few arguments, so they stay inline.
pub type ArgValues = SmallVec<[Value; 4]>;

/// Signature of host functions callable from bytecode: `(vm, self, arguments)`.
pub type NativeFn = fn(&mut Vm, Option<Value>, ArgValues) -> RunResult<Value>;

/// A method packaged with the environment of the frame that created it.
///
/// The locals are shared with the defining frame, so writes on either side
/// are visible to the other.
#[derive(Debug)]
pub struct Closure {
    method: Rc<Method>,
    locals: Rc<RefCell<Vec<Value>>>,
    receiver: Option<Value>,
}

impl Closure {
    #[must_use]
    pub(crate) fn new(method: Rc<Method>, locals: Rc<RefCell<Vec<Value>>>, receiver: Option<Value>) -> Self {
        Self {
            method,
            locals,
            receiver,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Rc<Method> {
        &self.method
    }

    pub(crate) fn locals(&self) -> &Rc<RefCell<Vec<Value>>> {
        &self.locals
    }

    pub(crate) fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }
}

/// A host function installable as any attribute or global.
///
/// `arity` of `None` accepts any number of arguments.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl NativeFunction {
    #[must_use]
    pub const fn new(name: &'static str, arity: Option<usize>, func: NativeFn) -> Self {
        Self { name, arity, func }
    }

    /// Wraps the function as a value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Native(Rc::new(self))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}
