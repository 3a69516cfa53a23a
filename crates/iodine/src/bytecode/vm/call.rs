//! Invocation: argument binding, frames, constructors and base constructor chaining.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::{Frame, FrameReturn, Vm};
use crate::{
    bytecode::code::Method,
    exception_private::{ExcType, Exception, RunError, RunResult},
    types::{ArgValues, Class, Closure, Instance, NativeFunction, ValueMap},
    value::Value,
};

impl Vm {
    /// Calls any callable value with already evaluated arguments.
    ///
    /// Natives use this to call back into bytecode, e.g. a user `toString`.
    pub fn call_value(&mut self, callee: &Value, args: ArgValues) -> RunResult<Value> {
        match callee {
            Value::Method(method) => self.invoke_method(method, None, args, None, None),
            Value::Closure(closure) => self.invoke_closure(closure, None, args),
            Value::BoundMethod(bound) => self.call_bound(bound.receiver().clone(), bound.method(), args),
            Value::Native(native) => self.call_native(native, None, args),
            Value::Class(class) => self.construct(class, args),
            Value::Type(ty) => ty.construct(self, args),
            Value::ExcType(exc_type) => construct_exception(self, *exc_type, args),
            Value::Instance(instance) => match instance.class().find_instance_method("__invoke__") {
                Some(method) => self.call_bound(callee.clone(), &method, args),
                None => Err(not_callable(callee)),
            },
            other => Err(not_callable(other)),
        }
    }

    /// Calls `method` with `receiver` as `self`.
    pub(super) fn call_bound(&mut self, receiver: Value, method: &Value, args: ArgValues) -> RunResult<Value> {
        match method {
            Value::Method(method) => self.invoke_method(method, Some(receiver), args, None, None),
            Value::Closure(closure) => self.invoke_closure(closure, Some(receiver), args),
            Value::Native(native) => self.call_native(native, Some(receiver), args),
            other => self.call_value(other, args),
        }
    }

    /// Calls the instance method `name` on `receiver` if its class defines one.
    pub(crate) fn call_instance_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: ArgValues,
    ) -> RunResult<Option<Value>> {
        let Value::Instance(instance) = receiver else {
            return Ok(None);
        };
        match instance.class().find_instance_method(name) {
            Some(method) => self.call_bound(receiver.clone(), &method, args).map(Some),
            None => Ok(None),
        }
    }

    fn call_native(&mut self, native: &NativeFunction, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
        if let Some(arity) = native.arity
            && arity != args.len()
        {
            return Err(RunError::argument_count(native.name, arity, args.len()));
        }
        (native.func)(self, this, args)
    }

    fn invoke_closure(&mut self, closure: &Closure, receiver: Option<Value>, args: ArgValues) -> RunResult<Value> {
        let receiver = receiver.or_else(|| closure.receiver().cloned());
        self.invoke_method(closure.method(), receiver, args, Some(closure.locals().clone()), None)
    }

    /// `Invoke` from a running frame.
    ///
    /// Bytecode callees get a frame on the current dispatch loop and deliver
    /// their result when they return; anything else is called directly and its
    /// result pushed now.
    pub(super) fn call_from_frame(&mut self, frame: &Frame, callee: &Value, args: ArgValues) -> RunResult<()> {
        match callee {
            Value::Method(method) => self.push_frame(method, None, args, None, None, FrameReturn::Value),
            Value::Closure(closure) => self.push_closure_frame(closure, None, args),
            Value::BoundMethod(bound) => match bound.method() {
                Value::Method(method) => {
                    self.push_frame(method, Some(bound.receiver().clone()), args, None, None, FrameReturn::Value)
                }
                Value::Closure(closure) => self.push_closure_frame(closure, Some(bound.receiver().clone()), args),
                _ => {
                    let result = self.call_value(callee, args)?;
                    frame.push(result);
                    Ok(())
                }
            },
            Value::Class(class) => {
                self.ensure_initialized(class)?;
                let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
                self.push_frame(
                    class.constructor(),
                    Some(instance.clone()),
                    args,
                    None,
                    Some(class.clone()),
                    FrameReturn::Instance(instance),
                )
            }
            _ => {
                let result = self.call_value(callee, args)?;
                frame.push(result);
                Ok(())
            }
        }
    }

    fn push_closure_frame(&mut self, closure: &Closure, receiver: Option<Value>, args: ArgValues) -> RunResult<()> {
        let receiver = receiver.or_else(|| closure.receiver().cloned());
        self.push_frame(
            closure.method(),
            receiver,
            args,
            Some(closure.locals().clone()),
            None,
            FrameReturn::Value,
        )
    }

    /// Pushes a frame for `method` and runs it to completion in a nested
    /// dispatch loop.
    ///
    /// `captured` are the locals of a closure's defining frame; otherwise the
    /// frame gets fresh null-initialized locals.
    pub(super) fn invoke_method(
        &mut self,
        method: &Rc<Method>,
        receiver: Option<Value>,
        args: ArgValues,
        captured: Option<Rc<RefCell<Vec<Value>>>>,
        owner: Option<Rc<Class>>,
    ) -> RunResult<Value> {
        if self.native_depth >= self.config.max_native_depth {
            return Err(RunError::new(
                ExcType::RecursionError,
                format!("maximum native call depth of {} exceeded", self.config.max_native_depth),
            ));
        }
        self.push_frame(method, receiver, args, captured, owner, FrameReturn::Value)?;
        self.native_depth += 1;
        let result = self.run_frames();
        self.native_depth -= 1;
        result
    }

    /// Binds arguments and pushes a frame without running it.
    fn push_frame(
        &mut self,
        method: &Rc<Method>,
        receiver: Option<Value>,
        args: ArgValues,
        captured: Option<Rc<RefCell<Vec<Value>>>>,
        owner: Option<Rc<Class>>,
        returns: FrameReturn,
    ) -> RunResult<()> {
        if self.frames.len() >= self.config.max_recursion_depth {
            return Err(RunError::new(
                ExcType::RecursionError,
                format!("maximum recursion depth of {} exceeded", self.config.max_recursion_depth),
            ));
        }
        let module = method
            .module()
            .ok_or_else(|| RunError::internal(format!("module of '{}' is no longer alive", method.name())))?;

        let locals = match captured {
            Some(locals) => {
                {
                    let mut slots = locals.borrow_mut();
                    if slots.len() < method.local_count() {
                        slots.resize(method.local_count(), Value::Null);
                    }
                }
                locals
            }
            None => Rc::new(RefCell::new(vec![Value::Null; method.local_count()])),
        };
        bind_arguments(method, &locals, args)?;

        self.frames.push(Rc::new(Frame {
            method: method.clone(),
            module,
            receiver,
            locals,
            stack: RefCell::new(Vec::new()),
            ip: Cell::new(0),
            owner,
            returns,
        }));
        self.tracer.on_call(method.name(), self.frames.len());
        Ok(())
    }

    /// The first time a class is used, links its declared bases and runs its
    /// field initializers.
    pub(super) fn ensure_initialized(&mut self, class: &Rc<Class>) -> RunResult<()> {
        if !class.begin_initialization() {
            return Ok(());
        }
        for path in class.declared_bases() {
            match self.resolve_base(class, path)? {
                Value::Class(base) => {
                    class.link_base(&base);
                    self.ensure_initialized(&base)?;
                }
                Value::ExcType(exc_type) => class.set_exception_base(exc_type),
                // the constructor's `InvokeSuper` reports anything else
                _ => {}
            }
        }
        if let Some(initializer) = class.initializer().cloned() {
            self.invoke_method(
                &initializer,
                Some(Value::Class(class.clone())),
                ArgValues::new(),
                None,
                None,
            )?;
        }
        Ok(())
    }

    /// Looks up a dotted base name the way `LoadGlobal` and `LoadAttribute` would
    /// from the class's own module.
    fn resolve_base(&mut self, class: &Class, path: &str) -> RunResult<Value> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut value = match self.globals.get(first) {
            Some(value) => value.clone(),
            None => class
                .constructor()
                .module()
                .and_then(|module| module.attribute(first))
                .ok_or_else(|| RunError::new(ExcType::NameError, format!("name '{first}' is not defined")))?,
        };
        for segment in segments {
            value = self.load_attribute(&value, segment)?;
        }
        Ok(value)
    }

    fn construct(&mut self, class: &Rc<Class>, args: ArgValues) -> RunResult<Value> {
        self.ensure_initialized(class)?;
        let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
        self.invoke_method(
            class.constructor(),
            Some(instance.clone()),
            args,
            None,
            Some(class.clone()),
        )?;
        Ok(instance)
    }

    /// `InvokeSuper`: links `base` into the class under construction and runs
    /// the base constructor against the same receiver.
    ///
    /// A class base's constructor runs as a frame on the current loop.
    pub(super) fn invoke_super(&mut self, frame: &Frame, base: Value, args: ArgValues) -> RunResult<()> {
        let receiver = frame.receiver.clone().unwrap_or(Value::Null);
        let owner = frame.owner.clone().or_else(|| match &receiver {
            Value::Instance(instance) => Some(instance.class().clone()),
            _ => None,
        });
        match base {
            Value::Class(base) => {
                if let Some(owner) = &owner {
                    owner.link_base(&base);
                }
                self.ensure_initialized(&base)?;
                let constructor = base.constructor().clone();
                self.push_frame(&constructor, Some(receiver), args, None, Some(base), FrameReturn::Discard)
            }
            Value::ExcType(exc_type) => {
                if let Some(owner) = &owner {
                    owner.set_exception_base(exc_type);
                }
                if let Value::Instance(instance) = &receiver {
                    let message = match args.first() {
                        Some(arg) => self.to_display(arg)?,
                        None => String::new(),
                    };
                    instance.set_attribute("message", Value::from(message));
                }
                Ok(())
            }
            other => Err(RunError::type_error(format!(
                "cannot inherit from '{}'",
                other.type_name()
            ))),
        }
    }
}

/// Binds call arguments to parameter slots.
///
/// Positional arity is strict. Surplus arguments go to the variadic tuple when
/// there is one; a trailing map beyond the positional arity becomes the
/// keyword map when the method accepts one.
fn bind_arguments(method: &Method, locals: &RefCell<Vec<Value>>, mut args: ArgValues) -> RunResult<()> {
    let arity = method.arity();
    let kwargs = if method.accepts_keyword_args() {
        if args.len() > arity && matches!(args.last(), Some(Value::Map(_))) {
            args.pop()
        } else {
            Some(Value::new_map(ValueMap::default()))
        }
    } else {
        None
    };

    if args.len() < arity || (!method.is_variadic() && args.len() > arity) {
        return Err(RunError::argument_count(method.name(), arity, args.len()));
    }
    let varargs = method
        .is_variadic()
        .then(|| Value::new_tuple(args.drain(arity..).collect()));

    // parameter slots are ordered positional, variadic, keyword
    let mut locals = locals.borrow_mut();
    let slots = method.parameters().values().copied();
    for (slot, value) in slots.zip(args.into_iter().chain(varargs).chain(kwargs)) {
        if let Some(cell) = locals.get_mut(slot) {
            *cell = value;
        }
    }
    Ok(())
}

fn construct_exception(vm: &mut Vm, exc_type: ExcType, args: ArgValues) -> RunResult<Value> {
    if args.len() > 1 {
        return Err(RunError::argument_count(<&'static str>::from(exc_type), 1, args.len()));
    }
    let message = match args.first() {
        Some(arg) => vm.to_display(arg)?,
        None => String::new(),
    };
    Ok(Value::Exception(Rc::new(Exception::new(exc_type, message))))
}

fn not_callable(value: &Value) -> RunError {
    RunError::type_error(format!("'{}' object is not callable", value.type_name()))
}
