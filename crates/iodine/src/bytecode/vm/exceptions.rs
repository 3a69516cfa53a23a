//! Exception raising, the handler stack and type tests.

use std::rc::Rc;

use super::{ExceptionHandler, Frame, Vm};
use crate::{
    exception_private::{ExcType, Exception, RunError, RunResult},
    exception_public::TraceFrame,
    value::Value,
};

impl Vm {
    /// Drives a raised exception through the handler stack.
    ///
    /// With a handler left, every frame above the handler's frame is dropped
    /// and the handler's frame resumes at the handler address with its operand
    /// stack cut back to the recorded height. Without one, every frame is
    /// dropped and the exception is kept for the top-level caller.
    pub(super) fn raise(&mut self, exc: Rc<Exception>) {
        if !exc.has_trace() {
            exc.set_trace(self.capture_trace());
        }
        self.tracer.on_raise(exc.exc_type(), !self.handlers.is_empty());

        let Some(handler) = self.handlers.pop() else {
            self.frames.clear();
            self.uncaught = Some(exc);
            return;
        };
        self.frames.truncate(handler.frame_depth);
        if let Some(frame) = self.frames.last() {
            frame.stack.borrow_mut().truncate(handler.stack_height);
            frame.jump(handler.handler_ip);
        }
        self.current_exception = Some(exc);
    }

    /// Converts the operand of `Raise` into an exception.
    ///
    /// Raising an instance of a user class wraps it as the payload; re-raising
    /// the payload of the exception being handled raises that exception again.
    pub(super) fn exception_from(&self, value: Value) -> RunResult<Rc<Exception>> {
        match value {
            Value::Exception(exc) => Ok(exc),
            Value::ExcType(exc_type) => Ok(Rc::new(Exception::new(exc_type, ""))),
            Value::Instance(instance) => {
                if let Some(current) = &self.current_exception
                    && let Some(Value::Instance(payload)) = current.payload()
                    && Rc::ptr_eq(payload, &instance)
                {
                    return Ok(current.clone());
                }
                let exc_type = instance.class().exception_base().unwrap_or(ExcType::Exception);
                let message = instance.attribute("message").map(|m| m.to_str()).unwrap_or_default();
                Ok(Rc::new(Exception::with_payload(exc_type, message, Value::Instance(instance))))
            }
            other => Err(RunError::type_error(format!(
                "exceptions must be Exception objects, not '{}'",
                other.type_name()
            ))),
        }
    }

    pub(super) fn push_handler(&mut self, frame: &Frame, handler_ip: usize) {
        self.handlers.push(ExceptionHandler {
            frame_depth: self.frames.len(),
            handler_ip,
            stack_height: frame.depth(),
        });
        self.tracer.on_exception_push(self.handlers.len());
    }

    pub(super) fn pop_handler(&mut self) {
        self.handlers.pop();
        self.tracer.on_exception_pop(self.handlers.len());
    }

    /// The exception being handled: the raised user object, or the exception itself.
    pub(super) fn load_exception(&self) -> Value {
        match &self.current_exception {
            Some(exc) => exc.payload().cloned().unwrap_or_else(|| Value::Exception(exc.clone())),
            None => Value::Null,
        }
    }

    /// `value is ty`.
    pub(super) fn instance_of(value: &Value, ty: &Value) -> RunResult<bool> {
        Ok(match ty {
            Value::Type(ty) => ty.matches(value.type_of()),
            Value::Class(class) => match value {
                Value::Instance(instance) => instance.class().is_subclass_of(class),
                _ => false,
            },
            Value::Interface(interface) => match value {
                Value::Instance(instance) => instance.class().implements(interface),
                _ => false,
            },
            Value::ExcType(exc_type) => match value {
                Value::Exception(exc) => exc.exc_type().is_subclass_of(*exc_type),
                // raised user objects without a built-in base count as plain `Exception`
                Value::Instance(instance) => instance
                    .class()
                    .exception_base()
                    .unwrap_or(ExcType::Exception)
                    .is_subclass_of(*exc_type),
                _ => false,
            },
            other => {
                return Err(RunError::type_error(format!(
                    "right operand of 'is' must be a type, not '{}'",
                    other.type_name()
                )));
            }
        })
    }

    /// Snapshot of the call stack, innermost frame first.
    pub(super) fn capture_trace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let ip = frame.ip.get().saturating_sub(1);
                TraceFrame {
                    name: frame.method.name().to_owned(),
                    loc: frame.method.body().get(ip).map(|i| i.loc).unwrap_or_default(),
                }
            })
            .collect()
    }
}
