use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{exception_public::TraceFrame, value::Value};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Built-in exception types.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly, which is also the
/// global name the type is installed under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
pub enum ExcType {
    /// Base of every exception; matches all of them in `is` checks.
    Exception,

    // --- lookup hierarchy ---
    LookupError,
    /// Subclass of LookupError.
    IndexError,
    /// Subclass of LookupError: missing map key or list element.
    KeyNotFound,

    // --- arithmetic hierarchy ---
    ArithmeticError,
    /// Subclass of ArithmeticError.
    ZeroDivisionError,
    /// Subclass of ArithmeticError: 64-bit integer overflow.
    OverflowError,

    // --- runtime hierarchy ---
    RuntimeError,
    /// Subclass of RuntimeError.
    RecursionError,
    /// Subclass of RuntimeError.
    NotImplementedError,

    TypeError,
    ValueError,
    /// Wrong number of arguments for a call.
    ArgumentError,
    AttributeNotFound,
    /// A global name that is neither an ambient global nor a module attribute.
    NameError,
    ImportError,
    IOError,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Returns true if `self` would be caught by `except (e as handler_type)`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::Exception => true,
            Self::LookupError => matches!(self, Self::IndexError | Self::KeyNotFound),
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::RecursionError | Self::NotImplementedError),
            _ => false,
        }
    }
}

/// A runtime exception object.
///
/// The trace is captured once, when the exception is first raised, innermost frame first.
/// `payload` holds the user object when an instance of a user class is raised.
#[derive(Debug)]
pub struct Exception {
    exc_type: ExcType,
    message: String,
    payload: Option<Value>,
    trace: RefCell<Vec<TraceFrame>>,
}

impl Exception {
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: message.into(),
            payload: None,
            trace: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub(crate) fn with_payload(exc_type: ExcType, message: String, payload: Value) -> Self {
        Self {
            exc_type,
            message,
            payload: Some(payload),
            trace: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    #[must_use]
    pub fn trace(&self) -> Vec<TraceFrame> {
        self.trace.borrow().clone()
    }

    pub(crate) fn has_trace(&self) -> bool {
        !self.trace.borrow().is_empty()
    }

    pub(crate) fn set_trace(&self, frames: Vec<TraceFrame>) {
        *self.trace.borrow_mut() = frames;
    }

    /// Type name shown to users: the payload's class name for user exceptions.
    #[must_use]
    pub fn type_name(&self) -> String {
        match &self.payload {
            Some(Value::Instance(instance)) => instance.class().name().to_owned(),
            _ => self.exc_type.to_string(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.type_name())
        } else {
            write!(f, "{}: {}", self.type_name(), self.message)
        }
    }
}

/// Error travelling up the Rust call stack during execution.
///
/// `Exc` carries a raised exception to the nearest dispatch loop, which drives it
/// through the handler stack. Once that has happened, every Rust frame between
/// the raise point and the handler's frame sees `Unwound` and returns without
/// doing anything else.
#[derive(Debug, Clone)]
pub enum RunError {
    Exc(Rc<Exception>),
    Unwound,
}

impl RunError {
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self::Exc(Rc::new(Exception::new(exc_type, message)))
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::TypeError, message)
    }

    /// A fault in the engine itself, surfaced as a `RuntimeError` exception.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExcType::RuntimeError, message)
    }

    #[must_use]
    pub fn attribute_not_found(type_name: &str, name: &str) -> Self {
        Self::new(
            ExcType::AttributeNotFound,
            format!("'{type_name}' object has no attribute '{name}'"),
        )
    }

    #[must_use]
    pub fn argument_count(name: &str, expected: usize, given: usize) -> Self {
        Self::new(
            ExcType::ArgumentError,
            format!("{name}() takes {expected} argument(s) but {given} were given"),
        )
    }
}

impl From<Exception> for RunError {
    fn from(exc: Exception) -> Self {
        Self::Exc(Rc::new(exc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_errors_are_caught_by_their_base() {
        assert!(ExcType::KeyNotFound.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::IndexError.is_subclass_of(ExcType::Exception));
        assert!(!ExcType::TypeError.is_subclass_of(ExcType::LookupError));
        assert!(!ExcType::Exception.is_subclass_of(ExcType::TypeError));
    }

    #[test]
    fn display_includes_message() {
        let exc = Exception::new(ExcType::ValueError, "bad value");
        assert_eq!(exc.to_string(), "ValueError: bad value");
        assert_eq!(Exception::new(ExcType::ImportError, "").to_string(), "ImportError");
    }
}
