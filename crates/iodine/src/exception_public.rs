//! The unhandled-exception boundary handed to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ast::CodeLoc,
    exception_private::{ExcType, Exception},
};

/// One entry of a captured trace: the executing method and the position of
/// the instruction it was running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    pub name: String,
    pub loc: CodeLoc,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {} ({})", self.name, self.loc)
    }
}

/// An exception that reached the program boundary with no handler left.
///
/// Carries the type tag, the message, and the trace innermost frame first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncaughtException {
    pub exc_type: ExcType,
    /// Class name for instances of user classes, otherwise the type tag's name.
    pub type_name: String,
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl UncaughtException {
    /// Process exit code a driver should use on this path.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }

    /// Renders the full diagnostic: the trace, then `Type: message`.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        if !self.trace.is_empty() {
            out.push_str("Traceback (innermost first):\n");
            for frame in &self.trace {
                // writing into a String cannot fail
                let _ = writeln!(out, "  {frame}");
            }
        }
        let _ = write!(out, "{self}");
        out
    }
}

impl From<&Exception> for UncaughtException {
    fn from(exc: &Exception) -> Self {
        Self {
            exc_type: exc.exc_type(),
            type_name: exc.type_name(),
            message: exc.message().to_owned(),
            trace: exc.trace(),
        }
    }
}

impl fmt::Display for UncaughtException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl std::error::Error for UncaughtException {}
