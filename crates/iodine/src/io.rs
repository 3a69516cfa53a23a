use std::{
    borrow::Cow,
    cell::RefCell,
    fmt,
    io::{self, Write as _},
    rc::Rc,
};

use crate::exception_private::{ExcType, Exception};

/// Trait for handling output from the `print()` builtin function.
///
/// Implement this trait to capture or redirect print output from scripts.
/// The default implementation `StdPrint` writes to stdout.
pub trait PrintWriter: fmt::Debug {
    /// Called once for each formatted argument passed to `print()`.
    ///
    /// Writes only the given argument's text. Separators and the final newline
    /// are emitted via [`PrintWriter::stdout_push`].
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception>;

    /// Adds a single character to stdout, such as a separator or the newline.
    fn stdout_push(&mut self, end: char) -> Result<(), Exception>;
}

/// Default `PrintWriter` that writes to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

fn io_error(err: &io::Error) -> Exception {
    Exception::new(ExcType::IOError, err.to_string())
}

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        io::stdout().write_all(output.as_bytes()).map_err(|e| io_error(&e))
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        let mut buf = [0; 4];
        let mut stdout = io::stdout();
        stdout.write_all(end.encode_utf8(&mut buf).as_bytes()).map_err(|e| io_error(&e))?;
        if end == '\n' {
            stdout.flush().map_err(|e| io_error(&e))?;
        }
        Ok(())
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Clones share the same buffer, so a handle kept by the caller sees what the
/// VM printed through its own clone.
#[derive(Debug, Clone, Default)]
pub struct CollectStringPrint(Rc<RefCell<String>>);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the collected output.
    #[must_use]
    pub fn output(&self) -> String {
        self.0.borrow().clone()
    }

    /// Empties the buffer, returning what it held.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        self.0.borrow_mut().push_str(&output);
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        self.0.borrow_mut().push(end);
        Ok(())
    }
}

/// `PrintWriter` that ignores all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> Result<(), Exception> {
        Ok(())
    }

    fn stdout_push(&mut self, _end: char) -> Result<(), Exception> {
        Ok(())
    }
}
