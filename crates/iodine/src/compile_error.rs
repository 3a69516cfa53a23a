//! Compile-time diagnostics.
//!
//! Analysis and code generation never stop at the first problem. Each error is
//! appended to an [`ErrorLog`] with its source location, and the pipeline checks
//! [`ErrorLog::error_count`] between phases.

use std::fmt;

use serde::Serialize;

use crate::ast::CodeLoc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CompileErrorKind {
    /// Control-flow statement at module level. Carries the statement keyword.
    StatementNotAllowedOutsideFunction(&'static str),
    /// Class, enum, interface or `use` inside a function body.
    DeclarationNotAllowedInFunction(&'static str),
    DuplicateDefinition(String),
    /// Enum member whose value is not an integer literal.
    MalformedEnumValue(String),
    /// Class-body assignment whose target is not a simple name.
    InvalidFieldInitializer,
    /// Class-body statement that is neither a member declaration nor a field initializer.
    InvalidClassMember,
    InvalidAssignmentTarget,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    SuperCallOutsideConstructor,
    TooManyOperands(&'static str),
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatementNotAllowedOutsideFunction(stmt) => {
                write!(f, "statement '{stmt}' not allowed outside function")
            }
            Self::DeclarationNotAllowedInFunction(decl) => {
                write!(f, "'{decl}' declaration not allowed inside function")
            }
            Self::DuplicateDefinition(name) => write!(f, "duplicate definition of '{name}'"),
            Self::MalformedEnumValue(name) => {
                write!(f, "enum member '{name}' must have an integer literal value")
            }
            Self::InvalidFieldInitializer => {
                write!(f, "field initializer must assign to a simple name")
            }
            Self::InvalidClassMember => write!(f, "statement not allowed in class body"),
            Self::InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            Self::BreakOutsideLoop => write!(f, "'break' outside loop"),
            Self::ContinueOutsideLoop => write!(f, "'continue' outside loop"),
            Self::SuperCallOutsideConstructor => {
                write!(f, "super call outside a derived class constructor")
            }
            Self::TooManyOperands(what) => write!(f, "too many {what}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    pub loc: CodeLoc,
    pub kind: CompileErrorKind,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.loc, self.kind)
    }
}

impl std::error::Error for CompileError {}

/// Accumulated compile errors, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorLog {
    errors: Vec<CompileError>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, loc: CodeLoc, kind: CompileErrorKind) {
        self.errors.push(CompileError { loc, kind });
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    /// Kinds only, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<CompileErrorKind> {
        self.errors.iter().map(|e| e.kind.clone()).collect()
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorLog {}
