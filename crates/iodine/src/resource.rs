/// Recommended maximum recursion depth if not otherwise specified.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Default nesting limit for natives and protocol hooks that call back into bytecode.
pub const DEFAULT_MAX_NATIVE_DEPTH: usize = 64;

/// Maximum nesting followed by data structure operations (repr, equality,
/// hashing, host conversion).
///
/// Debug builds use larger stack frames, so the limit is lower there.
#[cfg(debug_assertions)]
pub const MAX_DATA_RECURSION_DEPTH: usize = 100;

/// Maximum nesting followed by data structure operations (repr, equality,
/// hashing, host conversion).
#[cfg(not(debug_assertions))]
pub const MAX_DATA_RECURSION_DEPTH: usize = 500;

/// Execution limits for a VM.
///
/// Calls between bytecode methods do not grow the host stack, so
/// `max_recursion_depth` only bounds the VM's own frame list. Each callback
/// from Rust into bytecode (a native calling a script function, an operator
/// overload, `toString`, iteration methods, a module initializer) does use the
/// host stack and is bounded by `max_native_depth`. Exceeding either raises a
/// catchable `RecursionError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum call stack depth.
    pub max_recursion_depth: usize,
    /// Maximum nesting of callbacks from Rust into bytecode.
    pub max_native_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_native_depth: DEFAULT_MAX_NATIVE_DEPTH,
        }
    }
}

impl VmConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    #[must_use]
    pub fn with_max_native_depth(mut self, limit: usize) -> Self {
        self.max_native_depth = limit;
        self
    }
}
