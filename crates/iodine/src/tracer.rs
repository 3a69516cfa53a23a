//! VM execution tracing.
//!
//! The [`VmTracer`] trait defines hook points at key execution events
//! (instruction dispatch, calls and returns, handler pushes, raises, closure
//! creation, imports). Every hook has a no-op default, so implementations only
//! override what they need.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (default) |
//! | [`StderrTracer`] | Human-readable execution log to stderr |
//! | [`ProfilingTracer`] | Opcode frequency counters and call depth tracking |
//! | [`RecordingTracer`] | Full event recording for post-mortem analysis |
//!
//! The VM owns its tracer as a `Box<dyn VmTracer>`. [`ProfilingTracer`] and
//! [`RecordingTracer`] are cheap handles over shared state: keep a clone and
//! read it after the run.
//!
//! ```ignore
//! let tracer = ProfilingTracer::new();
//! let mut engine = Engine::new().with_tracer(tracer.clone());
//! engine.run_module(&module)?;
//! println!("{}", tracer.report());
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use ahash::AHashMap;

use crate::{bytecode::Opcode, exception_private::ExcType};

/// Trace event emitted during VM execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An opcode was dispatched at the given instruction index.
    Instruction {
        ip: usize,
        opcode: Opcode,
        /// Operand stack depth of the executing frame at dispatch.
        stack_depth: usize,
    },
    /// A call pushed a new frame.
    Call {
        name: String,
        /// Call stack depth after the push.
        depth: usize,
    },
    /// A frame completed normally.
    Return {
        /// Call stack depth after the pop.
        depth: usize,
    },
    ExceptionPush {
        /// Handler stack depth after the push.
        depth: usize,
    },
    ExceptionPop {
        /// Handler stack depth after the pop.
        depth: usize,
    },
    /// An exception was raised; `handled` is false when no handler was left.
    Raise { exc_type: ExcType, handled: bool },
    /// `BuildClosure` captured a frame's locals.
    Closure { local_count: usize },
    /// A module was loaded and initialized for the first time.
    Import { module: String },
}

/// Hooks called by the VM at execution events.
pub trait VmTracer: fmt::Debug {
    /// Called before each opcode dispatch in the main execution loop.
    ///
    /// This is the hottest hook; implementations should be as lightweight as possible.
    ///
    /// # Arguments
    /// * `ip` - Index of the instruction in the method body
    /// * `opcode` - The opcode about to be executed
    /// * `stack_depth` - Number of values on the executing frame's operand stack
    /// * `frame_depth` - Number of frames on the call stack
    #[inline]
    fn on_instruction(&mut self, _ip: usize, _opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {}

    /// Called when a new frame is pushed, with the call stack depth after the push.
    #[inline]
    fn on_call(&mut self, _name: &str, _depth: usize) {}

    /// Called when a frame completes normally, with the depth after the pop.
    #[inline]
    fn on_return(&mut self, _depth: usize) {}

    /// Called when a protected region is entered, with the handler stack depth after the push.
    #[inline]
    fn on_exception_push(&mut self, _depth: usize) {}

    /// Called when a protected region is left, with the handler stack depth after the pop.
    #[inline]
    fn on_exception_pop(&mut self, _depth: usize) {}

    /// Called for every raise, before unwinding.
    #[inline]
    fn on_raise(&mut self, _exc_type: ExcType, _handled: bool) {}

    #[inline]
    fn on_closure(&mut self, _local_count: usize) {}

    #[inline]
    fn on_import(&mut self, _module: &str) {}
}

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Tracer that prints a human-readable execution log to stderr.
///
/// Output format:
/// ```text
/// [    0] LoadConst         stack=0  frames=1
/// [    1] StoreGlobal       stack=1  frames=1
///   >>> CALL fib            depth=2
/// [    0] LoadLocal         stack=0  frames=2
///   <<< RETURN              depth=1
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of instructions to trace before stopping. None = unlimited.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer that goes quiet after `limit` instructions.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, frame_depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("[{ip:>5}] {opcode:<17} stack={stack_depth}  frames={frame_depth}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} instructions) ---");
            self.stopped = true;
        }
    }

    fn on_call(&mut self, name: &str, depth: usize) {
        if !self.stopped {
            eprintln!("  >>> CALL {name:<20} depth={depth}");
        }
    }

    fn on_return(&mut self, depth: usize) {
        if !self.stopped {
            eprintln!("  <<< RETURN              depth={depth}");
        }
    }

    fn on_raise(&mut self, exc_type: ExcType, handled: bool) {
        if !self.stopped {
            let outcome = if handled { "handled" } else { "uncaught" };
            eprintln!("  !!! RAISE {exc_type} ({outcome})");
        }
    }

    fn on_closure(&mut self, local_count: usize) {
        if !self.stopped {
            eprintln!("  +++ CLOSURE locals={local_count}");
        }
    }

    fn on_import(&mut self, module: &str) {
        if !self.stopped {
            eprintln!("  ::: IMPORT {module}");
        }
    }
}

#[derive(Debug, Default)]
struct ProfileData {
    opcode_counts: AHashMap<Opcode, u64>,
    total_instructions: u64,
    max_depth: usize,
    total_calls: u64,
    total_raises: u64,
}

/// Tracer that collects execution statistics.
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ProfilingTracer {
    data: Rc<RefCell<ProfileData>>,
}

/// Summary report from a profiling trace.
#[derive(Debug, Clone)]
pub struct ProfilingReport {
    /// Per-opcode execution counts, most executed first.
    pub opcode_counts: Vec<(Opcode, u64)>,
    pub total_instructions: u64,
    pub max_depth: usize,
    pub total_calls: u64,
    pub total_raises: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let data = self.data.borrow();
        let mut opcode_counts: Vec<_> = data.opcode_counts.iter().map(|(&k, &v)| (k, v)).collect();
        opcode_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| (a.0 as u8).cmp(&(b.0 as u8))));
        ProfilingReport {
            opcode_counts,
            total_instructions: data.total_instructions,
            max_depth: data.max_depth,
            total_calls: data.total_calls,
            total_raises: data.total_raises,
        }
    }
}

impl VmTracer for ProfilingTracer {
    fn on_instruction(&mut self, _ip: usize, opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {
        let mut data = self.data.borrow_mut();
        *data.opcode_counts.entry(opcode).or_insert(0) += 1;
        data.total_instructions += 1;
    }

    fn on_call(&mut self, _name: &str, depth: usize) {
        let mut data = self.data.borrow_mut();
        data.total_calls += 1;
        data.max_depth = data.max_depth.max(depth);
    }

    fn on_raise(&mut self, _exc_type: ExcType, _handled: bool) {
        self.data.borrow_mut().total_raises += 1;
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== VM Profiling Report ===")?;
        writeln!(f, "Total instructions: {}", self.total_instructions)?;
        writeln!(f, "Total calls:        {}", self.total_calls)?;
        writeln!(f, "Max call depth:     {}", self.max_depth)?;
        writeln!(f, "Raises:             {}", self.total_raises)?;
        writeln!(f)?;
        writeln!(f, "--- Opcode Frequency ---")?;
        for (opcode, count) in &self.opcode_counts {
            let pct = (*count as f64 / self.total_instructions as f64) * 100.0;
            writeln!(f, "  {opcode:<20} {count:>10}  ({pct:>5.1}%)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

/// Tracer that records every event in chronological order.
///
/// This is the most expensive tracer (allocates per event); use it for
/// debugging specific issues or recording short executions. Clones share
/// the same event list.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Recording {
                events: Vec::with_capacity(limit.min(1024)),
                limit: Some(limit),
            })),
        }
    }

    /// A copy of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.inner.borrow().events.clone()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.inner.borrow().events.len()
    }

    fn record(&self, event: TraceEvent) {
        let mut inner = self.inner.borrow_mut();
        if inner.limit.is_none_or(|limit| inner.events.len() < limit) {
            inner.events.push(event);
        }
    }
}

impl VmTracer for RecordingTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, _frame_depth: usize) {
        self.record(TraceEvent::Instruction {
            ip,
            opcode,
            stack_depth,
        });
    }

    fn on_call(&mut self, name: &str, depth: usize) {
        self.record(TraceEvent::Call {
            name: name.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.record(TraceEvent::Return { depth });
    }

    fn on_exception_push(&mut self, depth: usize) {
        self.record(TraceEvent::ExceptionPush { depth });
    }

    fn on_exception_pop(&mut self, depth: usize) {
        self.record(TraceEvent::ExceptionPop { depth });
    }

    fn on_raise(&mut self, exc_type: ExcType, handled: bool) {
        self.record(TraceEvent::Raise { exc_type, handled });
    }

    fn on_closure(&mut self, local_count: usize) {
        self.record(TraceEvent::Closure { local_count });
    }

    fn on_import(&mut self, module: &str) {
        self.record(TraceEvent::Import {
            module: module.to_owned(),
        });
    }
}
