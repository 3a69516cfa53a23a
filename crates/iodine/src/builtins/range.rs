//! Implementation of the range() builtin function.

use std::{cell::RefCell, rc::Rc};

use crate::{
    bytecode::Vm,
    exception_private::{RunError, RunResult},
    types::{ArgValues, Iter},
    value::Value,
};

/// `range(end)`, `range(start, end)` or `range(start, end, step)`.
pub(super) fn builtin_range(_vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let mut ints = Vec::with_capacity(args.len());
    for arg in &args {
        match arg {
            Value::Int(i) => ints.push(*i),
            other => {
                return Err(RunError::type_error(format!(
                    "range() arguments must be Int, not '{}'",
                    other.type_name()
                )));
            }
        }
    }
    let (start, end, step) = match ints.as_slice() {
        [end] => (0, *end, 1),
        [start, end] => (*start, *end, 1),
        [start, end, step] => (*start, *end, *step),
        _ => return Err(RunError::argument_count("range", 3, args.len())),
    };
    Ok(Value::Iterator(Rc::new(RefCell::new(Iter::range(start, end, step)?))))
}
