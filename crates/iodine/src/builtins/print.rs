//! Implementation of the print() builtin function.

use std::borrow::Cow;

use crate::{
    bytecode::Vm,
    exception_private::{RunError, RunResult},
    types::ArgValues,
    value::Value,
};

/// Writes the display form of each argument separated by spaces, then a newline.
///
/// The text of every argument is produced before anything is written, so a
/// failing `toString` prints nothing.
pub(super) fn builtin_print(vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let mut parts = Vec::with_capacity(args.len());
    for value in &args {
        parts.push(vm.to_display(value)?);
    }
    let print = vm.print_writer();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            print.stdout_push(' ').map_err(RunError::from)?;
        }
        print.stdout_write(Cow::Owned(part)).map_err(RunError::from)?;
    }
    print.stdout_push('\n').map_err(RunError::from)?;
    Ok(Value::Null)
}
