//! Implementation of the len() builtin function.

use crate::{
    bytecode::Vm,
    exception_private::{RunError, RunResult},
    types::ArgValues,
    value::Value,
};

pub(super) fn builtin_len(vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let value = super::single(args);
    let len = match &value {
        Value::Str(s) => s.chars().count(),
        Value::Tuple(items) => items.len(),
        Value::List(items) => items.borrow().len(),
        Value::Map(map) => map.borrow().len(),
        other => {
            return vm
                .call_instance_method(other, "__len__", ArgValues::new())?
                .ok_or_else(|| RunError::type_error(format!("object of type '{}' has no len()", other.type_name())));
        }
    };
    Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
}
