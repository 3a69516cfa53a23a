//! Built-in methods of lists.

use std::{cell::RefCell, rc::Rc};

use super::function::{ArgValues, NativeFunction};
use crate::{
    bytecode::Vm,
    exception_private::{ExcType, RunError, RunResult},
    value::Value,
};

pub(crate) fn method(name: &str) -> Option<Value> {
    LIST_METHODS
        .iter()
        .find(|native| native.name == name)
        .map(|native| Value::Native(Rc::new(*native)))
}

static LIST_METHODS: &[NativeFunction] = &[
    NativeFunction::new("append", None, list_append),
    NativeFunction::new("prepend", Some(1), list_prepend),
    NativeFunction::new("appendrange", Some(1), list_append_range),
    NativeFunction::new("discard", Some(1), list_discard),
    NativeFunction::new("remove", Some(1), list_remove),
    NativeFunction::new("removeat", Some(1), list_remove_at),
    NativeFunction::new("contains", Some(1), list_contains),
    NativeFunction::new("clear", Some(0), list_clear),
    NativeFunction::new("index", Some(1), list_index),
    NativeFunction::new("rindex", Some(1), list_rindex),
    NativeFunction::new("find", Some(1), list_find),
    NativeFunction::new("rfind", Some(1), list_rfind),
];

type ListRef = Rc<RefCell<Vec<Value>>>;

fn receiver(this: Option<Value>) -> RunResult<ListRef> {
    match this {
        Some(Value::List(list)) => Ok(list),
        other => Err(RunError::type_error(format!(
            "expected List receiver, got '{}'",
            other.map_or_else(|| "null".to_owned(), |v| v.type_name())
        ))),
    }
}

fn single(args: ArgValues) -> Value {
    args.into_iter().next().unwrap_or(Value::Null)
}

fn position(list: &ListRef, item: &Value, from_end: bool) -> Option<usize> {
    let items = list.borrow();
    if from_end {
        items.iter().rposition(|v| v.equals(item))
    } else {
        items.iter().position(|v| v.equals(item))
    }
}

fn index_value(index: Option<usize>) -> Value {
    index.map_or(Value::Int(-1), |i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
}

fn list_append(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    receiver(this)?.borrow_mut().extend(args);
    Ok(Value::Null)
}

fn list_prepend(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    receiver(this)?.borrow_mut().insert(0, single(args));
    Ok(Value::Null)
}

fn list_append_range(vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let list = receiver(this)?;
    let items = vm.collect_iterable(&single(args))?;
    list.borrow_mut().extend(items);
    Ok(Value::Null)
}

/// Removes the first equal element if there is one.
fn list_discard(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let list = receiver(this)?;
    if let Some(i) = position(&list, &single(args), false) {
        list.borrow_mut().remove(i);
    }
    Ok(Value::Null)
}

fn list_remove(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let list = receiver(this)?;
    let item = single(args);
    match position(&list, &item, false) {
        Some(i) => {
            list.borrow_mut().remove(i);
            Ok(Value::Null)
        }
        None => Err(RunError::new(
            ExcType::KeyNotFound,
            format!("{} not found in list", item.repr()),
        )),
    }
}

fn list_remove_at(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let list = receiver(this)?;
    let index = single(args);
    let len = list.borrow().len();
    let i = normalize_index(&index, len)?;
    Ok(list.borrow_mut().remove(i))
}

fn list_contains(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let list = receiver(this)?;
    Ok(Value::Bool(position(&list, &single(args), false).is_some()))
}

fn list_clear(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    receiver(this)?.borrow_mut().clear();
    Ok(Value::Null)
}

fn list_index(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    lookup_or_raise(&receiver(this)?, &single(args), false)
}

fn list_rindex(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    lookup_or_raise(&receiver(this)?, &single(args), true)
}

fn list_find(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(index_value(position(&receiver(this)?, &single(args), false)))
}

fn list_rfind(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(index_value(position(&receiver(this)?, &single(args), true)))
}

fn lookup_or_raise(list: &ListRef, item: &Value, from_end: bool) -> RunResult<Value> {
    match position(list, item, from_end) {
        Some(i) => Ok(index_value(Some(i))),
        None => Err(RunError::new(
            ExcType::KeyNotFound,
            format!("{} not found in list", item.repr()),
        )),
    }
}

/// Converts an index value into a position in a sequence of `len` items.
///
/// Negative indices count from the end.
pub(crate) fn normalize_index(index: &Value, len: usize) -> RunResult<usize> {
    let Value::Int(i) = index else {
        return Err(RunError::type_error(format!(
            "indices must be Int, not '{}'",
            index.type_name()
        )));
    };
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if *i < 0 { *i + len_i } else { *i };
    if (0..len_i).contains(&resolved) {
        // in 0..len, so the conversion cannot fail
        Ok(usize::try_from(resolved).unwrap_or_default())
    } else {
        Err(RunError::new(ExcType::IndexError, format!("index {i} out of range")))
    }
}
