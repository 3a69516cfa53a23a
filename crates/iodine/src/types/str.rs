//! Built-in methods of strings.

use std::rc::Rc;

use super::function::{ArgValues, NativeFunction};
use crate::{
    bytecode::Vm,
    exception_private::{ExcType, RunError, RunResult},
    value::Value,
};

pub(crate) fn method(name: &str) -> Option<Value> {
    STR_METHODS
        .iter()
        .find(|native| native.name == name)
        .map(|native| Value::Native(Rc::new(*native)))
}

static STR_METHODS: &[NativeFunction] = &[
    NativeFunction::new("substr", None, str_substr),
    NativeFunction::new("toLower", Some(0), str_to_lower),
    NativeFunction::new("toUpper", Some(0), str_to_upper),
    NativeFunction::new("indexOf", Some(1), str_index_of),
    NativeFunction::new("contains", Some(1), str_contains),
    NativeFunction::new("replace", Some(2), str_replace),
    NativeFunction::new("startsWith", Some(1), str_starts_with),
    NativeFunction::new("endsWith", Some(1), str_ends_with),
    NativeFunction::new("split", Some(1), str_split),
    NativeFunction::new("join", Some(1), str_join),
    NativeFunction::new("trim", Some(0), str_trim),
];

fn receiver(this: Option<Value>) -> RunResult<Rc<str>> {
    match this {
        Some(Value::Str(s)) => Ok(s),
        other => Err(RunError::type_error(format!(
            "expected Str receiver, got '{}'",
            other.map_or_else(|| "null".to_owned(), |v| v.type_name())
        ))),
    }
}

fn str_arg(args: &ArgValues, index: usize) -> RunResult<Rc<str>> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(RunError::type_error(format!(
            "expected Str argument, got '{}'",
            other.type_name()
        ))),
        None => Err(RunError::new(ExcType::ArgumentError, "missing Str argument")),
    }
}

fn int_arg(args: &ArgValues, index: usize) -> RunResult<i64> {
    match args.get(index) {
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(RunError::type_error(format!(
            "expected Int argument, got '{}'",
            other.type_name()
        ))),
        None => Err(RunError::new(ExcType::ArgumentError, "missing Int argument")),
    }
}

/// `substr(start)` or `substr(start, end)`, by character position.
fn str_substr(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let s = receiver(this)?;
    if args.is_empty() || args.len() > 2 {
        return Err(RunError::argument_count("substr", 1, args.len()));
    }
    let chars: Vec<char> = s.chars().collect();
    let len = i64::try_from(chars.len()).unwrap_or(i64::MAX);
    let start = int_arg(&args, 0)?;
    let end = if args.len() == 2 { int_arg(&args, 1)? } else { len };
    if start < 0 || end > len || start > end {
        return Err(RunError::new(
            ExcType::IndexError,
            format!("substring range {start}..{end} out of bounds"),
        ));
    }
    let (start, end) = (
        usize::try_from(start).unwrap_or_default(),
        usize::try_from(end).unwrap_or_default(),
    );
    Ok(Value::from(chars[start..end].iter().collect::<String>()))
}

fn str_to_lower(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    Ok(Value::from(receiver(this)?.to_lowercase()))
}

fn str_to_upper(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    Ok(Value::from(receiver(this)?.to_uppercase()))
}

/// Character index of the first occurrence, or -1.
fn str_index_of(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let s = receiver(this)?;
    let needle = str_arg(&args, 0)?;
    let index = s
        .find(&*needle)
        .map_or(-1, |byte| i64::try_from(s[..byte].chars().count()).unwrap_or(i64::MAX));
    Ok(Value::Int(index))
}

fn str_contains(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(Value::Bool(receiver(this)?.contains(&*str_arg(&args, 0)?)))
}

fn str_replace(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let s = receiver(this)?;
    Ok(Value::from(s.replace(&*str_arg(&args, 0)?, &str_arg(&args, 1)?)))
}

fn str_starts_with(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(Value::Bool(receiver(this)?.starts_with(&*str_arg(&args, 0)?)))
}

fn str_ends_with(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(Value::Bool(receiver(this)?.ends_with(&*str_arg(&args, 0)?)))
}

fn str_split(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let s = receiver(this)?;
    let separator = str_arg(&args, 0)?;
    if separator.is_empty() {
        return Err(RunError::new(ExcType::ValueError, "empty separator"));
    }
    Ok(Value::new_list(s.split(&*separator).map(Value::from).collect()))
}

/// `sep.join(items)`: items are converted with `Str`.
fn str_join(vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let separator = receiver(this)?;
    let items = vm.collect_iterable(args.first().unwrap_or(&Value::Null))?;
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(vm.to_display(item)?);
    }
    Ok(Value::from(parts.join(&separator)))
}

fn str_trim(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    Ok(Value::from(receiver(this)?.trim()))
}
