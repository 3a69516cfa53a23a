//! Hash maps keyed by runtime values, and their built-in methods.

use std::{
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::IndexMap;

use super::function::{ArgValues, NativeFunction};
use crate::{
    bytecode::Vm,
    exception_private::{ExcType, RunError, RunResult},
    value::Value,
};

pub type ValueMap = IndexMap<HashKey, Value, ahash::RandomState>;

/// A value admitted as a map key.
///
/// Construction rejects unhashable values, so `Hash` and `Eq` here always
/// agree with [`Value::equals`].
#[derive(Debug, Clone)]
pub struct HashKey(Value);

impl HashKey {
    pub fn new(value: Value) -> RunResult<Self> {
        value.check_hashable()?;
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_into(state);
    }
}

pub(crate) fn key_not_found(key: &Value) -> RunError {
    RunError::new(ExcType::KeyNotFound, format!("key {} not found", key.repr()))
}

pub(crate) fn method(name: &str) -> Option<Value> {
    MAP_METHODS
        .iter()
        .find(|native| native.name == name)
        .map(|native| Value::Native(Rc::new(*native)))
}

static MAP_METHODS: &[NativeFunction] = &[
    NativeFunction::new("contains", Some(1), map_contains),
    NativeFunction::new("getSize", Some(0), map_get_size),
    NativeFunction::new("clear", Some(0), map_clear),
    NativeFunction::new("set", Some(2), map_set),
    NativeFunction::new("get", None, map_get),
    NativeFunction::new("remove", Some(1), map_remove),
    NativeFunction::new("keys", Some(0), map_keys),
    NativeFunction::new("values", Some(0), map_values),
];

fn receiver(this: Option<Value>) -> RunResult<Rc<std::cell::RefCell<ValueMap>>> {
    match this {
        Some(Value::Map(map)) => Ok(map),
        other => Err(RunError::type_error(format!(
            "expected HashMap receiver, got '{}'",
            other.map_or_else(|| "null".to_owned(), |v| v.type_name())
        ))),
    }
}

fn first(args: ArgValues) -> RunResult<Value> {
    args.into_iter().next().ok_or_else(|| RunError::argument_count("HashMap method", 1, 0))
}

fn map_contains(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let map = receiver(this)?;
    let key = HashKey::new(first(args)?)?;
    Ok(Value::Bool(map.borrow().contains_key(&key)))
}

fn map_get_size(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    let len = receiver(this)?.borrow().len();
    Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
}

fn map_clear(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    receiver(this)?.borrow_mut().clear();
    Ok(Value::Null)
}

fn map_set(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let map = receiver(this)?;
    let mut args = args.into_iter();
    let (Some(key), Some(value)) = (args.next(), args.next()) else {
        return Err(RunError::argument_count("set", 2, 0));
    };
    map.borrow_mut().insert(HashKey::new(key)?, value);
    Ok(Value::Null)
}

/// `get(key)` raises on a missing key; `get(key, default)` returns the default.
fn map_get(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let map = receiver(this)?;
    if args.is_empty() || args.len() > 2 {
        return Err(RunError::argument_count("get", 1, args.len()));
    }
    let mut args = args.into_iter();
    let key = args.next().unwrap_or(Value::Null);
    let default = args.next();
    let found = map.borrow().get(&HashKey::new(key.clone())?).cloned();
    match (found, default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(key_not_found(&key)),
    }
}

fn map_remove(_vm: &mut Vm, this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let map = receiver(this)?;
    let key = first(args)?;
    let removed = map.borrow_mut().shift_remove(&HashKey::new(key.clone())?);
    removed.ok_or_else(|| key_not_found(&key))
}

fn map_keys(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    let keys = receiver(this)?.borrow().keys().map(|k| k.value().clone()).collect();
    Ok(Value::new_list(keys))
}

fn map_values(_vm: &mut Vm, this: Option<Value>, _args: ArgValues) -> RunResult<Value> {
    let values = receiver(this)?.borrow().values().cloned().collect();
    Ok(Value::new_list(values))
}
