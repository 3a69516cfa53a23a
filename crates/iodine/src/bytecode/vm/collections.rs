//! Containers: hash literals, indexing and the iteration protocol.
//!
//! Built-in iterables produce a [`Iter`]. An instance takes part in `foreach`
//! by defining `__iter__` (returning another iterable) or by implementing
//! `__iterMoveNext__`, `__iterGetNext__` and optionally `__iterReset__` itself.

use std::{cell::RefCell, rc::Rc};

use smallvec::smallvec;

use super::Vm;
use crate::{
    exception_private::{RunError, RunResult},
    types::{
        ArgValues, HashKey, Iter, ValueMap,
        list::normalize_index,
        map::key_not_found,
    },
    value::Value,
};

/// How many times `GetIter` follows `__iter__` results before giving up.
const MAX_ITER_DELEGATION: usize = 32;

impl Vm {
    /// Builds a map from alternating keys and values in push order.
    pub(super) fn build_hash(items: ArgValues) -> RunResult<Value> {
        let mut map = ValueMap::with_capacity_and_hasher(items.len() / 2, ahash::RandomState::default());
        let mut items = items.into_iter();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            map.insert(HashKey::new(key)?, value);
        }
        Ok(Value::new_map(map))
    }

    pub(super) fn load_index(&mut self, target: &Value, index: Value) -> RunResult<Value> {
        match target {
            Value::List(items) => {
                let items = items.borrow();
                let position = normalize_index(&index, items.len())?;
                Ok(items[position].clone())
            }
            Value::Tuple(items) => {
                let position = normalize_index(&index, items.len())?;
                Ok(items[position].clone())
            }
            Value::Str(s) => {
                let position = normalize_index(&index, s.chars().count())?;
                Ok(s.chars().nth(position).map_or(Value::Null, |c| Value::from(c.to_string())))
            }
            Value::Map(map) => {
                let key = HashKey::new(index)?;
                map.borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| key_not_found(key.value()))
            }
            _ => match self.call_instance_method(target, "__getitem__", smallvec![index])? {
                Some(value) => Ok(value),
                None => Err(not_indexable(target)),
            },
        }
    }

    pub(super) fn store_index(&mut self, target: &Value, index: Value, value: Value) -> RunResult<()> {
        match target {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let position = normalize_index(&index, items.len())?;
                items[position] = value;
                Ok(())
            }
            Value::Map(map) => {
                map.borrow_mut().insert(HashKey::new(index)?, value);
                Ok(())
            }
            _ => match self.call_instance_method(target, "__setitem__", smallvec![index, value])? {
                Some(_) => Ok(()),
                None => Err(RunError::type_error(format!(
                    "'{}' object does not support item assignment",
                    target.type_name()
                ))),
            },
        }
    }

    /// `GetIter`: lists are iterated live, other built-ins over a snapshot.
    ///
    /// An object's `__iter__` may hand back another iterable, which is followed
    /// up to [`MAX_ITER_DELEGATION`] times.
    pub(super) fn get_iter(&mut self, iterable: Value) -> RunResult<Value> {
        let mut iterable = iterable;
        for _ in 0..=MAX_ITER_DELEGATION {
            let iter = match &iterable {
                Value::List(items) => Iter::over_list(items.clone()),
                Value::Tuple(items) => Iter::over_items(items.clone()),
                Value::Str(s) => Iter::over_items(s.chars().map(|c| Value::from(c.to_string())).collect()),
                Value::Map(map) => Iter::over_items(map.borrow().keys().map(|k| k.value().clone()).collect()),
                Value::Iterator(_) => return Ok(iterable),
                Value::Instance(instance) => {
                    let class = instance.class();
                    if class.find_instance_method("__iter__").is_some() {
                        let inner = self
                            .call_instance_method(&iterable, "__iter__", ArgValues::new())?
                            .unwrap_or(Value::Null);
                        if matches!(&inner, Value::Instance(other) if Rc::ptr_eq(other, instance)) {
                            return Ok(inner);
                        }
                        iterable = inner;
                        continue;
                    }
                    if class.find_instance_method("__iterMoveNext__").is_some() {
                        return Ok(iterable);
                    }
                    return Err(not_iterable(&iterable));
                }
                other => return Err(not_iterable(other)),
            };
            return Ok(Value::Iterator(Rc::new(RefCell::new(iter))));
        }
        Err(RunError::type_error(format!(
            "'__iter__' did not produce an iterator within {MAX_ITER_DELEGATION} calls"
        )))
    }

    pub(super) fn iter_reset(&mut self, iter: &Value) -> RunResult<()> {
        match iter {
            Value::Iterator(iter) => iter.borrow_mut().reset(),
            other => {
                self.call_instance_method(other, "__iterReset__", ArgValues::new())?;
            }
        }
        Ok(())
    }

    pub(super) fn iter_move_next(&mut self, iter: &Value) -> RunResult<bool> {
        match iter {
            Value::Iterator(iter) => Ok(iter.borrow_mut().move_next()),
            other => match self.call_instance_method(other, "__iterMoveNext__", ArgValues::new())? {
                Some(more) => Ok(more.is_truthy()),
                None => Err(not_iterable(other)),
            },
        }
    }

    pub(super) fn iter_current(&mut self, iter: &Value) -> RunResult<Value> {
        match iter {
            Value::Iterator(iter) => Ok(iter.borrow().current()),
            other => self
                .call_instance_method(other, "__iterGetNext__", ArgValues::new())?
                .ok_or_else(|| not_iterable(other)),
        }
    }

    /// Drains any iterable into a vector.
    pub fn collect_iterable(&mut self, iterable: &Value) -> RunResult<Vec<Value>> {
        match iterable {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.to_vec()),
            _ => {
                let iter = self.get_iter(iterable.clone())?;
                self.iter_reset(&iter)?;
                let mut items = Vec::new();
                while self.iter_move_next(&iter)? {
                    items.push(self.iter_current(&iter)?);
                }
                Ok(items)
            }
        }
    }

    /// Text for `print` and `Str(x)`; instances may provide a `toString` method.
    pub fn to_display(&mut self, value: &Value) -> RunResult<String> {
        match self.call_instance_method(value, "toString", ArgValues::new())? {
            Some(text) => Ok(text.to_str()),
            None => Ok(value.to_str()),
        }
    }
}

fn not_iterable(value: &Value) -> RunError {
    RunError::type_error(format!("'{}' object is not iterable", value.type_name()))
}

fn not_indexable(value: &Value) -> RunError {
    RunError::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}
