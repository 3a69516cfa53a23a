use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::{function::ArgValues, map::ValueMap};
use crate::{
    bytecode::Vm,
    exception_private::{ExcType, RunError, RunResult},
    value::Value,
};

/// Built-in type tags.
///
/// Every value reports one through [`Value::type_of`]. The constructible
/// ones are installed as globals (`Int`, `Str`, `List`, ...) and build
/// values when invoked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum Type {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Tuple,
    List,
    HashMap,
    Method,
    Closure,
    BoundMethod,
    NativeFunction,
    Class,
    /// Instances of user classes; also the root every value matches in `is Object`.
    Object,
    Exception,
    Module,
    Interface,
    Enum,
    Iterator,
    Type,
}

impl Type {
    /// Types installed as ambient globals.
    pub const GLOBALS: [Self; 8] = [
        Self::Int,
        Self::Float,
        Self::Str,
        Self::Bool,
        Self::List,
        Self::Tuple,
        Self::HashMap,
        Self::Object,
    ];

    /// Whether a value of type `value_type` passes `is self`.
    #[must_use]
    pub fn matches(self, value_type: Self) -> bool {
        self == Self::Object || self == value_type
    }

    /// Calls the type as a constructor.
    pub fn construct(self, vm: &mut Vm, args: ArgValues) -> RunResult<Value> {
        if args.len() > 1 {
            return Err(RunError::argument_count(<&'static str>::from(self), 1, args.len()));
        }
        let arg = args.into_iter().next();
        match (self, arg) {
            (Self::Int, None) => Ok(Value::Int(0)),
            (Self::Int, Some(arg)) => to_int(&arg).map(Value::Int),
            (Self::Float, None) => Ok(Value::Float(0.0)),
            (Self::Float, Some(arg)) => to_float(&arg).map(Value::Float),
            (Self::Str, None) => Ok(Value::from("")),
            (Self::Str, Some(arg)) => Ok(Value::from(vm.to_display(&arg)?)),
            (Self::Bool, arg) => Ok(Value::Bool(arg.is_some_and(|v| v.is_truthy()))),
            (Self::List, None) => Ok(Value::new_list(Vec::new())),
            (Self::List, Some(arg)) => Ok(Value::new_list(vm.collect_iterable(&arg)?)),
            (Self::Tuple, None) => Ok(Value::new_tuple(Vec::new())),
            (Self::Tuple, Some(arg)) => Ok(Value::new_tuple(vm.collect_iterable(&arg)?)),
            (Self::HashMap, None) => Ok(Value::new_map(ValueMap::default())),
            (Self::HashMap, Some(Value::Map(map))) => Ok(Value::new_map(map.borrow().clone())),
            (ty, _) => Err(RunError::type_error(format!("cannot construct values of type '{ty}'"))),
        }
    }
}

#[expect(clippy::cast_possible_truncation, reason = "float to int conversion truncates toward zero")]
fn to_int(value: &Value) -> RunResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        Value::Float(f) => Err(RunError::new(
            ExcType::ValueError,
            format!("cannot convert {} to Int", crate::value::format_float(*f)),
        )),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| RunError::new(ExcType::ValueError, format!("invalid Int literal: {}", value.repr()))),
        other => Err(RunError::type_error(format!(
            "cannot convert '{}' to Int",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> RunResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RunError::new(ExcType::ValueError, format!("invalid Float literal: {}", value.repr()))),
        other => Err(RunError::type_error(format!(
            "cannot convert '{}' to Float",
            other.type_name()
        ))),
    }
}
