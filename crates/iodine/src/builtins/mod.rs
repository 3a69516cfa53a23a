//! Ambient globals: native functions, built-in types and exception types.
//!
//! Each native function of any size has its own submodule.

mod hash;
mod len;
mod print;
mod range;

use std::rc::Rc;

use ahash::AHashMap;
use strum::IntoEnumIterator;

use crate::{
    bytecode::Vm,
    exception_private::{ExcType, RunResult},
    types::{ArgValues, NativeFunction, Type},
    value::Value,
};

/// Native functions installed as globals.
static BUILTIN_FUNCTIONS: &[NativeFunction] = &[
    NativeFunction::new("print", None, print::builtin_print),
    NativeFunction::new("len", Some(1), len::builtin_len),
    NativeFunction::new("repr", Some(1), builtin_repr),
    NativeFunction::new("str", Some(1), builtin_str),
    NativeFunction::new("typeof", Some(1), builtin_typeof),
    NativeFunction::new("hash", Some(1), hash::builtin_hash),
    NativeFunction::new("range", None, range::builtin_range),
];

/// Populates the ambient global table of a new VM.
pub(crate) fn install(globals: &mut AHashMap<String, Value>) {
    for native in BUILTIN_FUNCTIONS {
        globals.insert(native.name.to_owned(), Value::Native(Rc::new(*native)));
    }
    for ty in Type::GLOBALS {
        globals.insert(ty.to_string(), Value::Type(ty));
    }
    for exc_type in ExcType::iter() {
        globals.insert(exc_type.to_string(), Value::ExcType(exc_type));
    }
}

/// Names of every ambient global, in installation order.
#[must_use]
pub fn builtin_names() -> Vec<String> {
    BUILTIN_FUNCTIONS
        .iter()
        .map(|native| native.name.to_owned())
        .chain(Type::GLOBALS.iter().map(ToString::to_string))
        .chain(ExcType::iter().map(|exc_type| exc_type.to_string()))
        .collect()
}

fn single(args: ArgValues) -> Value {
    args.into_iter().next().unwrap_or(Value::Null)
}

fn builtin_repr(_vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(Value::from(single(args).repr()))
}

fn builtin_str(vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let text = vm.to_display(&single(args))?;
    Ok(Value::from(text))
}

/// The class of an instance, otherwise the built-in type tag.
fn builtin_typeof(_vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    Ok(match single(args) {
        Value::Instance(instance) => Value::Class(instance.class().clone()),
        Value::Exception(exc) => Value::ExcType(exc.exc_type()),
        other => Value::Type(other.type_of()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exception_type_is_a_global() {
        let mut globals = AHashMap::new();
        install(&mut globals);
        assert!(matches!(globals.get("KeyNotFound"), Some(Value::ExcType(ExcType::KeyNotFound))));
        assert!(matches!(globals.get("HashMap"), Some(Value::Type(Type::HashMap))));
        assert!(matches!(globals.get("print"), Some(Value::Native(_))));
        assert_eq!(builtin_names().len(), globals.len());
    }
}
