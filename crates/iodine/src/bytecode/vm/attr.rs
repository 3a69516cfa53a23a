//! Global and attribute access.

use std::rc::Rc;

use super::{Frame, Vm};
use crate::{
    exception_private::{ExcType, RunError, RunResult},
    types::{BoundMethod, class::Member, list, map, str as string},
    value::Value,
};

impl Vm {
    /// Resolves a global name: ambient globals first, then the executing module.
    pub(super) fn load_global(&self, frame: &Frame, name: &str) -> RunResult<Value> {
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        frame
            .module
            .attribute(name)
            .ok_or_else(|| RunError::new(ExcType::NameError, format!("name '{name}' is not defined")))
    }

    /// Writes a module attribute when the module defines `name`, otherwise an ambient global.
    pub(super) fn store_global(&mut self, frame: &Frame, name: &str, value: Value) {
        if frame.module.has_attribute(name) {
            frame.module.set_attribute(name, value);
        } else {
            self.globals.insert(name.to_owned(), value);
        }
    }

    pub(super) fn load_attribute(&mut self, target: &Value, name: &str) -> RunResult<Value> {
        let found = match target {
            Value::Instance(instance) => match instance.attribute(name) {
                Some(value) => Some(value),
                None => instance.class().find_member(name).map(|member| match member {
                    Member::Method(method) => bind(target, method),
                    Member::Attribute(value) => value,
                }),
            },
            Value::Class(class) => {
                self.ensure_initialized(class)?;
                class.find_attribute(name)
            }
            Value::Module(module) => module.attribute(name),
            Value::Enum(enumeration) => enumeration.member(name).map(Value::Int),
            Value::Exception(exc) => match name {
                "message" => Some(Value::from(exc.message())),
                "type" => Some(Value::from(exc.type_name())),
                _ => None,
            },
            Value::List(_) => list::method(name).map(|method| bind(target, method)),
            Value::Map(_) => map::method(name).map(|method| bind(target, method)),
            Value::Str(_) => string::method(name).map(|method| bind(target, method)),
            _ => None,
        };
        found.ok_or_else(|| RunError::attribute_not_found(&target.type_name(), name))
    }

    pub(super) fn store_attribute(&mut self, target: &Value, name: &str, value: Value) -> RunResult<()> {
        match target {
            Value::Instance(instance) => instance.set_attribute(name, value),
            Value::Class(class) => class.set_attribute(name, value),
            Value::Module(module) => module.set_attribute(name, value),
            other => {
                return Err(RunError::type_error(format!(
                    "cannot set attribute '{name}' on '{}'",
                    other.type_name()
                )));
            }
        }
        Ok(())
    }
}

fn bind(receiver: &Value, method: Value) -> Value {
    Value::BoundMethod(Rc::new(BoundMethod::new(receiver.clone(), method)))
}
