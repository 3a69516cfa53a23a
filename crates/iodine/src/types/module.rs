use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

use super::AttrMap;
use crate::{
    ast::CodeLoc,
    bytecode::{Instruction, Method, Opcode},
    value::Value,
};

/// A compiled or native module.
///
/// The constant pool is written once by the compiler and frozen; attributes
/// stay mutable so top-level code, global stores and imports can bind names.
#[derive(Debug)]
pub struct Module {
    pub(crate) name: String,
    pub(crate) file: String,
    pub(crate) constant_pool: Vec<Value>,
    pub(crate) attributes: RefCell<AttrMap>,
    pub(crate) initializer: Rc<Method>,
    pub(crate) imports: Vec<String>,
}

impl Module {
    /// Builds a module backed only by host-provided values, e.g. natives for the
    /// built-in registry. Its initializer does nothing.
    #[must_use]
    pub fn native(name: &str, attributes: impl IntoIterator<Item = (String, Value)>) -> Rc<Self> {
        let attributes: AttrMap = attributes.into_iter().collect();
        Rc::new_cyclic(|module: &Weak<Self>| Self {
            name: name.to_owned(),
            file: String::new(),
            constant_pool: Vec::new(),
            attributes: RefCell::new(attributes),
            initializer: Rc::new(Method {
                module: module.clone(),
                name: "<module>".to_owned(),
                is_instance_method: false,
                parameters: IndexMap::new(),
                arity: 0,
                local_count: 0,
                variadic: false,
                accepts_keyword_args: false,
                body: vec![Instruction::new(Opcode::LoadNull, 0, CodeLoc::default())],
            }),
            imports: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn constants(&self) -> &[Value] {
        &self.constant_pool
    }

    #[must_use]
    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.constant_pool.get(index)
    }

    #[must_use]
    pub fn initializer(&self) -> &Rc<Method> {
        &self.initializer
    }

    #[must_use]
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name)
    }

    pub fn set_attribute(&self, name: &str, value: Value) {
        self.attributes.borrow_mut().insert(name.to_owned(), value);
    }

    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.borrow().keys().cloned().collect()
    }

    /// Looks up a compiled method attribute by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<Rc<Method>> {
        match self.attribute(name) {
            Some(Value::Method(method)) => Some(method),
            _ => None,
        }
    }
}
