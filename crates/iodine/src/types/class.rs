//! User-defined classes, their instances, enums and interfaces.
//!
//! Attribute lookup follows a prototype chain: the instance's own map, then the
//! class (instance methods, then class attributes), then base classes in the
//! order they were linked. Declared bases are linked the first time the class
//! is used; `InvokeSuper` links any further base a constructor chains to.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use indexmap::IndexMap;

use super::AttrMap;
use crate::{ast::InterfaceMethod, bytecode::Method, exception_private::ExcType, value::Value};

/// A member found on a class chain.
#[derive(Debug, Clone)]
pub(crate) enum Member {
    /// From an instance-method table; binds to the receiver on access.
    Method(Value),
    /// From a class attribute table; returned as is.
    Attribute(Value),
}

#[derive(Debug)]
pub struct Class {
    name: String,
    constructor: Rc<Method>,
    /// Field initializers, run once per class before first use.
    initializer: Option<Rc<Method>>,
    instance_methods: AttrMap,
    attributes: RefCell<AttrMap>,
    /// Dotted names of the bases in the declaration.
    declared_bases: Vec<String>,
    /// Resolved bases, in declaration order.
    bases: RefCell<Vec<Rc<Class>>>,
    /// Set when a constructor chains to a built-in exception type.
    exception_base: Cell<Option<ExcType>>,
    initialized: Cell<bool>,
}

impl Class {
    #[must_use]
    pub(crate) fn new(
        name: String,
        constructor: Rc<Method>,
        initializer: Option<Rc<Method>>,
        instance_methods: AttrMap,
        attributes: AttrMap,
        declared_bases: Vec<String>,
    ) -> Self {
        Self {
            name,
            constructor,
            initializer,
            instance_methods,
            attributes: RefCell::new(attributes),
            declared_bases,
            bases: RefCell::new(Vec::new()),
            exception_base: Cell::new(None),
            initialized: Cell::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn constructor(&self) -> &Rc<Method> {
        &self.constructor
    }

    #[must_use]
    pub fn bases(&self) -> Vec<Rc<Self>> {
        self.bases.borrow().clone()
    }

    #[must_use]
    pub fn instance_method_names(&self) -> Vec<String> {
        self.instance_methods.keys().cloned().collect()
    }

    #[must_use]
    pub fn declared_bases(&self) -> &[String] {
        &self.declared_bases
    }

    pub(crate) fn initializer(&self) -> Option<&Rc<Method>> {
        self.initializer.as_ref()
    }

    /// Marks the class initialized; true only the first time.
    pub(crate) fn begin_initialization(&self) -> bool {
        !self.initialized.replace(true)
    }

    /// Records `base` as a base class. Linking the same base twice, or a base
    /// that already inherits from this class, is a no-op.
    pub(crate) fn link_base(&self, base: &Rc<Self>) {
        if base.is_subclass_of(self) {
            return;
        }
        let mut bases = self.bases.borrow_mut();
        if !bases.iter().any(|b| Rc::ptr_eq(b, base)) {
            bases.push(base.clone());
        }
    }

    pub(crate) fn set_exception_base(&self, exc_type: ExcType) {
        self.exception_base.set(Some(exc_type));
    }

    /// The built-in exception type this class derives from, directly or through a base.
    #[must_use]
    pub fn exception_base(&self) -> Option<ExcType> {
        self.exception_base
            .get()
            .or_else(|| self.bases.borrow().iter().find_map(|base| base.exception_base()))
    }

    pub(crate) fn find_member(&self, name: &str) -> Option<Member> {
        if let Some(method) = self.instance_methods.get(name) {
            return Some(Member::Method(method.clone()));
        }
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(Member::Attribute(value.clone()));
        }
        self.bases.borrow().iter().find_map(|base| base.find_member(name))
    }

    /// Class-level lookup: class attributes, then unbound instance methods, then bases.
    #[must_use]
    pub fn find_attribute(&self, name: &str) -> Option<Value> {
        self.find_member(name).map(|member| match member {
            Member::Method(value) | Member::Attribute(value) => value,
        })
    }

    #[must_use]
    pub fn find_instance_method(&self, name: &str) -> Option<Value> {
        match self.find_member(name)? {
            Member::Method(value) => Some(value),
            Member::Attribute(_) => None,
        }
    }

    pub fn set_attribute(&self, name: &str, value: Value) {
        self.attributes.borrow_mut().insert(name.to_owned(), value);
    }

    /// Whether `self` is `other` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.bases.borrow().iter().any(|base| base.is_subclass_of(other))
    }

    /// Structural check: every interface method exists with the same arity.
    #[must_use]
    pub fn implements(&self, interface: &Interface) -> bool {
        interface.methods.iter().all(|required| {
            self.find_instance_method(&required.name)
                .is_some_and(|method| callable_arity(&method) == Some(required.arity))
        })
    }
}

fn callable_arity(value: &Value) -> Option<usize> {
    match value {
        Value::Method(method) => Some(method.arity()),
        Value::Closure(closure) => Some(closure.method().arity()),
        Value::Native(native) => native.arity,
        _ => None,
    }
}

#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    attributes: RefCell<AttrMap>,
}

impl Instance {
    #[must_use]
    pub(crate) fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            attributes: RefCell::new(AttrMap::default()),
        }
    }

    #[must_use]
    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: Value) {
        self.attributes.borrow_mut().insert(name.to_owned(), value);
    }

    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.borrow().keys().cloned().collect()
    }
}

/// A callable paired with the receiver it was looked up on.
#[derive(Debug)]
pub struct BoundMethod {
    receiver: Value,
    method: Value,
}

impl BoundMethod {
    #[must_use]
    pub fn new(receiver: Value, method: Value) -> Self {
        Self { receiver, method }
    }

    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    #[must_use]
    pub fn method(&self) -> &Value {
        &self.method
    }
}

/// An enum declaration; members are plain integers.
#[derive(Debug)]
pub struct Enum {
    name: String,
    members: IndexMap<String, i64>,
}

impl Enum {
    #[must_use]
    pub(crate) fn new(name: String, members: IndexMap<String, i64>) -> Self {
        Self { name, members }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<i64> {
        self.members.get(name).copied()
    }

    #[must_use]
    pub fn members(&self) -> &IndexMap<String, i64> {
        &self.members
    }
}

/// A capability descriptor checked structurally by `is`.
#[derive(Debug)]
pub struct Interface {
    name: String,
    methods: Vec<InterfaceMethod>,
}

impl Interface {
    #[must_use]
    pub(crate) fn new(name: String, methods: Vec<InterfaceMethod>) -> Self {
        Self { name, methods }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn methods(&self) -> &[InterfaceMethod] {
        &self.methods
    }
}
