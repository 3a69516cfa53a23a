//! The uniform runtime value.
//!
//! Built-in kinds are variants of [`Value`]; user classes and their instances
//! are the `Class`/`Instance` pair. Heap-backed variants are reference counted,
//! so cloning a value shares the underlying object.

use std::{
    cell::RefCell,
    fmt::{self, Write},
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::{
    bytecode::Method,
    exception_private::{ExcType, Exception, RunError, RunResult},
    resource::MAX_DATA_RECURSION_DEPTH,
    types::{BoundMethod, Class, Closure, Enum, Instance, Interface, Iter, Module, NativeFunction, Type, ValueMap},
};

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Value]>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<ValueMap>>),
    Method(Rc<Method>),
    Closure(Rc<Closure>),
    BoundMethod(Rc<BoundMethod>),
    Native(Rc<NativeFunction>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Exception(Rc<Exception>),
    Module(Rc<Module>),
    Interface(Rc<Interface>),
    Enum(Rc<Enum>),
    Iterator(Rc<RefCell<Iter>>),
    /// A built-in type descriptor such as `Int` or `List`.
    Type(Type),
    /// A built-in exception type such as `TypeError`.
    ExcType(ExcType),
}

impl Value {
    #[must_use]
    pub fn new_list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn new_tuple(items: Vec<Self>) -> Self {
        Self::Tuple(items.into())
    }

    #[must_use]
    pub fn new_map(map: ValueMap) -> Self {
        Self::Map(Rc::new(RefCell::new(map)))
    }

    #[must_use]
    pub fn type_of(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Str(_) => Type::Str,
            Self::Tuple(_) => Type::Tuple,
            Self::List(_) => Type::List,
            Self::Map(_) => Type::HashMap,
            Self::Method(_) => Type::Method,
            Self::Closure(_) => Type::Closure,
            Self::BoundMethod(_) => Type::BoundMethod,
            Self::Native(_) => Type::NativeFunction,
            Self::Class(_) => Type::Class,
            Self::Instance(_) => Type::Object,
            Self::Exception(_) => Type::Exception,
            Self::Module(_) => Type::Module,
            Self::Interface(_) => Type::Interface,
            Self::Enum(_) => Type::Enum,
            Self::Iterator(_) => Type::Iterator,
            Self::Type(_) | Self::ExcType(_) => Type::Type,
        }
    }

    /// Name used in error messages: the class name for instances.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Instance(instance) => instance.class().name().to_owned(),
            other => other.type_of().to_string(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness used by conditional jumps and `!`.
    ///
    /// Null, false, zero and empty strings/containers are false; everything else is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Map(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    /// Structural equality for data, identity for objects.
    ///
    /// `Int(1)` equals `Float(1.0)`; [`HashKey`](crate::types::HashKey) hashes them
    /// identically. Containers nested deeper than [`MAX_DATA_RECURSION_DEPTH`]
    /// (including distinct self-containing lists) compare unequal.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.equals_within(other, MAX_DATA_RECURSION_DEPTH).unwrap_or(false)
    }

    /// Equality for `==` and `!=`: nesting too deep to compare raises `RecursionError`.
    pub(crate) fn checked_equals(&self, other: &Self) -> RunResult<bool> {
        self.equals_within(other, MAX_DATA_RECURSION_DEPTH).ok_or_else(|| {
            RunError::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded in comparison",
            )
        })
    }

    /// `None` once `budget` levels of container nesting are used up.
    fn equals_within(&self, other: &Self, budget: usize) -> Option<bool> {
        Some(match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => integral_float(*b) == Some(*a),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => return seq_equals(a, b, budget),
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Some(true);
                }
                return seq_equals(&a.borrow(), &b.borrow(), budget);
            }
            (Self::Map(a), Self::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Some(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Some(false);
                }
                let budget = budget.checked_sub(1)?;
                for (key, value) in a.iter() {
                    let Some(other) = b.get(key) else {
                        return Some(false);
                    };
                    if !value.equals_within(other, budget)? {
                        return Some(false);
                    }
                }
                true
            }
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::ExcType(a), Self::ExcType(b)) => a == b,
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            (Self::BoundMethod(a), Self::BoundMethod(b)) => {
                same_receiver(a.receiver(), b.receiver()) && a.method().equals(b.method())
            }
            (Self::Native(a), Self::Native(b)) => Rc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Rc::ptr_eq(a, b),
            (Self::Interface(a), Self::Interface(b)) => Rc::ptr_eq(a, b),
            (Self::Enum(a), Self::Enum(b)) => Rc::ptr_eq(a, b),
            (Self::Iterator(a), Self::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        })
    }

    /// Fails with `TypeError` for values that cannot be used as map keys.
    pub(crate) fn check_hashable(&self) -> RunResult<()> {
        match self {
            Self::List(_) | Self::Map(_) => Err(RunError::type_error(format!(
                "unhashable type: '{}'",
                self.type_of()
            ))),
            Self::Tuple(items) => items.iter().try_for_each(Self::check_hashable),
            _ => Ok(()),
        }
    }

    /// Feeds the value into `state`, consistently with [`Value::equals`].
    ///
    /// Callers must have checked hashability first.
    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.hash_within(state, MAX_DATA_RECURSION_DEPTH);
    }

    /// Tuples nested deeper than `budget` contribute only their length.
    fn hash_within<H: Hasher>(&self, state: &mut H, budget: usize) {
        match self {
            Self::Null => state.write_u8(0),
            Self::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Self::Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Self::Float(f) => {
                if let Some(i) = integral_float(*f) {
                    state.write_u8(2);
                    i.hash(state);
                } else {
                    state.write_u8(3);
                    f.to_bits().hash(state);
                }
            }
            Self::Str(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Self::Tuple(items) => {
                state.write_u8(5);
                state.write_usize(items.len());
                if let Some(budget) = budget.checked_sub(1) {
                    for item in items.iter() {
                        item.hash_within(state, budget);
                    }
                }
            }
            Self::Type(t) => {
                state.write_u8(6);
                t.hash(state);
            }
            Self::ExcType(t) => {
                state.write_u8(7);
                t.hash(state);
            }
            Self::BoundMethod(bound) => {
                state.write_u8(8);
                let receiver = bound.receiver();
                match receiver.identity() {
                    Some(id) => state.write_usize(id),
                    None => receiver.hash_within(state, budget),
                }
                bound.method().hash_within(state, budget);
            }
            other => {
                state.write_u8(9);
                state.write_usize(other.identity().unwrap_or(0));
            }
        }
    }

    /// Address of the shared object; `None` for plain data.
    fn identity(&self) -> Option<usize> {
        let ptr = match self {
            Self::Tuple(v) => Rc::as_ptr(v).cast::<()>(),
            Self::List(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Map(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Method(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Closure(v) => Rc::as_ptr(v).cast::<()>(),
            Self::BoundMethod(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Native(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Class(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Instance(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Exception(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Module(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Interface(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Enum(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Iterator(v) => Rc::as_ptr(v).cast::<()>(),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Str(_)
            | Self::Type(_)
            | Self::ExcType(_) => return None,
        };
        Some(ptr as usize)
    }

    /// String conversion used by `print` and `Str(x)`: strings are not quoted.
    #[must_use]
    pub fn to_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// Source-like representation: strings are quoted.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.repr_fmt(&mut out, 0);
        out
    }

    fn repr_fmt(&self, out: &mut String, depth: usize) {
        if depth > MAX_DATA_RECURSION_DEPTH {
            out.push_str("...");
            return;
        }
        // writing into a String cannot fail
        let _ = match self {
            Self::Null => write!(out, "null"),
            Self::Bool(b) => write!(out, "{b}"),
            Self::Int(i) => write!(out, "{i}"),
            Self::Float(f) => write!(out, "{}", format_float(*f)),
            Self::Str(s) => {
                string_repr_fmt(s, out);
                Ok(())
            }
            Self::Tuple(items) => {
                out.push('(');
                seq_repr_fmt(items, out, depth);
                if items.len() == 1 {
                    out.push(',');
                }
                write!(out, ")")
            }
            Self::List(items) => {
                out.push('[');
                seq_repr_fmt(&items.borrow(), out, depth);
                write!(out, "]")
            }
            Self::Map(map) => {
                out.push('{');
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.value().repr_fmt(out, depth + 1);
                    out.push_str(": ");
                    value.repr_fmt(out, depth + 1);
                }
                write!(out, "}}")
            }
            Self::Method(m) => write!(out, "<method {}>", m.name()),
            Self::Closure(c) => write!(out, "<closure {}>", c.method().name()),
            Self::BoundMethod(b) => write!(out, "<bound method of {}>", b.receiver().type_name()),
            Self::Native(n) => write!(out, "<native function {}>", n.name),
            Self::Class(c) => write!(out, "<class {}>", c.name()),
            Self::Instance(i) => write!(out, "<{} object>", i.class().name()),
            Self::Exception(e) => write!(out, "{e}"),
            Self::Module(m) => write!(out, "<module {}>", m.name()),
            Self::Interface(i) => write!(out, "<interface {}>", i.name()),
            Self::Enum(e) => write!(out, "<enum {}>", e.name()),
            Self::Iterator(_) => write!(out, "<iterator>"),
            Self::Type(t) => write!(out, "{t}"),
            Self::ExcType(t) => write!(out, "{t}"),
        };
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

fn seq_equals(a: &[Value], b: &[Value], budget: usize) -> Option<bool> {
    if a.len() != b.len() {
        return Some(false);
    }
    let budget = budget.checked_sub(1)?;
    for (x, y) in a.iter().zip(b) {
        if !x.equals_within(y, budget)? {
            return Some(false);
        }
    }
    Some(true)
}

/// Bound methods match receivers by identity unless the receiver is plain data.
fn same_receiver(a: &Value, b: &Value) -> bool {
    match (a.identity(), b.identity()) {
        (Some(a), Some(b)) => a == b,
        (None, None) => a.equals(b),
        _ => false,
    }
}

fn seq_repr_fmt(items: &[Value], out: &mut String, depth: usize) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.repr_fmt(out, depth + 1);
    }
}

/// Quotes a string with double quotes, escaping control characters.
pub(crate) fn string_repr_fmt(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Shortest round-trip float formatting.
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_owned()
    } else if f == f64::INFINITY {
        "inf".to_owned()
    } else if f == f64::NEG_INFINITY {
        "-inf".to_owned()
    } else {
        ryu::Buffer::new().format_finite(f).to_owned()
    }
}

/// The integer a float equals exactly, if it is integral and in range.
#[expect(clippy::cast_possible_truncation, reason = "range is checked before the cast")]
fn integral_float(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use pretty_assertions::assert_eq;

    use super::*;

    fn hash_of(value: &Value) -> u64 {
        let state = ahash::RandomState::with_seeds(1, 2, 3, 4);
        let mut hasher = state.build_hasher();
        value.hash_into(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_numbers_hash_alike() {
        assert!(Value::Int(1).equals(&Value::Float(1.0)));
        assert_eq!(hash_of(&Value::Int(1)), hash_of(&Value::Float(1.0)));
        assert_eq!(hash_of(&Value::Float(-0.0)), hash_of(&Value::Int(0)));
    }

    #[test]
    fn large_ints_equal_floats_only_when_exact() {
        let int = Value::Int(9_007_199_254_740_993);
        let float = Value::Float(9_007_199_254_740_992.0);
        assert!(!int.equals(&float));
        assert!(Value::Int(9_007_199_254_740_992).equals(&float));
        assert_eq!(hash_of(&Value::Int(9_007_199_254_740_992)), hash_of(&float));
        assert!(!Value::Int(i64::MAX).equals(&Value::Float(9_223_372_036_854_775_807.0)));
    }

    #[test]
    fn bound_methods_match_receivers_the_way_they_hash() {
        let bound = |receiver: Value| Value::BoundMethod(Rc::new(BoundMethod::new(receiver, Value::from("size"))));
        let list = Value::new_list(vec![Value::Int(1)]);
        let twin = Value::new_list(vec![Value::Int(1)]);
        assert!(bound(list.clone()).equals(&bound(list.clone())));
        assert_eq!(hash_of(&bound(list.clone())), hash_of(&bound(list.clone())));
        assert!(!bound(list).equals(&bound(twin)));

        assert!(bound(Value::Int(2)).equals(&bound(Value::Float(2.0))));
        assert_eq!(hash_of(&bound(Value::Int(2))), hash_of(&bound(Value::Float(2.0))));
    }

    #[test]
    fn self_containing_lists_compare_without_overflow() {
        let a = Value::new_list(vec![]);
        let b = Value::new_list(vec![]);
        if let (Value::List(x), Value::List(y)) = (&a, &b) {
            x.borrow_mut().push(a.clone());
            y.borrow_mut().push(b.clone());
        }
        assert!(a.equals(&a));
        assert!(!a.equals(&b));
        assert!(a.checked_equals(&b).is_err());
        // break the cycles so the lists are freed
        if let (Value::List(x), Value::List(y)) = (&a, &b) {
            x.borrow_mut().clear();
            y.borrow_mut().clear();
        }
    }

    #[test]
    fn tuples_compare_structurally() {
        let a = Value::new_tuple(vec![Value::Int(1), Value::from("x")]);
        let b = Value::new_tuple(vec![Value::Int(1), Value::from("x")]);
        assert!(a.equals(&b));
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn lists_are_unhashable() {
        assert!(Value::new_list(vec![]).check_hashable().is_err());
        let nested = Value::new_tuple(vec![Value::new_list(vec![])]);
        assert!(nested.check_hashable().is_err());
        assert!(Value::from("ok").check_hashable().is_ok());
    }

    #[test]
    fn repr_quotes_strings_and_nests() {
        let list = Value::new_list(vec![Value::Int(1), Value::from("a\"b"), Value::Float(2.5), Value::Null]);
        assert_eq!(list.repr(), r#"[1, "a\"b", 2.5, null]"#);
        assert_eq!(Value::from("plain").to_str(), "plain");
        assert_eq!(Value::new_tuple(vec![Value::Bool(true)]).repr(), "(true,)");
    }

    #[test]
    fn floats_format_round_trip() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::new_tuple(vec![Value::Null]).is_truthy());
    }
}
