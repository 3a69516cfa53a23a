use std::{fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    exception_private::{ExcType, Exception},
    resource::MAX_DATA_RECURSION_DEPTH,
    types::{HashKey, ValueMap},
    value::{Value, format_float, string_repr_fmt},
};

/// An Iodine value that can be passed to or returned from the engine.
///
/// Unlike the internal [`Value`], an `Object` owns all its data: it can be
/// cloned, compared, serialized and kept after the VM is gone.
///
/// # Input vs Output Variants
///
/// Data variants work in both directions. `Repr` is output-only: it stands in
/// for values with no data mapping (functions, classes, instances, modules)
/// and holds their representation.
///
/// # JSON Serialization
///
/// [`Object::to_json_value`] produces natural JSON:
/// - `Null` ↔ `null`, `Bool` ↔ booleans, `Int`/`Float` ↔ numbers, `Str` ↔ strings
/// - `List` ↔ arrays
/// - `Map` → objects, with non-string keys rendered through their representation
/// - `Tuple` → `{"$tuple": [...]}`
/// - `Exception` → `{"$exception": {"type": ..., "message": ...}}`
/// - `Repr` → `{"$repr": "..."}`
///
/// The derived serde impls use the tagged enum form instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Object>),
    List(Vec<Object>),
    /// Key/value pairs in insertion order.
    Map(Vec<(Object, Object)>),
    Exception {
        exc_type: ExcType,
        message: String,
    },
    /// Output-only representation of a value without a data form.
    Repr(String),
}

impl Object {
    /// Snapshots a runtime value. Containers are copied recursively.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self::from_value_within(value, MAX_DATA_RECURSION_DEPTH)
    }

    /// Containers nested deeper than `budget`, such as a list that contains
    /// itself, become `Repr("...")`.
    fn from_value_within(value: &Value, budget: usize) -> Self {
        let nested = |items: &[Value]| -> Option<Vec<Self>> {
            let budget = budget.checked_sub(1)?;
            Some(items.iter().map(|item| Self::from_value_within(item, budget)).collect())
        };
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            Value::Str(s) => Self::Str(s.to_string()),
            Value::Tuple(items) => nested(items).map_or_else(Self::elided, Self::Tuple),
            Value::List(items) => nested(&items.borrow()).map_or_else(Self::elided, Self::List),
            Value::Map(map) => match budget.checked_sub(1) {
                Some(budget) => Self::Map(
                    map.borrow()
                        .iter()
                        .map(|(k, v)| {
                            (
                                Self::from_value_within(k.value(), budget),
                                Self::from_value_within(v, budget),
                            )
                        })
                        .collect(),
                ),
                None => Self::elided(),
            },
            Value::Exception(exc) => Self::Exception {
                exc_type: exc.exc_type(),
                message: exc.message().to_owned(),
            },
            other => Self::Repr(other.repr()),
        }
    }

    fn elided() -> Self {
        Self::Repr("...".to_owned())
    }

    /// Converts back into a runtime value.
    pub fn to_value(&self) -> Result<Value, InvalidInputError> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Float(f) => Value::Float(*f),
            Self::Str(s) => Value::from(s.as_str()),
            Self::Tuple(items) => Value::new_tuple(items.iter().map(Self::to_value).collect::<Result<_, _>>()?),
            Self::List(items) => Value::new_list(items.iter().map(Self::to_value).collect::<Result<_, _>>()?),
            Self::Map(pairs) => {
                let mut map = ValueMap::default();
                for (k, v) in pairs {
                    let key = HashKey::new(k.to_value()?)
                        .map_err(|_| InvalidInputError::invalid_type("unhashable map key"))?;
                    map.insert(key, v.to_value()?);
                }
                Value::new_map(map)
            }
            Self::Exception { exc_type, message } => {
                Value::Exception(Rc::new(Exception::new(*exc_type, message.as_str())))
            }
            Self::Repr(_) => return Err(InvalidInputError::invalid_type("Repr")),
        })
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Natural JSON form, see the type docs for the mapping.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Value as JV, json};
        match self {
            Self::Null => JV::Null,
            Self::Bool(b) => JV::Bool(*b),
            Self::Int(i) => json!(i),
            Self::Float(f) => {
                if f.is_finite() {
                    json!(f)
                } else {
                    JV::Null
                }
            }
            Self::Str(s) => JV::String(s.clone()),
            Self::List(items) => JV::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Tuple(items) => json!({"$tuple": items.iter().map(Self::to_json_value).collect::<Vec<_>>()}),
            Self::Map(pairs) => {
                let map: serde_json::Map<String, JV> = pairs
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Self::Str(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key, v.to_json_value())
                    })
                    .collect();
                JV::Object(map)
            }
            Self::Exception { exc_type, message } => {
                json!({"$exception": {"type": exc_type.to_string(), "message": message}})
            }
            Self::Repr(r) => json!({"$repr": r}),
        }
    }
}

impl From<&Value> for Object {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Source-like rendering, matching the VM's `repr`.
impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Str(s) => {
                let mut out = String::new();
                string_repr_fmt(s, &mut out);
                f.write_str(&out)
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Exception { exc_type, message } if message.is_empty() => write!(f, "{exc_type}"),
            Self::Exception { exc_type, message } => write!(f, "{exc_type}: {message}"),
            Self::Repr(r) => f.write_str(r),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Object]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Error converting a host [`Object`] into a runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidInputError {
    /// The variant (or a nested part of it) has no runtime form.
    InvalidType(&'static str),
}

impl InvalidInputError {
    #[must_use]
    pub fn invalid_type(type_name: &'static str) -> Self {
        Self::InvalidType(type_name)
    }
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidType(type_name) => write!(f, "'{type_name}' is not a valid input value"),
        }
    }
}

impl std::error::Error for InvalidInputError {}
