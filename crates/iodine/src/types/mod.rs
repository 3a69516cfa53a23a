//! Runtime object kinds beyond the scalar [`Value`](crate::value::Value) variants.

pub mod class;
pub mod function;
pub mod iter;
pub(crate) mod list;
pub mod map;
pub mod module;
pub(crate) mod str;
pub mod r#type;

use indexmap::IndexMap;

pub use self::{
    class::{BoundMethod, Class, Enum, Instance, Interface},
    function::{ArgValues, Closure, NativeFn, NativeFunction},
    iter::Iter,
    map::{HashKey, ValueMap},
    module::Module,
    r#type::Type,
};
use crate::value::Value;

/// Ordered name → value table used for module, class and instance attributes.
pub type AttrMap = IndexMap<String, Value, ahash::RandomState>;
