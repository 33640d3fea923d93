//! Dynamically-typed values resolved through scopes.
//!
//! Configuration values arrive as JSON and are converted once into
//! [`ScopeValue`]s. Nested objects and arrays become shared
//! [`ScopedMap`]/[`ScopedList`] containers whose parent is the container
//! that holds them.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::list::ScopedList;
use crate::map::ScopedMap;
use crate::scope::Scope;

/// A value stored in a scoped container or produced by a named accessor.
#[derive(Debug, Clone)]
pub enum ScopeValue {
    /// JSON `null`, or an accessor with nothing to report.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// A whole number.
    Integer(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    String(String),
    /// A nested scoped map.
    Map(Arc<ScopedMap>),
    /// A nested scoped list.
    List(Arc<ScopedList>),
    /// Any other scope-aware object (a timing component, a module, ...).
    Scope(Arc<dyn Scope>),
}

impl ScopeValue {
    /// Convert a parsed JSON value, recursively freezing objects and arrays
    /// into shared containers.
    ///
    /// Integers that do not fit in `i64` are kept as floats.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => number.as_i64().map_or_else(
                || Self::Float(number.as_f64().unwrap_or(f64::NAN)),
                Self::Integer,
            ),
            serde_json::Value::String(text) => Self::String(text),
            serde_json::Value::Array(items) => {
                Self::List(ScopedList::from_json_array(items).into_shared())
            }
            serde_json::Value::Object(entries) => {
                Self::Map(ScopedMap::from_json_object(entries).into_shared())
            }
        }
    }

    /// Short name of the variant, for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Map(_) => "map",
            Self::List(_) => "list",
            Self::Scope(_) => "scope",
        }
    }

    /// Whether this is [`ScopeValue::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Read a whole number. Floats are accepted only when they have no
    /// fractional part and fit in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Float(value) => float_to_i64(*value),
            _ => None,
        }
    }

    /// Read a number as `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            // Configuration integers are small; precision loss above 2^53 is accepted.
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Read a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Borrow the nested map, if this is a map.
    pub const fn as_map(&self) -> Option<&Arc<ScopedMap>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the nested list, if this is a list.
    pub const fn as_list(&self) -> Option<&Arc<ScopedList>> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// View this value as a scope, if it is one.
    ///
    /// Maps and lists are scopes too, so they are returned as well.
    pub fn as_scope(&self) -> Option<Arc<dyn Scope>> {
        match self {
            Self::Map(map) => Some(Arc::clone(map) as Arc<dyn Scope>),
            Self::List(list) => Some(Arc::clone(list) as Arc<dyn Scope>),
            Self::Scope(scope) => Some(Arc::clone(scope)),
            _ => None,
        }
    }

    /// Give a contained container its parent if it does not have one yet.
    pub(crate) fn adopt(&self, parent: &Weak<dyn Scope>) {
        match self {
            Self::Map(map) => map.adopt(parent),
            Self::List(list) => list.adopt(parent),
            _ => {}
        }
    }
}

/// Convert an integral float to `i64`, rejecting fractions and overflow.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_i64(value: f64) -> Option<i64> {
    let whole = value.is_finite() && value.fract().abs() <= 0.0;
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (whole && in_range).then_some(value as i64)
}

impl PartialEq for ScopeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Scope(a), Self::Scope(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(text) => write!(f, "{text}"),
            Self::Map(map) => write!(f, "{{map with {} entries}}", map.len()),
            Self::List(list) => write!(f, "[list with {} items]", list.len()),
            Self::Scope(scope) => write!(f, "{scope:?}"),
        }
    }
}

impl From<bool> for ScopeValue {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for ScopeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ScopeValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ScopeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ScopeValue {
    fn from(text: &str) -> Self {
        Self::String(text.to_owned())
    }
}

impl From<String> for ScopeValue {
    fn from(text: String) -> Self {
        Self::String(text)
    }
}

impl From<ScopedMap> for ScopeValue {
    fn from(map: ScopedMap) -> Self {
        Self::Map(map.into_shared())
    }
}

impl From<Arc<ScopedMap>> for ScopeValue {
    fn from(map: Arc<ScopedMap>) -> Self {
        Self::Map(map)
    }
}

impl From<ScopedList> for ScopeValue {
    fn from(list: ScopedList) -> Self {
        Self::List(list.into_shared())
    }
}

impl From<Arc<ScopedList>> for ScopeValue {
    fn from(list: Arc<ScopedList>) -> Self {
        Self::List(list)
    }
}

impl From<serde_json::Value> for ScopeValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}
