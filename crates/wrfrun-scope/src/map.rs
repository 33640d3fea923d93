//! [`ScopedMap`]: an insertion-ordered map that knows its enclosing scope.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;

use crate::error::ScopeError;
use crate::list::ScopedList;
use crate::scope::Scope;
use crate::value::ScopeValue;

/// String-keyed map of [`ScopeValue`]s with a single parent scope.
///
/// Entries keep configuration-file order. A map is built mutably, then
/// frozen with [`into_shared`](Self::into_shared), at which point every
/// directly contained map or list that has no parent yet is parented to it.
///
/// The map is itself a [`Scope`]: its named values are its keys.
#[derive(Default)]
pub struct ScopedMap {
    /// Owning scope, set at most once.
    parent: OnceLock<Weak<dyn Scope>>,
    /// Entries in insertion order.
    entries: IndexMap<String, ScopeValue>,
}

impl ScopedMap {
    /// Create an empty map with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a JSON object, freezing nested containers as it goes.
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .into_iter()
            .map(|(key, value)| (key, ScopeValue::from_json(value)))
            .collect()
    }

    /// Freeze the map into shared form and adopt unparented children.
    pub fn into_shared(self) -> Arc<Self> {
        let shared = Arc::new(self);
        let weak: Weak<dyn Scope> = Arc::downgrade(&shared) as Weak<dyn Scope>;
        for value in shared.entries.values() {
            value.adopt(&weak);
        }
        shared
    }

    /// Set the owning scope.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ParentAlreadySet`] if the parent was already
    /// set, either explicitly or by adoption into an enclosing container.
    pub fn set_parent(&self, parent: Weak<dyn Scope>) -> Result<(), ScopeError> {
        self.parent
            .set(parent)
            .map_err(|_rejected| ScopeError::ParentAlreadySet)
    }

    /// Whether the owning scope has been set.
    pub fn has_parent(&self) -> bool {
        self.parent.get().is_some()
    }

    /// Set the parent only if none is set yet.
    pub(crate) fn adopt(&self, parent: &Weak<dyn Scope>) {
        self.parent.get_or_init(|| Weak::clone(parent));
    }

    /// Insert an entry, returning the value it replaced.
    ///
    /// Re-inserting an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ScopeValue>) -> Option<ScopeValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Borrow the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ScopeValue> {
        self.entries.get(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Borrow a string entry.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ScopeValue::as_str)
    }

    /// Read a whole-number entry.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ScopeValue::as_i64)
    }

    /// Read a numeric entry as `f64`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ScopeValue::as_f64)
    }

    /// Read a boolean entry.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ScopeValue::as_bool)
    }

    /// Borrow a nested map entry.
    pub fn get_map(&self, key: &str) -> Option<&Arc<Self>> {
        self.get(key).and_then(ScopeValue::as_map)
    }

    /// Borrow a nested list entry.
    pub fn get_list(&self, key: &str) -> Option<&Arc<ScopedList>> {
        self.get(key).and_then(ScopeValue::as_list)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScopeValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl Scope for ScopedMap {
    fn parent(&self) -> Option<Arc<dyn Scope>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    fn has_value_by_name(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError> {
        self.get(name).cloned().ok_or_else(|| ScopeError::unknown(name))
    }
}

impl PartialEq for ScopedMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for ScopedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedMap")
            .field("has_parent", &self.has_parent())
            .field("entries", &self.entries)
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for ScopedMap
where
    K: Into<String>,
    V: Into<ScopeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            parent: OnceLock::new(),
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
