//! [`ScopedList`]: an ordered sequence that knows its enclosing scope.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::error::ScopeError;
use crate::map::ScopedMap;
use crate::scope::Scope;
use crate::value::ScopeValue;

/// Ordered sequence of [`ScopeValue`]s with a single parent scope.
///
/// Follows the same build-then-freeze rule as [`ScopedMap`]. As a
/// [`Scope`], its named values are decimal indices (`"0"`, `"1"`, ...).
#[derive(Default)]
pub struct ScopedList {
    /// Owning scope, set at most once.
    parent: OnceLock<Weak<dyn Scope>>,
    /// Items in positional order.
    items: Vec<ScopeValue>,
}

impl ScopedList {
    /// Create an empty list with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a JSON array, freezing nested containers as it goes.
    pub fn from_json_array(items: Vec<serde_json::Value>) -> Self {
        items.into_iter().map(ScopeValue::from_json).collect()
    }

    /// Freeze the list into shared form and adopt unparented children.
    pub fn into_shared(self) -> Arc<Self> {
        let shared = Arc::new(self);
        let weak: Weak<dyn Scope> = Arc::downgrade(&shared) as Weak<dyn Scope>;
        for item in &shared.items {
            item.adopt(&weak);
        }
        shared
    }

    /// Set the owning scope.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ParentAlreadySet`] on a second call.
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

    /// Append an item.
    ///
    /// The item's own parent linkage is not touched here; containers are
    /// adopted when the list is frozen.
    pub fn push(&mut self, item: impl Into<ScopeValue>) {
        self.items.push(item.into());
    }

    /// Borrow the item at `index`.
    pub fn get(&self, index: usize) -> Option<&ScopeValue> {
        self.items.get(index)
    }

    /// Borrow the string at `index`.
    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(ScopeValue::as_str)
    }

    /// Borrow the map at `index`.
    pub fn get_map(&self, index: usize) -> Option<&Arc<ScopedMap>> {
        self.get(index).and_then(ScopeValue::as_map)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScopeValue> {
        self.items.iter()
    }
}

impl Scope for ScopedList {
    fn parent(&self) -> Option<Arc<dyn Scope>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    fn has_value_by_name(&self, name: &str) -> bool {
        name.parse::<usize>().is_ok_and(|index| index < self.items.len())
    }

    fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError> {
        name.parse::<usize>()
            .ok()
            .and_then(|index| self.get(index))
            .cloned()
            .ok_or_else(|| ScopeError::unknown(name))
    }
}

impl PartialEq for ScopedList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for ScopedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedList")
            .field("has_parent", &self.has_parent())
            .field("items", &self.items)
            .finish()
    }
}

impl<V: Into<ScopeValue>> FromIterator<V> for ScopedList {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            parent: OnceLock::new(),
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ScopedList {
    type Item = &'a ScopeValue;
    type IntoIter = std::slice::Iter<'a, ScopeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
