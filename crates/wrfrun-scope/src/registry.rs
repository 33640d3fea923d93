//! [`AttributeRegistry`]: the explicit name-to-accessor table behind
//! registry-backed scopes.
//!
//! A type that exposes named values builds one registry in its constructor,
//! declaring each exposed field or method once, and answers
//! [`Scope::has_value_by_name`] / [`Scope::value_by_name`] from it:
//!
//! ```
//! use std::sync::Arc;
//!
//! use wrfrun_scope::{AttributeRegistry, Scope, ScopeError, ScopeValue};
//!
//! #[derive(Debug)]
//! struct Domain {
//!     name: String,
//!     registry: AttributeRegistry<Domain>,
//! }
//!
//! impl Domain {
//!     fn new(name: &str) -> Self {
//!         let registry = AttributeRegistry::new()
//!             .field("name", |domain: &Domain| ScopeValue::from(domain.name.clone()));
//!         Self { name: name.to_owned(), registry }
//!     }
//! }
//!
//! impl Scope for Domain {
//!     fn parent(&self) -> Option<Arc<dyn Scope>> {
//!         None
//!     }
//!     fn has_value_by_name(&self, name: &str) -> bool {
//!         self.registry.contains(name)
//!     }
//!     fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError> {
//!         self.registry.resolve(self, name)
//!     }
//! }
//!
//! let domain = Domain::new("d01");
//! assert_eq!(domain.value_by_name("name").ok(), Some(ScopeValue::from("d01")));
//! ```
//!
//! [`Scope::has_value_by_name`]: crate::Scope::has_value_by_name
//! [`Scope::value_by_name`]: crate::Scope::value_by_name

use std::fmt;

use indexmap::IndexMap;

use crate::error::{AccessError, ScopeError};
use crate::value::ScopeValue;

/// Deferred read of one named value on an owner of type `T`.
type Accessor<T> = Box<dyn Fn(&T) -> Result<ScopeValue, AccessError> + Send + Sync>;

/// Name-to-accessor table for one scope instance.
///
/// Built once during construction and never modified afterwards.
/// Registering the same name twice is a programming error and trips a
/// debug assertion.
pub struct AttributeRegistry<T> {
    /// Accessors in registration order.
    accessors: IndexMap<&'static str, Accessor<T>>,
}

impl<T> AttributeRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            accessors: IndexMap::new(),
        }
    }

    /// Expose a value that can always be read (typically a field).
    #[must_use]
    pub fn field<F>(self, name: &'static str, read: F) -> Self
    where
        F: Fn(&T) -> ScopeValue + Send + Sync + 'static,
    {
        self.register(name, Box::new(move |owner| Ok(read(owner))))
    }

    /// Expose a value produced by a fallible computation (typically a
    /// lazily-derived accessor method).
    #[must_use]
    pub fn method<F, E>(self, name: &'static str, call: F) -> Self
    where
        F: Fn(&T) -> Result<ScopeValue, E> + Send + Sync + 'static,
        E: Into<AccessError>,
    {
        self.register(name, Box::new(move |owner| call(owner).map_err(Into::into)))
    }

    fn register(mut self, name: &'static str, accessor: Accessor<T>) -> Self {
        debug_assert!(
            !self.accessors.contains_key(name),
            "duplicate named scope value '{name}'"
        );
        self.accessors.insert(name, accessor);
        self
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.accessors.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.accessors.keys().copied()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    /// Invoke the accessor for `name` on `owner`.
    ///
    /// # Errors
    ///
    /// [`ScopeError::UnknownName`] if `name` is not registered;
    /// [`ScopeError::AccessFailed`] wrapping the accessor's error otherwise.
    pub fn resolve(&self, owner: &T, name: &str) -> Result<ScopeValue, ScopeError> {
        let accessor = self
            .accessors
            .get(name)
            .ok_or_else(|| ScopeError::unknown(name))?;
        accessor(owner).map_err(|source| ScopeError::AccessFailed {
            name: name.to_owned(),
            source,
        })
    }
}

impl<T> Default for AttributeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AttributeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.accessors.keys()).finish()
    }
}
