//! Hierarchical scope resolution for the wrfrun simulation runner.
//!
//! Every configurable object in a run (the simulation, its modules, and each
//! link of a timing pipeline) is a [`Scope`]: it can resolve values by name and
//! knows the scope that encloses it. Configuration arrives as nested
//! [`ScopedMap`] and [`ScopedList`] containers that remember which scope they
//! belong to.
//!
//! # Modules
//!
//! - [`scope`] -- The [`Scope`] trait and the explicit parent-chain [`lookup`].
//! - [`value`] -- [`ScopeValue`], the dynamically-typed value every scope
//!   resolves to.
//! - [`map`] -- [`ScopedMap`], an insertion-ordered map with a parent scope.
//! - [`list`] -- [`ScopedList`], an ordered sequence with a parent scope.
//! - [`registry`] -- [`AttributeRegistry`], the name-to-accessor table behind
//!   registry-backed scopes.
//! - [`lazy`] -- [`ComputeOnce`], the at-most-once cell used for cached
//!   derived state.
//! - [`error`] -- [`ScopeError`].
//!
//! # Resolution rules
//!
//! [`Scope::value_by_name`] only consults the local table. Walking up to the
//! parent is always explicit, either by calling [`Scope::parent`] or through
//! [`lookup`].
//!
//! ```
//! use wrfrun_scope::{lookup, Scope, ScopeValue, ScopedMap};
//!
//! let mut inner = ScopedMap::new();
//! inner.insert("hours", 6_i64);
//!
//! let mut outer = ScopedMap::new();
//! outer.insert("wrap", true);
//! outer.insert("offset", inner);
//! let outer = outer.into_shared();
//!
//! let offset = outer.get_map("offset").cloned().unwrap_or_default();
//! assert!(!offset.has_value_by_name("wrap"));
//! assert_eq!(lookup(offset.as_ref(), "wrap").ok(), Some(ScopeValue::Bool(true)));
//! ```

pub mod error;
pub mod lazy;
pub mod list;
pub mod map;
pub mod registry;
pub mod scope;
pub mod value;

pub use error::{AccessError, ScopeError};
pub use lazy::ComputeOnce;
pub use list::ScopedList;
pub use map::ScopedMap;
pub use registry::AttributeRegistry;
pub use scope::{Scope, depth, lookup};
pub use value::ScopeValue;
