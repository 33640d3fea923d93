//! Error types for the `wrfrun-scope` crate.

/// Boxed error raised by a named-value accessor.
pub type AccessError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while resolving values through a scope.
///
/// The first two variants are both "invalid variable access": they always
/// carry the requested name, and an accessor failure keeps its cause as the
/// error [`source`](std::error::Error::source).
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// No value is registered under the name in the local scope.
    #[error("'{name}' does not exist in the current scope")]
    UnknownName {
        /// The requested name.
        name: String,
    },

    /// The name is registered but its accessor failed.
    #[error("could not access '{name}': {source}")]
    AccessFailed {
        /// The requested name.
        name: String,
        /// The accessor's own error.
        source: AccessError,
    },

    /// A container's parent scope was set a second time.
    #[error("scope parent has already been set")]
    ParentAlreadySet,
}

impl ScopeError {
    /// Build an [`ScopeError::UnknownName`] for `name`.
    pub fn unknown(name: &str) -> Self {
        Self::UnknownName {
            name: name.to_owned(),
        }
    }

    /// Return the name whose access failed, if the error concerns one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::UnknownName { name } | Self::AccessFailed { name, .. } => Some(name),
            Self::ParentAlreadySet => None,
        }
    }

    /// Whether the error means "not registered" rather than "accessor failed".
    pub const fn is_unknown_name(&self) -> bool {
        matches!(self, Self::UnknownName { .. })
    }
}
