//! Error types for the `wrfrun-timing` crate.

/// Errors that can occur while building or applying a timing pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TimingError {
    /// A parameter has the wrong type or an unusable value.
    #[error("invalid {component} parameter '{key}': {reason}")]
    InvalidParameter {
        /// The component being configured (`offset`, `rounding`, ...).
        component: &'static str,
        /// The offending parameter key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A calendar field name was not recognised.
    #[error("unknown calendar field: {name}")]
    UnknownField {
        /// The unrecognised name.
        name: String,
    },

    /// A component `type` other than the supported variants.
    #[error("unknown {component} type: {kind}")]
    UnknownKind {
        /// The component being configured.
        component: &'static str,
        /// The unsupported type name.
        kind: String,
    },

    /// Calendar arithmetic left the representable range.
    #[error("calendar value out of range: {detail}")]
    OutOfRange {
        /// Description of the failed computation.
        detail: String,
    },

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp '{text}': expected YYYY-MM-DD_HH:MM:SS")]
    InvalidTimestamp {
        /// The rejected text.
        text: String,
    },
}

impl TimingError {
    pub(crate) fn out_of_range(detail: impl Into<String>) -> Self {
        Self::OutOfRange {
            detail: detail.into(),
        }
    }
}
