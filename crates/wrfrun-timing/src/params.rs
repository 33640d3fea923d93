//! Shared readers for timing component parameters.

use wrfrun_scope::{ScopeValue, ScopedMap};

use crate::error::TimingError;
use crate::{INHERIT, STANDARD_KIND};

/// Borrow a locally-set parameter. The string `"inherit"` counts as unset.
pub(crate) fn local<'a>(parameters: &'a ScopedMap, key: &str) -> Option<&'a ScopeValue> {
    parameters
        .get(key)
        .filter(|value| value.as_str() != Some(INHERIT))
}

/// Reject any `type` other than the standard variant.
pub(crate) fn check_kind(component: &'static str, parameters: &ScopedMap) -> Result<(), TimingError> {
    match local(parameters, "type") {
        None => Ok(()),
        Some(value) => match value.as_str() {
            Some(kind) if kind.eq_ignore_ascii_case(STANDARD_KIND) => Ok(()),
            _ => Err(TimingError::UnknownKind {
                component,
                kind: value.to_string(),
            }),
        },
    }
}

/// Read a whole-number parameter.
pub(crate) fn integer(component: &'static str, key: &str, value: &ScopeValue) -> Result<i64, TimingError> {
    value.as_i64().ok_or_else(|| TimingError::InvalidParameter {
        component,
        key: key.to_owned(),
        reason: format!("expected a whole number, found {} '{value}'", value.type_name()),
    })
}

/// Read a boolean parameter.
pub(crate) fn boolean(component: &'static str, key: &str, value: &ScopeValue) -> Result<bool, TimingError> {
    value.as_bool().ok_or_else(|| TimingError::InvalidParameter {
        component,
        key: key.to_owned(),
        reason: format!("expected true or false, found {} '{value}'", value.type_name()),
    })
}

/// Read a string parameter.
pub(crate) fn text<'a>(
    component: &'static str,
    key: &str,
    value: &'a ScopeValue,
) -> Result<&'a str, TimingError> {
    value.as_str().ok_or_else(|| TimingError::InvalidParameter {
        component,
        key: key.to_owned(),
        reason: format!("expected a string, found {} '{value}'", value.type_name()),
    })
}
