//! [`Offset`]: shifts a timestamp by per-field deltas.
//!
//! Parameters (all optional, each inherited from the parent offset when
//! absent or `"inherit"`):
//!
//! | Key | Type | Root default |
//! |-----|------|--------------|
//! | `years` .. `seconds` | integer | `0` |
//! | `wrap` | boolean | `true` |
//! | `type` | `"standard"` | `"standard"` |
//!
//! With `wrap` the deltas are added with calendar rollover; without it each
//! field is incremented in place and may end up out of range.

use std::sync::Arc;

use tracing::debug;
use wrfrun_scope::{AttributeRegistry, ComputeOnce, Scope, ScopeError, ScopeValue, ScopedMap};

use crate::calendar::CalendarTime;
use crate::error::TimingError;
use crate::field::TimingField;
use crate::params;

/// Component name used in error messages.
const COMPONENT: &str = "offset";

/// Derived state of an offset, computed once from the parameter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOffset {
    /// Delta per field, in [`TimingField::ALL`] order.
    deltas: [i64; 6],
    /// Whether deltas carry into larger fields.
    wrap: bool,
}

impl ResolvedOffset {
    /// Delta for one field.
    pub fn delta(&self, field: TimingField) -> i64 {
        self.deltas()
            .find_map(|(candidate, delta)| (candidate == field).then_some(delta))
            .unwrap_or(0)
    }

    /// Every field paired with its delta, largest field first.
    pub fn deltas(&self) -> impl Iterator<Item = (TimingField, i64)> + '_ {
        TimingField::ALL.into_iter().zip(self.deltas.iter().copied())
    }

    /// Whether deltas carry into larger fields.
    pub const fn wraps(&self) -> bool {
        self.wrap
    }
}

/// A per-field shift of a timestamp, inheriting unset fields from its parent.
#[derive(Debug)]
pub struct Offset {
    /// Raw parameters from configuration.
    parameters: Arc<ScopedMap>,
    /// Same-stage offset of the enclosing timing, if any.
    parent: Option<Arc<Self>>,
    /// Deltas and wrap flag, computed on first use.
    resolved: ComputeOnce<ResolvedOffset>,
    /// Named values exposed through [`Scope`].
    registry: AttributeRegistry<Self>,
}

impl Offset {
    /// Create an offset from its parameters and optional parent.
    ///
    /// Only the `type` key is checked here; every other parameter is read
    /// lazily on first use.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::UnknownKind`] for an unsupported `type`.
    pub fn new(parameters: Arc<ScopedMap>, parent: Option<Arc<Self>>) -> Result<Arc<Self>, TimingError> {
        params::check_kind(COMPONENT, &parameters)?;
        Ok(Arc::new(Self {
            parameters,
            parent,
            resolved: ComputeOnce::new(),
            registry: Self::registry(),
        }))
    }

    fn registry() -> AttributeRegistry<Self> {
        let registry = AttributeRegistry::new()
            .method("wrap", |offset: &Self| offset.does_wrap().map(ScopeValue::Bool))
            .field("parameters", |offset: &Self| {
                ScopeValue::Map(Arc::clone(&offset.parameters))
            });
        TimingField::ALL.into_iter().fold(registry, |registry, field| {
            registry.method(field.key(), move |offset: &Self| {
                offset.delta(field).map(ScopeValue::Integer)
            })
        })
    }

    /// Raw parameters.
    pub const fn parameters(&self) -> &Arc<ScopedMap> {
        &self.parameters
    }

    /// The offset this one inherits from.
    pub const fn parent_offset(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// Deltas and wrap flag, computing them on first call.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidParameter`] if this offset or an
    /// ancestor has a mistyped parameter.
    pub fn resolved(&self) -> Result<&ResolvedOffset, TimingError> {
        self.resolved.get_or_try_init(|| self.compute())
    }

    fn compute(&self) -> Result<ResolvedOffset, TimingError> {
        let inherited = self.parent.as_deref().map(Self::resolved).transpose()?.copied();

        let mut deltas = [0_i64; 6];
        for (slot, field) in deltas.iter_mut().zip(TimingField::ALL) {
            *slot = match params::local(&self.parameters, field.key()) {
                Some(value) => params::integer(COMPONENT, field.key(), value)?,
                None => inherited.map_or(0, |parent| parent.delta(field)),
            };
        }

        let wrap = match params::local(&self.parameters, "wrap") {
            Some(value) => params::boolean(COMPONENT, "wrap", value)?,
            None => inherited.is_none_or(|parent| parent.wrap),
        };

        let resolved = ResolvedOffset { deltas, wrap };
        debug!(?deltas, wrap, "offset resolved");
        Ok(resolved)
    }

    /// Whether this offset carries into larger fields.
    ///
    /// The local `wrap` parameter wins; otherwise the parent's answer is
    /// used; a root offset wraps by default.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidParameter`] if a `wrap` in the chain
    /// is not a boolean.
    pub fn does_wrap(&self) -> Result<bool, TimingError> {
        self.resolved().map(ResolvedOffset::wraps)
    }

    /// Resolved delta for one field.
    ///
    /// # Errors
    ///
    /// See [`Offset::resolved`].
    pub fn delta(&self, field: TimingField) -> Result<i64, TimingError> {
        self.resolved().map(|resolved| resolved.delta(field))
    }

    /// Shift `base` by this offset. `base` itself is never modified.
    ///
    /// # Errors
    ///
    /// Returns a parameter error from resolution, or
    /// [`TimingError::OutOfRange`] if the arithmetic overflows.
    pub fn apply(&self, base: &CalendarTime) -> Result<CalendarTime, TimingError> {
        let resolved = self.resolved()?;
        if resolved.wraps() {
            let mut shifted = base.normalized()?;
            for (field, delta) in resolved.deltas().filter(|(_, delta)| *delta != 0) {
                shifted = shifted.add_wrapping(field, delta)?;
            }
            Ok(shifted)
        } else {
            resolved
                .deltas()
                .try_fold(*base, |shifted, (field, delta)| shifted.add_clamped(field, delta))
        }
    }
}

impl Scope for Offset {
    fn parent(&self) -> Option<Arc<dyn Scope>> {
        self.parent
            .as_ref()
            .map(|parent| Arc::clone(parent) as Arc<dyn Scope>)
    }

    fn has_value_by_name(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError> {
        self.registry.resolve(self, name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: serde_json::Value) -> Arc<ScopedMap> {
        match ScopeValue::from_json(value) {
            ScopeValue::Map(map) => map,
            _ => ScopedMap::new().into_shared(),
        }
    }

    fn offset(value: serde_json::Value, parent: Option<Arc<Offset>>) -> Arc<Offset> {
        Offset::new(params(value), parent).unwrap()
    }

    const LATE_EVENING: CalendarTime = CalendarTime::new(2024, 5, 10, 23, 0, 0);

    #[test]
    fn wrap_mode_rolls_into_next_day() {
        let shift = offset(json!({"hours": 3}), None);
        assert_eq!(shift.apply(&LATE_EVENING).unwrap(), CalendarTime::new(2024, 5, 11, 2, 0, 0));
    }

    #[test]
    fn clamp_mode_keeps_raw_hour() {
        let shift = offset(json!({"hours": 3, "wrap": false}), None);
        let shifted = shift.apply(&LATE_EVENING).unwrap();
        assert_eq!(shifted, CalendarTime::new(2024, 5, 10, 26, 0, 0));
        assert_eq!(shifted.get(TimingField::Day), 10);
    }

    #[test]
    fn apply_never_mutates_base() {
        let base = LATE_EVENING;
        let shift = offset(json!({"days": 1, "hours": -30}), None);
        let _shifted = shift.apply(&base).unwrap();
        assert_eq!(base, LATE_EVENING);
    }

    #[test]
    fn root_wraps_by_default() {
        assert!(offset(json!({}), None).does_wrap().unwrap());
    }

    #[test]
    fn wrap_is_inherited_from_parent() {
        let root = offset(json!({"wrap": false}), None);
        let child = offset(json!({"hours": 1}), Some(Arc::clone(&root)));
        let grandchild = offset(json!({}), Some(Arc::clone(&child)));
        assert_eq!(child.does_wrap().unwrap(), root.does_wrap().unwrap());
        assert!(!grandchild.does_wrap().unwrap());

        let overriding = offset(json!({"wrap": true}), Some(root));
        assert!(overriding.does_wrap().unwrap());
    }

    #[test]
    fn fields_fall_through_the_chain() {
        let root = offset(json!({"days": 1, "hours": -6}), None);
        let middle = offset(json!({"hours": 2}), Some(Arc::clone(&root)));
        let leaf = offset(json!({"minutes": 30, "days": "inherit"}), Some(Arc::clone(&middle)));

        assert_eq!(leaf.delta(TimingField::Day).unwrap(), 1);
        assert_eq!(leaf.delta(TimingField::Hour).unwrap(), 2);
        assert_eq!(leaf.delta(TimingField::Minute).unwrap(), 30);
        assert_eq!(leaf.delta(TimingField::Second).unwrap(), 0);
        assert_eq!(root.delta(TimingField::Minute).unwrap(), 0);

        let base = CalendarTime::new(2024, 1, 1, 0, 0, 0);
        assert_eq!(leaf.apply(&base).unwrap(), CalendarTime::new(2024, 1, 2, 2, 30, 0));
    }

    #[test]
    fn resolution_is_cached() {
        let shift = offset(json!({"hours": 3}), None);
        let first: *const ResolvedOffset = shift.resolved().unwrap();
        let second: *const ResolvedOffset = shift.resolved().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn mistyped_parameters_are_reported() {
        let shift = offset(json!({"hours": "three"}), None);
        let err = shift.apply(&LATE_EVENING).unwrap_err();
        assert!(matches!(err, TimingError::InvalidParameter { component: "offset", .. }));

        let child = offset(json!({}), Some(offset(json!({"wrap": 1}), None)));
        assert!(child.does_wrap().is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Offset::new(params(json!({"type": "sidereal"})), None).unwrap_err();
        assert!(matches!(err, TimingError::UnknownKind { .. }));
    }

    #[test]
    fn scope_exposes_fields_and_parent() {
        let root = offset(json!({"hours": -6, "wrap": false}), None);
        let child = offset(json!({"days": 2}), Some(Arc::clone(&root)));
        assert_eq!(child.value_by_name("hours").unwrap(), ScopeValue::Integer(-6));
        assert_eq!(child.value_by_name("wrap").unwrap(), ScopeValue::Bool(false));
        assert!(child.has_value_by_name("parameters"));
        assert!(!child.has_value_by_name("magnitude"));
        assert!(child.parent().unwrap().has_value_by_name("wrap"));
        assert!(root.is_root());
    }
}
