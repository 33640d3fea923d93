//! [`Timing`]: the offset, rounding and duration pipeline.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::trace;
use wrfrun_scope::{AttributeRegistry, Scope, ScopeError, ScopeValue, ScopedMap};

use crate::INHERIT;
use crate::calendar::CalendarTime;
use crate::error::TimingError;
use crate::offset::Offset;
use crate::rounding::Rounding;

/// Start and end of a simulation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    /// First instant of the window. May hold raw clamp-mode fields.
    pub start: CalendarTime,
    /// Last instant of the window. May hold raw clamp-mode fields.
    pub end: CalendarTime,
}

impl TimeWindow {
    /// Elapsed time between the normalised start and end.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] if either end cannot be
    /// normalised.
    pub fn length(&self) -> Result<TimeDelta, TimingError> {
        Ok(self.end.to_datetime()?.signed_duration_since(self.start.to_datetime()?))
    }
}

/// A timing pipeline: `offset`, then `rounding`, for the window start, and
/// `duration` for the window end.
///
/// Stages are built eagerly from the local parameter map; their derived
/// values are computed lazily inside each stage.
#[derive(Debug)]
pub struct Timing {
    parameters: Arc<ScopedMap>,
    parent: Option<Arc<Self>>,
    offset: Option<Arc<Offset>>,
    rounding: Option<Arc<Rounding>>,
    duration: Option<Arc<Offset>>,
    registry: AttributeRegistry<Self>,
}

impl Timing {
    /// Build a timing from its parameter map and optional parent.
    ///
    /// For each of `offset`, `rounding` and `duration`:
    /// - a map builds a new stage whose parent is the parent timing's stage;
    /// - an absent key, `"inherit"` or `true` reuses the parent's stage;
    /// - `null` or `false` disables the stage.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidParameter`] for any other stage value,
    /// or [`TimingError::UnknownKind`] from a stage's `type`.
    pub fn new(parameters: Arc<ScopedMap>, parent: Option<Arc<Self>>) -> Result<Arc<Self>, TimingError> {
        let inherited = parent.as_deref();
        let offset = stage(
            &parameters,
            "offset",
            inherited.and_then(|timing| timing.offset.as_ref()),
            Offset::new,
        )?;
        let rounding = stage(
            &parameters,
            "rounding",
            inherited.and_then(|timing| timing.rounding.as_ref()),
            Rounding::new,
        )?;
        let duration = stage(
            &parameters,
            "duration",
            inherited.and_then(|timing| timing.duration.as_ref()),
            Offset::new,
        )?;

        let registry = AttributeRegistry::new()
            .field("offset", |timing: &Self| scope_or_null(timing.offset.as_ref()))
            .field("rounding", |timing: &Self| scope_or_null(timing.rounding.as_ref()))
            .field("duration", |timing: &Self| scope_or_null(timing.duration.as_ref()))
            .field("parameters", |timing: &Self| {
                ScopeValue::Map(Arc::clone(&timing.parameters))
            });
        Ok(Arc::new(Self {
            parameters,
            parent,
            offset,
            rounding,
            duration,
            registry,
        }))
    }

    /// Raw parameters.
    pub const fn parameters(&self) -> &Arc<ScopedMap> {
        &self.parameters
    }

    /// The timing this one inherits from.
    pub const fn parent_timing(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// The offset stage, if enabled.
    pub const fn offset(&self) -> Option<&Arc<Offset>> {
        self.offset.as_ref()
    }

    /// The rounding stage, if enabled.
    pub const fn rounding(&self) -> Option<&Arc<Rounding>> {
        self.rounding.as_ref()
    }

    /// The duration stage, if enabled.
    pub const fn duration(&self) -> Option<&Arc<Offset>> {
        self.duration.as_ref()
    }

    /// `rounding(offset(base))`; a disabled stage is the identity.
    ///
    /// # Errors
    ///
    /// Propagates any stage error.
    pub fn apply(&self, base: &CalendarTime) -> Result<CalendarTime, TimingError> {
        let shifted = match &self.offset {
            Some(offset) => offset.apply(base)?,
            None => *base,
        };
        let start = match &self.rounding {
            Some(rounding) => rounding.apply(&shifted)?,
            None => shifted,
        };
        trace!(%base, %start, "timing applied");
        Ok(start)
    }

    /// Window starting at `apply(base)` and ending at `duration(start)`.
    ///
    /// # Errors
    ///
    /// Propagates any stage error.
    pub fn window(&self, base: &CalendarTime) -> Result<TimeWindow, TimingError> {
        let start = self.apply(base)?;
        let end = match &self.duration {
            Some(duration) => duration.apply(&start)?,
            None => start,
        };
        Ok(TimeWindow { start, end })
    }
}

impl Scope for Timing {
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

fn scope_or_null<C: Scope + 'static>(component: Option<&Arc<C>>) -> ScopeValue {
    component.map_or(ScopeValue::Null, |component| {
        ScopeValue::Scope(Arc::clone(component) as Arc<dyn Scope>)
    })
}

/// Build one pipeline stage from the value under `key`.
fn stage<C>(
    parameters: &ScopedMap,
    key: &'static str,
    inherited: Option<&Arc<C>>,
    build: fn(Arc<ScopedMap>, Option<Arc<C>>) -> Result<Arc<C>, TimingError>,
) -> Result<Option<Arc<C>>, TimingError> {
    let Some(value) = parameters.get(key) else {
        return Ok(inherited.cloned());
    };
    if let Some(map) = value.as_map() {
        return build(Arc::clone(map), inherited.cloned()).map(Some);
    }
    match value {
        ScopeValue::Null | ScopeValue::Bool(false) => Ok(None),
        ScopeValue::Bool(true) => Ok(inherited.cloned()),
        other if other.as_str() == Some(INHERIT) => Ok(inherited.cloned()),
        other => Err(TimingError::InvalidParameter {
            component: "timing",
            key: key.to_owned(),
            reason: format!(
                "expected a map, null, false or \"inherit\", found {} '{other}'",
                other.type_name()
            ),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::field::TimingField;

    fn timing(value: serde_json::Value, parent: Option<Arc<Timing>>) -> Arc<Timing> {
        let parameters = match ScopeValue::from_json(value) {
            ScopeValue::Map(map) => map,
            _ => ScopedMap::new().into_shared(),
        };
        Timing::new(parameters, parent).unwrap()
    }

    const BASE: CalendarTime = CalendarTime::new(2024, 3, 1, 14, 40, 0);

    #[test]
    fn pipeline_offsets_then_rounds() {
        let root = timing(
            json!({
                "offset": {"hours": -6},
                "rounding": {"magnitude": "day"},
                "duration": {"days": 2}
            }),
            None,
        );
        let window = root.window(&BASE).unwrap();
        assert_eq!(window.start, CalendarTime::new(2024, 3, 1, 0, 0, 0));
        assert_eq!(window.end, CalendarTime::new(2024, 3, 3, 0, 0, 0));
        assert_eq!(window.length().unwrap(), TimeDelta::days(2));
    }

    #[test]
    fn missing_stages_are_identities() {
        let empty = timing(json!({}), None);
        let window = empty.window(&BASE).unwrap();
        assert_eq!(window.start, BASE);
        assert_eq!(window.end, BASE);
        assert_eq!(window.length().unwrap(), TimeDelta::zero());
    }

    #[test]
    fn absent_stage_shares_parent_component() {
        let root = timing(json!({"offset": {"hours": 1}}), None);
        let child = timing(json!({}), Some(Arc::clone(&root)));
        let explicit = timing(json!({"offset": "inherit"}), Some(Arc::clone(&root)));
        assert!(Arc::ptr_eq(child.offset().unwrap(), root.offset().unwrap()));
        assert!(Arc::ptr_eq(explicit.offset().unwrap(), root.offset().unwrap()));
    }

    #[test]
    fn null_or_false_disables_stage() {
        let root = timing(json!({"offset": {"hours": 1}, "rounding": {"magnitude": "day"}}), None);
        let child = timing(json!({"offset": null, "rounding": false}), Some(root));
        assert!(child.offset().is_none());
        assert!(child.rounding().is_none());
        assert_eq!(child.apply(&BASE).unwrap(), BASE);
    }

    #[test]
    fn new_stage_is_parented_to_parent_stage() {
        let root = timing(json!({"offset": {"hours": -6, "wrap": false}}), None);
        let child = timing(json!({"offset": {"minutes": 30}}), Some(Arc::clone(&root)));
        let offset = child.offset().unwrap();
        assert!(Arc::ptr_eq(offset.parent_offset().unwrap(), root.offset().unwrap()));
        assert_eq!(offset.delta(TimingField::Hour).unwrap(), -6);
        assert!(!offset.does_wrap().unwrap());
    }

    #[test]
    fn deep_chain_resolves_root_and_intermediate_values() {
        let root = timing(json!({"offset": {"days": 1}, "rounding": {"magnitude": "hour"}}), None);
        let mut chain = vec![Arc::clone(&root)];
        for level in 1..6_i64 {
            let params = if level == 3 {
                json!({"offset": {"hours": 5}, "rounding": {}})
            } else {
                json!({"offset": {}, "rounding": {}})
            };
            let next = timing(params, chain.last().cloned());
            chain.push(next);
        }

        for (level, link) in chain.iter().enumerate() {
            let offset = link.offset().unwrap();
            assert_eq!(offset.delta(TimingField::Day).unwrap(), 1, "level {level}");
            let hours = if level >= 3 { 5 } else { 0 };
            assert_eq!(offset.delta(TimingField::Hour).unwrap(), hours, "level {level}");
            assert_eq!(link.rounding().unwrap().resolved().unwrap().magnitude, TimingField::Hour);
        }
    }

    #[test]
    fn invalid_stage_value_is_rejected() {
        let parameters = match ScopeValue::from_json(json!({"duration": 5})) {
            ScopeValue::Map(map) => map,
            _ => ScopedMap::new().into_shared(),
        };
        let err = Timing::new(parameters, None).unwrap_err();
        assert!(matches!(err, TimingError::InvalidParameter { component: "timing", .. }));
    }

    #[test]
    fn scope_exposes_stages() {
        let root = timing(json!({"offset": {"hours": 2}}), None);
        let child = timing(json!({"rounding": {"magnitude": "minute"}}), Some(Arc::clone(&root)));
        let offset = child.value_by_name("offset").unwrap();
        let offset = offset.as_scope().unwrap();
        assert_eq!(offset.value_by_name("hours").unwrap(), ScopeValue::Integer(2));
        assert!(root.value_by_name("rounding").unwrap().is_null());
        assert!(child.parent().is_some());
    }
}
