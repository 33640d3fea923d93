//! [`Rounding`]: snaps a timestamp to a calendar boundary.
//!
//! | Key | Type | Root default |
//! |-----|------|--------------|
//! | `magnitude` | field name (`"hour"`, `"days"`, ...) | `"second"` |
//! | `step` | positive integer | `1` |
//! | `diff` | `"previous"`, `"next"` or `"nearest"` | `"previous"` |
//! | `type` | `"standard"` | `"standard"` |
//!
//! Each key is inherited separately from the parent rounding, so a child
//! can change the direction while keeping its parent's magnitude.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;
use wrfrun_scope::{AttributeRegistry, ComputeOnce, Scope, ScopeError, ScopeValue, ScopedMap};

use crate::calendar::CalendarTime;
use crate::error::TimingError;
use crate::field::TimingField;
use crate::params;

const COMPONENT: &str = "rounding";

/// Which boundary a rounding snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundingDirection {
    /// The boundary at or before the value (floor).
    #[default]
    Previous,
    /// The boundary at or after the value (ceiling).
    Next,
    /// Whichever boundary is closer; ties go to the later one.
    Nearest,
}

impl RoundingDirection {
    /// Canonical configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Next => "next",
            Self::Nearest => "nearest",
        }
    }
}

impl fmt::Display for RoundingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundingDirection {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "previous" | "floor" | "down" => Ok(Self::Previous),
            "next" | "ceil" | "up" => Ok(Self::Next),
            "nearest" | "round" => Ok(Self::Nearest),
            _ => Err(TimingError::InvalidParameter {
                component: COMPONENT,
                key: "diff".to_owned(),
                reason: format!("expected previous, next or nearest, found '{s}'"),
            }),
        }
    }
}

/// Effective rounding parameters after inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRounding {
    /// Field whose boundaries are snapped to.
    pub magnitude: TimingField,
    /// Boundary spacing in units of `magnitude`.
    pub step: i64,
    /// Which boundary to pick.
    pub diff: RoundingDirection,
}

impl Default for ResolvedRounding {
    fn default() -> Self {
        Self {
            magnitude: TimingField::Second,
            step: 1,
            diff: RoundingDirection::Previous,
        }
    }
}

impl ResolvedRounding {
    /// Round `base` with these parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] if `base` cannot be normalised or
    /// the ceiling overflows.
    pub fn apply(&self, base: &CalendarTime) -> Result<CalendarTime, TimingError> {
        let normal = base.normalized()?;
        let floor = self.floor(&normal)?;
        if floor == normal {
            return Ok(floor);
        }
        match self.diff {
            RoundingDirection::Previous => Ok(floor),
            RoundingDirection::Next => floor.add_wrapping(self.magnitude, self.step),
            RoundingDirection::Nearest => {
                let ceil = floor.add_wrapping(self.magnitude, self.step)?;
                let instant = normal.to_datetime()?;
                let below = instant.signed_duration_since(floor.to_datetime()?);
                let above = ceil.to_datetime()?.signed_duration_since(instant);
                Ok(if above <= below { ceil } else { floor })
            }
        }
    }

    /// Reset every finer field to its origin and snap `magnitude` down to a
    /// multiple of `step`, counted from the field's origin.
    fn floor(&self, normal: &CalendarTime) -> Result<CalendarTime, TimingError> {
        let truncated = TimingField::ALL
            .into_iter()
            .filter(|field| field.is_finer_than(self.magnitude))
            .fold(*normal, |time, field| time.with(field, field.origin()));

        let origin = self.magnitude.origin();
        let snapped = truncated
            .get(self.magnitude)
            .checked_sub(origin)
            .and_then(|units| units.checked_div_euclid(self.step))
            .and_then(|steps| steps.checked_mul(self.step))
            .and_then(|units| units.checked_add(origin))
            .ok_or_else(|| TimingError::out_of_range(format!("cannot round {normal} to {}", self.magnitude)))?;
        Ok(truncated.with(self.magnitude, snapped))
    }
}

/// Snaps timestamps to boundaries, inheriting unset keys from its parent.
#[derive(Debug)]
pub struct Rounding {
    /// Raw parameters from configuration.
    parameters: Arc<ScopedMap>,
    /// Same-stage rounding of the enclosing timing, if any.
    parent: Option<Arc<Self>>,
    /// Effective parameters, computed on first use.
    resolved: ComputeOnce<ResolvedRounding>,
    /// Named values exposed through [`Scope`].
    registry: AttributeRegistry<Self>,
}

impl Rounding {
    /// Create a rounding from its parameters and optional parent.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::UnknownKind`] for an unsupported `type`.
    pub fn new(parameters: Arc<ScopedMap>, parent: Option<Arc<Self>>) -> Result<Arc<Self>, TimingError> {
        params::check_kind(COMPONENT, &parameters)?;
        let registry = AttributeRegistry::new()
            .method("magnitude", |rounding: &Self| {
                rounding
                    .resolved()
                    .map(|resolved| ScopeValue::from(resolved.magnitude.singular()))
            })
            .method("step", |rounding: &Self| {
                rounding.resolved().map(|resolved| ScopeValue::Integer(resolved.step))
            })
            .method("diff", |rounding: &Self| {
                rounding.resolved().map(|resolved| ScopeValue::from(resolved.diff.as_str()))
            })
            .field("parameters", |rounding: &Self| {
                ScopeValue::Map(Arc::clone(&rounding.parameters))
            });
        Ok(Arc::new(Self {
            parameters,
            parent,
            resolved: ComputeOnce::new(),
            registry,
        }))
    }

    /// Raw parameters.
    pub const fn parameters(&self) -> &Arc<ScopedMap> {
        &self.parameters
    }

    /// The rounding this one inherits from.
    pub const fn parent_rounding(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// Effective parameters, computing them on first call.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidParameter`] for a mistyped key, a
    /// non-positive `step`, or an unknown `diff`, and
    /// [`TimingError::UnknownField`] for an unknown `magnitude`.
    pub fn resolved(&self) -> Result<&ResolvedRounding, TimingError> {
        self.resolved.get_or_try_init(|| self.compute())
    }

    fn compute(&self) -> Result<ResolvedRounding, TimingError> {
        let inherited = match self.parent.as_deref() {
            Some(parent) => *parent.resolved()?,
            None => ResolvedRounding::default(),
        };

        let magnitude = match params::local(&self.parameters, "magnitude") {
            Some(value) => params::text(COMPONENT, "magnitude", value)?.parse()?,
            None => inherited.magnitude,
        };
        let step = match params::local(&self.parameters, "step") {
            Some(value) => params::integer(COMPONENT, "step", value)?,
            None => inherited.step,
        };
        if step <= 0 {
            return Err(TimingError::InvalidParameter {
                component: COMPONENT,
                key: "step".to_owned(),
                reason: format!("must be positive, found {step}"),
            });
        }
        let diff = match params::local(&self.parameters, "diff") {
            Some(value) => params::text(COMPONENT, "diff", value)?.parse()?,
            None => inherited.diff,
        };

        debug!(%magnitude, step, %diff, "rounding resolved");
        Ok(ResolvedRounding { magnitude, step, diff })
    }

    /// Round `base`. `base` itself is never modified.
    ///
    /// # Errors
    ///
    /// See [`Rounding::resolved`] and [`ResolvedRounding::apply`].
    pub fn apply(&self, base: &CalendarTime) -> Result<CalendarTime, TimingError> {
        self.resolved()?.apply(base)
    }
}

impl Scope for Rounding {
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
