//! Timing engine for wrfrun: turns a base timestamp into a simulation
//! window.
//!
//! A [`Timing`] is a small pipeline of optional stages, each built from a
//! [`ScopedMap`] of raw parameters and parented to the same stage of an
//! enclosing timing:
//!
//! 1. [`Offset`] -- shifts the base by per-field deltas, with calendar
//!    rollover (wrap) or raw per-field addition (clamp).
//! 2. [`Rounding`] -- snaps the shifted value to a boundary.
//! 3. duration (another [`Offset`]) -- applied to the window start to
//!    produce its end.
//!
//! Any field a stage does not set locally is inherited from its parent
//! stage, then from a built-in default at the root. Derived state is
//! computed lazily, once.
//!
//! # Modules
//!
//! - [`field`] -- [`TimingField`], the six calendar fields in order.
//! - [`calendar`] -- [`CalendarTime`], a timestamp that may hold
//!   out-of-range fields.
//! - [`offset`] -- [`Offset`].
//! - [`rounding`] -- [`Rounding`] and [`RoundingDirection`].
//! - [`timing`] -- [`Timing`] and [`TimeWindow`].
//! - [`error`] -- [`TimingError`].
//!
//! [`ScopedMap`]: wrfrun_scope::ScopedMap

pub mod calendar;
pub mod error;
pub mod field;
pub mod offset;
mod params;
pub mod rounding;
pub mod timing;

pub use calendar::CalendarTime;
pub use error::TimingError;
pub use field::TimingField;
pub use offset::{Offset, ResolvedOffset};
pub use rounding::{ResolvedRounding, Rounding, RoundingDirection};
pub use timing::{TimeWindow, Timing};

/// Parameter value meaning "take this from the parent".
pub const INHERIT: &str = "inherit";

/// The only component variant currently recognised in a `type` key.
pub const STANDARD_KIND: &str = "standard";
