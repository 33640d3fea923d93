//! Fortran namelist files for WRF and WPS.
//!
//! WRF (`namelist.input`) and WPS (`namelist.wps`) are configured through
//! Fortran namelists: named groups of `key = value, ...` entries. This crate
//! reads them into an ordered [`Namelist`], lets callers rewrite individual
//! entries, and writes them back out in the layout WRF itself uses.
//!
//! # Modules
//!
//! - [`namelist`] -- [`Namelist`] and [`NamelistGroup`].
//! - [`value`] -- [`NamelistValue`], one scalar entry.
//! - [`codec`] -- [`NamelistCodec`] and the default [`FortranCodec`].
//! - [`error`] -- [`NamelistError`].
//!
//! ```
//! use wrfrun_namelist::{Namelist, NamelistValue};
//!
//! let mut namelist: Namelist = "&domains max_dom = 2, /".parse()?;
//! assert_eq!(namelist.first_integer("domains", "max_dom"), Some(2));
//!
//! namelist.set("time_control", "run_hours", vec![NamelistValue::Integer(48)]);
//! assert!(namelist.to_string().contains(" run_hours = 48,"));
//! # Ok::<(), wrfrun_namelist::NamelistError>(())
//! ```

pub mod codec;
pub mod error;
pub mod namelist;
mod parse;
pub mod value;

pub use codec::{FortranCodec, NamelistCodec};
pub use error::NamelistError;
pub use namelist::{Namelist, NamelistGroup};
pub use value::NamelistValue;
