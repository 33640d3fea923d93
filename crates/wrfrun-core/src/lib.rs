//! # wrfrun-core
//!
//! The simulation model of wrfrun.
//!
//! A [`Simulation`] is built from one JSON configuration document. It owns
//! the top-level timing, the base timestamp and a set of named [`Module`]s.
//! Each module inherits its timing from the simulation, reads its namelist
//! from the module's source directory, rewrites the time entries for its
//! run window, and mirrors the source tree into a per-run active directory.
//!
//! - [`config`]: configuration document and typed settings
//! - [`simulation`]: the root scope and dependency ordering
//! - [`module`]: per-module timing, namelist and preparation
//! - [`update`]: namelist rewriting per [`ModuleKind`]
//! - [`link`]: active-directory mirroring and file exclusion
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod link;
pub mod module;
pub mod simulation;
pub mod update;

pub use config::{ConfigDocument, FeaturesConfig, GeneralConfig, ModuleEntry, PathsConfig, SimulationConfig};
pub use error::{ConfigError, ModuleError, SimulationError};
pub use link::{MirrorReport, TransferAction, mirror_tree, should_exclude};
pub use module::{Module, PreparedModule};
pub use simulation::Simulation;
pub use update::{ModuleKind, ModulePaths};
