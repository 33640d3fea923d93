//! Error types for the `wrfrun-core` crate.

use std::path::PathBuf;

use wrfrun_namelist::NamelistError;
use wrfrun_scope::ScopeError;
use wrfrun_timing::TimingError;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse config JSON: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The document parsed but has the wrong shape.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

/// Errors raised by a [`Module`](crate::Module).
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// A module parameter has the wrong type.
    #[error("module '{module}': invalid parameter '{key}': {reason}")]
    InvalidParameter {
        /// The module name.
        module: String,
        /// The offending key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A dependency names a module that does not exist.
    #[error("module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency {
        /// The dependent module.
        module: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The owning simulation has been dropped.
    #[error("module '{module}' outlived its simulation")]
    SimulationDropped {
        /// The module name.
        module: String,
    },

    /// Filesystem work in the active directory failed.
    #[error("module I/O failed for {}: {source}", path.display())]
    Io {
        /// The path being worked on.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Timing construction or evaluation failed.
    #[error("timing error: {source}")]
    Timing {
        /// The underlying timing error.
        #[from]
        source: TimingError,
    },

    /// Namelist reading or writing failed.
    #[error("namelist error: {source}")]
    Namelist {
        /// The underlying namelist error.
        #[from]
        source: NamelistError,
    },

    /// Scope wiring failed.
    #[error("scope error: {source}")]
    Scope {
        /// The underlying scope error.
        #[from]
        source: ScopeError,
    },
}

/// Errors raised while building or ordering a [`Simulation`](crate::Simulation).
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Two modules share a name.
    #[error("duplicate module name '{name}'")]
    DuplicateModule {
        /// The repeated name.
        name: String,
    },

    /// A dependency names a module that does not exist.
    #[error("module '{required_by}' depends on unknown module '{name}'")]
    UnknownModule {
        /// The missing module.
        name: String,
        /// The module that asked for it.
        required_by: String,
    },

    /// Module dependencies form a cycle.
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle {
        /// Module names around the cycle; the first is repeated at the end.
        cycle: Vec<String>,
    },

    /// Configuration was invalid.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Timing construction or evaluation failed.
    #[error("timing error: {source}")]
    Timing {
        /// The underlying timing error.
        #[from]
        source: TimingError,
    },

    /// A module could not be built.
    #[error("module error: {source}")]
    Module {
        /// The underlying module error.
        #[from]
        source: ModuleError,
    },

    /// Scope wiring failed.
    #[error("scope error: {source}")]
    Scope {
        /// The underlying scope error.
        #[from]
        source: ScopeError,
    },
}
