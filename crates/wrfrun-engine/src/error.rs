//! Error types for the wrfrun binary.
//!
//! [`EngineError`] wraps every failure mode of a run so that `main` can
//! propagate with `?`.

/// Top-level error for the wrfrun binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: wrfrun_core::ConfigError,
    },

    /// Building or ordering the simulation failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: wrfrun_core::SimulationError,
    },

    /// Preparing a module failed.
    #[error("module error: {source}")]
    Module {
        /// The underlying module error.
        #[from]
        source: wrfrun_core::ModuleError,
    },
}
