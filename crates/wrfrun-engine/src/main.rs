//! wrfrun binary.
//!
//! Prepares one WRF run: every configured module gets its working
//! directory linked from its source tree and its namelist rewritten for the
//! module's time window. The WRF/WPS executables are run afterwards by the
//! calling script.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Resolve the configuration path (argument, `WRF_RUNNER_CONFIG`, or
//!    `configuration.json`)
//! 3. Load the configuration and build the simulation
//! 4. Order modules so dependencies come first
//! 5. Prepare each module and log the result

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wrfrun_core::{ConfigDocument, PreparedModule, Simulation};
use wrfrun_namelist::FortranCodec;

use crate::error::EngineError;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "WRF_RUNNER_CONFIG";

/// Configuration file used when neither an argument nor the environment
/// names one.
const DEFAULT_CONFIG: &str = "configuration.json";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or any module
/// fails to prepare.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("wrfrun-engine starting");

    // 2. Resolve the configuration path.
    let config_path = resolve_config_path(std::env::args().nth(1), |key| std::env::var(key).ok());
    info!(path = %config_path.display(), "Using configuration");

    // 3-5. Load, order, prepare.
    let prepared = run(&config_path)?;

    info!(modules = prepared.len(), "Run prepared");
    Ok(())
}

/// Pick the configuration file: explicit argument, then `WRF_RUNNER_CONFIG`,
/// then `configuration.json` in the current directory.
fn resolve_config_path(argument: Option<String>, var: impl Fn(&str) -> Option<String>) -> PathBuf {
    argument
        .filter(|path| !path.is_empty())
        .or_else(|| var(CONFIG_ENV).filter(|path| !path.is_empty()))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from)
}

/// Load `config_path`, build the simulation, and prepare every module in
/// dependency order.
fn run(config_path: &Path) -> Result<Vec<PreparedModule>, EngineError> {
    let document = ConfigDocument::from_file(config_path)?;
    info!(
        modules = document.modules.len(),
        working = %document.settings.paths.working.display(),
        "Configuration loaded"
    );

    let simulation = Simulation::from_document(document, Arc::new(FortranCodec))?;
    let window = simulation.window()?;
    info!(
        start = %window.start,
        end = %window.end,
        active_root = %simulation.active_root().display(),
        "Simulation window computed"
    );

    let order = simulation.execution_order()?;
    info!(
        order = ?order.iter().map(|module| module.name()).collect::<Vec<_>>(),
        "Module order resolved"
    );

    let mut prepared = Vec::with_capacity(order.len());
    for module in &order {
        let result = module.prepare()?;
        info!(
            module = %result.name,
            start = %result.window.start,
            end = %result.window.end,
            linked = result.link.map_or(0, |report| report.transferred),
            namelist = ?result.namelist,
            "Module ready"
        );
        prepared.push(result);
    }
    Ok(prepared)
}
