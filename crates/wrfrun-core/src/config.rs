//! Configuration loading for a wrfrun simulation.
//!
//! A run is described by one JSON document:
//!
//! ```json
//! {
//!   "general": { "start": "2024-03-01T12:00:00",
//!                "features": { "link": true, "namelists": true } },
//!   "paths": { "working": "runs", "sources": { "wrf": "/opt/WRF/run" } },
//!   "timing": { "offset": { "hours": -6 }, "rounding": { "magnitude": "day" },
//!               "duration": { "days": 2 } },
//!   "modules": [ { "name": "wrf", "module": { "namelist": "namelist.input" } } ]
//! }
//! ```
//!
//! The `general` and `paths` sections are also read into typed settings
//! ([`SimulationConfig`]). Everything except `modules` stays available as a
//! raw scoped map, and each module entry is kept as raw JSON so that the
//! module can own its own scope tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use wrfrun_scope::ScopedMap;

use crate::error::ConfigError;

/// Environment variable overriding `paths.working`.
pub const WORKING_DIR_ENV: &str = "WRF_RUNNER_WORKING_DIR";

/// Environment variable overriding `general.start`.
pub const START_ENV: &str = "WRF_RUNNER_START";

/// Typed settings read from the `general` and `paths` sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Start time and feature toggles.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Working and source directories.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The `general` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GeneralConfig {
    /// Base timestamp (`YYYY-MM-DD_HH:MM:SS`, ISO `T` form, or `"now"`).
    /// Absent means now.
    #[serde(default)]
    pub start: Option<String>,

    /// Which preparation steps run.
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Preparation steps that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeaturesConfig {
    /// Mirror module source trees into the active directory.
    #[serde(default = "default_true")]
    pub link: bool,

    /// Rewrite and write module namelists.
    #[serde(default = "default_true")]
    pub namelists: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            link: default_true(),
            namelists: default_true(),
        }
    }
}

/// The `paths` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathsConfig {
    /// Root under which each run gets a timestamped directory.
    #[serde(default = "default_working_dir")]
    pub working: PathBuf,

    /// Source directory per module name.
    #[serde(default)]
    pub sources: BTreeMap<String, PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            working: default_working_dir(),
            sources: BTreeMap::new(),
        }
    }
}

impl SimulationConfig {
    /// Resolve relative paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        self.paths.working = resolve(base_dir, &self.paths.working);
        for source in self.paths.sources.values_mut() {
            *source = resolve(base_dir, source);
        }
    }

    /// Override settings from the process environment:
    /// - `WRF_RUNNER_WORKING_DIR` overrides `paths.working`
    /// - `WRF_RUNNER_START` overrides `general.start`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override settings from an arbitrary variable source.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(working) = var(WORKING_DIR_ENV) {
            self.paths.working = PathBuf::from(working);
        }
        if let Some(start) = var(START_ENV) {
            self.general.start = Some(start);
        }
    }
}

/// One entry of the `modules` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEntry {
    /// Module name, unique within the simulation.
    pub name: String,
    /// The entry's raw JSON (`module`, `timing`, `parameters`, ...).
    pub config: Map<String, Value>,
}

/// A loaded configuration document.
#[derive(Debug)]
pub struct ConfigDocument {
    /// Typed settings with paths resolved and overrides applied.
    pub settings: SimulationConfig,
    /// Every top-level section except `modules`.
    pub root: ScopedMap,
    /// Module entries in declaration order.
    pub modules: Vec<ModuleEntry>,
    /// Directory relative paths were resolved against.
    pub base_dir: PathBuf,
}

impl ConfigDocument {
    /// Load a configuration file. Relative paths inside it resolve against
    /// the file's directory; environment overrides are applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, and
    /// [`ConfigError::Json`] or [`ConfigError::Invalid`] if its content is
    /// unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let mut document = Self::parse_in(&contents, &base_dir)?;
        document.settings.apply_env_overrides();
        Ok(document)
    }

    /// Parse a configuration string, resolving relative paths against
    /// `base_dir`. No environment overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed JSON and
    /// [`ConfigError::Invalid`] for a document of the wrong shape.
    pub fn parse_in(json: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(mut object) = value else {
            return Err(invalid("top level must be an object"));
        };

        let mut settings: SimulationConfig = serde_json::from_value(Value::Object(object.clone()))?;
        settings.resolve_paths(base_dir);

        let modules = match object.shift_remove("modules") {
            None | Some(Value::Null) => Vec::new(),
            Some(modules) => module_entries(modules)?,
        };

        Ok(Self {
            settings,
            root: ScopedMap::from_json_object(object),
            modules,
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Parse a configuration string relative to the current directory.
    ///
    /// # Errors
    ///
    /// See [`ConfigDocument::parse_in`].
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        Self::parse_in(json, Path::new("."))
    }
}

/// Accept `modules` as a list of named entries or a map keyed by name.
fn module_entries(modules: Value) -> Result<Vec<ModuleEntry>, ConfigError> {
    match modules {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let Value::Object(config) = item else {
                    return Err(invalid(format!("modules[{index}] must be an object")));
                };
                let name = config
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid(format!("modules[{index}] has no 'name' string")))?
                    .to_owned();
                Ok(ModuleEntry { name, config })
            })
            .collect(),
        Value::Object(entries) => entries
            .into_iter()
            .map(|(name, item)| {
                let Value::Object(mut config) = item else {
                    return Err(invalid(format!("modules.{name} must be an object")));
                };
                config
                    .entry("name")
                    .or_insert_with(|| Value::String(name.clone()));
                Ok(ModuleEntry { name, config })
            })
            .collect(),
        other => Err(invalid(format!(
            "modules must be a list or an object, found {other}"
        ))),
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

const fn default_true() -> bool {
    true
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("runs")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "general": { "start": "2024-03-01T12:00:00", "features": { "link": false } },
        "paths": { "working": "runs", "sources": { "wrf": "/opt/WRF/run", "wps": "WPS" } },
        "timing": { "offset": { "hours": -6 } },
        "modules": [
            { "name": "wps", "module": { "namelist": "namelist.wps" } },
            { "name": "wrf", "module": { "dependencies": "wps" } }
        ]
    }"#;

    #[test]
    fn parses_settings_and_modules() {
        let document = ConfigDocument::parse_in(EXAMPLE, Path::new("/etc/wrf")).unwrap();
        let settings = &document.settings;
        assert_eq!(settings.general.start.as_deref(), Some("2024-03-01T12:00:00"));
        assert!(!settings.general.features.link);
        assert!(settings.general.features.namelists);
        assert_eq!(settings.paths.working, PathBuf::from("/etc/wrf/runs"));
        assert_eq!(settings.paths.sources["wrf"], PathBuf::from("/opt/WRF/run"));
        assert_eq!(settings.paths.sources["wps"], PathBuf::from("/etc/wrf/WPS"));

        let names: Vec<&str> = document.modules.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["wps", "wrf"]);
        assert!(!document.root.contains_key("modules"));
        assert!(document.root.get_map("timing").is_some());
    }

    #[test]
    fn defaults_apply_to_empty_document() {
        let document = ConfigDocument::parse("{}").unwrap();
        assert_eq!(document.settings.paths.working, PathBuf::from("./runs"));
        assert!(document.settings.general.start.is_none());
        assert!(document.settings.general.features.link);
        assert!(document.modules.is_empty());
    }

    #[test]
    fn module_map_form_names_entries_by_key() {
        let document = ConfigDocument::parse(r#"{"modules": {"wps": {}, "wrf": {"timing": {}}}}"#).unwrap();
        let names: Vec<&str> = document.modules.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["wps", "wrf"]);
        assert_eq!(document.modules[1].config["name"], Value::from("wrf"));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(matches!(ConfigDocument::parse("[]"), Err(ConfigError::Invalid { .. })));
        assert!(matches!(ConfigDocument::parse("{"), Err(ConfigError::Json { .. })));
        assert!(matches!(
            ConfigDocument::parse(r#"{"modules": [{"module": {}}]}"#),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            ConfigDocument::parse(r#"{"modules": 3}"#),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn overrides_replace_working_dir_and_start() {
        let mut settings = SimulationConfig::default();
        settings.apply_overrides(|key| match key {
            WORKING_DIR_ENV => Some("/scratch/runs".to_owned()),
            START_ENV => Some("now".to_owned()),
            _ => None,
        });
        assert_eq!(settings.paths.working, PathBuf::from("/scratch/runs"));
        assert_eq!(settings.general.start.as_deref(), Some("now"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ConfigDocument::from_file(Path::new("/nonexistent/configuration.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
