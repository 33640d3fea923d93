//! [`Module`]: one unit of simulation work (WPS, WRF, post-processing).
//!
//! A module owns the slice of configuration it was declared with:
//!
//! ```json
//! { "name": "wrf",
//!   "module": { "kind": "wrf", "namelist": "namelist.input",
//!               "dependencies": ["wps"] },
//!   "timing": { "duration": { "hours": 36 } },
//!   "parameters": { } }
//! ```
//!
//! Its timing, namelist path, namelist and resolved dependencies are
//! computed on first use and cached; concurrent first callers share one
//! computation. A failed computation is not cached. Resolved dependencies
//! are held weakly; the simulation owns every module.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use tracing::{debug, info};
use wrfrun_namelist::{Namelist, NamelistValue};
use wrfrun_scope::{
    AttributeRegistry, ComputeOnce, Scope, ScopeError, ScopeValue, ScopedList, ScopedMap,
};
use wrfrun_timing::{TimeWindow, Timing};

use crate::error::ModuleError;
use crate::link::{MirrorReport, SOURCE_DIR_NAME, TransferAction, mirror_tree, should_exclude};
use crate::simulation::Simulation;
use crate::update::{ModuleKind, ModulePaths, OUTPUT_DIR_NAME};

/// Key of the module's own settings inside its entry.
const SETTINGS_KEY: &str = "module";

/// Outcome of [`Module::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedModule {
    /// The module name.
    pub name: String,
    /// The module's run window.
    pub window: TimeWindow,
    /// Mirroring result, when the source tree was linked.
    pub link: Option<MirrorReport>,
    /// Where the rewritten namelist was written, if one was.
    pub namelist: Option<PathBuf>,
}

/// A configured unit of simulation work.
pub struct Module {
    name: String,
    kind: ModuleKind,
    /// The whole entry; its scope parent is this module.
    parameters: Arc<ScopedMap>,
    /// The `module` sub-map (empty when absent).
    settings: Arc<ScopedMap>,
    dependency_names: Vec<String>,
    simulation: Weak<Simulation>,
    timing: ComputeOnce<Arc<Timing>>,
    namelist_path: ComputeOnce<Option<PathBuf>>,
    namelist: ComputeOnce<Option<Arc<Namelist>>>,
    dependencies: ComputeOnce<Vec<Weak<Self>>>,
    registry: AttributeRegistry<Self>,
}

impl Module {
    /// Build a module from its configuration entry.
    ///
    /// `dependencies` may be absent, a single name, or a list of names; it
    /// is normalised to a list here. The entry's scoped map is parented to
    /// the new module.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidParameter`] for a malformed `module`
    /// section, `kind`, or `dependencies` value.
    pub fn new(
        simulation: Weak<Simulation>,
        name: &str,
        entry: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Arc<Self>, ModuleError> {
        let parameters = ScopedMap::from_json_object(entry).into_shared();
        let settings = match parameters.get(SETTINGS_KEY) {
            None | Some(ScopeValue::Null) => ScopedMap::new().into_shared(),
            Some(ScopeValue::Map(settings)) => Arc::clone(settings),
            Some(other) => return Err(invalid(name, SETTINGS_KEY, expected("a map", other))),
        };

        let kind = match settings.get("kind") {
            None | Some(ScopeValue::Null) => ModuleKind::detect(None, name),
            Some(value) => value.as_str().and_then(|kind| ModuleKind::detect(Some(kind), name)),
        }
        .ok_or_else(|| {
            let found = settings.get("kind").map_or_else(String::new, ToString::to_string);
            invalid(name, "kind", format!("expected wrf, wps or generic, found '{found}'"))
        })?;

        let dependency_names = dependency_names(name, settings.get("dependencies"))?;

        let module = Arc::new(Self {
            name: name.to_owned(),
            kind,
            parameters,
            settings,
            dependency_names,
            simulation,
            timing: ComputeOnce::new(),
            namelist_path: ComputeOnce::new(),
            namelist: ComputeOnce::new(),
            dependencies: ComputeOnce::new(),
            registry: Self::registry(),
        });
        let scope: Weak<dyn Scope> = Arc::downgrade(&module) as Weak<dyn Scope>;
        module.parameters.set_parent(scope)?;
        debug!(module = %module.name, kind = %module.kind, dependencies = ?module.dependency_names, "module created");
        Ok(module)
    }

    fn registry() -> AttributeRegistry<Self> {
        AttributeRegistry::new()
            .field("name", |module: &Self| ScopeValue::from(module.name.as_str()))
            .field("kind", |module: &Self| ScopeValue::from(module.kind.as_str()))
            .field("parameters", |module: &Self| {
                ScopeValue::Map(Arc::clone(&module.parameters))
            })
            .method("timing", |module: &Self| {
                module
                    .timing()
                    .map(|timing| ScopeValue::Scope(Arc::clone(timing) as Arc<dyn Scope>))
            })
            .method("dependencies", |module: &Self| {
                module.dependencies().map(|dependencies| {
                    dependencies
                        .iter()
                        .map(|dependency| ScopeValue::Scope(Arc::clone(dependency) as Arc<dyn Scope>))
                        .collect::<ScopedList>()
                        .into()
                })
            })
            .method("namelist", |module: &Self| {
                module
                    .namelist()
                    .map(|namelist| namelist.map_or(ScopeValue::Null, |namelist| namelist_value(&namelist)))
            })
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the module's namelist is rewritten.
    pub const fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// The raw configuration entry.
    pub const fn parameters(&self) -> &Arc<ScopedMap> {
        &self.parameters
    }

    /// The `module` settings section.
    pub const fn settings(&self) -> &Arc<ScopedMap> {
        &self.settings
    }

    /// Declared dependency names, in order.
    pub fn dependency_names(&self) -> &[String] {
        &self.dependency_names
    }

    fn simulation(&self) -> Result<Arc<Simulation>, ModuleError> {
        self.simulation
            .upgrade()
            .ok_or_else(|| ModuleError::SimulationDropped {
                module: self.name.clone(),
            })
    }

    /// The module's timing, parented to the simulation's timing.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Timing`] if the `timing` section is invalid,
    /// or [`ModuleError::InvalidParameter`] if it is not a map.
    pub fn timing(&self) -> Result<&Arc<Timing>, ModuleError> {
        self.timing.get_or_try_init(|| {
            let simulation = self.simulation()?;
            let parameters = match self.parameters.get("timing") {
                None | Some(ScopeValue::Null) => ScopedMap::new().into_shared(),
                Some(ScopeValue::Map(parameters)) => Arc::clone(parameters),
                Some(other) => return Err(invalid(&self.name, "timing", expected("a map", other))),
            };
            let timing = Timing::new(parameters, Some(Arc::clone(simulation.timing())))?;
            debug!(module = %self.name, "timing built");
            Ok(timing)
        })
    }

    /// Modules this one depends on, in declaration order. The returned
    /// handles are the simulation's own modules.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UnknownDependency`] for a name the simulation
    /// does not know and [`ModuleError::SimulationDropped`] once the
    /// simulation is gone.
    pub fn dependencies(&self) -> Result<Vec<Arc<Self>>, ModuleError> {
        let resolved = self.dependencies.get_or_try_init(|| {
            let simulation = self.simulation()?;
            self.dependency_names
                .iter()
                .map(|dependency| {
                    simulation
                        .module(dependency)
                        .map(Arc::downgrade)
                        .ok_or_else(|| ModuleError::UnknownDependency {
                            module: self.name.clone(),
                            dependency: dependency.clone(),
                        })
                })
                .collect()
        })?;
        resolved
            .iter()
            .map(|dependency| {
                dependency.upgrade().ok_or_else(|| ModuleError::SimulationDropped {
                    module: self.name.clone(),
                })
            })
            .collect()
    }

    /// Namelist location relative to the module's source and active
    /// directories, from `module.namelist`.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidParameter`] if `namelist` is not a
    /// string.
    pub fn namelist_path(&self) -> Result<Option<&Path>, ModuleError> {
        self.namelist_path
            .get_or_try_init(|| match self.settings.get("namelist") {
                None | Some(ScopeValue::Null) => Ok(None),
                Some(ScopeValue::String(path)) => Ok(Some(PathBuf::from(path))),
                Some(other) => Err(invalid(&self.name, "namelist", expected("a path string", other))),
            })
            .map(Option::as_deref)
    }

    /// The module's source namelist, read through the simulation's codec.
    ///
    /// `None` when no namelist path is configured or the module has no
    /// existing source directory.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Namelist`] if the file cannot be read or
    /// parsed.
    pub fn namelist(&self) -> Result<Option<Arc<Namelist>>, ModuleError> {
        self.namelist
            .get_or_try_init(|| {
                let Some(relative) = self.namelist_path()? else {
                    return Ok(None);
                };
                let simulation = self.simulation()?;
                let Some(source) = simulation.source_path(&self.name).filter(|source| source.is_dir()) else {
                    debug!(module = %self.name, "no source directory, namelist not read");
                    return Ok(None);
                };
                let namelist = simulation.codec().read(&source.join(relative))?;
                Ok(Some(Arc::new(namelist)))
            })
            .cloned()
    }

    /// Write `namelist` into the module's active directory.
    ///
    /// Returns the path written, or `None` when no namelist path is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Io`] if the destination directory cannot be
    /// created and [`ModuleError::Namelist`] if writing fails.
    pub fn write_namelist(&self, namelist: &Namelist) -> Result<Option<PathBuf>, ModuleError> {
        let Some(relative) = self.namelist_path()? else {
            return Ok(None);
        };
        let destination = self.simulation()?.active_path(&self.name).join(relative);
        if let Some(parent) = destination.parent() {
            create_dir(parent)?;
        }
        self.simulation()?.codec().write(namelist, &destination)?;
        Ok(Some(destination))
    }

    /// The module's run window: its timing applied to the simulation base.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Timing`] if the timing cannot be built or
    /// evaluated.
    pub fn window(&self) -> Result<TimeWindow, ModuleError> {
        let base = self.simulation()?.base();
        Ok(self.timing()?.window(&base)?)
    }

    /// A copy of the source namelist with its time entries set to
    /// [`Module::window`] and its paths made absolute (see
    /// [`ModuleKind::rewrite`]). The cached namelist is not modified.
    ///
    /// # Errors
    ///
    /// See [`Module::namelist`] and [`Module::window`]. Returns
    /// [`ModuleError::Io`] if the current directory is needed and
    /// unavailable.
    pub fn updated_namelist(&self) -> Result<Option<Namelist>, ModuleError> {
        let Some(source) = self.namelist()? else {
            return Ok(None);
        };
        let window = self.window()?;
        let simulation = self.simulation()?;
        let active = absolute(&simulation.active_path(&self.name))?;
        let source_dir = simulation.source_path(&self.name).map(absolute).transpose()?;
        let paths = ModulePaths {
            source: source_dir.as_deref(),
            active: &active,
        };
        let mut namelist = Namelist::clone(&source);
        self.kind.rewrite(&mut namelist, &window, &paths)?;
        Ok(Some(namelist))
    }

    /// Create the active directory and symlink the source tree into it,
    /// skipping `src` directories and files [`should_exclude`] rejects.
    /// A module without a configured source gets an empty active directory
    /// and an empty report.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Io`] on filesystem failures.
    pub fn link_to_working_directory(&self) -> Result<MirrorReport, ModuleError> {
        let simulation = self.simulation()?;
        let destination = simulation.active_path(&self.name);
        create_dir(&destination)?;
        let Some(source) = simulation.source_path(&self.name) else {
            debug!(module = %self.name, destination = %destination.display(), "no source path, nothing to link");
            return Ok(MirrorReport::default());
        };
        let report = mirror_tree(
            source,
            &destination,
            TransferAction::Symlink,
            |file| !should_exclude(file),
            |dir| dir != SOURCE_DIR_NAME,
        )
        .map_err(|err| ModuleError::Io {
            path: source.to_path_buf(),
            source: err,
        })?;
        info!(
            module = %self.name,
            destination = %destination.display(),
            linked = report.transferred,
            existing = report.existing,
            excluded = report.excluded,
            "source tree linked"
        );
        Ok(report)
    }

    /// Link the source tree and write the rewritten namelist, as enabled
    /// by `general.features`. A WRF module also gets the `output`
    /// directory its namelist points history files at.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step.
    pub fn prepare(&self) -> Result<PreparedModule, ModuleError> {
        let simulation = self.simulation()?;
        let features = simulation.settings().general.features;
        let window = self.window()?;

        let link = if features.link {
            Some(self.link_to_working_directory()?)
        } else {
            None
        };

        let namelist = if features.namelists {
            match self.updated_namelist()? {
                Some(namelist) => {
                    if self.kind == ModuleKind::Wrf {
                        create_dir(&simulation.active_path(&self.name).join(OUTPUT_DIR_NAME))?;
                    }
                    self.write_namelist(&namelist)?
                }
                None => None,
            }
        } else {
            None
        };

        info!(
            module = %self.name,
            start = %window.start,
            end = %window.end,
            namelist = ?namelist,
            "module prepared"
        );
        Ok(PreparedModule {
            name: self.name.clone(),
            window,
            link,
            namelist,
        })
    }
}

// Dependencies are printed by name; resolved modules may refer back here.
impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependency_names)
            .field("timing", &self.timing)
            .field("namelist_path", &self.namelist_path)
            .finish_non_exhaustive()
    }
}

impl Scope for Module {
    fn parent(&self) -> Option<Arc<dyn Scope>> {
        self.simulation
            .upgrade()
            .map(|simulation| simulation as Arc<dyn Scope>)
    }

    fn has_value_by_name(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError> {
        self.registry.resolve(self, name)
    }
}

/// Normalise `dependencies` (absent, one name, or a list of names).
fn dependency_names(module: &str, value: Option<&ScopeValue>) -> Result<Vec<String>, ModuleError> {
    match value {
        None | Some(ScopeValue::Null) => Ok(Vec::new()),
        Some(ScopeValue::String(name)) => Ok(vec![name.clone()]),
        Some(ScopeValue::List(names)) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| invalid(module, "dependencies", expected("module names", name)))
            })
            .collect(),
        Some(other) => Err(invalid(
            module,
            "dependencies",
            expected("a module name or a list of names", other),
        )),
    }
}

/// Namelist as nested scoped maps: group, then key, then a scalar or a list.
fn namelist_value(namelist: &Namelist) -> ScopeValue {
    let groups: ScopedMap = namelist
        .groups()
        .map(|(name, group)| {
            let entries: ScopedMap = group
                .iter()
                .map(|(key, values)| {
                    let value = match values {
                        [single] => scalar(single),
                        many => many.iter().map(scalar).collect::<ScopedList>().into(),
                    };
                    (key, value)
                })
                .collect();
            (name, ScopeValue::from(entries))
        })
        .collect();
    groups.into()
}

fn scalar(value: &NamelistValue) -> ScopeValue {
    match value {
        NamelistValue::Integer(value) => ScopeValue::Integer(*value),
        NamelistValue::Real(value) => ScopeValue::Float(*value),
        NamelistValue::Logical(value) => ScopeValue::Bool(*value),
        NamelistValue::Str(value) => ScopeValue::from(value.as_str()),
    }
}

fn create_dir(path: &Path) -> Result<(), ModuleError> {
    fs::create_dir_all(path).map_err(|source| ModuleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn absolute(path: &Path) -> Result<PathBuf, ModuleError> {
    std::path::absolute(path).map_err(|source| ModuleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn expected(what: &str, found: &ScopeValue) -> String {
    format!("expected {what}, found {} '{found}'", found.type_name())
}

fn invalid(module: &str, key: &str, reason: String) -> ModuleError {
    ModuleError::InvalidParameter {
        module: module.to_owned(),
        key: key.to_owned(),
        reason,
    }
}
