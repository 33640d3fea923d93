//! [`Simulation`]: the root scope of a run.
//!
//! The simulation owns the typed settings, the raw configuration tree, the
//! root [`Timing`], the base timestamp, and every [`Module`]. Modules are
//! created once during [`Simulation::from_document`] and never change
//! afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use chrono::Utc;
use indexmap::IndexMap;
use tracing::info;
use wrfrun_namelist::NamelistCodec;
use wrfrun_scope::{AttributeRegistry, Scope, ScopeError, ScopeValue, ScopedMap};
use wrfrun_timing::{CalendarTime, TimeWindow, Timing};

use crate::config::{ConfigDocument, SimulationConfig};
use crate::error::SimulationError;
use crate::module::Module;

/// `general.start` value meaning the current time.
pub const START_NOW: &str = "now";

/// A configured run: settings, timing, and modules.
#[derive(Debug)]
pub struct Simulation {
    settings: SimulationConfig,
    /// Raw configuration minus `modules`; its scope parent is the simulation.
    root: Arc<ScopedMap>,
    timing: Arc<Timing>,
    base: CalendarTime,
    active_root: PathBuf,
    modules: OnceLock<IndexMap<String, Arc<Module>>>,
    codec: Arc<dyn NamelistCodec>,
    registry: AttributeRegistry<Self>,
}

impl Simulation {
    /// Build a simulation from a loaded configuration document.
    ///
    /// The base timestamp is `general.start` (absent or `"now"` means the
    /// current UTC second). The active root is `paths.working` joined with
    /// the simulation window start, formatted `YYYY-MM-DD_HH-MM-SS`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Timing`] for a bad start time or timing
    /// section, [`SimulationError::DuplicateModule`] if two modules share a
    /// name, and [`SimulationError::Module`] if a module entry is invalid.
    pub fn from_document(
        document: ConfigDocument,
        codec: Arc<dyn NamelistCodec>,
    ) -> Result<Arc<Self>, SimulationError> {
        let ConfigDocument {
            settings,
            root,
            modules: entries,
            ..
        } = document;

        let base = base_time(settings.general.start.as_deref())?;
        let root = root.into_shared();
        let timing_parameters = root
            .get_map("timing")
            .cloned()
            .unwrap_or_else(|| ScopedMap::new().into_shared());
        let timing = Timing::new(timing_parameters, None)?;
        let start = timing.apply(&base)?.normalized()?;
        let active_root = settings.paths.working.join(start.to_string().replace(':', "-"));

        let simulation = Arc::new(Self {
            settings,
            root,
            timing,
            base,
            active_root,
            modules: OnceLock::new(),
            codec,
            registry: Self::registry(),
        });
        let scope: Weak<dyn Scope> = Arc::downgrade(&simulation) as Weak<dyn Scope>;
        simulation.root.set_parent(scope)?;

        let mut modules = IndexMap::with_capacity(entries.len());
        for entry in entries {
            if modules.contains_key(&entry.name) {
                return Err(SimulationError::DuplicateModule { name: entry.name });
            }
            let module = Module::new(Arc::downgrade(&simulation), &entry.name, entry.config)?;
            modules.insert(entry.name, module);
        }
        let count = modules.len();
        let stored = simulation.modules.set(modules).is_ok();
        debug_assert!(stored, "module registry populated twice");

        info!(
            base = %simulation.base,
            active_root = %simulation.active_root.display(),
            modules = count,
            "simulation created"
        );
        Ok(simulation)
    }

    fn registry() -> AttributeRegistry<Self> {
        AttributeRegistry::new()
            .field("timing", |simulation: &Self| {
                ScopeValue::Scope(Arc::clone(&simulation.timing) as Arc<dyn Scope>)
            })
            .field("start", |simulation: &Self| ScopeValue::from(simulation.base.to_string()))
            .field("general", |simulation: &Self| simulation.section("general"))
            .field("paths", |simulation: &Self| simulation.section("paths"))
            .field("modules", |simulation: &Self| {
                simulation
                    .modules()
                    .map(|module| {
                        (
                            module.name().to_owned(),
                            ScopeValue::Scope(Arc::clone(module) as Arc<dyn Scope>),
                        )
                    })
                    .collect::<ScopedMap>()
                    .into()
            })
    }

    fn section(&self, key: &str) -> ScopeValue {
        self.root.get(key).cloned().unwrap_or(ScopeValue::Null)
    }

    /// Typed settings.
    pub const fn settings(&self) -> &SimulationConfig {
        &self.settings
    }

    /// Raw configuration tree (everything except `modules`).
    pub const fn root(&self) -> &Arc<ScopedMap> {
        &self.root
    }

    /// The top-level timing every module timing inherits from.
    pub const fn timing(&self) -> &Arc<Timing> {
        &self.timing
    }

    /// The base timestamp module timings are applied to.
    pub const fn base(&self) -> CalendarTime {
        self.base
    }

    /// The simulation-level window.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Timing`] if the timing cannot be evaluated.
    pub fn window(&self) -> Result<TimeWindow, SimulationError> {
        Ok(self.timing.window(&self.base)?)
    }

    /// Look up a module by name.
    pub fn module(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.get()?.get(name)
    }

    /// All modules, in declaration order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.get().into_iter().flat_map(IndexMap::values)
    }

    /// The configured source directory of a module, from `paths.sources`.
    pub fn source_path(&self, name: &str) -> Option<&Path> {
        self.settings.paths.sources.get(name).map(PathBuf::as_path)
    }

    /// Directory this run works in.
    pub fn active_root(&self) -> &Path {
        &self.active_root
    }

    /// A module's working directory for this run.
    pub fn active_path(&self, name: &str) -> PathBuf {
        self.active_root.join(name)
    }

    /// Codec used for module namelists.
    pub fn codec(&self) -> &dyn NamelistCodec {
        self.codec.as_ref()
    }

    /// Modules ordered so that every module comes after its dependencies.
    /// Independent modules keep their declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownModule`] for an undeclared
    /// dependency and [`SimulationError::DependencyCycle`] if the graph has
    /// a cycle.
    pub fn execution_order(&self) -> Result<Vec<Arc<Module>>, SimulationError> {
        let mut marks = HashMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();
        for module in self.modules() {
            self.visit(module, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        module: &'a Arc<Module>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<Arc<Module>>,
    ) -> Result<(), SimulationError> {
        match marks.get(module.name()) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let cycle_start = path.iter().position(|name| *name == module.name()).unwrap_or(0);
                let cycle = path
                    .iter()
                    .skip(cycle_start)
                    .chain(std::iter::once(&module.name()))
                    .map(|name| (*name).to_owned())
                    .collect();
                return Err(SimulationError::DependencyCycle { cycle });
            }
            None => {}
        }

        marks.insert(module.name(), Mark::Visiting);
        path.push(module.name());
        for dependency in module.dependency_names() {
            let next = self
                .module(dependency)
                .ok_or_else(|| SimulationError::UnknownModule {
                    name: dependency.clone(),
                    required_by: module.name().to_owned(),
                })?;
            self.visit(next, marks, path, order)?;
        }
        path.pop();
        marks.insert(module.name(), Mark::Done);
        order.push(Arc::clone(module));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl Scope for Simulation {
    fn parent(&self) -> Option<Arc<dyn Scope>> {
        None
    }

    fn has_value_by_name(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError> {
        self.registry.resolve(self, name)
    }
}

/// Parse `general.start`, treating absent and `"now"` as the current UTC
/// second.
fn base_time(start: Option<&str>) -> Result<CalendarTime, SimulationError> {
    match start.map(str::trim).filter(|text| !text.eq_ignore_ascii_case(START_NOW)) {
        None => Ok(now()),
        Some(text) => Ok(CalendarTime::parse(text)?),
    }
}

fn now() -> CalendarTime {
    CalendarTime::from_datetime(Utc::now().naive_utc())
}
