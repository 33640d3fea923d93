//! End-to-end tests: a configuration on disk, source trees, and prepared
//! active directories.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier, Weak};

use tempfile::TempDir;
use wrfrun_core::{ConfigDocument, MirrorReport, ModuleError, ModuleKind, Simulation, SimulationError};
use wrfrun_namelist::{FortranCodec, NamelistCodec, NamelistValue};
use wrfrun_scope::{Scope, ScopeValue, depth, lookup};
use wrfrun_timing::CalendarTime;

const CONFIG: &str = r#"{
    "general": { "start": "2024-03-01_14:40:00" },
    "paths": { "working": "runs", "sources": { "wrf": "WRF/run", "wps": "WPS" } },
    "timing": { "rounding": { "magnitude": "day" }, "duration": { "days": 1 } },
    "modules": [
        { "name": "wps", "module": { "namelist": "namelist.wps" } },
        {
            "name": "wrf",
            "module": { "namelist": "namelist.input", "dependencies": "wps" },
            "timing": { "offset": { "hours": 6 }, "duration": { "days": 0, "hours": 36 } }
        },
        { "name": "post", "module": { "dependencies": ["wrf", "wps"] } }
    ]
}"#;

const NAMELIST_INPUT: &str = "\
&time_control
 run_days = 0,
 run_hours = 12,
 start_year = 2019, 2019,
 history_interval = 180, 60,
/

&domains
 max_dom = 2,
/
";

const NAMELIST_WPS: &str = "\
&share
 wrf_core = 'ARW',
 max_dom = 1,
 start_date = '2019-09-04_12:00:00',
 end_date = '2019-09-06_00:00:00',
/

&geogrid
 geog_data_path = '../geog',
/
";

fn touch(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, contents).expect("write file");
}

/// A WRF `run` directory and a WPS directory under a fresh temp dir.
fn installation() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let wrf = dir.path().join("WRF/run");
    touch(&wrf.join("namelist.input"), NAMELIST_INPUT);
    touch(&wrf.join("wrf.exe"), "");
    touch(&wrf.join("real.exe"), "");
    touch(&wrf.join("link_grib.csh"), "");
    touch(&wrf.join("wrfout_d01_2019"), "");
    touch(&wrf.join("rsl.out.0000"), "");
    touch(&wrf.join("tables/GENPARM.TBL"), "");
    touch(&wrf.join("src/module_io.F"), "");

    let wps = dir.path().join("WPS");
    touch(&wps.join("namelist.wps"), NAMELIST_WPS);
    touch(&wps.join("geogrid.exe"), "");
    dir
}

fn simulation(dir: &TempDir) -> Arc<Simulation> {
    let document = ConfigDocument::parse_in(CONFIG, dir.path()).expect("config");
    Simulation::from_document(document, Arc::new(FortranCodec)).expect("simulation")
}

#[test]
fn windows_follow_the_timing_chain() {
    let dir = installation();
    let sim = simulation(&dir);

    let window = sim.window().unwrap();
    assert_eq!(window.start, CalendarTime::new(2024, 3, 1, 0, 0, 0));
    assert_eq!(window.end, CalendarTime::new(2024, 3, 2, 0, 0, 0));
    assert_eq!(
        sim.active_root(),
        dir.path().join("runs/2024-03-01_00-00-00")
    );

    let wps = sim.module("wps").unwrap().window().unwrap();
    assert_eq!(wps, window);

    let wrf = sim.module("wrf").unwrap().window().unwrap();
    assert_eq!(wrf.start, CalendarTime::new(2024, 3, 1, 0, 0, 0));
    assert_eq!(wrf.end, CalendarTime::new(2024, 3, 2, 12, 0, 0));
}

#[test]
fn module_values_are_cached() {
    let dir = installation();
    let sim = simulation(&dir);
    let wrf = sim.module("wrf").unwrap();

    assert!(Arc::ptr_eq(wrf.timing().unwrap(), wrf.timing().unwrap()));
    let first = wrf.namelist().unwrap().unwrap();
    let second = wrf.namelist().unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.first_integer("domains", "max_dom"), Some(2));

    let parent = wrf.timing().unwrap().parent_timing().unwrap();
    assert!(Arc::ptr_eq(parent, sim.timing()));
}

#[test]
fn dependencies_resolve_to_shared_modules() {
    let dir = installation();
    let sim = simulation(&dir);

    let post = sim.module("post").unwrap();
    let dependencies = post.dependencies().unwrap();
    let names: Vec<&str> = dependencies.iter().map(|module| module.name()).collect();
    assert_eq!(names, vec!["wrf", "wps"]);
    assert!(Arc::ptr_eq(&dependencies[1], sim.module("wps").unwrap()));
    assert_eq!(post.kind(), ModuleKind::Generic);

    let order: Vec<String> = sim
        .execution_order()
        .unwrap()
        .iter()
        .map(|module| module.name().to_owned())
        .collect();
    assert_eq!(order, vec!["wps", "wrf", "post"]);
}

#[test]
fn unknown_dependency_fails_on_access() {
    let dir = installation();
    let document = ConfigDocument::parse_in(
        r#"{"general": {"start": "2024-01-01_00:00:00"},
            "modules": [{"name": "wrf", "module": {"dependencies": "real"}}]}"#,
        dir.path(),
    )
    .unwrap();
    let sim = Simulation::from_document(document, Arc::new(FortranCodec)).unwrap();
    let wrf = sim.module("wrf").unwrap();
    assert!(matches!(
        wrf.dependencies(),
        Err(ModuleError::UnknownDependency { dependency, .. }) if dependency == "real"
    ));
    assert!(matches!(
        sim.execution_order(),
        Err(SimulationError::UnknownModule { name, required_by }) if name == "real" && required_by == "wrf"
    ));
}

#[test]
fn scope_chain_reaches_the_simulation() {
    let dir = installation();
    let sim = simulation(&dir);
    let wrf = sim.module("wrf").unwrap();

    let parameters = wrf.parameters();
    assert_eq!(depth(parameters.as_ref()), 2);
    assert_eq!(
        lookup(parameters.as_ref(), "start").unwrap(),
        ScopeValue::from("2024-03-01_14:40:00")
    );
    assert_eq!(lookup(parameters.as_ref(), "kind").unwrap(), ScopeValue::from("wrf"));

    let namelist = lookup(parameters.as_ref(), "namelist").unwrap();
    let groups = namelist.as_map().unwrap();
    assert_eq!(groups.get_map("domains").unwrap().get_i64("max_dom"), Some(2));

    let dependencies = wrf.value_by_name("dependencies").unwrap();
    assert_eq!(dependencies.as_list().unwrap().len(), 1);
}

#[test]
fn prepare_links_sources_and_writes_namelists() {
    let dir = installation();
    let sim = simulation(&dir);
    let active = sim.active_root().to_path_buf();

    let wrf = sim.module("wrf").unwrap().prepare().unwrap();
    let report = wrf.link.unwrap();
    assert_eq!(report.transferred, 4);
    assert_eq!(report.excluded, 3);
    assert_eq!(report.pruned, 1);
    assert_eq!(report.directories, 1);

    let run = active.join("wrf");
    let source = fs::canonicalize(dir.path().join("WRF/run")).unwrap();
    assert_eq!(fs::read_link(run.join("wrf.exe")).unwrap(), source.join("wrf.exe"));
    assert!(fs::symlink_metadata(run.join("link_grib.csh")).unwrap().file_type().is_symlink());
    assert!(run.join("tables/GENPARM.TBL").exists());
    assert!(!run.join("src").exists());
    assert!(!run.join("wrfout_d01_2019").exists());
    assert!(!run.join("rsl.out.0000").exists());

    let written = wrf.namelist.unwrap();
    assert_eq!(written, run.join("namelist.input"));
    assert!(!fs::symlink_metadata(&written).unwrap().file_type().is_symlink());
    let namelist = FortranCodec.read(&written).unwrap();
    assert_eq!(namelist.first_integer("time_control", "run_days"), Some(1));
    assert_eq!(namelist.first_integer("time_control", "run_hours"), Some(12));
    assert_eq!(
        namelist.get("time_control", "start_year").unwrap(),
        vec![NamelistValue::Integer(2024); 2].as_slice()
    );
    assert_eq!(
        namelist.get("time_control", "end_hour").unwrap(),
        vec![NamelistValue::Integer(12); 2].as_slice()
    );
    assert_eq!(
        namelist.get("time_control", "history_interval").unwrap(),
        [NamelistValue::Integer(180), NamelistValue::Integer(60)].as_slice()
    );

    assert_eq!(
        namelist.get("time_control", "history_outname").unwrap(),
        [NamelistValue::from(
            run.join("output/wrfout_d<domain>_<date>").to_str().unwrap()
        )]
        .as_slice()
    );
    assert!(run.join("output").is_dir());

    let source_namelist = fs::read_to_string(dir.path().join("WRF/run/namelist.input")).unwrap();
    assert_eq!(source_namelist, NAMELIST_INPUT);

    let wps = sim.module("wps").unwrap().prepare().unwrap();
    let namelist = FortranCodec.read(&wps.namelist.unwrap()).unwrap();
    assert_eq!(
        namelist.get("share", "start_date").unwrap(),
        [NamelistValue::from("2024-03-01_00:00:00")].as_slice()
    );
    assert_eq!(
        namelist.get("share", "end_date").unwrap(),
        [NamelistValue::from("2024-03-02_00:00:00")].as_slice()
    );
    assert_eq!(
        namelist.get("geogrid", "geog_data_path").unwrap(),
        [NamelistValue::from(dir.path().join("geog").to_str().unwrap())].as_slice()
    );
    assert!(!active.join("wps/output").exists());
}

#[test]
fn linking_twice_leaves_existing_entries() {
    let dir = installation();
    let sim = simulation(&dir);
    let wrf = sim.module("wrf").unwrap();

    let first = wrf.link_to_working_directory().unwrap();
    let second = wrf.link_to_working_directory().unwrap();
    assert_eq!(first.transferred, 4);
    assert_eq!(second.transferred, 0);
    assert_eq!(second.existing, 4);
}

#[test]
fn module_without_source_gets_an_empty_active_directory() {
    let dir = installation();
    let sim = simulation(&dir);
    let post = sim.module("post").unwrap();

    let prepared = post.prepare().unwrap();
    assert_eq!(prepared.link, Some(MirrorReport::default()));
    assert!(prepared.namelist.is_none());
    assert!(sim.active_path("post").is_dir());
    assert_eq!(fs::read_dir(sim.active_path("post")).unwrap().count(), 0);

    assert_eq!(post.link_to_working_directory().unwrap(), MirrorReport::default());
}

#[test]
fn cyclic_modules_are_freed_with_the_simulation() {
    let dir = installation();
    let document = ConfigDocument::parse_in(
        r#"{"general": {"start": "2024-01-01_00:00:00"},
            "modules": [
                {"name": "a", "module": {"dependencies": "b"}},
                {"name": "b", "module": {"dependencies": "a"}}
            ]}"#,
        dir.path(),
    )
    .unwrap();
    let sim = Simulation::from_document(document, Arc::new(FortranCodec)).unwrap();
    let a = sim.module("a").unwrap();
    let b = sim.module("b").unwrap();
    assert!(Arc::ptr_eq(&a.dependencies().unwrap()[0], b));
    assert!(Arc::ptr_eq(&b.dependencies().unwrap()[0], a));
    assert!(matches!(sim.execution_order(), Err(SimulationError::DependencyCycle { .. })));

    let weak_a: Weak<_> = Arc::downgrade(a);
    let weak_b: Weak<_> = Arc::downgrade(b);
    drop(sim);
    assert!(weak_a.upgrade().is_none());
    assert!(weak_b.upgrade().is_none());
}

#[test]
fn features_switch_off_preparation_steps() {
    let dir = installation();
    let json = CONFIG.replace(
        r#""general": { "start": "2024-03-01_14:40:00" }"#,
        r#""general": { "start": "2024-03-01_14:40:00", "features": { "link": false, "namelists": false } }"#,
    );
    let document = ConfigDocument::parse_in(&json, dir.path()).unwrap();
    let sim = Simulation::from_document(document, Arc::new(FortranCodec)).unwrap();

    let prepared = sim.module("wrf").unwrap().prepare().unwrap();
    assert!(prepared.link.is_none());
    assert!(prepared.namelist.is_none());
    assert!(!sim.active_path("wrf").exists());
}

#[test]
fn concurrent_first_access_shares_one_value() {
    let dir = installation();
    let sim = simulation(&dir);
    let wrf = sim.module("wrf").unwrap();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    let timing = Arc::clone(wrf.timing().unwrap());
                    let namelist = wrf.namelist().unwrap().unwrap();
                    (timing, namelist)
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let (timing, namelist) = &results[0];
    for (other_timing, other_namelist) in &results {
        assert!(Arc::ptr_eq(timing, other_timing));
        assert!(Arc::ptr_eq(namelist, other_namelist));
    }
}

#[test]
fn configuration_file_paths_resolve_against_its_directory() {
    let dir = installation();
    let path = dir.path().join("configuration.json");
    fs::write(&path, CONFIG).unwrap();

    let document = ConfigDocument::from_file(&path).unwrap();
    assert_eq!(document.base_dir, dir.path());
    assert_eq!(
        document.settings.paths.sources["wps"],
        dir.path().join("WPS")
    );
}
