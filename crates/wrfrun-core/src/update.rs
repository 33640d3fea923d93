//! Module kinds and how each rewrites its namelist for a run window.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use wrfrun_namelist::{Namelist, NamelistValue};
use wrfrun_timing::{CalendarTime, TimeWindow, TimingError, TimingField};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Directory under a WRF module's active directory that receives history files.
pub const OUTPUT_DIR_NAME: &str = "output";

/// File name pattern WRF expands for each history file.
const HISTORY_PATTERN: &str = "wrfout_d<domain>_<date>";

/// Directories a namelist's relative paths are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulePaths<'a> {
    /// The module's configured source directory, if any.
    pub source: Option<&'a Path>,
    /// The module's active directory for this run.
    pub active: &'a Path,
}

impl ModulePaths<'_> {
    /// Base for relative input paths: the source directory when configured,
    /// else the active directory.
    pub const fn base(&self) -> &Path {
        match self.source {
            Some(source) => source,
            None => self.active,
        }
    }
}

/// What a module runs, which decides how its namelist is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// The WRF model (`namelist.input`, group `time_control`).
    Wrf,
    /// The WRF Preprocessing System (`namelist.wps`, group `share`).
    Wps,
    /// Anything else; its namelist is passed through unchanged.
    Generic,
}

impl ModuleKind {
    /// Kind from an explicit `kind` setting, else from the module name,
    /// else [`ModuleKind::Generic`].
    pub fn detect(explicit: Option<&str>, name: &str) -> Option<Self> {
        match explicit {
            Some(kind) => kind.parse().ok(),
            None => Some(name.parse().unwrap_or(Self::Generic)),
        }
    }

    /// Configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wrf => "wrf",
            Self::Wps => "wps",
            Self::Generic => "generic",
        }
    }

    /// Rewrite the time and path entries of `namelist` for `window`.
    ///
    /// Raw window fields are written as they are, so clamp-mode values such
    /// as hour 26 reach the namelist unchanged.
    ///
    /// - WRF: `time_control` run length, per-domain start and end fields,
    ///   and `history_outname` under `<active>/output/`.
    /// - WPS: `share` start and end dates; `geogrid.geog_data_path` and
    ///   `metgrid.opt_output_from_metgrid_path`, when present, are resolved
    ///   against [`ModulePaths::base`].
    ///
    /// Written paths are lexically normalised; they are absolute when
    /// `paths` are.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] if the window length cannot be
    /// computed or the window ends before it starts.
    pub fn rewrite(
        self,
        namelist: &mut Namelist,
        window: &TimeWindow,
        paths: &ModulePaths<'_>,
    ) -> Result<(), TimingError> {
        match self {
            Self::Wrf => rewrite_wrf(namelist, window, paths),
            Self::Wps => {
                rewrite_wps(namelist, window, paths);
                Ok(())
            }
            Self::Generic => Ok(()),
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wrf" => Ok(Self::Wrf),
            "wps" => Ok(Self::Wps),
            "generic" => Ok(Self::Generic),
            other => Err(format!("unknown module kind '{other}'")),
        }
    }
}

/// Domain count from `group.max_dom`; at least one.
fn domain_count(namelist: &Namelist, group: &str) -> usize {
    namelist
        .first_integer(group, "max_dom")
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or(1)
        .max(1)
}

fn rewrite_wrf(namelist: &mut Namelist, window: &TimeWindow, paths: &ModulePaths<'_>) -> Result<(), TimingError> {
    let domains = domain_count(namelist, "domains");
    let total = window.length()?.num_seconds();
    if total < 0 {
        return Err(TimingError::OutOfRange {
            detail: format!("window ends before it starts: {} .. {}", window.start, window.end),
        });
    }
    let run = [
        ("run_days", total.checked_div(SECONDS_PER_DAY)),
        (
            "run_hours",
            total
                .checked_rem(SECONDS_PER_DAY)
                .and_then(|rest| rest.checked_div(SECONDS_PER_HOUR)),
        ),
        (
            "run_minutes",
            total
                .checked_rem(SECONDS_PER_HOUR)
                .and_then(|rest| rest.checked_div(SECONDS_PER_MINUTE)),
        ),
        ("run_seconds", total.checked_rem(SECONDS_PER_MINUTE)),
    ];

    let group = namelist.group_or_insert("time_control");
    for (key, value) in run {
        group.set(key, vec![NamelistValue::Integer(value.unwrap_or(0))]);
    }
    for (prefix, time) in [("start", &window.start), ("end", &window.end)] {
        for field in TimingField::ALL {
            group.set(&format!("{prefix}_{}", field.singular()), per_domain(integer(time, field), domains));
        }
    }
    let output = normalize(&paths.active.join(OUTPUT_DIR_NAME)).join(HISTORY_PATTERN);
    group.set("history_outname", vec![path_value(&output)]);
    Ok(())
}

fn rewrite_wps(namelist: &mut Namelist, window: &TimeWindow, paths: &ModulePaths<'_>) {
    let domains = domain_count(namelist, "share");
    let group = namelist.group_or_insert("share");
    group.set("start_date", per_domain(NamelistValue::Str(window.start.to_string()), domains));
    group.set("end_date", per_domain(NamelistValue::Str(window.end.to_string()), domains));

    for (section, key) in [("geogrid", "geog_data_path"), ("metgrid", "opt_output_from_metgrid_path")] {
        resolve_first_path(namelist, section, key, paths.base());
    }
}

/// Replace the first value of `group.key` with that path resolved against
/// `base`. Absent keys and non-string values are left alone.
fn resolve_first_path(namelist: &mut Namelist, group: &str, key: &str, base: &Path) {
    let Some(mut values) = namelist.get(group, key).map(<[NamelistValue]>::to_vec) else {
        return;
    };
    let Some(first) = values.first_mut() else {
        return;
    };
    let Some(resolved) = first.as_str().map(|relative| normalize(&base.join(relative))) else {
        return;
    };
    *first = path_value(&resolved);
    namelist.set(group, key, values);
}

/// Lexical normalisation: drops `.` and folds `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

fn path_value(path: &Path) -> NamelistValue {
    NamelistValue::Str(path.to_string_lossy().into_owned())
}

const fn integer(time: &CalendarTime, field: TimingField) -> NamelistValue {
    NamelistValue::Integer(time.get(field))
}

fn per_domain(value: NamelistValue, domains: usize) -> Vec<NamelistValue> {
    vec![value; domains]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn window(start: CalendarTime, end: CalendarTime) -> TimeWindow {
        TimeWindow { start, end }
    }

    fn paths() -> ModulePaths<'static> {
        ModulePaths {
            source: Some(Path::new("/data/WPS")),
            active: Path::new("/runs/2024-03-01_00-00-00/wrf"),
        }
    }

    #[test]
    fn kind_detection() {
        assert_eq!(ModuleKind::detect(None, "wrf"), Some(ModuleKind::Wrf));
        assert_eq!(ModuleKind::detect(None, "WPS"), Some(ModuleKind::Wps));
        assert_eq!(ModuleKind::detect(None, "postprocess"), Some(ModuleKind::Generic));
        assert_eq!(ModuleKind::detect(Some("wrf"), "model"), Some(ModuleKind::Wrf));
        assert_eq!(ModuleKind::detect(Some("grads"), "wrf"), None);
    }

    #[test]
    fn wrf_time_control_is_rewritten_per_domain() {
        let mut namelist = Namelist::parse(
            "&time_control run_hours = 12, start_year = 2019, /\n&domains max_dom = 2, /",
        )
        .unwrap();
        let run = window(
            CalendarTime::new(2024, 3, 1, 0, 0, 0),
            CalendarTime::new(2024, 3, 2, 12, 30, 15),
        );
        ModuleKind::Wrf.rewrite(&mut namelist, &run, &paths()).unwrap();

        assert_eq!(namelist.first_integer("time_control", "run_days"), Some(1));
        assert_eq!(namelist.first_integer("time_control", "run_hours"), Some(12));
        assert_eq!(namelist.first_integer("time_control", "run_minutes"), Some(30));
        assert_eq!(namelist.first_integer("time_control", "run_seconds"), Some(15));
        assert_eq!(
            namelist.get("time_control", "start_year").unwrap(),
            vec![NamelistValue::Integer(2024); 2].as_slice()
        );
        assert_eq!(
            namelist.get("time_control", "end_day").unwrap(),
            vec![NamelistValue::Integer(2); 2].as_slice()
        );
        assert_eq!(namelist.first_integer("time_control", "end_second"), Some(15));
    }

    #[test]
    fn wrf_writes_raw_clamped_fields() {
        let mut namelist = Namelist::new();
        let run = window(
            CalendarTime::new(2024, 3, 1, 26, 0, 0),
            CalendarTime::new(2024, 3, 1, 30, 0, 0),
        );
        ModuleKind::Wrf.rewrite(&mut namelist, &run, &paths()).unwrap();
        assert_eq!(namelist.first_integer("time_control", "start_hour"), Some(26));
        assert_eq!(namelist.first_integer("time_control", "start_day"), Some(1));
        assert_eq!(namelist.first_integer("time_control", "run_hours"), Some(4));
        assert_eq!(
            namelist.get("time_control", "start_year").unwrap().len(),
            1,
            "max_dom defaults to one domain"
        );
    }

    #[test]
    fn wps_share_dates_are_rewritten() {
        let mut namelist = Namelist::parse("&share max_dom = 3, start_date = 'x', /").unwrap();
        let run = window(
            CalendarTime::new(2024, 3, 1, 6, 0, 0),
            CalendarTime::new(2024, 3, 3, 6, 0, 0),
        );
        ModuleKind::Wps.rewrite(&mut namelist, &run, &paths()).unwrap();
        assert_eq!(
            namelist.get("share", "start_date").unwrap(),
            vec![NamelistValue::from("2024-03-01_06:00:00"); 3].as_slice()
        );
        assert_eq!(
            namelist.get("share", "end_date").unwrap(),
            vec![NamelistValue::from("2024-03-03_06:00:00"); 3].as_slice()
        );
    }

    #[test]
    fn generic_leaves_namelist_alone() {
        let original = Namelist::parse("&io path = 'a', /").unwrap();
        let mut namelist = original.clone();
        let run = window(CalendarTime::new(2024, 1, 1, 0, 0, 0), CalendarTime::new(2024, 1, 2, 0, 0, 0));
        ModuleKind::Generic.rewrite(&mut namelist, &run, &paths()).unwrap();
        assert_eq!(namelist, original);
    }

    #[test]
    fn wrf_history_goes_to_the_output_directory() {
        let mut namelist = Namelist::parse("&time_control history_outname = 'old', /").unwrap();
        let run = window(CalendarTime::new(2024, 3, 1, 0, 0, 0), CalendarTime::new(2024, 3, 1, 6, 0, 0));
        let paths = ModulePaths {
            source: None,
            active: Path::new("/runs/./2024-03-01_00-00-00/wrf"),
        };
        ModuleKind::Wrf.rewrite(&mut namelist, &run, &paths).unwrap();
        assert_eq!(
            namelist.get("time_control", "history_outname").unwrap(),
            [NamelistValue::from("/runs/2024-03-01_00-00-00/wrf/output/wrfout_d<domain>_<date>")].as_slice()
        );
    }

    #[test]
    fn wrf_rejects_a_window_that_ends_first() {
        let mut namelist = Namelist::new();
        let run = window(CalendarTime::new(2024, 3, 2, 0, 0, 0), CalendarTime::new(2024, 3, 1, 0, 0, 0));
        let result = ModuleKind::Wrf.rewrite(&mut namelist, &run, &paths());
        assert!(matches!(result, Err(TimingError::OutOfRange { .. })));
        assert!(namelist.group("time_control").is_none(), "nothing is written on failure");
    }

    #[test]
    fn wps_data_paths_are_resolved_against_the_source() {
        let mut namelist = Namelist::parse(
            "&share max_dom = 1, /\n\
             &geogrid geog_data_path = '../geog', 'spare', /\n\
             &metgrid opt_output_from_metgrid_path = './', /",
        )
        .unwrap();
        let run = window(CalendarTime::new(2024, 3, 1, 0, 0, 0), CalendarTime::new(2024, 3, 1, 6, 0, 0));
        ModuleKind::Wps.rewrite(&mut namelist, &run, &paths()).unwrap();
        assert_eq!(
            namelist.get("geogrid", "geog_data_path").unwrap(),
            [NamelistValue::from("/data/geog"), NamelistValue::from("spare")].as_slice()
        );
        assert_eq!(
            namelist.get("metgrid", "opt_output_from_metgrid_path").unwrap(),
            [NamelistValue::from("/data/WPS")].as_slice()
        );
    }

    #[test]
    fn wps_paths_fall_back_to_the_active_directory() {
        let mut namelist = Namelist::parse("&geogrid geog_data_path = '/srv/geog', /\n&metgrid opt_output_from_metgrid_path = 'met', /").unwrap();
        let run = window(CalendarTime::new(2024, 3, 1, 0, 0, 0), CalendarTime::new(2024, 3, 1, 6, 0, 0));
        let paths = ModulePaths {
            source: None,
            active: Path::new("/runs/wps"),
        };
        ModuleKind::Wps.rewrite(&mut namelist, &run, &paths).unwrap();
        assert_eq!(namelist.get("geogrid", "geog_data_path").unwrap(), [NamelistValue::from("/srv/geog")].as_slice());
        assert_eq!(
            namelist.get("metgrid", "opt_output_from_metgrid_path").unwrap(),
            [NamelistValue::from("/runs/wps/met")].as_slice()
        );
    }

    #[test]
    fn wps_without_path_groups_gains_none() {
        let mut namelist = Namelist::parse("&share max_dom = 1, /").unwrap();
        let run = window(CalendarTime::new(2024, 3, 1, 0, 0, 0), CalendarTime::new(2024, 3, 1, 6, 0, 0));
        ModuleKind::Wps.rewrite(&mut namelist, &run, &paths()).unwrap();
        assert!(namelist.group("geogrid").is_none());
        assert!(namelist.group("metgrid").is_none());
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("../../a")), PathBuf::from("../../a"));
    }
}
