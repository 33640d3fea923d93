//! Mirroring a module's source tree into its active directory.
//!
//! WRF and WPS are run from a per-run working directory that links back to
//! the installed executables and tables. Outputs, logs, namelists and build
//! sources from the installation are left behind so that each run starts
//! clean and writes its own.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, trace};
use walkdir::WalkDir;

/// Directory name never mirrored into an active directory.
pub const SOURCE_DIR_NAME: &str = "src";

/// Whether a file should be left out of a module's active directory.
///
/// Excluded (case-insensitive): model output (`wrf*` with no extension),
/// MPI logs (`rsl.out*`, `rsl.error*`), namelists and readmes, Fortran and C
/// sources and objects (extension starting with `f` or `c`), and `.log`
/// files. The extension is the text after the last `.`, or the whole name
/// when there is none. C-shell scripts (`.csh`) are always kept.
///
/// ```
/// use wrfrun_core::should_exclude;
///
/// assert!(should_exclude("wrfout_d01"));
/// assert!(should_exclude("namelist.input"));
/// assert!(!should_exclude("link_grib.csh"));
/// assert!(!should_exclude("run.sh"));
/// ```
pub fn should_exclude(filename: &str) -> bool {
    let name = filename.to_ascii_lowercase();
    let extension = name.rsplit_once('.').map_or(name.as_str(), |(_, extension)| extension);
    if extension == "csh" {
        return false;
    }
    if name.starts_with("wrf") && !name.contains('.') {
        return true;
    }
    if name.starts_with("rsl.out") || name.starts_with("rsl.error") {
        return true;
    }
    name.starts_with("namelist")
        || name.starts_with("readme")
        || extension.starts_with('f')
        || extension.starts_with('c')
        || extension == "log"
}

/// How files are placed in the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferAction {
    /// Symbolic link to the absolute source path.
    #[default]
    Symlink,
    /// Independent copy of the file contents.
    Copy,
}

/// What a [`mirror_tree`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorReport {
    /// Directories created in the destination.
    pub directories: usize,
    /// Files linked or copied.
    pub transferred: usize,
    /// Files left alone because the destination already had an entry.
    pub existing: usize,
    /// Files rejected by the file filter.
    pub excluded: usize,
    /// Directories rejected by the directory filter (with their contents).
    pub pruned: usize,
}

/// Recreate the directory structure of `source` under `destination` and
/// place every accepted file there with `action`.
///
/// `include_file` and `include_dir` receive entry file names. A rejected
/// directory is skipped with everything below it. Entries that already
/// exist in the destination are left untouched, so repeated calls are
/// harmless. Symbolic links inside `source` are mirrored, not followed.
///
/// # Errors
///
/// Returns the first I/O error met while walking or writing.
pub fn mirror_tree(
    source: &Path,
    destination: &Path,
    action: TransferAction,
    include_file: impl Fn(&str) -> bool,
    include_dir: impl Fn(&str) -> bool,
) -> io::Result<MirrorReport> {
    let source = fs::canonicalize(source)?;
    fs::create_dir_all(destination)?;
    let mut report = MirrorReport::default();

    let mut pruned = 0_usize;
    let walker = WalkDir::new(&source)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() || include_dir(&entry.file_name().to_string_lossy()) {
                return true;
            }
            trace!(path = %entry.path().display(), "directory pruned");
            pruned = pruned.saturating_add(1);
            false
        });

    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(&source).map_err(io::Error::other)?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            if !target.exists() {
                fs::create_dir_all(&target)?;
                report.directories = report.directories.saturating_add(1);
            }
            continue;
        }

        if !include_file(&entry.file_name().to_string_lossy()) {
            report.excluded = report.excluded.saturating_add(1);
            continue;
        }
        if fs::symlink_metadata(&target).is_ok() {
            report.existing = report.existing.saturating_add(1);
            continue;
        }
        match action {
            TransferAction::Symlink => symlink(entry.path(), &target)?,
            TransferAction::Copy => {
                fs::copy(entry.path(), &target)?;
            }
        }
        report.transferred = report.transferred.saturating_add(1);
    }
    report.pruned = pruned;

    debug!(
        source = %source.display(),
        destination = %destination.display(),
        transferred = report.transferred,
        existing = report.existing,
        excluded = report.excluded,
        "tree mirrored"
    );
    Ok(report)
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}
