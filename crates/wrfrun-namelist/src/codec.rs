//! [`NamelistCodec`]: how namelist files are read from and written to disk.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::NamelistError;
use crate::namelist::Namelist;

/// Reads and writes namelist files.
///
/// Modules hold a codec rather than calling the parser directly so that
/// alternative on-disk formats can be substituted.
pub trait NamelistCodec: fmt::Debug + Send + Sync {
    /// Read and parse the file at `path`.
    fn read(&self, path: &Path) -> Result<Namelist, NamelistError>;

    /// Write `namelist` to `path`, replacing any existing file.
    fn write(&self, namelist: &Namelist, path: &Path) -> Result<(), NamelistError>;
}

/// Plain Fortran namelist text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FortranCodec;

impl NamelistCodec for FortranCodec {
    fn read(&self, path: &Path) -> Result<Namelist, NamelistError> {
        let text = fs::read_to_string(path).map_err(|source| NamelistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let namelist = Namelist::parse(&text).map_err(|err| err.in_file(path))?;
        debug!(path = %path.display(), groups = namelist.len(), "namelist read");
        Ok(namelist)
    }

    fn write(&self, namelist: &Namelist, path: &Path) -> Result<(), NamelistError> {
        fs::write(path, namelist.to_string()).map_err(|source| NamelistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), groups = namelist.len(), "namelist written");
        Ok(())
    }
}
