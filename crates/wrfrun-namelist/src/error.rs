//! Error types for the `wrfrun-namelist` crate.

use std::path::PathBuf;

/// Errors that can occur while reading, parsing, or writing namelists.
#[derive(Debug, thiserror::Error)]
pub enum NamelistError {
    /// A namelist file could not be read or written.
    #[error("namelist I/O failed for {}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Namelist text is malformed.
    #[error("namelist syntax error on line {line}: {message}")]
    Parse {
        /// 1-based line number where the problem was found.
        line: usize,
        /// What is wrong.
        message: String,
    },

    /// A namelist file is malformed.
    #[error("namelist syntax error in {}: line {line}: {message}", path.display())]
    ParseFile {
        /// The file being parsed.
        path: PathBuf,
        /// 1-based line number where the problem was found.
        line: usize,
        /// What is wrong.
        message: String,
    },
}

impl NamelistError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Attach a file path to a text-level parse error.
    #[must_use]
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Parse { line, message } => Self::ParseFile {
                path: path.into(),
                line,
                message,
            },
            other => other,
        }
    }
}
