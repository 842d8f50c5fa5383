use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, glob_with};
use thiserror::Error;

use crate::domain::intensity_table::IntensityTableError;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse CSV in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("malformed input in {path}: {reason}")]
    MalformedInput { path: String, reason: MalformedInput },
    #[error("inconsistent intensity data: {0}")]
    IntensityTable(#[from] IntensityTableError),
}

impl LoaderError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn malformed(path: &Path, reason: MalformedInput) -> Self {
        Self::MalformedInput {
            path: path.display().to_string(),
            reason,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedInput {
    #[error("missing header row")]
    MissingHeader,
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },
    #[error("missing column {0:?}")]
    MissingColumn(&'static str),
}

/// A data row that could not be turned into a record. The rest of its file
/// is still used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub file: String,
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Files directly inside `dir` with the given extension, sorted by path.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, LoaderError> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        extension
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut paths: Vec<PathBuf> = glob_with(&pattern, options)?
        .flatten()
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    tracing::debug!(
        dir = %dir.display(),
        extension,
        files = paths.len(),
        "source files discovered"
    );

    Ok(paths)
}
