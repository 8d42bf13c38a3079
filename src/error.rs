//! Error types for loading, querying and reference lookups.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal dataset loading errors. Any of these aborts the session.
#[derive(Error, Debug)]
pub enum LoadError {
    /// An input file could not be opened or read
    #[error("Failed to read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required column is missing from the header row
    #[error("{table} table is missing required column '{column}'")]
    MissingColumn { table: &'static str, column: &'static str },

    /// A row could not be decoded into its typed form
    #[error("Failed to parse {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: csv::Error,
    },
}

impl LoadError {
    /// True for the "input unreadable" class, false for parse failures.
    pub fn is_file_access(&self) -> bool {
        matches!(self, LoadError::FileAccess { .. })
    }
}

/// Recoverable query errors (bad user input, never "nothing matched").
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Please enter a valid year and genre")]
    Validation,
}

/// Failures of the external reference lookup. Always swallowed by the core.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Reference request failed: {0}")]
    Http(String),

    #[error("Invalid reference response: {0}")]
    InvalidResponse(String),
}

pub type LoadResult<T> = Result<T, LoadError>;
