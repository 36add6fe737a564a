//! Crate-wide error taxonomy
//!
//! Each subsystem keeps its own narrow error type (see `store::StoreError`,
//! `parser::ParseError`, ...); this module collects them behind one enum so the
//! CLI can map any failure to an exit code and a single-line diagnostic.

use thiserror::Error;

/// Top-level error taxonomy mapping every subsystem failure to a process exit code.
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("invalid input: {0}")]
    UserInput(String),

    #[error("missing dependency in module {module}: {missing:?}")]
    MissingDependency { module: String, missing: Vec<String> },

    #[error("store I/O error: {0}")]
    StoreIo(#[from] crate::store::StoreError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("inconsistent state: {0}")]
    Inconsistency(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CoverageError {
    /// Maps a taxonomy entry to a process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoverageError::UserInput(_) => 2,
            CoverageError::MissingDependency { .. } => 3,
            CoverageError::StoreIo(_) => 4,
            CoverageError::Cancelled => 5,
            CoverageError::Inconsistency(_) => 6,
            CoverageError::Other(_) => 1,
        }
    }
}
