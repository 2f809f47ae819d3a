//! Error types shared by the parsers and the sample store

use std::path::PathBuf;

/// Failure to read or parse a procfs network table
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failure reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TCP stats line: {line}")]
    InvalidLine { line: String },

    #[error("invalid local port in line: {line}")]
    InvalidPort { line: String },

    #[error("invalid value {value:?} for counter {name}")]
    InvalidCounter { name: String, value: String },

    #[error("no value for counter {name}")]
    MissingCounter { name: String },
}

impl ParseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors returned by the sample store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unable to find data for workload {0}")]
    NotFound(String),
}
