use std::path::PathBuf;

use thiserror::Error;

/// The file name does not follow `<scenario> - <mode> - YYYY.MM.DD-HH.MM.SS Stats.csv`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename did not match expected format: {0}")]
    NotMatched(String),

    #[error("filename timestamp is not a valid local time: {0}")]
    InvalidTimestamp(String),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error(transparent)]
    Filename(#[from] FilenameError),
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("could not determine a traces directory")]
    NoBaseDir,

    #[error("no persisted trace at {0:?}")]
    NotFound(PathBuf),

    #[error("trace storage io failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode trace {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode trace: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("cannot update config while running")]
    Running,

    #[error("failed to list watch directory {path:?}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
