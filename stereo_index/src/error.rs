//! Error type shared by the detection engine, the record store and the indexing pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse record: {details} (at line ~{line})")]
    Parse { line: usize, details: String },

    #[error("invalid offset {entry:?} in index file at line {line}")]
    IndexEntry { line: usize, entry: String },

    #[error("offset index is empty")]
    EmptyIndex,

    #[error("chirality detection was cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("cannot lay out molecule: {0}")]
    Geometry(&'static str),
}

impl Error {
    pub fn parse(line: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            line,
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
