use core::fmt;
use std::io;
use std::process::ExitStatus;

use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single record could not be reshaped. Always absorbed: the record is
/// dropped and the run continues.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("unsupported record shape: {tokens} tokens")]
    UnsupportedShape { tokens: usize },

    #[error("record value is not valid UTF-8")]
    NotUtf8,

    #[error("record contains the reserved fragment separator")]
    ReservedSeparator,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RangeError {
    #[error("interval key {key:?} is not a fixed-precision decimal")]
    Unparsable { key: String },

    #[error("interval is inverted: start {start:?} is after end {end:?}")]
    Inverted { start: String, end: String },

    #[error("interval keys {start:?} and {end:?} do not sort in byte order")]
    Unordered { start: String, end: String },

    #[error("partition count must be at least 1")]
    NoPartitions,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("no record schemas registered")]
    Empty,

    #[error("schema {name:?} declares zero tokens")]
    ZeroTokens { name: String },

    #[error("schema {name:?} has an empty key")]
    EmptyKey { name: String },

    #[error("schema {name:?} references token {index}, but records have {tokens} tokens")]
    IndexOutOfRange {
        name: String,
        index: usize,
        tokens: usize,
    },

    #[error("schema {name:?} uses token {index} twice in its key")]
    DuplicateIndex { name: String, index: usize },

    #[error("schemas {first:?} and {second:?} both claim {tokens}-token records")]
    DuplicateShape {
        tokens: usize,
        first: String,
        second: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreSide {
    Source,
    Destination,
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.pad("source"),
            Self::Destination => f.pad("destination"),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    #[error("{side} store {op} failed")]
    Store {
        side: StoreSide,
        op: &'static str,
        #[source]
        source: BoxedError,
    },

    #[error("{0} queue closed while work was still pending")]
    QueueClosed(&'static str),

    #[error("pipeline worker did not complete")]
    Worker(#[from] JoinError),

    #[error("failed to access {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub(crate) fn source_store(op: &'static str, err: eyre::Report) -> Self {
        Self::Store {
            side: StoreSide::Source,
            op,
            source: err.into(),
        }
    }

    pub(crate) fn destination_store(op: &'static str, err: eyre::Report) -> Self {
        Self::Store {
            side: StoreSide::Destination,
            op,
            source: err.into(),
        }
    }
}

/// Failure of the external graph conversion step. Reported alongside the
/// captured output, never raised as a pipeline failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubprocessError {
    #[error("failed to spawn {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program:?} exited with {status}")]
    Exit { program: String, status: ExitStatus },
}
