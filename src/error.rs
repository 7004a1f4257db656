//! Error types for the tailer.

use crate::types::Position;
use std::fmt;
use thiserror::Error;

/// Main error type for tailer operations.
///
/// Only startup failures surface here; failures while tailing are absorbed
/// into the retry loop and reported through logging and [`TailerStats`].
///
/// [`TailerStats`]: crate::TailerStats
#[derive(Debug, Error)]
pub enum TailerError {
    #[error("Lookup of the most recent record failed: {0}")]
    Lookup(#[source] SourceError),

    #[error("Failed to open tailable cursor after {after}: {source}")]
    OpenCursor {
        after: Position,
        #[source]
        source: SourceError,
    },

    #[error("Failed to spawn tailer thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Tailer thread panicked")]
    WorkerPanicked,
}

/// How a source failure should be treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Store temporarily unreachable or the operation failed recoverably.
    Transient,
    /// Anything else. The cursor that raised it is not trusted again.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => f.write_str("transient"),
            ErrorKind::Fatal => f.write_str("fatal"),
        }
    }
}

/// Error reported by a [`ChangeFeedSource`] or its cursor.
///
/// [`ChangeFeedSource`]: crate::ChangeFeedSource
#[derive(Clone, Debug, Error)]
#[error("{kind} source error: {message}")]
pub struct SourceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

/// Error raised by a [`Sink`](crate::Sink). Logged and otherwise ignored.
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for tailer operations.
pub type Result<T> = std::result::Result<T, TailerError>;
