//! Error taxonomy for the synchronization engine
//!
//! I/O boundaries (HTTP, SQLite, config files) use `anyhow`; the engine
//! converts their failures into [`SyncError`] so the embedding UI can decide
//! how to surface each class. A response that arrives for a stale selection
//! or a reset list is not an error at all: it is discarded silently.

use std::fmt;

/// Remote operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchPage,
    FetchDetail,
    WriteField,
    Correct,
    Refine,
    Undo,
    Redo,
    PersistSelection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchPage => "page fetch",
            Operation::FetchDetail => "detail fetch",
            Operation::WriteField => "field write",
            Operation::Correct => "correction",
            Operation::Refine => "refinement",
            Operation::Undo => "undo",
            Operation::Redo => "redo",
            Operation::PersistSelection => "draft selection write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A fetch or write failed without corrupting local state
    #[error("{operation} failed: {message}")]
    TransientNetwork { operation: Operation, message: String },

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("no field has input focus")]
    MissingFocus,

    #[error("no reply variant is selected")]
    NoVariantSelected,

    #[error("variant {index} is out of range ({len} loaded)")]
    InvalidVariant { index: usize, len: usize },

    #[error("refinement instruction is empty")]
    EmptyInstruction,

    #[error("no item is open for editing")]
    NoActiveItem,

    /// A push frame could not be parsed; it is dropped and the channel stays open
    #[error("malformed push frame: {0}")]
    MalformedPush(String),

    #[error("push channel dropped (close code {code:?})")]
    ChannelDrop { code: Option<u16> },
}

impl SyncError {
    pub fn transient(operation: Operation, error: &anyhow::Error) -> Self {
        Self::TransientNetwork {
            operation,
            message: format!("{error:#}"),
        }
    }

    /// Whether the UI should show this error to the user.
    ///
    /// Malformed pushes and channel drops are only logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, SyncError::MalformedPush(_) | SyncError::ChannelDrop { .. })
    }
}
