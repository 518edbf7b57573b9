//! Error types for pulselog

use thiserror::Error;

use crate::channels::ChannelId;

/// Result codes reported by a logging sink for open/append/close operations.
///
/// All of these are non-fatal: the failing record is dropped, the failure is
/// logged with its description, and processing continues.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("someone else is writing to this logging channel")]
    Busy,

    #[error("no more space to save data")]
    Full,

    #[error("the logging channel does not exist")]
    NotFound,

    #[error("the logging channel was made inactive")]
    Closed,

    #[error("an invalid parameter was passed to the sink")]
    InvalidParams,

    #[error("an internal sink error occurred")]
    Internal,
}

/// Errors that can surface outside a single sink call
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to open logging channel {id}: {source}")]
    ChannelOpen { id: ChannelId, source: SinkError },

    #[error("failed to read flag store: {0}")]
    FlagRead(String),

    #[error("failed to write flag store: {0}")]
    FlagWrite(String),

    #[error("invalid flag store contents: {0}")]
    FlagFormat(#[from] serde_json::Error),
}
