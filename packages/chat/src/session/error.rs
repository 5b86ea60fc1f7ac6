//! Error types for the chat session.

use thiserror::Error;

use crate::domain::{ApiError, TransportError};

/// Errors returned to the caller of a `ChatSession` operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The socket is not connected; the caller should offer a reconnect
    #[error("not connected to the chat room")]
    NotConnected,

    #[error("already connected to the chat room")]
    AlreadyConnected,

    #[error("a history fetch in that direction is already in progress")]
    FetchInProgress,

    /// There is no local message to anchor a forward fetch on
    #[error("no local messages to continue from")]
    EmptyTimeline,

    #[error("only the post owner can do that")]
    NotPostOwner,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session task has been torn down
    #[error("chat session is closed")]
    Closed,
}
