//! Error types for the terminal client.

use thiserror::Error;

use crate::session::SessionError;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The user was removed from the room
    #[error("Removed from the room by the post owner")]
    Banned,

    #[error(transparent)]
    Session(#[from] SessionError),
}
