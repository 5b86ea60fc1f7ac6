//! Chat session: one WebSocket connection per room, bounded reconnect,
//! control-suffix filtering and history reconciliation.

mod actor;
mod error;
mod event;
#[cfg(test)]
mod fake;
mod handle;

pub use error::SessionError;
pub use event::{FetchOutcome, SessionEvent};
pub use handle::{ChatServices, ChatSession};
