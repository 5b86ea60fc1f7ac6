//! Group-buy marketplace chat session library.
//!
//! One WebSocket connection per chat room, bounded reconnect with a retry
//! budget, control-suffix message filtering, paginated history merge and a
//! periodic keep-alive. The `groupbuy-chat` binary is a terminal front end
//! built on top of [`ChatSession`].

// layers
pub mod domain;
pub mod infrastructure;
pub mod session;
pub mod ui;

pub mod config;

pub use config::ChatConfig;
pub use session::{ChatServices, ChatSession, FetchOutcome, SessionError, SessionEvent};
