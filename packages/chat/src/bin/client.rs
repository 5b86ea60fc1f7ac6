//! Terminal chat client for one group-buy room.
//!
//! Opens the room's WebSocket, prints messages and notifications, and sends
//! what you type. Slash commands (`/older`, `/newer`, `/leave`, ...) map to
//! session operations; `/help` lists them. Lost connections are retried up to
//! the retry limit.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin groupbuy-chat -- --user-id uid-alice --nickname alice --room post-1
//! cargo run --bin groupbuy-chat -- -u uid-bob -n bob -r post-1 --join
//! ```

use std::time::Duration;

use clap::Parser;

use groupbuy_chat::{
    config::{self, ChatConfig},
    domain::{BlockedUsers, Nickname, RoomId, SessionContext, UserId},
    ui::{ClientOptions, run_client},
};
use groupbuy_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "groupbuy-chat")]
#[command(about = "Chat client for group-buy rooms with reconnect and history paging", long_about = None)]
struct Args {
    /// Your user ID
    #[arg(short = 'u', long)]
    user_id: String,

    /// Your nickname as shown to other participants
    #[arg(short = 'n', long)]
    nickname: String,

    /// Room (post) ID to open
    #[arg(short = 'r', long)]
    room: String,

    /// Join the group buy before connecting
    #[arg(long)]
    join: bool,

    /// WebSocket server URL
    #[arg(long, default_value = config::DEFAULT_WEBSOCKET_URL)]
    ws_url: String,

    /// REST API base URL
    #[arg(long, default_value = config::DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Media download base URL
    #[arg(long, default_value = config::DEFAULT_MEDIA_BASE_URL)]
    media_url: String,

    /// Access token sent with REST requests
    #[arg(long)]
    access_token: Option<String>,

    /// User IDs whose messages are hidden (repeatable)
    #[arg(long = "block")]
    blocked: Vec<String>,

    /// Consecutive connection failures before giving up
    #[arg(long, default_value_t = config::DEFAULT_RETRY_LIMIT)]
    retry_limit: u32,

    /// Keep-alive interval in seconds
    #[arg(long, default_value_t = config::DEFAULT_KEEP_ALIVE_INTERVAL.as_secs())]
    keep_alive_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let (user_id, nickname, room) = match (
        UserId::try_from(args.user_id),
        Nickname::try_from(args.nickname),
        RoomId::try_from(args.room),
    ) {
        (Ok(user_id), Ok(nickname), Ok(room)) => (user_id, nickname, room),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            tracing::error!("Invalid argument: {}", e);
            std::process::exit(2);
        }
    };

    let options = ClientOptions {
        room,
        context: SessionContext::new(user_id, nickname, BlockedUsers::from_ids(args.blocked)),
        config: ChatConfig {
            websocket_url: args.ws_url,
            api_base_url: args.api_url,
            media_base_url: args.media_url,
            retry_limit: args.retry_limit,
            keep_alive_interval: Duration::from_secs(args.keep_alive_secs),
            ..ChatConfig::default()
        },
        access_token: args.access_token,
        join: args.join,
    };

    // Run the client
    if let Err(e) = run_client(options).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
