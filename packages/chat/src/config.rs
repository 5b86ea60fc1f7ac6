//! チャットセッションの設定

use std::time::Duration;

pub const DEFAULT_WEBSOCKET_URL: &str = "ws://127.0.0.1:5004/ws";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5004/api/v1";
pub const DEFAULT_MEDIA_BASE_URL: &str = "http://127.0.0.1:5004/api/v1/media";

/// 連続した接続失敗の上限
pub const DEFAULT_RETRY_LIMIT: u32 = 8;
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// WebSocket の Ping 間隔。その 2 倍の間なにも受信しなければ再接続を提案する
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);
/// 1 フレームの書き込み完了を待つ上限
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// 退室通知を書き込んでから退出 API を呼ぶまでの待ち時間
pub const DEFAULT_EXIT_FLUSH_DELAY: Duration = Duration::from_millis(1600);
/// キープアライブを書き込んでから強制退室通知を送るまでの待ち時間
pub const DEFAULT_BAN_FLUSH_DELAY: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub websocket_url: String,
    pub api_base_url: String,
    pub media_base_url: String,
    pub retry_limit: u32,
    pub keep_alive_interval: Duration,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    pub exit_flush_delay: Duration,
    pub ban_flush_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            ping_interval: DEFAULT_PING_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            exit_flush_delay: DEFAULT_EXIT_FLUSH_DELAY,
            ban_flush_delay: DEFAULT_BAN_FLUSH_DELAY,
        }
    }
}
