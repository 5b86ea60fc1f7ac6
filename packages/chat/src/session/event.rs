//! UI 層への通知

use crate::domain::ApiError;

/// セッションから UI 層へ送る通知（送りっぱなし）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    ChatReceived,
    ChatSent,
    /// 再接続を促す（送信時に未接続だった・生存確認に失敗した）
    ReconnectSuggested,
    /// 再接続の予算を使い切った。ユーザー操作なしには再試行しない
    ConnectionFailed { attempts: u32 },
    ExitedRoom,
    PostDeleted,
    FetchedOlderMessages { count: usize },
    FetchedNewerMessages { count: usize },
    FetchedEmptyHistory,
    ReceivedBanNotification,
    ImageUploadFailed,
    /// REST 呼び出しの失敗（失敗 1 回につき 1 度だけ）
    RequestFailed(ApiError),
}

/// 履歴取得の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 表示対象として追加された件数
    Fetched(usize),
    /// これ以上の履歴はない
    Empty,
}
