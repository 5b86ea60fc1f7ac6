//! Domain 層のエラー型

use thiserror::Error;

/// 値オブジェクト生成時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// 空文字列は許可されない
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// REST API 呼び出しのエラー
///
/// バックエンドはエラー時に `{"errorCode": "E108", "errorDescription": "..."}`
/// を返すため、既知のコードはバリアントに対応付ける。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// E108: 既に参加している公募
    #[error("already participating in this group buy")]
    AlreadyJoined,

    /// E109: 権限がない
    #[error("not authorized")]
    Unauthorized,

    /// E301 / E302: ログインセッション切れ
    #[error("login session expired")]
    SessionExpired,

    /// E601: 存在しない投稿
    #[error("post not found")]
    PostNotFound,

    /// その他のサーバーエラーコード
    #[error("server error {code}: {description}")]
    Server { code: String, description: String },

    /// 通信そのものの失敗
    #[error("network error: {0}")]
    Network(String),

    /// レスポンスの解釈に失敗
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// バックエンドのエラーコードから ApiError を作成
    pub fn from_code(code: &str, description: &str) -> Self {
        match code {
            "E108" => Self::AlreadyJoined,
            "E109" => Self::Unauthorized,
            "E301" | "E302" => Self::SessionExpired,
            "E601" => Self::PostNotFound,
            _ => Self::Server {
                code: code.to_string(),
                description: description.to_string(),
            },
        }
    }

    /// ユーザーに一度だけ表示するメッセージ
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AlreadyJoined => "You are already participating in this group buy.",
            Self::Unauthorized => "You do not have permission to do that.",
            Self::SessionExpired => "Your login session has expired. Please log in again.",
            Self::PostNotFound => "This post no longer exists.",
            Self::Server { .. } | Self::Network(_) | Self::Decode(_) => {
                "A temporary service error occurred. Please try again in a moment."
            }
        }
    }
}

/// WebSocket トランスポートのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 接続の確立に失敗
    #[error("connection error: {0}")]
    Connect(String),

    /// フレームの書き込みに失敗
    #[error("write error: {0}")]
    Write(String),

    /// 書き込みの完了が時間内に確認できなかった
    #[error("write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    /// 接続が既に閉じられている
    #[error("connection closed")]
    Closed,
}
