//! WebSocket frame DTOs.

use serde::{Deserialize, Serialize};

/// チャットフレーム
///
/// ```json
/// {"id": "<nickname>", "uuid": "<user id>", "room": "<room id>", "comment": "<body>"}
/// ```
///
/// 欠けているフィールドは空文字列として扱う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// 送信者のニックネーム
    #[serde(default)]
    pub id: String,
    /// 送信者の UID
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub room: String,
    /// 制御サフィックスを含みうる本文
    #[serde(default)]
    pub comment: String,
}
