//! REST API DTOs.

use serde::{Deserialize, Serialize};

/// チャット履歴のレスポンス
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPageDto {
    #[serde(default)]
    pub chat: Vec<ChatEntryDto>,
}

/// 履歴の 1 件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntryDto {
    #[serde(default)]
    pub chat_uid: i64,
    #[serde(rename = "chat_userUID")]
    pub chat_user_uid: String,
    pub chat_username: String,
    #[serde(rename = "chat_roomUID", default)]
    pub chat_room_uid: String,
    pub chat_content: String,
    /// `%Y-%m-%d %H:%M:%S`（KST）
    pub chat_date: String,
}

/// ルーム情報のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfoDto {
    #[serde(default)]
    pub member: Vec<MemberDto>,
    pub post: PostSummaryDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    #[serde(rename = "userUID")]
    pub user_uid: String,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummaryDto {
    pub user: PostUserDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUserDto {
    pub uid: String,
}

/// 画像アップロードのレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponseDto {
    pub uid: String,
}

/// エラーレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBodyDto {
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorDescription", default)]
    pub error_description: String,
}
