//! Conversion logic between DTOs and domain entities.

use groupbuy_shared::time::parse_chat_date;

use crate::domain::{
    ChatFrame, HistoryEntry, Participant, RoomId, RoomInfo, Sender, SessionContext,
    Timestamp,
};
use crate::infrastructure::dto::{http as http_dto, websocket as ws_dto};

// ========================================
// DTO → Domain Entity
// ========================================

impl From<ws_dto::WireMessage> for ChatFrame {
    fn from(dto: ws_dto::WireMessage) -> Self {
        Self {
            sender: Sender::new(dto.uuid, dto.id),
            room: dto.room,
            body: dto.comment,
        }
    }
}

impl http_dto::ChatEntryDto {
    /// 履歴の 1 件に変換する
    ///
    /// `chat_date` が読めない行はページ全体を失敗させず、`fallback` の日時として扱う。
    pub fn into_entry(self, fallback: Timestamp) -> HistoryEntry {
        let sent_at = match parse_chat_date(&self.chat_date) {
            Some(millis) => Timestamp::new(millis),
            None => {
                tracing::warn!(
                    "Unreadable chat_date '{}' in history row {}; using fallback",
                    self.chat_date,
                    self.chat_uid
                );
                fallback
            }
        };
        HistoryEntry {
            sender: Sender::new(self.chat_user_uid, self.chat_username),
            body: self.chat_content,
            sent_at,
        }
    }
}

impl http_dto::ChatPageDto {
    /// ページ内の全行を変換する
    pub fn into_entries(self, fallback: Timestamp) -> Vec<HistoryEntry> {
        self.chat
            .into_iter()
            .map(|entry| entry.into_entry(fallback))
            .collect()
    }
}

impl From<http_dto::RoomInfoDto> for RoomInfo {
    fn from(dto: http_dto::RoomInfoDto) -> Self {
        Self {
            post_owner_id: dto.post.user.uid,
            participants: dto
                .member
                .into_iter()
                .map(|member| Participant {
                    user_id: member.user_uid,
                    nickname: member.nickname,
                })
                .collect(),
        }
    }
}

// ========================================
// Domain → DTO
// ========================================

impl ws_dto::WireMessage {
    /// 自分が送信するフレームを作成
    pub fn outgoing(context: &SessionContext, room: &RoomId, comment: &str) -> Self {
        Self {
            id: context.nickname.as_str().to_string(),
            uuid: context.user_id.as_str().to_string(),
            room: room.as_str().to_string(),
            comment: comment.to_string(),
        }
    }
}
