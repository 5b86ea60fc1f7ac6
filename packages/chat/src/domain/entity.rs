//! エンティティ

use uuid::Uuid;

use super::{ImageRef, Nickname, Timestamp, UserId};

/// メッセージの送信者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: String,
    pub display_name: String,
}

impl Sender {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// セッションの利用者自身
    pub fn myself(user_id: &UserId, nickname: &Nickname) -> Self {
        Self::new(user_id.as_str(), nickname.as_str())
    }
}

/// 表示用に分類されたメッセージ本文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Image(ImageRef),
}

impl MessageBody {
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }
}

/// タイムラインに並ぶチャットメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// ローカルで採番する ID（サーバーはメッセージ ID を返さない）
    pub id: Uuid,
    pub sender: Sender,
    pub body: MessageBody,
    pub sent_at: Timestamp,
    /// 自分が送信したメッセージかどうか
    pub is_own: bool,
}

impl ChatMessage {
    pub fn new(sender: Sender, body: MessageBody, sent_at: Timestamp, is_own: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            body,
            sent_at,
            is_own,
        }
    }
}

/// WebSocket で受信した 1 フレーム分のチャット
///
/// `body` はフィルタ適用前の生の本文（制御サフィックスを含みうる）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFrame {
    pub sender: Sender,
    pub room: String,
    pub body: String,
}

/// REST で取得した履歴の 1 件（フィルタ適用前）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub body: String,
    pub sent_at: Timestamp,
}

/// ルームの参加者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub nickname: String,
}

/// ルーム情報（投稿者と参加者一覧）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub post_owner_id: String,
    pub participants: Vec<Participant>,
}

impl RoomInfo {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.post_owner_id == user_id.as_str()
    }
}
