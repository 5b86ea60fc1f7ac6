//! REST API 境界の trait 定義
//!
//! チャットセッションが呼び出すバックエンドの API。UseCase 相当の
//! セッションはこれらの trait にだけ依存し、HTTP の具体的な実装には依存しない。

use async_trait::async_trait;

use super::{ApiError, HistoryEntry, ImageRef, RoomId, RoomInfo, Timestamp};

/// チャット履歴の取得
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatHistoryApi: Send + Sync {
    /// 過去のメッセージを 1 ページ取得（ページ 1 が最新側）
    async fn fetch_older(&self, room: &RoomId, page: u32) -> Result<Vec<HistoryEntry>, ApiError>;

    /// `after` 以降のメッセージを 1 ページ取得
    async fn fetch_after(
        &self,
        room: &RoomId,
        after: Timestamp,
        page: u32,
    ) -> Result<Vec<HistoryEntry>, ApiError>;
}

/// ルームへの参加・退出と参加者情報
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomMembershipApi: Send + Sync {
    async fn join(&self, room: &RoomId) -> Result<(), ApiError>;

    async fn exit(&self, room: &RoomId) -> Result<(), ApiError>;

    async fn room_info(&self, room: &RoomId) -> Result<RoomInfo, ApiError>;
}

/// 公募投稿の操作
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostApi: Send + Sync {
    async fn delete_post(&self, room: &RoomId) -> Result<(), ApiError>;
}

/// 画像アップロード
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaApi: Send + Sync {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<ImageRef, ApiError>;
}
