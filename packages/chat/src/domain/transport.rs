//! WebSocket トランスポート境界
//!
//! ## 設計ノート
//!
//! `open` が成功した時点でトランスポートレベルの「接続済み」とみなす。
//! 以降のイベント（受信テキスト・切断・エラー）は `events` から、書き込みは
//! `writer` に `WriteRequest` を送り、完了を `done` で受け取る。

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{RoomId, TransportError};

/// トランスポートから届くイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// テキストフレームを受信
    Text(String),
    /// サーバーが正常に接続を閉じた
    Disconnected(String),
    /// 通信エラー
    Error(String),
    /// 接続の生存確認に失敗した
    ReconnectSuggested,
}

/// 書き込み要求
#[derive(Debug)]
pub struct WriteRequest {
    pub text: String,
    pub done: oneshot::Sender<Result<(), TransportError>>,
}

/// 確立済みの接続
#[derive(Debug)]
pub struct TransportLink {
    pub writer: mpsc::UnboundedSender<WriteRequest>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// テキストを書き込み、完了まで待つ
pub async fn write_frame(
    writer: &mpsc::UnboundedSender<WriteRequest>,
    text: String,
) -> Result<(), TransportError> {
    let (done, completed) = oneshot::channel();
    writer
        .send(WriteRequest { text, done })
        .map_err(|_| TransportError::Closed)?;
    completed.await.map_err(|_| TransportError::Closed)?
}

/// ルームごとの WebSocket 接続を開く
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, room: &RoomId) -> Result<TransportLink, TransportError>;
}
