//! ChatSession ハンドル
//!
//! UI 層が保持する軽量なハンドル。操作はすべてコマンドとしてセッションの
//! タスクに送られ、そこで直列に処理される。

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use groupbuy_shared::time::{Clock, SystemClock};

use crate::{
    config::ChatConfig,
    domain::{
        ChatHistoryApi, ChatMessage, ChatTransport, ConnectionState, MediaApi, Nickname, PostApi,
        RoomId, RoomInfo, RoomMembershipApi, SessionContext, UserId,
    },
    infrastructure::{api::HttpApiClient, transport::WebSocketTransport},
};

use super::{
    FetchOutcome, SessionError, SessionEvent,
    actor::{Command, Reply, SessionActor},
};

/// セッションが依存する外部境界
#[derive(Clone)]
pub struct ChatServices {
    pub transport: Arc<dyn ChatTransport>,
    pub history: Arc<dyn ChatHistoryApi>,
    pub membership: Arc<dyn RoomMembershipApi>,
    pub posts: Arc<dyn PostApi>,
    pub media: Arc<dyn MediaApi>,
    pub clock: Arc<dyn Clock>,
}

impl ChatServices {
    /// reqwest / tokio-tungstenite の実装で組み立てる
    pub fn from_config(config: &ChatConfig, access_token: Option<String>) -> Self {
        let mut api = HttpApiClient::new(config.api_base_url.as_str());
        if let Some(token) = access_token {
            api = api.with_access_token(token);
        }
        let api = Arc::new(api);

        Self {
            transport: Arc::new(WebSocketTransport::new(
                config.websocket_url.as_str(),
                config.ping_interval,
            )),
            history: api.clone(),
            membership: api.clone(),
            posts: api.clone(),
            media: api,
            clock: Arc::new(SystemClock),
        }
    }
}

/// 1 つのチャットルームのセッション
#[derive(Clone)]
pub struct ChatSession {
    room: RoomId,
    user_id: UserId,
    commands: mpsc::UnboundedSender<Command>,
}

impl ChatSession {
    /// セッションのタスクを起動し、ハンドルと通知の受信側を返す
    ///
    /// 接続はまだ行わない。`connect` か `join_room` を呼ぶこと。
    pub fn spawn(
        room: RoomId,
        context: SessionContext,
        config: ChatConfig,
        services: ChatServices,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let user_id = context.user_id.clone();

        let actor = SessionActor::new(room.clone(), context, config, services, event_tx);
        tokio::spawn(actor.run(command_rx));

        let session = Self {
            room,
            user_id,
            commands: command_tx,
        };
        (session, event_rx)
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// WebSocket 接続を開始する（接続完了は `SessionEvent::Connected` で通知）
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.request(Command::Connect).await
    }

    /// 明示的に切断する。再接続は行わない
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request(Command::Disconnect).await
    }

    /// テキストを送信し、書き込み完了まで待つ
    ///
    /// 未接続なら `SessionError::NotConnected` を返し、`ReconnectSuggested` を通知する。
    pub async fn send(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.request(|reply| Command::Send { text, reply }).await
    }

    /// 画像をアップロードし、その参照を画像メッセージとして送信する
    pub async fn send_image(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.request(|reply| Command::SendImage { bytes, reply })
            .await
    }

    /// 公募に参加して接続する。既に参加済み（E108）でも接続する
    pub async fn join_room(&self) -> Result<(), SessionError> {
        self.request(Command::JoinRoom).await
    }

    /// 退室通知を送ってからルームを退出する（完了は `ExitedRoom` で通知）
    pub async fn leave_room(&self) -> Result<(), SessionError> {
        self.request(Command::LeaveRoom).await
    }

    pub async fn fetch_older_messages(&self) -> Result<FetchOutcome, SessionError> {
        self.request(Command::FetchOlder).await
    }

    /// 最後に持っているメッセージ以降を取得する
    pub async fn fetch_newer_messages(&self) -> Result<FetchOutcome, SessionError> {
        self.request(Command::FetchNewer).await
    }

    /// 投稿を削除する（投稿者のみ）
    pub async fn request_post_deletion(&self) -> Result<(), SessionError> {
        self.request(Command::DeletePost).await
    }

    /// 参加者を強制退室させたことをルームに知らせる（投稿者のみ）
    pub async fn ban_user(&self, user_id: UserId, nickname: Nickname) -> Result<(), SessionError> {
        self.request(|reply| Command::BanUser {
            user_id,
            nickname,
            reply,
        })
        .await
    }

    /// 再接続し、接続後に途切れていた間のメッセージを取得する
    pub async fn reconnect_and_fetch_newer(&self) -> Result<(), SessionError> {
        self.request(Command::ReconnectAndFetchNewer).await
    }

    /// メッセージを破棄して再接続する
    pub async fn reset_and_reconnect(&self) -> Result<(), SessionError> {
        self.request(Command::ResetAndReconnect).await
    }

    pub async fn messages(&self) -> Result<Vec<ChatMessage>, SessionError> {
        self.query(Command::Messages).await
    }

    pub async fn state(&self) -> Result<ConnectionState, SessionError> {
        self.query(Command::State).await
    }

    pub async fn room_info(&self) -> Result<Option<RoomInfo>, SessionError> {
        self.query(Command::RoomInfo).await
    }

    pub async fn is_post_owner(&self) -> Result<bool, SessionError> {
        let info = self.room_info().await?;
        Ok(info.is_some_and(|info| info.is_owned_by(&self.user_id)))
    }

    /// セッションを終了する（タイマー停止・ソケット切断）
    pub async fn close(&self) -> Result<(), SessionError> {
        self.query(Command::Close).await
    }
}
