//! チャットセッションのアクター
//!
//! ## 設計ノート
//!
//! メッセージ列・接続状態・カーソルはすべてこのタスクだけが書き換える。
//! UI 層からのコマンド、トランスポートのイベント、REST 呼び出しの結果、
//! キープアライブのタイマーは同じ `select!` ループに届く。
//!
//! REST 呼び出しは別タスクで実行し、結果を `Internal` としてループに戻す。
//! セッションが既に終了していれば送信に失敗し、結果は捨てられる。
//! 接続試行には世代番号を付け、切断や再接続の後に届いた古い結果は無視する。

use std::{future, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Instant, Interval, MissedTickBehavior},
};

use crate::{
    config::ChatConfig,
    domain::{
        ApiError, ChatFrame, ChatMessage, ConnectionState, FilterOutcome, HistoryEntry, ImageRef,
        MessageBody, MessageOrigin, Nickname, PaginationCursor, RetryBudget, RetryDecision,
        RoomId, RoomInfo, Sender, SessionContext, Timestamp, TransportError, TransportEvent,
        TransportLink, UserId,
        filter::{
            KEEP_ALIVE_PLACEHOLDER, UNSUPPORTED_NOTICE, ban_notice, enter_notice, exit_notice,
            filter_body, image_body,
        },
        write_frame,
    },
    infrastructure::dto::websocket::WireMessage,
};

use super::{ChatServices, FetchOutcome, SessionError, SessionEvent};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// UI 層からのコマンド
pub(crate) enum Command {
    Connect(Reply<()>),
    Disconnect(Reply<()>),
    Send { text: String, reply: Reply<()> },
    SendImage { bytes: Vec<u8>, reply: Reply<()> },
    JoinRoom(Reply<()>),
    LeaveRoom(Reply<()>),
    FetchOlder(Reply<FetchOutcome>),
    FetchNewer(Reply<FetchOutcome>),
    DeletePost(Reply<()>),
    BanUser {
        user_id: UserId,
        nickname: Nickname,
        reply: Reply<()>,
    },
    ReconnectAndFetchNewer(Reply<()>),
    ResetAndReconnect(Reply<()>),
    Messages(oneshot::Sender<Vec<ChatMessage>>),
    State(oneshot::Sender<ConnectionState>),
    RoomInfo(oneshot::Sender<Option<RoomInfo>>),
    Close(oneshot::Sender<()>),
}

/// 別タスクからループに戻ってくる結果
enum Internal {
    Opened {
        generation: u64,
        result: Result<TransportLink, TransportError>,
    },
    RoomInfoLoaded(Result<RoomInfo, ApiError>),
    OlderFetched {
        result: Result<Vec<HistoryEntry>, ApiError>,
        reply: Reply<FetchOutcome>,
    },
    NewerFetched {
        result: Result<Vec<HistoryEntry>, ApiError>,
        reply: Option<Reply<FetchOutcome>>,
    },
    Joined {
        result: Result<(), ApiError>,
        reply: Reply<()>,
    },
    Exited(Result<(), ApiError>),
    PostDeleted {
        result: Result<(), ApiError>,
        reply: Reply<()>,
    },
    ImageUploaded {
        result: Result<ImageRef, ApiError>,
        reply: Reply<()>,
    },
    DeferredSend(String),
    ExitFlushElapsed,
}

/// 退室処理の進行状況
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitProgress {
    Idle,
    /// 退室通知を書き込み、エコーか待ち時間の経過を待っている
    NoticeSent,
    /// 退出 API を呼び出した
    Requested,
}

pub(crate) struct SessionActor {
    room: RoomId,
    context: SessionContext,
    config: ChatConfig,
    services: ChatServices,

    state: ConnectionState,
    link: Option<TransportLink>,
    generation: u64,
    retry: RetryBudget,
    keep_alive: Option<Interval>,

    messages: Vec<ChatMessage>,
    older: PaginationCursor,
    newer: PaginationCursor,
    newer_anchor: Option<Timestamp>,
    fetching_older: bool,
    fetching_newer: bool,

    room_info: Option<RoomInfo>,
    exit: ExitProgress,
    announce_entry: bool,
    fetch_newer_on_connect: bool,

    events: mpsc::UnboundedSender<SessionEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
}

impl SessionActor {
    pub(crate) fn new(
        room: RoomId,
        context: SessionContext,
        config: ChatConfig,
        services: ChatServices,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let retry = RetryBudget::new(config.retry_limit);

        Self {
            room,
            context,
            config,
            services,
            state: ConnectionState::Disconnected,
            link: None,
            generation: 0,
            retry,
            keep_alive: None,
            messages: Vec::new(),
            older: PaginationCursor::default(),
            newer: PaginationCursor::default(),
            newer_anchor: None,
            fetching_older: false,
            fetching_newer: false,
            room_info: None,
            exit: ExitProgress::Idle,
            announce_entry: false,
            fetch_newer_on_connect: false,
            events,
            internal_tx,
            internal_rx,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!("Chat session for room '{}' started", self.room);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        self.teardown();
                        break;
                    };
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal).await,
                event = next_event(&mut self.link) => self.handle_transport_event(event),
                () = next_tick(&mut self.keep_alive) => self.on_keep_alive_tick().await,
            }
        }

        tracing::debug!("Chat session for room '{}' ended", self.room);
    }

    /// Returns `false` when the session should stop.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect(reply) => {
                let _ = reply.send(self.connect());
            }
            Command::Disconnect(reply) => {
                self.disconnect();
                let _ = reply.send(Ok(()));
            }
            Command::Send { text, reply } => {
                let result = self.send_text(text).await;
                let _ = reply.send(result);
            }
            Command::SendImage { bytes, reply } => self.upload_image(bytes, reply),
            Command::JoinRoom(reply) => self.join_room(reply),
            Command::LeaveRoom(reply) => {
                self.leave_room().await;
                let _ = reply.send(Ok(()));
            }
            Command::FetchOlder(reply) => self.fetch_older(reply),
            Command::FetchNewer(reply) => self.fetch_newer(Some(reply)),
            Command::DeletePost(reply) => self.delete_post(reply),
            Command::BanUser {
                user_id,
                nickname,
                reply,
            } => {
                let result = self.ban_user(user_id, nickname).await;
                let _ = reply.send(result);
            }
            Command::ReconnectAndFetchNewer(reply) => {
                self.reconnect_and_fetch_newer();
                let _ = reply.send(Ok(()));
            }
            Command::ResetAndReconnect(reply) => {
                self.reset_and_reconnect();
                let _ = reply.send(Ok(()));
            }
            Command::Messages(reply) => {
                let _ = reply.send(self.messages.clone());
            }
            Command::State(reply) => {
                let _ = reply.send(self.state);
            }
            Command::RoomInfo(reply) => {
                let _ = reply.send(self.room_info.clone());
            }
            Command::Close(done) => {
                self.teardown();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    async fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Opened { generation, result } => self.on_opened(generation, result).await,
            Internal::RoomInfoLoaded(result) => match result {
                Ok(info) => self.room_info = Some(info),
                Err(e) => tracing::warn!("Failed to load room info of '{}': {}", self.room, e),
            },
            Internal::OlderFetched { result, reply } => self.on_older_fetched(result, reply),
            Internal::NewerFetched { result, reply } => self.on_newer_fetched(result, reply),
            Internal::Joined { result, reply } => self.on_joined(result, reply).await,
            Internal::Exited(result) => self.on_exited(result),
            Internal::PostDeleted { result, reply } => {
                let outcome = match result {
                    Ok(()) => {
                        tracing::info!("Post '{}' deleted", self.room);
                        self.emit(SessionEvent::PostDeleted);
                        Ok(())
                    }
                    Err(e) => Err(self.request_failed("delete post", e)),
                };
                let _ = reply.send(outcome);
            }
            Internal::ImageUploaded { result, reply } => {
                let outcome = match result {
                    Ok(reference) => self.send_text(image_body(&reference)).await,
                    Err(e) => {
                        tracing::warn!("Image upload failed: {}", e);
                        self.emit(SessionEvent::ImageUploadFailed);
                        Err(e.into())
                    }
                };
                let _ = reply.send(outcome);
            }
            Internal::DeferredSend(text) => {
                if let Err(e) = self.send_text(text).await {
                    tracing::warn!("Deferred send failed: {}", e);
                }
            }
            Internal::ExitFlushElapsed => {
                if self.exit == ExitProgress::NoticeSent {
                    self.request_exit();
                }
            }
        }
    }

    fn handle_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Text(raw)) => self.on_wire_message(&raw),
            Some(TransportEvent::Disconnected(reason)) => {
                tracing::info!("Disconnected from room '{}': {}", self.room, reason);
                self.drop_link();
                self.emit(SessionEvent::Disconnected);
            }
            Some(TransportEvent::Error(reason)) => self.on_transport_failure(reason, false),
            Some(TransportEvent::ReconnectSuggested) => {
                self.on_transport_failure("liveness check failed".to_string(), true)
            }
            None => self.on_transport_failure("event stream closed".to_string(), false),
        }
    }

    // ========================================
    // Connection lifecycle
    // ========================================

    fn connect(&mut self) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Connected => Err(SessionError::AlreadyConnected),
            ConnectionState::Connecting => Ok(()),
            ConnectionState::Disconnected => {
                if self.retry.is_exhausted() {
                    self.retry.reset();
                }
                self.start_connect(Duration::ZERO);
                Ok(())
            }
        }
    }

    fn start_connect(&mut self, delay: Duration) {
        self.generation += 1;
        self.drop_link();
        self.state = ConnectionState::Connecting;

        tracing::info!(
            "Connecting to room '{}' (attempt {}/{})",
            self.room,
            self.retry.attempts() + 1,
            self.retry.limit()
        );

        let generation = self.generation;
        let transport = Arc::clone(&self.services.transport);
        let room = self.room.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
            let result = transport.open(&room).await;
            let _ = internal.send(Internal::Opened { generation, result });
        });
    }

    async fn on_opened(&mut self, generation: u64, result: Result<TransportLink, TransportError>) {
        if generation != self.generation {
            tracing::debug!("Discarding stale connection attempt #{}", generation);
            return;
        }

        match result {
            Ok(link) => self.on_connected(link).await,
            Err(e) => self.on_transport_failure(e.to_string(), false),
        }
    }

    async fn on_connected(&mut self, link: TransportLink) {
        tracing::info!("Connected to room '{}'", self.room);

        self.link = Some(link);
        self.retry.reset();
        self.state = ConnectionState::Connected;
        self.load_room_info();
        self.emit(SessionEvent::Connected);

        // 接続直後に一度書き込んでおく
        if self
            .send_text(KEEP_ALIVE_PLACEHOLDER.to_string())
            .await
            .is_err()
        {
            return;
        }
        self.keep_alive = Some(keep_alive_timer(self.config.keep_alive_interval));

        if std::mem::take(&mut self.announce_entry) {
            self.announce_entry().await;
        }
        if std::mem::take(&mut self.fetch_newer_on_connect) {
            self.fetch_newer(None);
        }
    }

    fn on_transport_failure(&mut self, reason: String, suggested: bool) {
        self.drop_link();
        if suggested {
            self.emit(SessionEvent::ReconnectSuggested);
        }

        match self.retry.record_failure() {
            RetryDecision::Retry { attempt } => {
                tracing::warn!(
                    "Connection to room '{}' lost: {} (failure {}/{})",
                    self.room,
                    reason,
                    attempt,
                    self.retry.limit()
                );
                self.start_connect(self.config.reconnect_delay);
            }
            RetryDecision::Exhausted => {
                tracing::error!(
                    "Failed to connect to room '{}' after {} attempts: {}",
                    self.room,
                    self.retry.limit(),
                    reason
                );
                self.emit(SessionEvent::ConnectionFailed {
                    attempts: self.retry.attempts(),
                });
            }
        }
    }

    fn disconnect(&mut self) {
        tracing::info!("Disconnecting from room '{}'", self.room);
        self.generation += 1;
        self.drop_link();
        self.emit(SessionEvent::Disconnected);
    }

    fn reconnect(&mut self) {
        self.retry.reset();
        self.start_connect(Duration::ZERO);
    }

    fn reconnect_and_fetch_newer(&mut self) {
        if self.messages.is_empty() {
            tracing::debug!("Nothing to catch up from; skipping reconnect");
            return;
        }
        self.newer.reset();
        self.newer_anchor = None;
        self.fetch_newer_on_connect = true;
        self.reconnect();
    }

    fn reset_and_reconnect(&mut self) {
        self.messages.clear();
        self.older.reset();
        self.newer.reset();
        self.newer_anchor = None;
        self.reconnect();
    }

    /// Closes the socket (by dropping the link) and stops the keep-alive timer.
    fn drop_link(&mut self) {
        self.link = None;
        self.keep_alive = None;
        self.state = ConnectionState::Disconnected;
    }

    fn teardown(&mut self) {
        self.generation += 1;
        self.drop_link();
        tracing::info!("Chat session for room '{}' closed", self.room);
    }

    async fn on_keep_alive_tick(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Err(e) = self.send_text(KEEP_ALIVE_PLACEHOLDER.to_string()).await {
            tracing::debug!("Keep-alive failed: {}", e);
        }
    }

    // ========================================
    // Messages
    // ========================================

    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        let writer = match (&self.link, self.state) {
            (Some(link), ConnectionState::Connected) => link.writer.clone(),
            _ => {
                tracing::warn!("Cannot send to room '{}': not connected", self.room);
                self.emit(SessionEvent::ReconnectSuggested);
                return Err(SessionError::NotConnected);
            }
        };

        let frame = WireMessage::outgoing(&self.context, &self.room, &text);
        let json =
            serde_json::to_string(&frame).map_err(|e| TransportError::Write(e.to_string()))?;

        let written = time::timeout(self.config.write_timeout, write_frame(&writer, json))
            .await
            .unwrap_or(Err(TransportError::WriteTimeout(self.config.write_timeout)));
        if let Err(e) = written {
            self.on_transport_failure(e.to_string(), true);
            return Err(e.into());
        }

        if text == KEEP_ALIVE_PLACEHOLDER {
            return Ok(());
        }

        if let FilterOutcome::Visible(body) =
            filter_body(&text, None, MessageOrigin::Local, &self.context)
        {
            let sender = Sender::myself(&self.context.user_id, &self.context.nickname);
            let sent_at = self.live_timestamp();
            self.messages
                .push(ChatMessage::new(sender, body, sent_at, true));
        }
        tracing::debug!("Sent message to room '{}'", self.room);
        self.emit(SessionEvent::ChatSent);
        Ok(())
    }

    fn on_wire_message(&mut self, raw: &str) {
        let frame: ChatFrame = match serde_json::from_str::<WireMessage>(raw) {
            Ok(wire) => wire.into(),
            Err(e) => {
                tracing::warn!("Unreadable chat frame ({}): {}", e, raw);
                let sent_at = self.live_timestamp();
                self.messages.push(ChatMessage::new(
                    Sender::new("", ""),
                    MessageBody::Text(UNSUPPORTED_NOTICE.to_string()),
                    sent_at,
                    false,
                ));
                self.emit(SessionEvent::ChatReceived);
                return;
            }
        };

        let outcome = filter_body(
            &frame.body,
            Some(frame.sender.user_id.as_str()),
            MessageOrigin::Socket,
            &self.context,
        );

        match outcome {
            FilterOutcome::Discard => {}
            FilterOutcome::OwnExitConfirmed => {
                tracing::info!("Exit notice for room '{}' reached the server", self.room);
                self.request_exit();
            }
            FilterOutcome::BannedSelf => {
                tracing::warn!("Banned from room '{}'", self.room);
                self.emit(SessionEvent::ReceivedBanNotification);
            }
            FilterOutcome::Visible(body) => {
                if self.context.is_me(&frame.sender.user_id) {
                    // 自分の送信のエコー。送信時に追加済み
                    tracing::debug!("Server acknowledged own message");
                    return;
                }
                let sent_at = self.live_timestamp();
                self.messages
                    .push(ChatMessage::new(frame.sender, body, sent_at, false));
                self.emit(SessionEvent::ChatReceived);
            }
        }
    }

    /// Now, but never older than the current tail.
    fn live_timestamp(&self) -> Timestamp {
        let now = Timestamp::new(self.services.clock.now_millis());
        match self.messages.last() {
            Some(last) => now.max(last.sent_at),
            None => now,
        }
    }

    async fn announce_entry(&mut self) {
        let notice = enter_notice(self.context.nickname.as_str());
        if let Err(e) = self.send_text(notice).await {
            tracing::warn!("Failed to announce entry to room '{}': {}", self.room, e);
        }
    }

    // ========================================
    // History
    // ========================================

    fn fetch_older(&mut self, reply: Reply<FetchOutcome>) {
        if self.fetching_older {
            let _ = reply.send(Err(SessionError::FetchInProgress));
            return;
        }
        if self.older.is_exhausted() {
            self.emit(SessionEvent::FetchedEmptyHistory);
            let _ = reply.send(Ok(FetchOutcome::Empty));
            return;
        }

        self.fetching_older = true;
        let history = Arc::clone(&self.services.history);
        let room = self.room.clone();
        let page = self.older.page();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = history.fetch_older(&room, page).await;
            let _ = internal.send(Internal::OlderFetched { result, reply });
        });
    }

    fn on_older_fetched(
        &mut self,
        result: Result<Vec<HistoryEntry>, ApiError>,
        reply: Reply<FetchOutcome>,
    ) {
        self.fetching_older = false;

        let outcome = match result {
            Err(e) => Err(self.request_failed("fetch older messages", e)),
            Ok(entries) if entries.is_empty() => {
                tracing::debug!("No more history in room '{}'", self.room);
                self.older.mark_exhausted();
                self.emit(SessionEvent::FetchedEmptyHistory);
                Ok(FetchOutcome::Empty)
            }
            Ok(entries) => {
                let head = self.messages.first().map(|message| message.sent_at);
                let mut batch = self.classify_history(entries);
                if let Some(head) = head {
                    for message in &mut batch {
                        message.sent_at = message.sent_at.min(head);
                    }
                }

                let count = batch.len();
                batch.append(&mut self.messages);
                self.messages = batch;
                self.older.advance();
                self.emit(SessionEvent::FetchedOlderMessages { count });
                Ok(FetchOutcome::Fetched(count))
            }
        };
        let _ = reply.send(outcome);
    }

    fn fetch_newer(&mut self, reply: Option<Reply<FetchOutcome>>) {
        if self.fetching_newer {
            respond(reply, Err(SessionError::FetchInProgress));
            return;
        }
        if self.newer.is_exhausted() {
            // 前回の取得は空ページで終わった。最新のメッセージから取り直す
            self.newer.reset();
            self.newer_anchor = None;
        }

        let anchor = self
            .newer_anchor
            .or_else(|| self.messages.last().map(|message| message.sent_at));
        let Some(anchor) = anchor else {
            tracing::debug!("No local message to continue from in room '{}'", self.room);
            respond(reply, Err(SessionError::EmptyTimeline));
            return;
        };

        self.newer_anchor = Some(anchor);
        self.fetching_newer = true;
        let history = Arc::clone(&self.services.history);
        let room = self.room.clone();
        let page = self.newer.page();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = history.fetch_after(&room, anchor, page).await;
            let _ = internal.send(Internal::NewerFetched { result, reply });
        });
    }

    fn on_newer_fetched(
        &mut self,
        result: Result<Vec<HistoryEntry>, ApiError>,
        reply: Option<Reply<FetchOutcome>>,
    ) {
        self.fetching_newer = false;

        let outcome = match result {
            Err(e) => Err(self.request_failed("fetch newer messages", e)),
            Ok(entries) if entries.is_empty() => {
                self.newer.mark_exhausted();
                self.emit(SessionEvent::FetchedEmptyHistory);
                Ok(FetchOutcome::Empty)
            }
            Ok(entries) => {
                let tail = self.messages.last().map(|message| message.sent_at);
                let mut batch = self.classify_history(entries);
                if let Some(tail) = tail {
                    for message in &mut batch {
                        message.sent_at = message.sent_at.max(tail);
                    }
                }

                let count = batch.len();
                self.messages.extend(batch);
                self.newer.advance();
                self.emit(SessionEvent::FetchedNewerMessages { count });
                Ok(FetchOutcome::Fetched(count))
            }
        };
        respond(reply, outcome);
    }

    /// Filters a history page and returns the visible messages oldest-first.
    fn classify_history(&self, mut entries: Vec<HistoryEntry>) -> Vec<ChatMessage> {
        entries.sort_by_key(|entry| entry.sent_at);

        let mut batch = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = filter_body(
                &entry.body,
                Some(entry.sender.user_id.as_str()),
                MessageOrigin::History,
                &self.context,
            );
            match outcome {
                FilterOutcome::Visible(body) => {
                    let is_own = self.context.is_me(&entry.sender.user_id);
                    batch.push(ChatMessage::new(entry.sender, body, entry.sent_at, is_own));
                }
                FilterOutcome::BannedSelf => self.emit(SessionEvent::ReceivedBanNotification),
                FilterOutcome::Discard | FilterOutcome::OwnExitConfirmed => {}
            }
        }
        batch
    }

    // ========================================
    // Room membership and post
    // ========================================

    fn load_room_info(&self) {
        let membership = Arc::clone(&self.services.membership);
        let room = self.room.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = membership.room_info(&room).await;
            let _ = internal.send(Internal::RoomInfoLoaded(result));
        });
    }

    fn join_room(&mut self, reply: Reply<()>) {
        let membership = Arc::clone(&self.services.membership);
        let room = self.room.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = membership.join(&room).await;
            let _ = internal.send(Internal::Joined { result, reply });
        });
    }

    async fn on_joined(&mut self, result: Result<(), ApiError>, reply: Reply<()>) {
        let outcome = match result {
            Ok(()) => {
                tracing::info!("Joined room '{}'", self.room);
                self.announce_entry = true;
                Ok(())
            }
            Err(ApiError::AlreadyJoined) => {
                tracing::info!("Already a participant of room '{}'", self.room);
                Ok(())
            }
            Err(e) => Err(self.request_failed("join room", e)),
        };

        if outcome.is_ok() {
            match self.state {
                ConnectionState::Disconnected => {
                    let _ = self.connect();
                }
                ConnectionState::Connecting => {}
                ConnectionState::Connected => {
                    self.load_room_info();
                    if std::mem::take(&mut self.announce_entry) {
                        self.announce_entry().await;
                    }
                }
            }
        }
        let _ = reply.send(outcome);
    }

    async fn leave_room(&mut self) {
        if self.exit != ExitProgress::Idle {
            return;
        }

        if self.state != ConnectionState::Connected {
            tracing::info!("Not connected; leaving room '{}' directly", self.room);
            self.request_exit();
            return;
        }

        let notice = exit_notice(self.context.nickname.as_str());
        match self.send_text(notice).await {
            Ok(()) => {
                self.exit = ExitProgress::NoticeSent;
                self.schedule(self.config.exit_flush_delay, Internal::ExitFlushElapsed);
            }
            Err(e) => {
                tracing::warn!("Failed to send exit notice: {}", e);
                self.request_exit();
            }
        }
    }

    /// Calls the membership exit API at most once per leave.
    fn request_exit(&mut self) {
        if self.exit == ExitProgress::Requested {
            return;
        }
        self.exit = ExitProgress::Requested;

        let membership = Arc::clone(&self.services.membership);
        let room = self.room.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = membership.exit(&room).await;
            let _ = internal.send(Internal::Exited(result));
        });
    }

    fn on_exited(&mut self, result: Result<(), ApiError>) {
        match result {
            Ok(()) => {
                tracing::info!("Left room '{}'", self.room);
                self.emit(SessionEvent::ExitedRoom);
            }
            Err(e) => {
                self.exit = ExitProgress::Idle;
                self.request_failed("leave room", e);
            }
        }
    }

    fn ensure_post_owner(&self) -> Result<(), SessionError> {
        match &self.room_info {
            Some(info) if !info.is_owned_by(&self.context.user_id) => {
                Err(SessionError::NotPostOwner)
            }
            _ => Ok(()),
        }
    }

    fn delete_post(&mut self, reply: Reply<()>) {
        if let Err(e) = self.ensure_post_owner() {
            let _ = reply.send(Err(e));
            return;
        }

        let posts = Arc::clone(&self.services.posts);
        let room = self.room.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = posts.delete_post(&room).await;
            let _ = internal.send(Internal::PostDeleted { result, reply });
        });
    }

    async fn ban_user(&mut self, user_id: UserId, nickname: Nickname) -> Result<(), SessionError> {
        self.ensure_post_owner()?;
        self.send_text(KEEP_ALIVE_PLACEHOLDER.to_string()).await?;

        let notice = ban_notice(nickname.as_str(), user_id.as_str());
        self.schedule(self.config.ban_flush_delay, Internal::DeferredSend(notice));
        Ok(())
    }

    fn upload_image(&mut self, bytes: Vec<u8>, reply: Reply<()>) {
        let media = Arc::clone(&self.services.media);
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = media.upload_image(bytes).await;
            let _ = internal.send(Internal::ImageUploaded { result, reply });
        });
    }

    // ========================================
    // Helpers
    // ========================================

    fn schedule(&self, delay: Duration, internal: Internal) {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(internal);
        });
    }

    fn request_failed(&self, operation: &str, error: ApiError) -> SessionError {
        tracing::warn!("Failed to {} for room '{}': {}", operation, self.room, error);
        self.emit(SessionEvent::RequestFailed(error.clone()));
        error.into()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

fn respond<T>(reply: Option<Reply<T>>, result: Result<T, SessionError>) {
    if let Some(reply) = reply {
        let _ = reply.send(result);
    }
}

fn keep_alive_timer(period: Duration) -> Interval {
    // interval panics on a zero period
    let period = period.max(Duration::from_millis(1));
    let mut timer = time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn next_event(link: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending().await,
    }
}
