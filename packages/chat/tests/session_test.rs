//! Integration tests for the chat session against an in-process fake backend.
//!
//! The backend is an axum server that relays every WebSocket text frame to all
//! connected sockets (including the sender) and serves the REST endpoints the
//! session uses. Sessions run with the real `WebSocketTransport` and
//! `HttpApiClient`.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc},
    time::timeout,
};

use groupbuy_chat::{
    ChatConfig, ChatServices, ChatSession, FetchOutcome, SessionEvent,
    domain::{BlockedUsers, ConnectionState, MessageBody, Nickname, RoomId, SessionContext, UserId},
};

const ROOM: &str = "post-1";
const ALREADY_JOINED_ROOM: &str = "post-joined";
const MALFORMED_DATE_ROOM: &str = "post-bad-date";
const OWNER: &str = "uid-alice";
const IMAGE_ID: &str = "img123abcdefghijklmnop";

/// State of the fake backend
struct Backend {
    relay: broadcast::Sender<String>,
    joins: AtomicUsize,
    exits: AtomicUsize,
    deletions: AtomicUsize,
}

struct TestServer {
    addr: SocketAddr,
    backend: Arc<Backend>,
}

impl TestServer {
    /// Start the fake backend on an ephemeral port
    async fn start() -> Self {
        let (relay, _) = broadcast::channel(64);
        let backend = Arc::new(Backend {
            relay,
            joins: AtomicUsize::new(0),
            exits: AtomicUsize::new(0),
            deletions: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/ws", get(websocket_handler))
            .route("/silent", get(silent_websocket_handler))
            .route("/api/chat/{room}/{page}", get(chat_page))
            .route("/api/room/{room}", get(room_info).post(join).delete(exit))
            .route("/api/posts/{room}", delete(delete_post))
            .route("/api/media", post(upload_media))
            .with_state(Arc::clone(&backend));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, backend }
    }

    fn config(&self) -> ChatConfig {
        ChatConfig {
            websocket_url: format!("ws://{}/ws", self.addr),
            api_base_url: format!("http://{}/api", self.addr),
            media_base_url: format!("http://{}/media", self.addr),
            retry_limit: 3,
            reconnect_delay: Duration::from_millis(50),
            exit_flush_delay: Duration::from_millis(500),
            ban_flush_delay: Duration::from_millis(50),
            ..ChatConfig::default()
        }
    }

    fn session(
        &self,
        room: &str,
        user_id: &str,
        nickname: &str,
    ) -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let config = self.config();
        let services = ChatServices::from_config(&config, Some("test-token".to_string()));
        let context = SessionContext::new(
            UserId::try_from(user_id).unwrap(),
            Nickname::try_from(nickname).unwrap(),
            BlockedUsers::new(),
        );
        ChatSession::spawn(RoomId::try_from(room).unwrap(), context, config, services)
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(backend): State<Arc<Backend>>,
) -> impl IntoResponse {
    // Subscribe before the handshake completes so no frame is missed
    let relayed = backend.relay.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, backend, relayed))
}

/// Accepts the upgrade but never reads, so pings go unanswered
async fn silent_websocket_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    })
}

async fn handle_socket(
    socket: WebSocket,
    backend: Arc<Backend>,
    mut relayed: broadcast::Receiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Ok(text) = relayed.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Text(text) = message {
                let _ = backend.relay.send(text.as_str().to_owned());
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

fn history_entry(user_id: &str, nickname: &str, content: &str, date: &str) -> Value {
    json!({
        "chat_uid": 1,
        "chat_userUID": user_id,
        "chat_username": nickname,
        "chat_roomUID": ROOM,
        "chat_content": content,
        "chat_date": date,
    })
}

async fn chat_page(Path((room, page)): Path<(String, u32)>, headers: HeaderMap) -> Json<Value> {
    let newer = headers.get("isover").is_some() && headers.get("date").is_some();
    if room == MALFORMED_DATE_ROOM {
        let chat = match page {
            1 => vec![
                history_entry("uid-bob", "bob", "readable", "2023-01-01 09:00:00"),
                history_entry("uid-carol", "carol", "odd date", "2023-01-01T09:00:01"),
            ],
            _ => vec![],
        };
        return Json(json!({ "chat": chat }));
    }
    let chat = match (newer, page) {
        (false, 1) => vec![
            history_entry("uid-bob", "bob", "second", "2023-01-01 09:02:00"),
            history_entry("uid-carol", "carol", "first", "2023-01-01 09:01:00"),
            history_entry("uid-bob", "bob", "_EMPTY_SUFFIX", "2023-01-01 09:03:00"),
        ],
        (true, 1) => vec![history_entry(
            "uid-carol",
            "carol",
            "missed while away",
            "2099-01-01 00:00:00",
        )],
        _ => vec![],
    };
    Json(json!({ "chat": chat }))
}

async fn room_info(Path(_room): Path<String>) -> Json<Value> {
    Json(json!({
        "member": [
            { "userUID": OWNER, "nickname": "alice" },
            { "userUID": "uid-bob", "nickname": "bob" },
        ],
        "post": { "user": { "uid": OWNER } },
    }))
}

async fn join(State(backend): State<Arc<Backend>>, Path(room): Path<String>) -> Response {
    backend.joins.fetch_add(1, Ordering::SeqCst);
    if room == ALREADY_JOINED_ROOM {
        let body = json!({ "errorCode": "E108", "errorDescription": "already joined" });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    StatusCode::OK.into_response()
}

async fn exit(State(backend): State<Arc<Backend>>) -> StatusCode {
    backend.exits.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn delete_post(State(backend): State<Arc<Backend>>) -> StatusCode {
    backend.deletions.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn upload_media(body: Bytes) -> Response {
    if body.is_empty() {
        let body = json!({ "errorCode": "E400", "errorDescription": "empty image" });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    Json(json!({ "uid": IMAGE_ID })).into_response()
}

async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

async fn connected(
    server: &TestServer,
    user_id: &str,
    nickname: &str,
) -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
    let (session, mut events) = server.session(ROOM, user_id, nickname);
    session.connect().await.unwrap();
    wait_for(&mut events, |e| *e == SessionEvent::Connected).await;
    (session, events)
}

#[tokio::test]
async fn test_messages_are_exchanged_between_sessions() {
    // テスト項目: 2 つのセッション間でメッセージが届き、送信者側は重複しない
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, mut alice_events) = connected(&server, OWNER, "alice").await;
    let (bob, mut bob_events) = connected(&server, "uid-bob", "bob").await;

    // when (操作):
    alice.send("Hello from alice").await.unwrap();
    wait_for(&mut bob_events, |e| *e == SessionEvent::ChatReceived).await;
    bob.send("Hi alice").await.unwrap();
    wait_for(&mut alice_events, |e| *e == SessionEvent::ChatReceived).await;

    // then (期待する結果):
    let alice_messages = alice.messages().await.unwrap();
    assert_eq!(alice_messages.len(), 2);
    assert!(alice_messages[0].is_own);
    assert_eq!(
        alice_messages[1].body,
        MessageBody::Text("Hi alice".to_string())
    );

    let bob_messages = bob.messages().await.unwrap();
    assert_eq!(
        bob_messages[0].body,
        MessageBody::Text("Hello from alice".to_string())
    );
    assert_eq!(bob_messages[0].sender.user_id, OWNER);
    assert!(!bob_messages[0].is_own);
}

#[tokio::test]
async fn test_room_info_is_loaded_on_connect() {
    // テスト項目: 接続時にルーム情報が読み込まれ、投稿者判定に使われる
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, _alice_events) = connected(&server, OWNER, "alice").await;
    let (bob, _bob_events) = connected(&server, "uid-bob", "bob").await;

    // when (操作):
    let mut loaded = false;
    for _ in 0..100 {
        if alice.room_info().await.unwrap().is_some() && bob.room_info().await.unwrap().is_some()
        {
            loaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // then (期待する結果):
    assert!(loaded);
    assert!(alice.is_post_owner().await.unwrap());
    assert!(!bob.is_post_owner().await.unwrap());
    let info = alice.room_info().await.unwrap().unwrap();
    assert_eq!(info.participants.len(), 2);
}

#[tokio::test]
async fn test_history_pages_are_merged_in_order() {
    // テスト項目: 履歴ページが古い順に並び、空ページ以降は何も追加されない
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, _events) = server.session(ROOM, OWNER, "alice");

    // when (操作):
    let first = alice.fetch_older_messages().await.unwrap();
    let second = alice.fetch_older_messages().await.unwrap();
    let third = alice.fetch_older_messages().await.unwrap();

    // then (期待する結果):
    assert_eq!(first, FetchOutcome::Fetched(2));
    assert_eq!(second, FetchOutcome::Empty);
    assert_eq!(third, FetchOutcome::Empty);

    let messages = alice.messages().await.unwrap();
    let bodies: Vec<_> = messages.iter().map(|m| m.body.clone()).collect();
    assert_eq!(
        bodies,
        vec![
            MessageBody::Text("first".to_string()),
            MessageBody::Text("second".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_history_row_with_unreadable_date_does_not_block_paging() {
    // テスト項目: 日時の読めない行を含むページも取り込まれ、次のページへ進める
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, _events) = server.session(MALFORMED_DATE_ROOM, OWNER, "alice");

    // when (操作):
    let first = alice.fetch_older_messages().await.unwrap();
    let second = alice.fetch_older_messages().await.unwrap();

    // then (期待する結果):
    assert_eq!(first, FetchOutcome::Fetched(2));
    assert_eq!(second, FetchOutcome::Empty);

    let messages = alice.messages().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
    assert!(
        messages
            .iter()
            .any(|m| m.body == MessageBody::Text("odd date".to_string()))
    );
}

#[tokio::test]
async fn test_reconnect_catches_up_with_newer_messages() {
    // テスト項目: 再接続後に最後のメッセージ以降の履歴を取得して末尾に追加する
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, mut events) = connected(&server, OWNER, "alice").await;
    alice.fetch_older_messages().await.unwrap();

    // when (操作):
    alice.reconnect_and_fetch_newer().await.unwrap();
    wait_for(&mut events, |e| {
        *e == SessionEvent::FetchedNewerMessages { count: 1 }
    })
    .await;

    // then (期待する結果):
    let messages = alice.messages().await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(
        messages[2].body,
        MessageBody::Text("missed while away".to_string())
    );
    assert_eq!(alice.state().await.unwrap(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_join_when_already_joined_still_connects() {
    // テスト項目: 参加 API が E108 を返しても接続する
    // given (前提条件):
    let server = TestServer::start().await;
    let (bob, mut events) = server.session(ALREADY_JOINED_ROOM, "uid-bob", "bob");

    // when (操作):
    let result = bob.join_room().await;

    // then (期待する結果):
    assert!(result.is_ok());
    wait_for(&mut events, |e| *e == SessionEvent::Connected).await;
    assert_eq!(server.backend.joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_new_participant_is_announced() {
    // テスト項目: 新規参加者の入室通知が他の参加者に表示される
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, mut alice_events) = connected(&server, OWNER, "alice").await;
    let (bob, _bob_events) = server.session(ROOM, "uid-bob", "bob");

    // when (操作):
    bob.join_room().await.unwrap();
    wait_for(&mut alice_events, |e| *e == SessionEvent::ChatReceived).await;

    // then (期待する結果):
    let messages = alice.messages().await.unwrap();
    assert_eq!(
        messages[0].body,
        MessageBody::Text("bob has joined 🎉".to_string())
    );
}

#[tokio::test]
async fn test_leave_room_exits_once_after_notice() {
    // テスト項目: 退室通知を送った後、退出 API が 1 回だけ呼ばれる
    // given (前提条件):
    let server = TestServer::start().await;
    let (bob, mut bob_events) = connected(&server, "uid-bob", "bob").await;
    let (alice, mut alice_events) = connected(&server, OWNER, "alice").await;

    // when (操作):
    bob.leave_room().await.unwrap();
    wait_for(&mut bob_events, |e| *e == SessionEvent::ExitedRoom).await;
    wait_for(&mut alice_events, |e| *e == SessionEvent::ChatReceived).await;
    tokio::time::sleep(Duration::from_millis(700)).await;

    // then (期待する結果):
    assert_eq!(server.backend.exits.load(Ordering::SeqCst), 1);
    let messages = alice.messages().await.unwrap();
    assert_eq!(messages[0].body, MessageBody::Text("bob has left 🏃".to_string()));
}

#[tokio::test]
async fn test_image_is_uploaded_and_relayed() {
    // テスト項目: アップロードした画像の参照が他の参加者に画像として届く
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, _alice_events) = connected(&server, OWNER, "alice").await;
    let (bob, mut bob_events) = connected(&server, "uid-bob", "bob").await;

    // when (操作):
    alice.send_image(vec![0xff, 0xd8, 0xff, 0xe0]).await.unwrap();
    wait_for(&mut bob_events, |e| *e == SessionEvent::ChatReceived).await;

    // then (期待する結果):
    let messages = bob.messages().await.unwrap();
    match &messages[0].body {
        MessageBody::Image(image) => {
            assert_eq!(image.as_str(), IMAGE_ID);
            assert!(image.url(&server.config().media_base_url).ends_with(IMAGE_ID));
        }
        other => panic!("expected an image, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ban_reaches_the_banned_participant_only() {
    // テスト項目: 強制退室の通知は対象者には通知として、他の参加者には汎用メッセージとして届く
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, mut alice_events) = connected(&server, OWNER, "alice").await;
    let (bob, mut bob_events) = connected(&server, "uid-bob", "bob").await;
    let (carol, mut carol_events) = connected(&server, "uid-carol", "carol").await;

    // when (操作):
    alice
        .ban_user(
            UserId::try_from("uid-bob").unwrap(),
            Nickname::try_from("bob").unwrap(),
        )
        .await
        .unwrap();

    // then (期待する結果):
    wait_for(&mut bob_events, |e| *e == SessionEvent::ReceivedBanNotification).await;
    wait_for(&mut carol_events, |e| *e == SessionEvent::ChatReceived).await;
    wait_for(&mut alice_events, |e| *e == SessionEvent::ChatSent).await;
    assert!(bob.messages().await.unwrap().is_empty());
    assert_eq!(carol.messages().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_post_deletion_by_owner() {
    // テスト項目: 投稿者は投稿を削除できる
    // given (前提条件):
    let server = TestServer::start().await;
    let (alice, mut events) = connected(&server, OWNER, "alice").await;

    // when (操作):
    alice.request_post_deletion().await.unwrap();

    // then (期待する結果):
    wait_for(&mut events, |e| *e == SessionEvent::PostDeleted).await;
    assert_eq!(server.backend.deletions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_failure_is_terminal_after_retry_limit() {
    // テスト項目: 接続できないサーバーには上限回数まで試行し、終端の失敗を通知する
    // given (前提条件):
    // 使われていないポートを取得して閉じる
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ChatConfig {
        websocket_url: format!("ws://{}/ws", addr),
        api_base_url: format!("http://{}/api", addr),
        retry_limit: 2,
        reconnect_delay: Duration::from_millis(10),
        ..ChatConfig::default()
    };
    let services = ChatServices::from_config(&config, None);
    let context = SessionContext::new(
        UserId::try_from("uid-bob").unwrap(),
        Nickname::try_from("bob").unwrap(),
        BlockedUsers::new(),
    );
    let (bob, mut events) =
        ChatSession::spawn(RoomId::try_from(ROOM).unwrap(), context, config, services);

    // when (操作):
    bob.connect().await.unwrap();
    let failed = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::ConnectionFailed { .. })
    })
    .await;

    // then (期待する結果):
    assert_eq!(failed, SessionEvent::ConnectionFailed { attempts: 2 });
    assert_eq!(bob.state().await.unwrap(), ConnectionState::Disconnected);
    assert!(bob.send("hello").await.is_err());
}

#[tokio::test]
async fn test_unresponsive_server_suggests_reconnect() {
    // テスト項目: Ping に応答しないサーバーは生存確認に失敗し、再接続が提案される
    // given (前提条件):
    let server = TestServer::start().await;
    let config = ChatConfig {
        websocket_url: format!("ws://{}/silent", server.addr),
        ping_interval: Duration::from_millis(50),
        ..server.config()
    };
    let services = ChatServices::from_config(&config, None);
    let context = SessionContext::new(
        UserId::try_from("uid-bob").unwrap(),
        Nickname::try_from("bob").unwrap(),
        BlockedUsers::new(),
    );
    let (bob, mut events) =
        ChatSession::spawn(RoomId::try_from(ROOM).unwrap(), context, config, services);

    // when (操作):
    bob.connect().await.unwrap();
    wait_for(&mut events, |e| *e == SessionEvent::Connected).await;

    // then (期待する結果):
    wait_for(&mut events, |e| *e == SessionEvent::ReconnectSuggested).await;
    bob.close().await.unwrap();
}
