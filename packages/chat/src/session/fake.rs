//! テスト用のインメモリ ChatTransport

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{
    ChatTransport, RoomId, TransportError, TransportEvent, TransportLink, WriteRequest,
};

#[derive(Default)]
struct FakeState {
    opens: u32,
    always_fail: bool,
    echo: bool,
    stalled: bool,
    written: Vec<String>,
    server: Option<mpsc::UnboundedSender<TransportEvent>>,
}

/// 書き込まれたフレームを記録し、必要ならサーバーのようにエコーする
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 常に接続に失敗する
    pub(crate) fn refusing() -> Self {
        let transport = Self::default();
        transport.inner.lock().unwrap().always_fail = true;
        transport
    }

    /// 書き込まれたフレームをそのまま受信イベントとして返す
    pub(crate) fn echoing() -> Self {
        let transport = Self::default();
        transport.inner.lock().unwrap().echo = true;
        transport
    }

    /// 書き込みを受け取るが完了を返さない（詰まった送信路）
    pub(crate) fn stalled() -> Self {
        let transport = Self::default();
        transport.inner.lock().unwrap().stalled = true;
        transport
    }

    pub(crate) fn opens(&self) -> u32 {
        self.inner.lock().unwrap().opens
    }

    /// 書き込まれたフレームの `comment`
    pub(crate) fn written_comments(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .written
            .iter()
            .map(|raw| {
                let value: serde_json::Value = serde_json::from_str(raw).unwrap();
                value["comment"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }

    /// 現在の接続にサーバー側からイベントを送る
    pub(crate) fn push(&self, event: TransportEvent) {
        let state = self.inner.lock().unwrap();
        let server = state.server.as_ref().expect("no open connection");
        server.send(event).expect("connection dropped");
    }

    /// 他のユーザーからのチャットを送る
    pub(crate) fn push_chat(&self, user_id: &str, nickname: &str, comment: &str) {
        let frame = serde_json::json!({
            "id": nickname,
            "uuid": user_id,
            "room": "post-1",
            "comment": comment,
        });
        self.push(TransportEvent::Text(frame.to_string()));
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn open(&self, _room: &RoomId) -> Result<TransportLink, TransportError> {
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WriteRequest>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let (echo, stalled) = {
            let mut state = self.inner.lock().unwrap();
            state.opens += 1;
            if state.always_fail {
                return Err(TransportError::Connect("connection refused".to_string()));
            }
            state.server = Some(event_tx.clone());
            (state.echo, state.stalled)
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut pending = Vec::new();
            while let Some(request) = writer_rx.recv().await {
                inner.lock().unwrap().written.push(request.text.clone());
                if stalled {
                    pending.push(request);
                    continue;
                }
                if echo {
                    let _ = event_tx.send(TransportEvent::Text(request.text));
                }
                let _ = request.done.send(Ok(()));
            }
        });

        Ok(TransportLink {
            writer: writer_tx,
            events: event_rx,
        })
    }
}
