//! tokio-tungstenite を使った ChatTransport 実装
//!
//! ## 責務
//!
//! - WebSocket 接続の確立
//! - 受信ループ（テキストフレームを `TransportEvent` に変換）
//! - 書き込みループ（`WriteRequest` を順に送信し、完了を通知）
//! - 生存確認（一定間隔で Ping を送り、何も受信しない時間が続けば `ReconnectSuggested`）
//!
//! `TransportLink` がドロップされると書き込みループが終了し、ソケットを閉じる。

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::time::Duration;

use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::domain::{
    ChatTransport, RoomId, TransportError, TransportEvent, TransportLink, WriteRequest,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 何も受信しないまま Ping 間隔の何倍が過ぎたら接続を疑うか
const LIVENESS_FACTOR: u32 = 2;

/// WebSocket を使った ChatTransport 実装
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    ping_interval: Duration,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, ping_interval: Duration) -> Self {
        Self {
            url: url.into(),
            ping_interval,
        }
    }
}

#[async_trait]
impl ChatTransport for WebSocketTransport {
    async fn open(&self, room: &RoomId) -> Result<TransportLink, TransportError> {
        tracing::debug!("Opening WebSocket {} for room '{}'", self.url, room);

        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        writer_loop(writer_rx, write, self.ping_interval);
        reader_loop(read, event_tx, self.ping_interval * LIVENESS_FACTOR);

        Ok(TransportLink {
            writer: writer_tx,
            events: event_rx,
        })
    }
}

/// Spawns a task that writes requested frames to the WebSocket sink in order.
///
/// Between requests it sends a Ping every `ping_interval`. The task ends (and
/// closes the sink) when every sender of the request channel has been dropped
/// or a write fails.
fn writer_loop(
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    mut sink: SplitSink<WsStream, Message>,
    ping_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping = time::interval_at(time::Instant::now() + ping_interval, ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                request = rx.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    let result = sink
                        .send(Message::Text(request.text.into()))
                        .await
                        .map_err(|e| TransportError::Write(e.to_string()));
                    let failed = result.is_err();

                    // 要求元が既にいなくても書き込みは完了している
                    let _ = request.done.send(result);

                    if failed {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if let Err(e) = sink.send(Message::Ping(Default::default())).await {
                        tracing::debug!("Failed to send ping: {}", e);
                        break;
                    }
                }
            }
        }

        if let Err(e) = sink.close().await {
            tracing::debug!("Failed to close WebSocket sink: {}", e);
        }
    })
}

/// Spawns a task that forwards inbound frames as `TransportEvent`s.
///
/// Any frame (including Pong) counts as a sign of life. If nothing arrives
/// within `liveness_timeout` the task reports `ReconnectSuggested` and ends.
fn reader_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<TransportEvent>,
    liveness_timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let message = match time::timeout(liveness_timeout, stream.next()).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!("No frame received for {:?}", liveness_timeout);
                    let _ = events.send(TransportEvent::ReconnectSuggested);
                    return;
                }
            };

            let event = match message {
                Ok(Message::Text(text)) => TransportEvent::Text(text.as_str().to_string()),
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|frame| frame.reason.as_str().to_string())
                        .unwrap_or_default();
                    tracing::info!("Server closed the connection: '{}'", reason);
                    let _ = events.send(TransportEvent::Disconnected(reason));
                    return;
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!("Ignoring {} bytes of binary data", data.len());
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    return;
                }
            };

            if events.send(event).is_err() {
                // セッション側がリンクを破棄した
                return;
            }
        }

        let _ = events.send(TransportEvent::Error("stream ended".to_string()));
    })
}
