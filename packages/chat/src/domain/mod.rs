//! Domain 層
//!
//! チャットセッションが扱う値オブジェクト・エンティティ・メッセージフィルタと、
//! 外部境界（REST API / WebSocket トランスポート）のインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod api;
pub mod context;
pub mod entity;
pub mod error;
pub mod filter;
pub mod retry;
pub mod transport;
pub mod value_object;

pub use api::{ChatHistoryApi, MediaApi, PostApi, RoomMembershipApi};
pub use context::{BlockedUsers, SessionContext};
pub use entity::{ChatFrame, ChatMessage, HistoryEntry, MessageBody, Participant, RoomInfo, Sender};
pub use error::{ApiError, TransportError, ValueObjectError};
pub use filter::{FilterOutcome, MessageOrigin};
pub use retry::{ConnectionState, PaginationCursor, RetryBudget, RetryDecision};
pub use transport::{ChatTransport, TransportEvent, TransportLink, WriteRequest, write_frame};
pub use value_object::{ImageRef, Nickname, RoomId, Timestamp, UserId};
