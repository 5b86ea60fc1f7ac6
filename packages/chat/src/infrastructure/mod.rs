//! Infrastructure 層
//!
//! Domain 層が定義する trait（REST API・WebSocket トランスポート）の具体的な実装と、
//! 通信で使う DTO を提供します。

pub mod api;
pub mod dto;
pub mod transport;
