//! Data Transfer Objects (DTOs) for the chat backend.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket frame DTOs
//! - `http`: REST API request / response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
