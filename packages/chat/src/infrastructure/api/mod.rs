//! REST API クライアントの実装
//!
//! - `http`: reqwest を使った実装

pub mod http;

pub use http::HttpApiClient;
