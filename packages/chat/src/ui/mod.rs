//! UI 層: ターミナルのフロントエンド

pub mod command;
pub mod error;
pub mod formatter;
pub mod runner;

pub use error::ClientError;
pub use runner::{ClientOptions, run_client};
