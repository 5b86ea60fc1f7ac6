//! Utilities shared by the group-buy chat packages.

pub mod logger;
pub mod time;
