//! Time-related utilities with clock abstraction for testability.
//!
//! The marketplace backend speaks Korea Standard Time (UTC+9) in its chat
//! date strings, so formatting and parsing helpers here are KST based.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

/// KST offset from UTC in seconds
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Date format used by the chat history API (`2023-01-01 09:30:00`)
pub const CHAT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        get_timestamp_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp (milliseconds)
pub fn get_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

fn to_kst(timestamp_millis: i64) -> Option<DateTime<FixedOffset>> {
    kst().timestamp_millis_opt(timestamp_millis).single()
}

/// Convert Unix timestamp (milliseconds) to KST RFC 3339 format
pub fn timestamp_to_kst_rfc3339(timestamp_millis: i64) -> String {
    match to_kst(timestamp_millis) {
        Some(dt) => dt.to_rfc3339(),
        None => timestamp_millis.to_string(),
    }
}

/// Format a timestamp the way the chat history API expects it
pub fn format_chat_date(timestamp_millis: i64) -> String {
    match to_kst(timestamp_millis) {
        Some(dt) => dt.format(CHAT_DATE_FORMAT).to_string(),
        None => timestamp_millis.to_string(),
    }
}

/// Parse a chat history date string (KST) into a Unix timestamp (milliseconds)
pub fn parse_chat_date(value: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), CHAT_DATE_FORMAT).ok()?;
    let dt = naive.and_local_timezone(kst()).single()?;
    Some(dt.timestamp_millis())
}

/// Short `HH:MM` label shown next to a chat bubble
pub fn format_clock_label(timestamp_millis: i64) -> String {
    match to_kst(timestamp_millis) {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => String::from("--:--"),
    }
}
