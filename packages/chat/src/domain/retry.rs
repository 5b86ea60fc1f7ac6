//! 接続状態・再接続予算・ページングカーソル
//!
//! 副作用のない状態遷移だけをここに置き、テストしやすくしている。

/// WebSocket の接続状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// 失敗を記録した結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 再接続する（`attempt` は何回目の失敗か）
    Retry { attempt: u32 },
    /// 予算を使い切った
    Exhausted,
}

/// 連続した接続失敗の回数と上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    attempts: u32,
    limit: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { attempts: 0, limit }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.limit
    }

    /// 接続失敗を 1 回消費する
    ///
    /// 上限に達した失敗で `Exhausted` を返す。つまり `limit` 回連続で失敗すると
    /// それ以上の接続は行われない。
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.is_exhausted() {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry {
                attempt: self.attempts,
            }
        }
    }

    /// 接続成功時に呼ぶ
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// 1 始まりのページ番号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    page: u32,
    exhausted: bool,
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self {
            page: 1,
            exhausted: false,
        }
    }
}

impl PaginationCursor {
    pub fn page(&self) -> u32 {
        self.page
    }

    /// 空のページを受け取った後は true
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// 空でないページを取得できたときに呼ぶ
    pub fn advance(&mut self) {
        self.page += 1;
    }

    /// 空のページを受け取ったときに呼ぶ（ページ番号は進めない）
    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
