//! セッションコンテキスト
//!
//! 利用者の ID・ニックネームと、ブロック済みユーザー集合を明示的に渡すための型。
//! ブロック集合はアカウント側のサブシステムが更新し、チャットセッションは読むだけ。

use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

use super::{Nickname, UserId};

/// ブロック済み（チャットから締め出した）ユーザーの集合
#[derive(Debug, Clone, Default)]
pub struct BlockedUsers {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl BlockedUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = ids.into_iter().map(Into::into).collect();
        Self {
            inner: Arc::new(RwLock::new(set)),
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        match self.inner.read() {
            Ok(set) => set.contains(user_id),
            Err(poisoned) => poisoned.into_inner().contains(user_id),
        }
    }

    pub fn insert(&self, user_id: impl Into<String>) {
        match self.inner.write() {
            Ok(mut set) => {
                set.insert(user_id.into());
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(user_id.into());
            }
        }
    }

    pub fn remove(&self, user_id: &str) {
        match self.inner.write() {
            Ok(mut set) => {
                set.remove(user_id);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(user_id);
            }
        }
    }
}

/// チャットセッションに注入される利用者情報
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: UserId,
    pub nickname: Nickname,
    pub blocked: BlockedUsers,
}

impl SessionContext {
    pub fn new(user_id: UserId, nickname: Nickname, blocked: BlockedUsers) -> Self {
        Self {
            user_id,
            nickname,
            blocked,
        }
    }

    pub fn is_me(&self, user_id: &str) -> bool {
        self.user_id.as_str() == user_id
    }

    pub fn is_blocked(&self, user_id: &str) -> bool {
        self.blocked.contains(user_id)
    }
}
