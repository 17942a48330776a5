//! Nonce Registry 数据类型定义

use crate::scope::NonceScope;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 存储中的 nonce 记录
///
/// 已消费的 nonce 直接从存储中删除，因此没有单独的 consumed 标记。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    /// 作用域
    pub scope: NonceScope,
    /// nonce 值
    pub nonce: String,
    /// 签发时间（Unix 毫秒）
    pub issued_at: i64,
}

impl NonceRecord {
    pub fn new(scope: NonceScope, nonce: String, issued_at: i64) -> Self {
        Self {
            scope,
            nonce,
            issued_at,
        }
    }

    /// 过期时间（Unix 毫秒）
    pub fn expires_at(&self, ttl: Duration) -> i64 {
        self.issued_at.saturating_add(ttl.as_millis() as i64)
    }

    /// 在 `now_ms` 时刻是否已过期（到达截止时间即视为过期）
    pub fn is_expired(&self, ttl: Duration, now_ms: i64) -> bool {
        now_ms >= self.expires_at(ttl)
    }
}

/// 存储统计信息
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// 当前记录数（可能包含尚未清理的过期记录）
    pub total_records: u64,
    /// 后端名称
    pub backend: &'static str,
}

/// 当前 Unix 时间（毫秒）
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
