//! Nonce 存储后端抽象接口
//!
//! 定义了所有存储后端必须实现的统一异步接口

use crate::error::RegistryResult;
use crate::scope::NonceScope;
use crate::types::NonceRecord;
use async_trait::async_trait;
use std::time::Duration;

/// Nonce 存储后端抽象接口
///
/// 所有存储后端（Memory, SQLite, Redis）都需要实现此 trait。
/// `take` 必须是原子的"读取并删除"：同一条记录在并发调用下只能被一个调用方取到。
/// 先读再单独删除的实现会重新引入重放竞争，不允许使用。
#[async_trait]
pub trait NonceStoreBackend: Send + Sync {
    /// 初始化存储后端
    ///
    /// 执行必要的初始化操作，如创建表、索引等
    async fn init(&self) -> RegistryResult<()>;

    /// 写入新的 nonce 记录
    ///
    /// # Arguments
    /// * `record` - nonce 记录
    /// * `ttl` - 有效期，支持原生 TTL 的后端用它设置过期
    ///
    /// # Errors
    /// * `RegistryError::DuplicateNonce` - 同作用域下已存在相同 nonce
    async fn insert(&self, record: &NonceRecord, ttl: Duration) -> RegistryResult<()>;

    /// 原子地取出并删除 nonce 记录
    ///
    /// # Returns
    /// * `Ok(Some(record))` - 记录存在，已被删除
    /// * `Ok(None)` - 记录不存在（从未签发或已被消费）
    /// * `Err(...)` - 存储错误
    async fn take(&self, scope: &NonceScope, nonce: &str) -> RegistryResult<Option<NonceRecord>>;

    /// 删除签发时间早于等于 `cutoff_ms` 的记录
    ///
    /// # Returns
    /// 被清理的记录数量
    async fn purge_issued_before(&self, cutoff_ms: i64) -> RegistryResult<u64>;

    /// 获取存储中的记录总数
    async fn count(&self) -> RegistryResult<u64>;
}
