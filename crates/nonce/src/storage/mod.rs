//! Nonce 存储模块
//!
//! 提供多种存储后端支持：Memory, SQLite, Redis
//!
//! # 设计
//!
//! - `NonceStoreBackend` trait 定义统一的异步接口
//! - `NonceStore` enum 封装不同的后端实现
//! - 通过 `NonceConfig` 配置选择和初始化后端

use std::time::Duration;

pub mod backend;
pub mod memory;

#[cfg(feature = "backend-sqlite")]
pub mod sqlite;

#[cfg(feature = "backend-redis")]
pub mod redis;

use crate::config::{NonceConfig, StoreBackend};
use crate::error::{RegistryError, RegistryResult};
use crate::scope::NonceScope;
use crate::types::NonceRecord;

pub use backend::NonceStoreBackend;
pub use memory::MemoryBackend;

#[cfg(feature = "backend-sqlite")]
use sqlite::SqliteBackend;

#[cfg(feature = "backend-redis")]
use redis::RedisBackend;

/// Nonce 存储统一接口
#[derive(Clone, Debug)]
pub enum NonceStore {
    /// 进程内存储（始终可用）
    Memory(MemoryBackend),

    /// SQLite 存储后端
    #[cfg(feature = "backend-sqlite")]
    Sqlite(Box<SqliteBackend>),

    /// Redis 存储后端
    #[cfg(feature = "backend-redis")]
    Redis(RedisBackend),
}

impl NonceStore {
    /// 从配置创建存储实例
    ///
    /// # Errors
    /// - 缺少对应后端的配置
    /// - 后端初始化失败
    /// - 后端功能未启用（feature flag）
    pub async fn from_config(config: &NonceConfig) -> RegistryResult<Self> {
        match config.backend {
            StoreBackend::Memory => Ok(Self::Memory(MemoryBackend::new())),

            #[cfg(feature = "backend-sqlite")]
            StoreBackend::Sqlite => {
                let cfg = config
                    .sqlite
                    .as_ref()
                    .ok_or_else(|| RegistryError::Config("Missing SQLite config".into()))?;
                let backend = SqliteBackend::new(cfg).await?;
                Ok(Self::Sqlite(Box::new(backend)))
            }

            #[cfg(feature = "backend-redis")]
            StoreBackend::Redis => {
                let cfg = config
                    .redis
                    .as_ref()
                    .ok_or_else(|| RegistryError::Config("Missing Redis config".into()))?;
                let backend = RedisBackend::new(cfg).await?;
                Ok(Self::Redis(backend))
            }

            #[cfg(not(feature = "backend-sqlite"))]
            StoreBackend::Sqlite => Err(RegistryError::Config(
                "SQLite backend not enabled. Compile with --features backend-sqlite".into(),
            )),

            #[cfg(not(feature = "backend-redis"))]
            StoreBackend::Redis => Err(RegistryError::Config(
                "Redis backend not enabled. Compile with --features backend-redis".into(),
            )),
        }
    }

    fn backend(&self) -> &dyn NonceStoreBackend {
        match self {
            Self::Memory(b) => b,

            #[cfg(feature = "backend-sqlite")]
            Self::Sqlite(b) => b.as_ref(),

            #[cfg(feature = "backend-redis")]
            Self::Redis(b) => b,
        }
    }

    /// 写入新的 nonce 记录
    pub async fn insert(&self, record: &NonceRecord, ttl: Duration) -> RegistryResult<()> {
        self.backend().insert(record, ttl).await
    }

    /// 原子地取出并删除 nonce 记录
    pub async fn take(
        &self,
        scope: &NonceScope,
        nonce: &str,
    ) -> RegistryResult<Option<NonceRecord>> {
        self.backend().take(scope, nonce).await
    }

    /// 清理签发时间不晚于 `cutoff_ms` 的记录
    pub async fn purge_issued_before(&self, cutoff_ms: i64) -> RegistryResult<u64> {
        self.backend().purge_issued_before(cutoff_ms).await
    }

    /// 获取记录总数
    pub async fn count(&self) -> RegistryResult<u64> {
        self.backend().count().await
    }

    /// 获取后端类型名称
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",

            #[cfg(feature = "backend-sqlite")]
            Self::Sqlite(_) => "sqlite",

            #[cfg(feature = "backend-redis")]
            Self::Redis(_) => "redis",
        }
    }
}
