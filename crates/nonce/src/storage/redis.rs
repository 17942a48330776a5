//! Redis 存储后端实现
//!
//! 多实例部署使用。签发用 `SET NX PX`，消费用 `GETDEL`，
//! 两者都是单条命令，跨实例原子。

use crate::config::RedisConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::scope::NonceScope;
use crate::storage::backend::NonceStoreBackend;
use crate::types::NonceRecord;
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use std::time::Duration;
use tracing::{debug, info};

const KEY_PREFIX: &str = "nonce";

/// Redis 存储后端
///
/// 数据结构设计：
/// - nonce:{scope}:{nonce} -> Integer (签发时间，毫秒)，带原生 TTL
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("max_size", &self.pool.status().max_size)
            .finish()
    }
}

fn record_key(scope: &NonceScope, nonce: &str) -> String {
    format!("{KEY_PREFIX}:{}:{nonce}", scope.storage_key())
}

impl RedisBackend {
    /// 创建新的 Redis 后端实例并测试连接
    pub async fn new(config: &RedisConfig) -> RegistryResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);

        let mut cfg = Config::from_url(&config.url);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RegistryError::Config(format!("Failed to create Redis pool: {e}")))?;

        let backend = Self { pool };
        backend.init().await?;

        info!(
            "Redis nonce storage initialized: url={}, pool_size={}",
            config.url, config.pool_size
        );

        Ok(backend)
    }

    async fn connection(&self) -> RegistryResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| RegistryError::storage("Failed to get Redis connection", e))
    }
}

#[async_trait]
impl NonceStoreBackend for RedisBackend {
    async fn init(&self) -> RegistryResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut *conn)
            .await
            .map_err(|e| RegistryError::storage("Redis PING failed", e))?;

        debug!("Redis backend initialized (no schema needed)");
        Ok(())
    }

    async fn insert(&self, record: &NonceRecord, ttl: Duration) -> RegistryResult<()> {
        let mut conn = self.connection().await?;
        let key = record_key(&record.scope, &record.nonce);
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let stored: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(record.issued_at)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut *conn)
            .await
            .map_err(|e| RegistryError::storage("Failed to store nonce in Redis", e))?;

        match stored {
            Some(_) => Ok(()),
            None => Err(RegistryError::DuplicateNonce),
        }
    }

    async fn take(&self, scope: &NonceScope, nonce: &str) -> RegistryResult<Option<NonceRecord>> {
        let mut conn = self.connection().await?;
        let key = record_key(scope, nonce);

        // GETDEL 需要 Redis >= 6.2
        let issued_at: Option<i64> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| RegistryError::storage("Failed to consume nonce in Redis", e))?;

        Ok(issued_at.map(|issued_at| NonceRecord::new(scope.clone(), nonce.to_string(), issued_at)))
    }

    async fn purge_issued_before(&self, _cutoff_ms: i64) -> RegistryResult<u64> {
        // 记录写入时已设置 PX，Redis 会自动清理
        debug!("Redis automatically handles nonce expiration via TTL");
        Ok(0)
    }

    async fn count(&self) -> RegistryResult<u64> {
        let mut conn = self.connection().await?;

        let mut cursor = 0u64;
        let mut count = 0u64;
        let pattern = format!("{KEY_PREFIX}:*");

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await
                .map_err(|e| RegistryError::storage("Failed to scan nonce keys", e))?;

            count += keys.len() as u64;
            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }
}
