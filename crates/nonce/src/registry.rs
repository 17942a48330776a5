//! Nonce Registry
//!
//! 签发、消费以及清理一次性 nonce。Registry 是显式构造并注入的实例，
//! 不存在模块级全局状态。

use crate::config::NonceConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::scope::{NonceScope, ScopeMode};
use crate::storage::NonceStore;
use crate::types::{NonceRecord, StoreStats, now_millis};
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// nonce 随机字节数（128 bit）
pub const NONCE_BYTES: usize = 16;

/// 生成 nonce 冲突时的最大尝试次数
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// 生成新的 nonce：操作系统 CSPRNG 的 16 字节，编码为 32 位小写 hex
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Nonce Registry
#[derive(Clone, Debug)]
pub struct NonceRegistry {
    store: NonceStore,
    ttl: Duration,
    scope_mode: ScopeMode,
    /// 每签发多少次触发一次惰性清理，0 表示关闭
    cleanup_every: u32,
    /// 签发计数器（用于惰性清理触发）
    issue_counter: Arc<AtomicU32>,
}

impl NonceRegistry {
    pub fn new(store: NonceStore, ttl: Duration, scope_mode: ScopeMode) -> Self {
        Self {
            store,
            ttl,
            scope_mode,
            cleanup_every: 0,
            issue_counter: Arc::new(AtomicU32::new(0)),
        }
    }

    /// 设置惰性清理间隔
    pub fn with_cleanup_every(mut self, cleanup_every: u32) -> Self {
        self.cleanup_every = cleanup_every;
        self
    }

    /// 从配置创建 Registry（初始化存储后端）
    pub async fn from_config(config: &NonceConfig) -> RegistryResult<Self> {
        if config.ttl_seconds == 0 {
            return Err(RegistryError::Config(
                "nonce.ttl_seconds must be greater than 0".into(),
            ));
        }

        let store = NonceStore::from_config(config).await?;
        info!(
            "Nonce registry ready: backend={}, scope={}, ttl={}s",
            store.backend_name(),
            config.scope,
            config.ttl_seconds
        );

        Ok(Self::new(
            store,
            Duration::from_secs(config.ttl_seconds),
            config.scope,
        )
        .with_cleanup_every(config.cleanup_every))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn scope_mode(&self) -> ScopeMode {
        self.scope_mode
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// 根据部署的作用域模式，为声明的地址选择作用域
    ///
    /// anonymous 模式下忽略地址
    pub fn scope_for(&self, address: Option<&str>) -> Option<NonceScope> {
        match (self.scope_mode, address) {
            (ScopeMode::Anonymous, _) => Some(NonceScope::Anonymous),
            (ScopeMode::Address, Some(address)) => Some(NonceScope::address(address)),
            (ScopeMode::Address, None) => None,
        }
    }

    /// 签发新的 nonce 并记录签发时间
    ///
    /// # Errors
    /// * `RegistryError::StorageUnavailable` - 存储后端不可用
    pub async fn issue(&self, scope: NonceScope) -> RegistryResult<String> {
        self.maybe_cleanup_expired();

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let nonce = generate_nonce();
            let record = NonceRecord::new(scope.clone(), nonce.clone(), now_millis());

            match self.store.insert(&record, self.ttl).await {
                Ok(()) => {
                    debug!("Issued nonce {}... for scope {}", &nonce[..8], scope);
                    return Ok(nonce);
                }
                Err(RegistryError::DuplicateNonce) => {
                    warn!(
                        "Nonce collision in scope {} (attempt {}/{})",
                        scope, attempt, MAX_ISSUE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(RegistryError::StorageUnavailable(
            "failed to store a unique nonce".into(),
        ))
    }

    /// 原子地消费 nonce
    ///
    /// 记录存在且未过期时返回 `true`。记录一旦被取出即被删除，
    /// 过期的记录同样被删除但返回 `false`。对同一个 nonce 的并发调用
    /// 至多只有一个得到 `true`。
    pub async fn consume(&self, scope: &NonceScope, nonce: &str) -> RegistryResult<bool> {
        let Some(record) = self.store.take(scope, nonce).await? else {
            debug!("Nonce not found in scope {}", scope);
            return Ok(false);
        };

        if record.is_expired(self.ttl, now_millis()) {
            debug!(
                "Nonce expired in scope {} (issued_at={})",
                scope, record.issued_at
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// 清理所有已过期的记录
    pub async fn purge_expired(&self) -> RegistryResult<u64> {
        let cutoff = now_millis().saturating_sub(self.ttl.as_millis() as i64);
        self.store.purge_issued_before(cutoff).await
    }

    /// 获取存储统计信息
    pub async fn stats(&self) -> RegistryResult<StoreStats> {
        Ok(StoreStats {
            total_records: self.store.count().await?,
            backend: self.store.backend_name(),
        })
    }

    /// 惰性清理：每 `cleanup_every` 次签发在后台清理一次过期记录
    fn maybe_cleanup_expired(&self) {
        if self.cleanup_every == 0 {
            return;
        }

        let count = self.issue_counter.fetch_add(1, Ordering::Relaxed);
        if count % self.cleanup_every != 0 || count == 0 {
            return;
        }

        // 在后台异步清理，不阻塞当前请求
        let registry = self.clone();
        tokio::spawn(async move {
            match registry.purge_expired().await {
                Ok(cleaned) if cleaned > 0 => {
                    info!("Lazy cleanup: removed {} expired nonces", cleaned);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to cleanup expired nonces: {}", e),
            }
        });
    }

    /// 启动周期性的过期清理任务
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.purge_expired().await {
                    Ok(cleaned) if cleaned > 0 => {
                        info!("Sweeper removed {} expired nonces", cleaned);
                    }
                    Ok(_) => debug!("Sweeper found no expired nonces"),
                    Err(e) => warn!("Nonce sweep failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn memory_registry(ttl: Duration, mode: ScopeMode) -> NonceRegistry {
        NonceRegistry::new(NonceStore::Memory(MemoryBackend::new()), ttl, mode)
    }

    #[test]
    fn test_generate_nonce_format() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_BYTES * 2);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(nonce, generate_nonce());
    }

    #[tokio::test]
    async fn test_issue_and_consume_once() {
        let registry = memory_registry(Duration::from_secs(300), ScopeMode::Address);
        let scope = NonceScope::address("0x71C7656EC7ab88b098defB751B7401B5f6d8976F");

        let nonce = registry.issue(scope.clone()).await.unwrap();
        assert!(registry.consume(&scope, &nonce).await.unwrap());
        assert!(!registry.consume(&scope, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_nonce_rejected() {
        let registry = memory_registry(Duration::from_secs(300), ScopeMode::Anonymous);
        assert!(
            !registry
                .consume(&NonceScope::Anonymous, "deadbeef")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_expired_nonce_rejected_and_removed() {
        let registry = memory_registry(Duration::from_millis(50), ScopeMode::Anonymous);
        let nonce = registry.issue(NonceScope::Anonymous).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!registry.consume(&NonceScope::Anonymous, &nonce).await.unwrap());
        assert_eq!(registry.stats().await.unwrap().total_records, 0);
    }

    #[tokio::test]
    async fn test_address_scope_isolation() {
        let registry = memory_registry(Duration::from_secs(300), ScopeMode::Address);
        let a = NonceScope::address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let b = NonceScope::address("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

        let nonce = registry.issue(a.clone()).await.unwrap();
        assert!(!registry.consume(&b, &nonce).await.unwrap());
        assert!(registry.consume(&a, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn test_address_scope_case_insensitive() {
        let registry = memory_registry(Duration::from_secs(300), ScopeMode::Address);
        let nonce = registry
            .issue(NonceScope::address("0xABCDEF0000000000000000000000000000000001"))
            .await
            .unwrap();

        let scope = NonceScope::address("0xabcdef0000000000000000000000000000000001");
        assert!(registry.consume(&scope, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_consume_single_winner() {
        let registry = Arc::new(memory_registry(
            Duration::from_secs(300),
            ScopeMode::Anonymous,
        ));
        let nonce = registry.issue(NonceScope::Anonymous).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            let nonce = nonce.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .consume(&NonceScope::Anonymous, &nonce)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_scope_for_mode() {
        let address = "0xAbCdEF0000000000000000000000000000000001";

        let registry = memory_registry(Duration::from_secs(300), ScopeMode::Address);
        assert_eq!(
            registry.scope_for(Some(address)),
            Some(NonceScope::address(address))
        );
        assert_eq!(registry.scope_for(None), None);

        let registry = memory_registry(Duration::from_secs(300), ScopeMode::Anonymous);
        assert_eq!(
            registry.scope_for(Some(address)),
            Some(NonceScope::Anonymous)
        );
        assert_eq!(registry.scope_for(None), Some(NonceScope::Anonymous));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let registry = memory_registry(Duration::from_millis(50), ScopeMode::Anonymous);
        for _ in 0..3 {
            registry.issue(NonceScope::Anonymous).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(120)).await;
        let fresh = registry.issue(NonceScope::Anonymous).await.unwrap();

        assert_eq!(registry.purge_expired().await.unwrap(), 3);
        assert!(registry.consume(&NonceScope::Anonymous, &fresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_from_config_rejects_zero_ttl() {
        let config = NonceConfig {
            ttl_seconds: 0,
            ..Default::default()
        };
        assert!(matches!(
            NonceRegistry::from_config(&config).await,
            Err(RegistryError::Config(_))
        ));
    }
}
