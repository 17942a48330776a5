//! 进程内存储后端实现
//!
//! 单实例部署使用。消费操作在同一把写锁内完成"查找并删除"。

use crate::error::{RegistryError, RegistryResult};
use crate::scope::NonceScope;
use crate::storage::backend::NonceStoreBackend;
use crate::types::NonceRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// (scope key, nonce) -> issued_at
type Entries = HashMap<(String, String), i64>;

/// 内存存储后端
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<Entries>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NonceStoreBackend for MemoryBackend {
    async fn init(&self) -> RegistryResult<()> {
        debug!("Memory backend initialized (no schema needed)");
        Ok(())
    }

    async fn insert(&self, record: &NonceRecord, _ttl: Duration) -> RegistryResult<()> {
        let key = (
            record.scope.storage_key().to_string(),
            record.nonce.clone(),
        );

        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(RegistryError::DuplicateNonce);
        }
        entries.insert(key, record.issued_at);
        Ok(())
    }

    async fn take(&self, scope: &NonceScope, nonce: &str) -> RegistryResult<Option<NonceRecord>> {
        let key = (scope.storage_key().to_string(), nonce.to_string());
        let issued_at = self.entries.write().await.remove(&key);

        Ok(issued_at.map(|issued_at| NonceRecord::new(scope.clone(), key.1, issued_at)))
    }

    async fn purge_issued_before(&self, cutoff_ms: i64) -> RegistryResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, issued_at| *issued_at > cutoff_ms);
        Ok((before - entries.len()) as u64)
    }

    async fn count(&self) -> RegistryResult<u64> {
        Ok(self.entries.read().await.len() as u64)
    }
}
