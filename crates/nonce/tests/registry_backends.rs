//! Registry 在不同存储后端上的集成测试

use siwe_nonce::{NonceConfig, NonceRegistry, NonceScope, ScopeMode, StoreBackend};
use std::sync::Arc;
use std::time::Duration;

async fn assert_single_use(registry: Arc<NonceRegistry>) {
    let scope = registry
        .scope_for(Some("0x71C7656EC7ab88b098defB751B7401B5f6d8976F"))
        .unwrap();
    let nonce = registry.issue(scope.clone()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        let scope = scope.clone();
        let nonce = nonce.clone();
        handles.push(tokio::spawn(async move {
            registry.consume(&scope, &nonce).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert!(!registry.consume(&scope, &nonce).await.unwrap());
}

#[tokio::test]
async fn test_memory_registry_single_use() {
    let registry = NonceRegistry::from_config(&NonceConfig::default())
        .await
        .unwrap();
    assert_eq!(registry.backend_name(), "memory");
    assert_single_use(Arc::new(registry)).await;
}

#[cfg(feature = "backend-sqlite")]
#[tokio::test]
async fn test_sqlite_registry_single_use_and_expiry() {
    let temp_dir = tempfile::tempdir().unwrap();
    let toml_str = format!(
        r#"
        backend = "sqlite"
        scope = "address"
        ttl_seconds = 1

        [sqlite]
        path = "{}"
        "#,
        temp_dir.path().join("nonces.db").display()
    );
    let config: NonceConfig = toml::from_str(&toml_str).unwrap();
    assert_eq!(config.backend, StoreBackend::Sqlite);

    let registry = Arc::new(NonceRegistry::from_config(&config).await.unwrap());
    assert_eq!(registry.scope_mode(), ScopeMode::Address);
    assert_single_use(registry.clone()).await;

    let scope = NonceScope::address("0x1111111111111111111111111111111111111111");
    let nonce = registry.issue(scope.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!registry.consume(&scope, &nonce).await.unwrap());
}

#[cfg(feature = "backend-sqlite")]
#[tokio::test]
async fn test_sqlite_records_survive_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = NonceConfig {
        backend: StoreBackend::Sqlite,
        scope: ScopeMode::Anonymous,
        sqlite: Some(siwe_nonce::SqliteConfig {
            path: temp_dir.path().join("nonces.db").display().to_string(),
        }),
        ..Default::default()
    };

    let nonce = {
        let registry = NonceRegistry::from_config(&config).await.unwrap();
        registry.issue(NonceScope::Anonymous).await.unwrap()
    };

    let registry = NonceRegistry::from_config(&config).await.unwrap();
    assert_eq!(registry.stats().await.unwrap().total_records, 1);
    assert!(registry.consume(&NonceScope::Anonymous, &nonce).await.unwrap());
}

#[cfg(feature = "backend-redis")]
#[tokio::test]
#[ignore] // 需要 Redis 服务器
async fn test_redis_registry_single_use() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".into());
    let config = NonceConfig {
        backend: StoreBackend::Redis,
        redis: Some(siwe_nonce::RedisConfig {
            url,
            ..Default::default()
        }),
        ..Default::default()
    };

    let registry = NonceRegistry::from_config(&config).await.unwrap();
    assert_eq!(registry.backend_name(), "redis");
    assert_single_use(Arc::new(registry)).await;
}
