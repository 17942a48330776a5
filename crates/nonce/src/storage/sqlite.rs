//! SQLite 存储后端实现
//!
//! 使用 sqlx 提供原生异步 SQLite 存储支持。消费通过单条
//! `DELETE ... RETURNING` 语句完成，读取与删除不可分割。

use crate::config::SqliteConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::scope::NonceScope;
use crate::storage::backend::NonceStoreBackend;
use crate::types::NonceRecord;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite 存储后端
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl SqliteBackend {
    /// 创建新的 SQLite 后端实例
    ///
    /// 数据库文件的父目录不存在时会自动创建
    pub async fn new(config: &SqliteConfig) -> RegistryResult<Self> {
        let file = Path::new(&config.path);
        if let Some(parent) = file.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                RegistryError::Config(format!(
                    "Failed to create SQLite directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        // 创建连接选项并启用 WAL 模式
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", file.display()))
            .map_err(|e| RegistryError::Config(format!("Failed to parse SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| RegistryError::storage("Failed to connect to SQLite", e))?;

        let backend = Self { pool };
        backend.init().await?;

        info!(
            "SQLite nonce storage initialized: path={}, WAL mode enabled",
            file.display()
        );

        Ok(backend)
    }
}

#[async_trait]
impl NonceStoreBackend for SqliteBackend {
    async fn init(&self) -> RegistryResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nonce_records (
                scope TEXT NOT NULL,
                nonce TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                PRIMARY KEY (scope, nonce)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::storage("Failed to create nonce_records table", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_nonce_records_issued_at ON nonce_records(issued_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::storage("Failed to create index", e))?;

        debug!("SQLite nonce tables and indexes initialized");
        Ok(())
    }

    async fn insert(&self, record: &NonceRecord, _ttl: Duration) -> RegistryResult<()> {
        let result =
            sqlx::query("INSERT INTO nonce_records (scope, nonce, issued_at) VALUES (?, ?, ?)")
                .bind(record.scope.storage_key())
                .bind(&record.nonce)
                .bind(record.issued_at)
                .execute(&self.pool)
                .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => {
                Err(RegistryError::DuplicateNonce)
            }
            Err(e) => Err(RegistryError::storage("Failed to insert nonce", e)),
        }
    }

    async fn take(&self, scope: &NonceScope, nonce: &str) -> RegistryResult<Option<NonceRecord>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "DELETE FROM nonce_records WHERE scope = ? AND nonce = ? RETURNING issued_at",
        )
        .bind(scope.storage_key())
        .bind(nonce)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RegistryError::storage("Failed to consume nonce", e))?;

        Ok(row.map(|(issued_at,)| NonceRecord::new(scope.clone(), nonce.to_string(), issued_at)))
    }

    async fn purge_issued_before(&self, cutoff_ms: i64) -> RegistryResult<u64> {
        let result = sqlx::query("DELETE FROM nonce_records WHERE issued_at <= ?")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await
            .map_err(|e| RegistryError::storage("Failed to purge expired nonces", e))?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> RegistryResult<u64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nonce_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RegistryError::storage("Failed to count nonces", e))?;

        Ok(total as u64)
    }
}
