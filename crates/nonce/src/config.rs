//! Nonce Registry 配置
//!
//! 定义存储后端选择、作用域模式和过期时间

use crate::scope::ScopeMode;
use serde::{Deserialize, Serialize};

/// Registry 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// 存储后端类型
    #[serde(default)]
    pub backend: StoreBackend,

    /// 作用域模式（address / anonymous），每个部署固定一种
    #[serde(default)]
    pub scope: ScopeMode,

    /// nonce 有效期（秒）
    ///
    /// 从签发时刻开始计算，必须大于 0
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// 每签发多少个 nonce 触发一次后台过期清理
    ///
    /// 设置为 0 表示关闭惰性清理
    #[serde(default = "default_cleanup_every")]
    pub cleanup_every: u32,

    /// SQLite 配置（当 backend = "sqlite" 时必需）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<SqliteConfig>,

    /// Redis 配置（当 backend = "redis" 时必需）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            scope: ScopeMode::Address,
            ttl_seconds: default_ttl_seconds(),
            cleanup_every: default_cleanup_every(),
            sqlite: None,
            redis: None,
        }
    }
}

impl NonceConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.ttl_seconds == 0 {
            errors.push("nonce.ttl_seconds must be greater than 0".to_string());
        }
        if self.ttl_seconds > 3600 {
            errors.push(format!(
                "Warning: nonce.ttl_seconds = {} is longer than one hour, consider a shorter window",
                self.ttl_seconds
            ));
        }

        match self.backend {
            StoreBackend::Memory => {}
            StoreBackend::Sqlite => {
                if self.sqlite.is_none() {
                    errors.push("nonce.sqlite section is required when backend = \"sqlite\"".into());
                }
            }
            StoreBackend::Redis => match &self.redis {
                Some(redis) => {
                    if !redis.url.starts_with("redis://") && !redis.url.starts_with("rediss://") {
                        errors.push(format!(
                            "Invalid nonce.redis.url '{}', must start with redis:// or rediss://",
                            redis.url
                        ));
                    }
                }
                None => {
                    errors.push("nonce.redis section is required when backend = \"redis\"".into());
                }
            },
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// 存储后端类型枚举
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// 进程内存储，适用于单实例部署
    #[default]
    Memory,
    /// SQLite 数据库，适用于需要持久化的单节点部署
    Sqlite,
    /// Redis，适用于多实例部署
    Redis,
}

/// SQLite 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// 数据库文件路径
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "database/nonces.db".to_string(),
        }
    }
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis 连接 URL
    ///
    /// 格式：redis://[username:password@]host[:port][/database]
    /// 示例：redis://localhost:6379/0
    pub url: String,

    /// 连接池大小
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// 获取连接的超时时间（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    300
}

fn default_cleanup_every() -> u32 {
    100
}

fn default_redis_pool_size() -> usize {
    20
}

fn default_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_nonce_config() {
        let config = NonceConfig::default();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.scope, ScopeMode::Address);
        assert_eq!(config.ttl_seconds, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_redis_config() {
        let toml_str = r#"
            backend = "redis"
            scope = "anonymous"
            ttl_seconds = 120

            [redis]
            url = "redis://localhost:6379/1"
            pool_size = 30
        "#;

        let config: NonceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend, StoreBackend::Redis);
        assert_eq!(config.scope, ScopeMode::Anonymous);
        assert_eq!(config.ttl_seconds, 120);

        let redis = config.redis.unwrap();
        assert_eq!(redis.url, "redis://localhost:6379/1");
        assert_eq!(redis.pool_size, 30);
        assert_eq!(redis.timeout_ms, 5000);
    }

    #[test]
    fn test_validate_missing_backend_section() {
        let config = NonceConfig {
            backend: StoreBackend::Sqlite,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors[0].contains("nonce.sqlite"));

        let config = NonceConfig {
            backend: StoreBackend::Redis,
            redis: Some(RedisConfig {
                url: "http://localhost".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors[0].contains("redis://"));
    }

    #[test]
    fn test_validate_ttl() {
        let config = NonceConfig {
            ttl_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NonceConfig {
            ttl_seconds: 7200,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors[0].starts_with("Warning:"));
    }
}
