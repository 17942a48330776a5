//! 统一错误处理模型
//!
//! 提供 siwe-gate 的顶层错误类型，聚合各子 crate 的错误

use crate::config::ConfigError;
use siwe_nonce::RegistryError;
use siwe_verifier::VerifyError;
use thiserror::Error;

/// 主应用的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件相关错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // ========== 服务相关错误 ==========
    /// Nonce Registry 错误
    #[error("Nonce registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 签名校验服务错误
    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifyError),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 后台任务错误
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    // ========== 业务逻辑错误 ==========
    /// 服务启动失败
    #[error("Service startup failed: {message}")]
    ServiceStartup { message: String },

    /// 服务配置验证失败
    #[error("Service configuration validation failed: {message}")]
    ServiceValidation { message: String },

    // ========== 通用错误 ==========
    /// Anyhow 错误兼容层
    #[error("Legacy error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建服务启动失败错误
    pub fn service_startup(message: impl Into<String>) -> Self {
        Self::ServiceStartup {
            message: message.into(),
        }
    }

    /// 创建服务配置验证失败错误
    pub fn service_validation(message: impl Into<String>) -> Self {
        Self::ServiceValidation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert!(matches!(err, Error::Custom { .. }));

        let err = Error::service_validation("ttl_seconds must be positive");
        assert_eq!(
            err.to_string(),
            "Service configuration validation failed: ttl_seconds must be positive"
        );
    }

    #[test]
    fn test_registry_error_conversion() {
        let err: Error = RegistryError::DuplicateNonce.into();
        assert!(matches!(err, Error::Registry(_)));
    }
}
