//! Nonce Registry 错误定义

use thiserror::Error;

/// Registry 错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 存储后端不可用（连接失败、查询失败等）
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// 同一作用域下 nonce 已存在
    #[error("Nonce already exists in scope")]
    DuplicateNonce,

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(format!("{context}: {err}"))
    }
}

/// Registry 结果类型别名
pub type RegistryResult<T> = Result<T, RegistryError>;
