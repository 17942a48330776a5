//! Signature Verifier 错误定义

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use siwe_nonce::RegistryError;
use thiserror::Error;

/// 校验失败类型
///
/// 每种失败对应稳定的机器可读代码（`kind()`）和通用提示信息，
/// 内部细节只写日志，不返回给调用方。
#[derive(Error, Debug)]
pub enum VerifyError {
    /// 地址、消息或签名格式不正确
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// 消息中没有 nonce 行
    #[error("Message does not contain a nonce")]
    NonceMissing,

    /// nonce 不存在、已被消费或已过期
    #[error("Nonce is invalid or expired")]
    NonceInvalidOrExpired,

    /// nonce 有效且已消费，但签名无法证明地址对消息的授权
    #[error("Invalid signature")]
    InvalidSignature,

    /// 账户校验后端不可达或超时
    #[error("Verification backend unavailable: {0}")]
    VerificationUnavailable(String),

    /// nonce 存储不可用
    #[error("Nonce storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl VerifyError {
    /// 稳定的错误代码
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "MalformedRequest",
            Self::NonceMissing => "NonceMissing",
            Self::NonceInvalidOrExpired => "NonceInvalidOrExpired",
            Self::InvalidSignature => "InvalidSignature",
            Self::VerificationUnavailable(_) => "VerificationUnavailable",
            Self::StorageUnavailable(_) => "StorageUnavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) | Self::NonceMissing => StatusCode::BAD_REQUEST,
            Self::NonceInvalidOrExpired | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::VerificationUnavailable(_) | Self::StorageUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// 返回给客户端的通用提示
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "Invalid address, message or signature",
            Self::NonceMissing => "Message does not contain a nonce",
            Self::NonceInvalidOrExpired => "Nonce is invalid or expired, request a new one",
            Self::InvalidSignature => "Signature verification failed",
            Self::VerificationUnavailable(_) => {
                "Signature could not be verified right now, request a new nonce and retry"
            }
            Self::StorageUnavailable(_) => "Service temporarily unavailable",
        }
    }
}

impl From<RegistryError> for VerifyError {
    fn from(err: RegistryError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        if let Self::VerificationUnavailable(_) | Self::StorageUnavailable(_) = &self {
            // 不向客户端暴露内部错误详情
            tracing::error!("Internal error: {:?}", self);
        }

        let status = self.status_code();
        let body = Json(json!({
            "ok": false,
            "error_kind": self.kind(),
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

/// Verifier 结果类型别名
pub type VerifyResult<T> = Result<T, VerifyError>;
