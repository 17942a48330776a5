//! Signature Verifier - SIWE 签名校验服务
//!
//! 提供以下功能：
//! 1. 从 SIWE 消息中提取 nonce 并在 Nonce Registry 中原子消费
//! 2. EOA 签名校验（EIP-191 + secp256k1 公钥恢复）
//! 3. 智能合约账户签名校验（ERC-1271，支持 ERC-6492 包装）
//! 4. HTTP 接口：签发 nonce、校验签名、健康检查

pub mod account;
pub mod address;
pub mod config;
pub mod eoa;
pub mod error;
pub mod handlers;
pub mod message;
pub mod metrics;
pub mod types;
pub mod verifier;

// Re-export commonly used items
pub use account::{AccountVerifier, BackendError, JsonRpcAccountVerifier, Sig6492};
pub use address::{Address, AddressParseError, parse_address};
pub use config::RpcConfig;
pub use error::{VerifyError, VerifyResult};
pub use handlers::{SiweState, create_router, create_siwe_state};
pub use message::extract_nonce;
pub use metrics::register_metrics;
pub use types::{NonceQuery, NonceResponse, VerifyRequest, VerifyResponse};
pub use verifier::SiweVerifier;
