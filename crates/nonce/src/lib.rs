//! Nonce Registry - SIWE 一次性 nonce 管理
//!
//! 提供以下功能：
//! 1. 签发不可预测的 nonce（128 bit，来自操作系统 CSPRNG）
//! 2. 按地址或匿名池隔离 nonce
//! 3. 原子性的一次性消费（防重放的唯一保证）
//! 4. 多存储后端支持：Memory, SQLite, Redis

pub mod config;
pub mod error;
pub mod registry;
pub mod scope;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub use config::{NonceConfig, RedisConfig, SqliteConfig, StoreBackend};
pub use error::{RegistryError, RegistryResult};
pub use registry::{NonceRegistry, generate_nonce};
pub use scope::{ANONYMOUS_POOL, NonceScope, ScopeMode};
pub use storage::{NonceStore, NonceStoreBackend};
pub use types::{NonceRecord, StoreStats};
