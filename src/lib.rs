//! # siwe-gate
//!
//! Sign-In with Ethereum 网关：签发一次性 nonce，校验 EOA 与智能合约账户的签名

pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod server;
pub mod trace;

// Re-export commonly used types
pub use config::GateConfig;
pub use error::{Error, Result};
pub use server::{GateServer, RunningGate, build_app};
