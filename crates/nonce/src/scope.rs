//! Nonce 作用域
//!
//! 一个 nonce 要么绑定到某个钱包地址，要么属于全局匿名池。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 匿名池在存储中使用的键
pub const ANONYMOUS_POOL: &str = "anon";

/// 部署级别的作用域模式
///
/// - `address`: nonce 绑定到签发时提供的地址，其他地址无法消费
/// - `anonymous`: 所有 nonce 共享一个池，任意地址都可以消费
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    #[default]
    Address,
    Anonymous,
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => f.write_str("address"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// 单个 nonce 的作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonceScope {
    /// 小写规范化后的地址
    Address(String),
    Anonymous,
}

impl NonceScope {
    /// Builds an address scope. The address is lower-cased so lookups are
    /// case-insensitive.
    pub fn address(address: &str) -> Self {
        Self::Address(address.trim().to_ascii_lowercase())
    }

    /// 存储层使用的作用域键
    pub fn storage_key(&self) -> &str {
        match self {
            Self::Address(address) => address,
            Self::Anonymous => ANONYMOUS_POOL,
        }
    }

    pub fn from_storage_key(key: &str) -> Self {
        if key == ANONYMOUS_POOL {
            Self::Anonymous
        } else {
            Self::Address(key.to_string())
        }
    }
}

impl fmt::Display for NonceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}
