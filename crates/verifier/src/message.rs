//! SIWE 消息解析
//!
//! 只关心消息中的 nonce。语法：消息中独占一行的 `Nonce: <token>`，
//! token 为一个或多个 ASCII 字母数字字符，允许行尾带 `\r`。

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NONCE_LINE_RE: Regex =
        Regex::new(r"(?m)^Nonce: ([A-Za-z0-9]+)\r?$").expect("valid nonce regex");
}

/// 提取消息中的 nonce，取第一个匹配行
pub fn extract_nonce(message: &str) -> Option<&str> {
    NONCE_LINE_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
