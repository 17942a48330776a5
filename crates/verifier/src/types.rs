//! HTTP 请求与响应类型定义

use serde::{Deserialize, Serialize};

/// 获取 nonce 的查询参数
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NonceQuery {
    /// 钱包地址（address 作用域模式下必需）
    #[serde(default)]
    pub address: Option<String>,
}

/// 获取 nonce 响应
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// 签名校验请求
///
/// 缺失字段按空字符串处理，由校验流程统一报告为格式错误
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub address: String,
    /// 完整的 SIWE 消息文本
    #[serde(default)]
    pub message: String,
    /// `0x` 前缀的 hex 签名
    #[serde(default)]
    pub signature: String,
}

/// 签名校验成功响应
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// 恒为 true，失败响应由错误类型生成
    pub ok: bool,
    /// EIP-55 校验和格式的地址
    pub address: String,
}
