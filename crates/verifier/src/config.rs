//! 账户校验后端配置

use serde::{Deserialize, Serialize};

/// 以太坊 JSON-RPC 节点配置
///
/// 未配置 `endpoint` 时只支持 EOA 签名，智能合约账户的签名一律视为无效
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// 节点 JSON-RPC 地址，例如 https://mainnet.example.org
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// 单次校验调用的超时时间（毫秒）
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

impl RpcConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.timeout_ms == 0 {
            errors.push("rpc.timeout_ms must be greater than 0".to_string());
        }

        match &self.endpoint {
            Some(endpoint)
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") =>
            {
                errors.push(format!(
                    "Invalid rpc.endpoint '{endpoint}', must start with http:// or https://"
                ));
            }
            Some(_) => {}
            None => errors.push(
                "Warning: rpc.endpoint is not set, smart-contract account signatures will be rejected"
                    .to_string(),
            ),
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rpc_config() {
        let config = RpcConfig::default();
        assert_eq!(config.timeout_ms, 10_000);
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Warning:"));
    }

    #[test]
    fn test_deserialize_and_validate() {
        let config: RpcConfig = toml::from_str(
            r#"
            endpoint = "https://rpc.example.org"
            timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://rpc.example.org"));
        assert_eq!(config.timeout_ms, 2500);
        assert!(config.validate().is_ok());

        let config = RpcConfig {
            endpoint: Some("ws://rpc.example.org".into()),
            timeout_ms: 0,
        };
        assert_eq!(config.validate().unwrap_err().len(), 2);
    }
}
