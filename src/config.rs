//! 统一配置管理
//!
//! siwe-gate 的全部配置项定义、默认值和校验都在这里。
//! 配置文件使用 TOML 格式。

use serde::{Deserialize, Serialize};
use siwe_nonce::NonceConfig;
use siwe_verifier::RpcConfig;
use std::path::Path;
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file does not exist: {0}")]
    NotFound(String),

    #[error("Path is not a valid file: {0}")]
    NotAFile(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// siwe-gate 主配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateConfig {
    /// 服务器实例名称
    ///
    /// 用于在多实例部署中区分节点，如 siwe-gate-01
    pub name: String,

    /// 运行环境标识：dev / prod / test
    #[serde(default = "default_env")]
    pub env: String,

    /// HTTP 监听配置
    #[serde(default)]
    pub bind: BindConfig,

    /// Nonce Registry 配置
    #[serde(default)]
    pub nonce: NonceConfig,

    /// 智能合约账户校验使用的节点配置
    #[serde(default)]
    pub rpc: RpcConfig,

    /// 后台过期清理间隔（秒），0 表示关闭
    ///
    /// 清理只是优化，消费 nonce 时总会重新检查过期时间
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP 服务绑定配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BindConfig {
    /// 绑定 IP 地址，通常使用 "0.0.0.0" 监听所有接口
    pub ip: String,

    /// 绑定端口
    pub port: u16,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl BindConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别
    ///
    /// 支持 EnvFilter 语法（如 "info,hyper=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志轮转开关（output = "file" 时有效，按天轮转）
    #[serde(default)]
    pub rotate: bool,

    /// 日志目录（output = "file" 时有效）
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            name: "siwe-gate-default".to_string(),
            env: default_env(),
            bind: BindConfig::default(),
            nonce: NonceConfig::default(),
            rpc: RpcConfig::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

impl GateConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.display().to_string()));
        }

        if !path_ref.is_file() {
            return Err(ConfigError::NotAFile(path_ref.display().to_string()));
        }

        let content = std::fs::read_to_string(path_ref)?;
        Ok(Self::from_toml(&content)?)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 获取日志过滤级别（RUST_LOG 优先）
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }

    /// 验证配置有效性
    ///
    /// 以 "Warning:" 开头的条目是警告，不阻止启动
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        if self.bind.ip.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "Invalid bind.ip '{}', must be a valid IP address",
                self.bind.ip
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        let main_level = self
            .observability
            .filter_level
            .split(',')
            .next()
            .unwrap_or("")
            .trim();
        if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
            errors.push(format!(
                "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                self.observability.filter_level
            ));
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if self.sweep_interval_secs == 0 {
            errors.push(
                "Warning: sweep_interval_secs = 0, expired nonces are only purged lazily"
                    .to_string(),
            );
        }

        if let Err(nonce_errors) = self.nonce.validate() {
            errors.extend(nonce_errors);
        }
        if let Err(rpc_errors) = self.rpc.validate() {
            errors.extend(rpc_errors);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
