//! 日志初始化
//!
//! 根据 `[observability]` 配置把 tracing 输出到控制台或文件

use crate::config::{GateConfig, LogConfig};
use crate::error::Result;
use anyhow::Context;
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const LOG_FILE_NAME: &str = "siwe-gate.log";

/// Guard for the non-blocking log writer; flushes on drop
#[derive(Default)]
pub struct ObservabilityGuard {
    log_guard: Option<WorkerGuard>,
}

impl ObservabilityGuard {
    pub fn writes_to_file(&self) -> bool {
        self.log_guard.is_some()
    }
}

/// Initialize logging based on configuration
pub fn init_observability(config: &GateConfig) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();
    let log_config = &config.observability.log;

    match log_config.output.as_str() {
        "file" => {
            fs::create_dir_all(&log_config.path).with_context(|| {
                format!("Failed to create log directory: {}", log_config.path)
            })?;
            let (non_blocking, worker_guard) = build_file_writer(log_config, log_config.rotate)?;
            guard.log_guard = Some(worker_guard);

            init_subscriber_with_writer(non_blocking, false, config);
        }
        _ => {
            init_subscriber_with_writer(std::io::stdout, true, config);
        }
    }

    Ok(guard)
}

/// Create an EnvFilter from config, with RUST_LOG taking precedence
fn create_env_filter(config: &GateConfig) -> EnvFilter {
    let directive = config.get_filter_level();

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        println!(
            "Failed to parse filter directive: {}. Falling back to default: info",
            directive
        );
        EnvFilter::new("info")
    })
}

fn init_subscriber_with_writer<W>(writer: W, use_ansi: bool, config: &GateConfig)
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(use_ansi)
        .with_writer(writer);

    // 重复初始化（如测试中）时保留已有 subscriber
    tracing_subscriber::registry()
        .with(create_env_filter(config))
        .with(fmt_layer)
        .try_init()
        .ok();
}

fn build_file_writer(log_config: &LogConfig, rotate: bool) -> Result<(NonBlocking, WorkerGuard)> {
    println!("日志写入模式: 文件");
    println!("  - 路径: {}", log_config.path);
    println!("  - 轮转: {}", if rotate { "开启（按天）" } else { "关闭" });

    if rotate {
        let file_appender = tracing_appender::rolling::daily(&log_config.path, LOG_FILE_NAME);
        Ok(tracing_appender::non_blocking(file_appender))
    } else {
        let log_file_path = std::path::Path::new(&log_config.path).join(LOG_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        Ok(tracing_appender::non_blocking(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_output_creates_log_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_dir = temp_dir.path().join("logs");

        let mut config = GateConfig::default();
        config.observability.log.output = "file".into();
        config.observability.log.path = log_dir.display().to_string();

        let guard = init_observability(&config).unwrap();
        assert!(guard.writes_to_file());
        assert!(log_dir.join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        let mut config = GateConfig::default();
        config.observability.filter_level = "info,[[[".into();

        // RUST_LOG 可能由测试环境设置，这里只确认不会 panic
        let _filter = create_env_filter(&config);
    }
}
