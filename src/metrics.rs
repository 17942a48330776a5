//! Prometheus 监控指标模块
//!
//! 进程级 Registry，聚合 siwe-verifier 的指标并以文本格式导出

use lazy_static::lazy_static;
use prometheus::Registry;
use std::sync::Once;
use tracing::error;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();
}

/// 注册所有指标到全局 Registry
///
/// 可重复调用，只有第一次真正注册
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        if let Err(e) = siwe_verifier::register_metrics(&REGISTRY) {
            result = Err(e);
        }
    });

    result
}

/// 导出 Prometheus 格式的指标
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use siwe_verifier::metrics::NONCES_ISSUED;

    #[test]
    fn test_register_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();

        NONCES_ISSUED.with_label_values(&["address"]).inc();
        let exported = export_metrics();
        assert!(exported.contains("siwe_nonces_issued_total"));
    }
}
