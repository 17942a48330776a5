//! Prometheus 指标

use axum::http::StatusCode;
use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use std::time::Instant;

lazy_static! {
    /// 签发的 nonce 数量，按作用域类型区分
    pub static ref NONCES_ISSUED: IntCounterVec = IntCounterVec::new(
        Opts::new("nonces_issued_total", "Total number of nonces issued").namespace("siwe"),
        &["scope"]
    ).unwrap();

    /// 校验结果，outcome 为 ok 或错误代码
    pub static ref VERIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("verifications_total", "Total number of sign-in verifications")
            .namespace("siwe"),
        &["outcome"]
    ).unwrap();

    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("request_duration_seconds", "HTTP request duration in seconds")
            .namespace("siwe")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        &["method", "path", "status"]
    ).unwrap();
}

/// 注册 SIWE metrics 到给定 registry
pub fn register_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(NONCES_ISSUED.clone()))?;
    registry.register(Box::new(VERIFICATIONS.clone()))?;
    registry.register(Box::new(REQUEST_DURATION.clone()))?;
    Ok(())
}

pub(crate) fn observe_request(method: &str, path: &str, status: StatusCode, start: Instant) {
    REQUEST_DURATION
        .with_label_values(&[method, path, status.as_str()])
        .observe(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_gather() {
        let registry = prometheus::Registry::new();
        register_metrics(&registry).unwrap();

        VERIFICATIONS.with_label_values(&["ok"]).inc();
        NONCES_ISSUED.with_label_values(&["anonymous"]).inc();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"siwe_verifications_total".to_string()));
        assert!(names.contains(&"siwe_nonces_issued_total".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = prometheus::Registry::new();
        register_metrics(&registry).unwrap();
        assert!(register_metrics(&registry).is_err());
    }
}
