//! SIWE HTTP 处理器

use crate::{
    account::JsonRpcAccountVerifier,
    address::parse_address,
    config::RpcConfig,
    error::VerifyError,
    metrics::{NONCES_ISSUED, VERIFICATIONS, observe_request},
    types::{NonceQuery, NonceResponse, VerifyRequest, VerifyResponse},
    verifier::SiweVerifier,
};
use axum::{
    Router,
    extract::{Json, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use siwe_nonce::{NonceRegistry, NonceScope};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// SIWE 服务状态
#[derive(Clone, Debug)]
pub struct SiweState {
    pub verifier: SiweVerifier,
}

impl SiweState {
    pub fn new(verifier: SiweVerifier) -> Self {
        Self { verifier }
    }

    pub fn registry(&self) -> &Arc<NonceRegistry> {
        self.verifier.registry()
    }
}

/// 从 Registry 和节点配置创建 SiweState
pub fn create_siwe_state(
    registry: Arc<NonceRegistry>,
    rpc: &RpcConfig,
) -> Result<SiweState, VerifyError> {
    let mut verifier = SiweVerifier::new(registry);

    match &rpc.endpoint {
        Some(endpoint) => {
            let timeout = Duration::from_millis(rpc.timeout_ms);
            let accounts = JsonRpcAccountVerifier::new(endpoint.clone(), timeout)
                .map_err(|e| VerifyError::VerificationUnavailable(e.to_string()))?;
            verifier = verifier.with_account_verifier(Arc::new(accounts), timeout);
            info!("Smart-contract account verification enabled via {}", endpoint);
        }
        None => {
            warn!("No rpc.endpoint configured, only EOA signatures can be verified");
        }
    }

    Ok(SiweState::new(verifier))
}

/// 创建 SIWE 服务的路由
pub fn create_router(state: SiweState) -> Router {
    Router::new()
        .route("/nonce", get(nonce_handler))
        .route("/verify", post(verify_handler))
        .route("/health", get(health_check_handler))
        .with_state(state)
}

async fn nonce_handler(
    State(app_state): State<SiweState>,
    Query(query): Query<NonceQuery>,
) -> Result<Json<NonceResponse>, VerifyError> {
    let start_time = Instant::now();

    let result = issue_nonce(&app_state, query).await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    observe_request("GET", "/nonce", status, start_time);

    result.map(Json)
}

async fn issue_nonce(state: &SiweState, query: NonceQuery) -> Result<NonceResponse, VerifyError> {
    if let Some(address) = query.address.as_deref() {
        parse_address(address).map_err(|e| VerifyError::MalformedRequest(e.to_string()))?;
    }

    let scope = state
        .registry()
        .scope_for(query.address.as_deref())
        .ok_or_else(|| {
            VerifyError::MalformedRequest("address query parameter is required".into())
        })?;
    let scope_label = match scope {
        NonceScope::Address(_) => "address",
        NonceScope::Anonymous => "anonymous",
    };

    let nonce = state.registry().issue(scope).await?;
    NONCES_ISSUED.with_label_values(&[scope_label]).inc();

    Ok(NonceResponse { nonce })
}

async fn verify_handler(
    State(app_state): State<SiweState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, VerifyError> {
    let start_time = Instant::now();

    let result = match payload {
        Ok(Json(request)) => {
            app_state
                .verifier
                .verify(&request.address, &request.message, &request.signature)
                .await
        }
        Err(rejection) => {
            debug!("Rejected verify body: {}", rejection);
            Err(VerifyError::MalformedRequest(rejection.body_text()))
        }
    };

    let (outcome, status) = match &result {
        Ok(_) => ("ok", StatusCode::OK),
        Err(e) => (e.kind(), e.status_code()),
    };
    VERIFICATIONS.with_label_values(&[outcome]).inc();
    observe_request("POST", "/verify", status, start_time);

    let address = result?;
    info!("Sign-in verified for {}", address);
    Ok(Json(VerifyResponse {
        ok: true,
        address: address.to_checksum(None),
    }))
}

async fn health_check_handler(
    State(app_state): State<SiweState>,
) -> Result<Json<serde_json::Value>, VerifyError> {
    debug!("Health check requested");

    let stats = app_state.registry().stats().await?;

    let response = serde_json::json!({
        "status": "healthy",
        "service": "siwe",
        "backend": stats.backend,
        "nonces": stats.total_records,
        "scope": app_state.registry().scope_mode().to_string(),
        "smart_accounts": app_state.verifier.supports_smart_accounts(),
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    });

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use siwe_nonce::{NonceConfig, ScopeMode};

    #[tokio::test]
    async fn test_create_siwe_state() {
        let registry = Arc::new(
            NonceRegistry::from_config(&NonceConfig::default())
                .await
                .unwrap(),
        );

        let state = create_siwe_state(registry.clone(), &RpcConfig::default()).unwrap();
        assert!(!state.verifier.supports_smart_accounts());
        assert_eq!(state.registry().scope_mode(), ScopeMode::Address);

        let rpc = RpcConfig {
            endpoint: Some("http://127.0.0.1:8545".into()),
            timeout_ms: 1000,
        };
        let state = create_siwe_state(registry, &rpc).unwrap();
        assert!(state.verifier.supports_smart_accounts());
    }
}
