//! HTTP 服务器
//!
//! 组装 SIWE 路由、`/metrics` 端点和中间件，负责监听和优雅关闭

use crate::config::GateConfig;
use crate::error::{Error, Result};
use crate::metrics::{export_metrics, register_metrics};
use crate::trace::http_trace_layer;
use axum::{Router, routing::get};
use siwe_nonce::NonceRegistry;
use siwe_verifier::{SiweState, create_router, create_siwe_state};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// SIWE 路由挂载前缀
pub const ROUTE_PREFIX: &str = "/auth";

/// 组装完整的 HTTP 应用
pub fn build_app(state: SiweState) -> Router {
    Router::new()
        .nest(ROUTE_PREFIX, create_router(state))
        .route("/metrics", get(metrics_handler))
        .layer(http_trace_layer())
        .layer(CorsLayer::permissive())
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> String {
    export_metrics()
}

/// siwe-gate 服务实例
#[derive(Debug)]
pub struct GateServer {
    config: GateConfig,
    state: SiweState,
}

/// 已启动的服务
#[derive(Debug)]
pub struct RunningGate {
    pub local_addr: SocketAddr,
    pub handles: Vec<JoinHandle<()>>,
}

impl GateServer {
    /// 初始化 Nonce Registry、指标和校验服务
    pub async fn new(config: GateConfig) -> Result<Self> {
        let registry = Arc::new(NonceRegistry::from_config(&config.nonce).await?);

        if let Err(e) = register_metrics() {
            warn!(
                "Prometheus metrics registration warning (may already be registered): {}",
                e
            );
        }

        let state = create_siwe_state(registry, &config.rpc)?;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NonceRegistry> {
        self.state.registry()
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    /// 绑定端口并启动 HTTP 服务器与后台清理任务
    ///
    /// 两个任务都在 `shutdown_tx` 广播后退出
    pub async fn start(&self, shutdown_tx: broadcast::Sender<()>) -> Result<RunningGate> {
        let addr = self.config.bind.addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            Error::service_startup(format!("Failed to bind to address '{addr}': {e}"))
        })?;
        let local_addr = listener.local_addr()?;
        info!("HTTP server listening on {}", local_addr);

        let mut handles = vec![spawn_http_server(listener, self.router(), shutdown_tx.clone())];

        if self.config.sweep_interval_secs > 0 {
            let interval = Duration::from_secs(self.config.sweep_interval_secs);
            handles.push(spawn_sweeper(self.registry().clone(), interval, &shutdown_tx));
            info!("Nonce sweeper running every {:?}", interval);
        }

        Ok(RunningGate {
            local_addr,
            handles,
        })
    }
}

fn spawn_http_server(
    listener: TcpListener,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP server received shutdown signal");
        });
        if let Err(e) = server.await {
            error!("HTTP server error: {}", e);
            let _ = shutdown_tx.send(());
        }
        info!("HTTP server stopped");
    })
}

fn spawn_sweeper(
    registry: Arc<NonceRegistry>,
    interval: Duration,
    shutdown_tx: &broadcast::Sender<()>,
) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let sweeper = registry.spawn_sweeper(interval);
        let _ = shutdown_rx.recv().await;
        sweeper.abort();
        info!("Nonce sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GateConfig {
        let mut config = GateConfig::default();
        config.bind.ip = "127.0.0.1".into();
        config.bind.port = 0;
        config
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = GateServer::new(test_config()).await.unwrap();
        assert_eq!(server.registry().backend_name(), "memory");

        let (shutdown_tx, _) = broadcast::channel(4);
        let running = server.start(shutdown_tx.clone()).await.unwrap();
        assert_ne!(running.local_addr.port(), 0);
        assert_eq!(running.handles.len(), 2);

        shutdown_tx.send(()).unwrap();
        for handle in running.handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweeper_disabled() {
        let mut config = test_config();
        config.sweep_interval_secs = 0;
        let server = GateServer::new(config).await.unwrap();

        let (shutdown_tx, _) = broadcast::channel(4);
        let running = server.start(shutdown_tx.clone()).await.unwrap();
        assert_eq!(running.handles.len(), 1);
        shutdown_tx.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let mut config = test_config();
        config.nonce.ttl_seconds = 0;
        assert!(matches!(
            GateServer::new(config).await,
            Err(Error::Registry(_))
        ));
    }
}
