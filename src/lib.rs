//! VSTS Deploy Agent - 将 VSTS 仓库中的规则、数据库连接脚本和页面同步到身份平台
//!
//! 库入口：模块声明和服务启动

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;
use crate::state::app_state::{get_shutdown_token, trigger_shutdown};
use crate::state::AppState;

/// 命令行覆盖的运行参数
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
    /// 覆盖 `PORT`
    pub port_override: Option<u16>,
}

/// 初始化日志、加载配置并运行 HTTP 服务，直到收到关闭信号
pub async fn init_and_run_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vsts_deploy_agent=debug")),
        )
        .init();

    let mut config = EnvConfig::from_env();
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(config));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, version = config::env::constants::VERSION, "VSTS deploy agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Ctrl+C、SIGTERM 或内部关闭令牌任一触发即返回
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let token = get_shutdown_token();

    tokio::select! {
        _ = ctrl_c => trigger_shutdown(),
        _ = terminate => trigger_shutdown(),
        _ = token.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
}
