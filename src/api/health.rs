//! 健康检查 API
//!
//! 包含 /health, /status 端点

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    /// 当前仓库类型，未配置时为 null
    vcs_type: Option<String>,
    uptime_secs: i64,
    apply_configured: bool,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(health_check))
}

/// 健康检查 - 返回状态、版本、运行时间等信息
///
/// GET /health, GET /status
/// 无需认证
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    Json(HealthResponse {
        status: "ok",
        service: "vsts-deploy-agent",
        version: VERSION,
        timestamp: now.to_rfc3339(),
        vcs_type: state.vcs_type().map(|t| t.to_string()),
        uptime_secs: (now - state.started_at).num_seconds(),
        apply_configured: state.management.apply_url().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use crate::config::EnvConfig;
    use crate::services::backend::VcsType;
    use crate::services::fakes::{app_state, FakeApplier, FakeBackend};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_vcs_type() {
        let config = EnvConfig {
            vcs_type: Some(VcsType::Tfvc),
            ..EnvConfig::default()
        };
        let state = app_state(
            config,
            Some(Arc::new(FakeBackend::tfvc())),
            Arc::new(FakeApplier::succeeding()),
        );

        let response = crate::api::router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["vcs_type"], "tfvc");
        assert_eq!(body["apply_configured"], false);
    }
}
