//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod deployments;
pub mod health;
pub mod webhooks;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 API 路由
///
/// webhook 路由按 `TFS_TYPE` 决定 `/deploy` 指向哪个后端
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Status
        .merge(health::router())
        // Webhooks
        .merge(webhooks::router(state.config.vcs_type))
        // Dashboard
        .merge(deployments::router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
