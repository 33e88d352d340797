//! Dashboard API
//!
//! 包含 /api/deployments, /api/config, /api/notified 端点

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::deploy::{DeployRequest, DeploymentStats};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services::backend::VcsType;
use crate::services::manual::{manual_deploy, ManualDeploy};
use crate::state::storage;
use crate::state::AppState;

/// 手动部署请求
#[derive(Debug, Default, Deserialize)]
pub struct DeployNowRequest {
    /// 覆盖默认版本（git 默认 `TFS_BRANCH`，tfvc 默认 latest）
    pub sha: Option<String>,
}

/// dashboard 配置
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub show_notification: bool,
    pub secret: String,
    pub branch: String,
    pub prefix: String,
    pub repository: String,
}

/// 创建 dashboard API 路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/deployments", get(list_deployments).post(deploy_now))
        .route("/api/config", get(get_config))
        .route("/api/notified", post(set_notified))
}

/// 立即部署
///
/// POST /api/deployments
/// 需要 API Key，同步等待部署完成
async fn deploy_now(
    auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    payload: Option<Json<DeployNowRequest>>,
) -> ApiResult<Json<DeploymentStats>> {
    let Some(deployer) = state.deployer.clone() else {
        return Err(ApiError::bad_request("Incorrect TFS_TYPE."));
    };

    let sha = payload
        .and_then(|Json(body)| body.sha)
        .filter(|s| !s.trim().is_empty());
    let config = deployer.config();

    info!(user = %auth.user, sha = ?sha, vcs = %deployer.backend().kind(), "Manual deployment");

    let stats = match deployer.backend().kind() {
        VcsType::Git => {
            manual_deploy(
                &deployer,
                state.storage.as_ref(),
                ManualDeploy {
                    id: "manual".to_string(),
                    branch: config.branch.clone(),
                    repository: config.project.clone(),
                    sha: sha.unwrap_or_else(|| config.branch.clone()),
                    user: auth.user,
                },
                &state.management,
            )
            .await?
        }
        VcsType::Tfvc => {
            deployer
                .deploy(
                    state.storage.as_ref(),
                    DeployRequest {
                        id: "manual".to_string(),
                        repository_id: config.project.clone(),
                        branch: config.path.clone(),
                        repository: config.project.clone(),
                        sha: sha.unwrap_or_else(|| "latest".to_string()),
                        user: auth.user,
                    },
                    &state.management,
                )
                .await?
        }
    };

    Ok(Json(stats))
}

/// 部署历史（按时间倒序）
///
/// GET /api/deployments
async fn list_deployments(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let records = storage::deployments(state.storage.as_ref()).await?;
    Ok(Json(records))
}

/// dashboard 配置
///
/// GET /api/config
/// 未提示过且租户中已有规则时，提示用户这些规则会被覆盖
async fn get_config(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ConfigResponse>> {
    let config = &state.config;
    let document = state
        .storage
        .read()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let show_notification = if document.is_notified {
        false
    } else {
        match state.management.rule_count().await {
            Ok(0) => {
                storage::set_notified(state.storage.as_ref()).await?;
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to read existing rules, hiding notification");
                false
            }
        }
    };

    Ok(Json(ConfigResponse {
        show_notification,
        secret: config.extension_secret.clone(),
        branch: config.display_branch().to_string(),
        prefix: config.instance.clone(),
        repository: config.project.clone(),
    }))
}

/// 标记提示已读
///
/// POST /api/notified
async fn set_notified(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    storage::set_notified(state.storage.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}
