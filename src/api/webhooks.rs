//! VSTS service hook 入口
//!
//! 处理顺序：校验密钥 → 解析 payload → 检查事件类型 → has_changes → 立即返回 202，
//! 部署在后台任务中执行，结果只体现在日志和部署记录中。

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::deploy::{ChangeSet, DeployRequest};
use crate::domain::webhook::{GitWebhook, TfvcWebhook, GIT_PUSH_EVENT, TFVC_CHECKIN_EVENT};
use crate::error::ApiResult;
use crate::middleware::RequireHookSecret;
use crate::services::backend::VcsType;
use crate::services::deploy::Deployer;
use crate::state::AppState;

/// webhook 响应
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

type WebhookResult = ApiResult<(StatusCode, Json<WebhookResponse>)>;

fn accepted(message: impl Into<String>) -> WebhookResult {
    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookResponse {
            message: message.into(),
        }),
    ))
}

const NO_CHANGES: &str =
    "Request ignored, none of the Rules, Database Connection scripts or Pages were changed.";

/// webhook 路径：配置的仓库类型使用 `/deploy`，另一种使用 `/deploy/<type>`
pub fn route_for(kind: VcsType, configured: Option<VcsType>) -> String {
    if configured == Some(kind) {
        "/deploy".to_string()
    } else {
        format!("/deploy/{}", kind)
    }
}

/// 创建 webhook 路由
pub fn router(configured: Option<VcsType>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&route_for(VcsType::Git, configured), post(git_webhook))
        .route(&route_for(VcsType::Tfvc, configured), post(tfvc_webhook))
}

/// 与 webhook 类型匹配的部署编排器
fn deployer_for(state: &AppState, kind: VcsType) -> Option<Arc<Deployer>> {
    state
        .deployer
        .as_ref()
        .filter(|d| d.backend().kind() == kind)
        .cloned()
}

/// 后台执行部署，失败只记录日志（部署记录由编排器写入）
fn spawn_deploy(state: Arc<AppState>, deployer: Arc<Deployer>, request: DeployRequest) {
    tokio::spawn(async move {
        let task_id = request.id.clone();
        match deployer
            .deploy(state.storage.as_ref(), request, &state.management)
            .await
        {
            Ok(_) => info!(task_id = %task_id, "Webhook deployment finished"),
            Err(e) => error!(task_id = %task_id, error = %e, "Webhook deployment failed"),
        }
    });
}

/// git push webhook
///
/// POST /deploy 或 /deploy/git
async fn git_webhook(
    _secret: RequireHookSecret,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> WebhookResult {
    let hook = GitWebhook::parse(&body)?;

    if hook.event != GIT_PUSH_EVENT {
        return accepted(format!(
            "Request ignored, the '{}' event is not supported.",
            hook.event
        ));
    }

    let Some(deployer) = deployer_for(&state, VcsType::Git) else {
        return accepted("Request ignored, the agent is not configured for git repositories.");
    };

    let changes = ChangeSet::Commits {
        repository_id: hook.repository_id.clone(),
        commit_ids: hook.commits.clone(),
    };
    if !deployer.backend().has_changes(&changes).await? {
        return accepted(NO_CHANGES);
    }

    info!(
        task_id = %hook.id,
        repository = %hook.repository,
        branch = %hook.branch,
        sha = %hook.sha,
        commits = hook.commits.len(),
        "Accepted git push"
    );

    spawn_deploy(
        state,
        deployer,
        DeployRequest {
            id: hook.id,
            repository_id: hook.repository_id,
            branch: hook.branch,
            repository: hook.repository,
            sha: hook.sha,
            user: hook.user,
        },
    );

    accepted("Deployment accepted")
}

/// tfvc checkin webhook
///
/// POST /deploy 或 /deploy/tfvc
async fn tfvc_webhook(
    _secret: RequireHookSecret,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> WebhookResult {
    let hook = TfvcWebhook::parse(&body)?;

    if hook.event != TFVC_CHECKIN_EVENT {
        return accepted(format!(
            "Request ignored, the '{}' event is not supported.",
            hook.event
        ));
    }

    let Some(deployer) = deployer_for(&state, VcsType::Tfvc) else {
        return accepted("Request ignored, the agent is not configured for tfvc repositories.");
    };

    if !deployer
        .backend()
        .has_changes(&ChangeSet::Changeset(hook.changeset.clone()))
        .await?
    {
        return accepted(NO_CHANGES);
    }

    info!(task_id = %hook.id, changeset = %hook.changeset, "Accepted tfvc checkin");

    let config = deployer.config();
    let request = DeployRequest {
        id: hook.id,
        repository_id: config.project.clone(),
        branch: config.path.clone(),
        repository: config.project.clone(),
        sha: hook.changeset,
        user: hook.user,
    };
    spawn_deploy(state, deployer, request);

    accepted("Deployment accepted")
}
