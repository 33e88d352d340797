//! 手动部署
//!
//! dashboard「立即部署」：按仓库名查找仓库 ID，再同步执行部署并把结果返回给调用方。

use tracing::{info, warn};

use crate::domain::deploy::{DeployRequest, DeploymentStats};
use crate::error::{SyncError, SyncResult};
use crate::infra::ManagementClient;
use crate::services::deploy::Deployer;
use crate::state::storage::Storage;

/// 手动部署参数（仓库用名称表示）
#[derive(Clone, Debug)]
pub struct ManualDeploy {
    pub id: String,
    pub branch: String,
    pub repository: String,
    pub sha: String,
    pub user: String,
}

pub async fn manual_deploy(
    deployer: &Deployer,
    storage: &dyn Storage,
    request: ManualDeploy,
    client: &ManagementClient,
) -> SyncResult<DeploymentStats> {
    let repository_id = deployer
        .backend()
        .resolve_repository_id(&request.repository)
        .await?
        .ok_or_else(|| {
            warn!(repository = %request.repository, "Repository not found");
            SyncError::not_found(format!("Repository '{}'", request.repository))
        })?;

    info!(
        repository = %request.repository,
        repository_id = %repository_id,
        sha = %request.sha,
        "Manual deployment requested"
    );

    deployer
        .deploy(
            storage,
            DeployRequest {
                id: request.id,
                repository_id,
                branch: request.branch,
                repository: request.repository,
                sha: request.sha,
                user: request.user,
            },
            client,
        )
        .await
}
