//! 部署服务模块
//!
//! 部署主流程：构建上下文 → 调用 apply 步骤 → 写入部署记录。
//! 实际的租户对比和增删改由 `Applier` 完成，这里只负责编排。

pub mod apply;
pub mod context;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::EnvConfig;
use crate::domain::deploy::{
    DeployIdentity, DeployRequest, DeploymentRecord, DeploymentStats, NotificationTemplate,
};
use crate::error::{SyncError, SyncResult};
use crate::infra::ManagementClient;
use crate::services::backend::SourceBackend;
use crate::state::storage::{append_deployment, Storage};

pub use apply::HttpApplier;
pub use context::DeployContext;

/// apply 步骤的输入
pub struct ApplyRequest<'a> {
    pub identity: &'a DeployIdentity,
    pub context: &'a DeployContext,
    pub client: &'a ManagementClient,
    pub storage: &'a dyn Storage,
    pub config: &'a EnvConfig,
    pub template: &'a NotificationTemplate,
}

/// apply 步骤：把部署单元同步到身份平台
///
/// 实现方负责调用 `context.init()`；返回的统计信息或错误由部署流程原样透传。
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, request: ApplyRequest<'_>) -> anyhow::Result<DeploymentStats>;
}

/// 部署编排器
///
/// 进程启动时构造一次，持有后端适配器和 apply 实现
pub struct Deployer {
    backend: Arc<dyn SourceBackend>,
    applier: Arc<dyn Applier>,
    config: Arc<EnvConfig>,
}

impl Deployer {
    pub fn new(
        backend: Arc<dyn SourceBackend>,
        applier: Arc<dyn Applier>,
        config: Arc<EnvConfig>,
    ) -> Self {
        Self {
            backend,
            applier,
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn SourceBackend> {
        &self.backend
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// 执行一次部署
    ///
    /// 无论成功失败都会追加一条部署记录；记录写入失败只记日志，不覆盖部署结果。
    pub async fn deploy(
        &self,
        storage: &dyn Storage,
        request: DeployRequest,
        client: &ManagementClient,
    ) -> SyncResult<DeploymentStats> {
        let identity = request.identity();
        let context = DeployContext::new(
            self.backend.clone(),
            request.repository_id,
            request.sha,
            self.config.fetch_concurrency,
        );
        let template = NotificationTemplate::for_vcs(self.backend.kind().as_str());

        info!(
            task_id = %identity.id,
            repository = %identity.repository,
            branch = %identity.branch,
            sha = %identity.sha,
            user = %identity.user,
            "Starting deployment"
        );

        let result = self
            .applier
            .apply(ApplyRequest {
                identity: &identity,
                context: &context,
                client,
                storage,
                config: &self.config,
                template: &template,
            })
            .await
            .map_err(into_sync_error);

        let record = match &result {
            Ok(stats) => {
                info!(task_id = %identity.id, stats = ?stats, "Deployment succeeded");
                DeploymentRecord::success(&identity, stats.clone())
            }
            Err(e) => {
                error!(task_id = %identity.id, error = %e, "Deployment failed");
                DeploymentRecord::failure(&identity, e.to_string())
            }
        };

        if let Err(e) = append_deployment(storage, record).await {
            error!(task_id = %identity.id, error = %e, "Failed to record deployment");
        }

        result
    }
}

/// apply 返回的错误中如果包着流水线错误（如 `init()` 失败），还原为原始类型
fn into_sync_error(err: anyhow::Error) -> SyncError {
    match err.downcast::<SyncError>() {
        Ok(e) => e,
        Err(other) => SyncError::Apply(other),
    }
}
