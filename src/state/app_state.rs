//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 全局 shutdown token，用于优雅关闭 HTTP 服务
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

/// 获取全局 shutdown token
pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN
        .get_or_init(CancellationToken::new)
        .clone()
}

/// 触发全局 shutdown
pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

use crate::config::env::EnvConfig;
use crate::infra::{GitRestClient, ManagementClient, TfvcRestClient, VstsClient};
use crate::services::backend::{GitBackend, SourceBackend, TfvcBackend, VcsType};
use crate::services::deploy::{Applier, Deployer, HttpApplier};

use super::storage::{FileStorage, Storage};

/// 应用状态
pub struct AppState {
    // ========== 核心配置 ==========
    /// API 密钥（用于验证 `/api/*` 请求）
    pub api_key: String,
    /// 环境配置
    pub config: Arc<EnvConfig>,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,

    // ========== 部署 ==========
    /// 部署编排器；`TFS_TYPE` 未配置或无法识别时为 None
    pub deployer: Option<Arc<Deployer>>,
    /// 部署历史与提示标记
    pub storage: Arc<dyn Storage>,

    // ========== 外部服务 ==========
    /// Management API 客户端
    pub management: ManagementClient,
}

impl AppState {
    /// 根据配置创建应用状态
    pub fn new(config: EnvConfig) -> Self {
        let config = Arc::new(config);

        tracing::info!(
            api_key_len = config.api_key.len(),
            vcs_type = ?config.vcs_type,
            collection_url = %config.collection_url(),
            project = %config.project,
            port = config.port,
            fetch_concurrency = config.fetch_concurrency,
            storage = %config.storage_path().display(),
            apply_url = ?config.management.apply_url,
            "Loaded configuration"
        );

        let deployer = build_backend(&config).map(|backend| {
            let applier: Arc<dyn Applier> = Arc::new(HttpApplier::new());
            Arc::new(Deployer::new(backend, applier, config.clone()))
        });

        if deployer.is_none() {
            tracing::warn!("TFS_TYPE is not set, webhooks will be ignored and manual deployments rejected");
        }

        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.storage_path()));
        let management = ManagementClient::new(config.management.clone());

        Self::with_parts(config, deployer, storage, management)
    }

    /// 由已构造的组件组装状态
    pub fn with_parts(
        config: Arc<EnvConfig>,
        deployer: Option<Arc<Deployer>>,
        storage: Arc<dyn Storage>,
        management: ManagementClient,
    ) -> Self {
        Self {
            api_key: config.api_key.clone(),
            config,
            started_at: Utc::now(),
            deployer,
            storage,
            management,
        }
    }

    /// 当前配置的仓库类型
    pub fn vcs_type(&self) -> Option<VcsType> {
        self.deployer.as_ref().map(|d| d.backend().kind())
    }
}

/// 按 `TFS_TYPE` 构造后端适配器（只有两种，封闭选择）
pub fn build_backend(config: &EnvConfig) -> Option<Arc<dyn SourceBackend>> {
    let vsts = VstsClient::new(config.collection_url(), config.credentials.clone());

    let backend: Arc<dyn SourceBackend> = match config.vcs_type? {
        VcsType::Git => Arc::new(GitBackend::new(Arc::new(GitRestClient::new(vsts)))),
        VcsType::Tfvc => Arc::new(TfvcBackend::new(
            Arc::new(TfvcRestClient::new(vsts)),
            &config.path,
        )),
    };

    Some(backend)
}
