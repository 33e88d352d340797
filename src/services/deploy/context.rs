//! 部署上下文
//!
//! 每次部署新建一个上下文。`init()` 一次性完成快照解析、列树、聚合和统一，
//! 结果缓存在上下文上，apply 步骤重复调用也只会访问一次仓库。

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::domain::units::{DeployUnits, SnapshotId, UnifiedDatabase, UnifiedItem};
use crate::error::SyncResult;
use crate::services::aggregator::ChangeAggregator;
use crate::services::backend::SourceBackend;
use crate::services::unify::{unify, unify_databases};

/// 部署执行上下文
pub struct DeployContext {
    backend: Arc<dyn SourceBackend>,
    /// git 为仓库 ID，tfvc 为项目名
    repository_id: String,
    /// 待解析的版本（分支名 / latest / 完整 id）
    revision: String,
    fetch_concurrency: usize,
    snapshot: OnceCell<SnapshotId>,
    units: OnceCell<DeployUnits>,
}

impl DeployContext {
    pub fn new(
        backend: Arc<dyn SourceBackend>,
        repository_id: impl Into<String>,
        revision: impl Into<String>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            backend,
            repository_id: repository_id.into(),
            revision: revision.into(),
            fetch_concurrency,
            snapshot: OnceCell::new(),
            units: OnceCell::new(),
        }
    }

    /// 加载并缓存部署单元
    pub async fn init(&self) -> SyncResult<&DeployUnits> {
        self.units.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> SyncResult<DeployUnits> {
        let snapshot = self
            .snapshot
            .get_or_try_init(|| {
                self.backend
                    .resolve_snapshot(&self.repository_id, &self.revision)
            })
            .await?;

        debug!(
            vcs = %self.backend.kind(),
            revision = %self.revision,
            snapshot = %snapshot,
            "Resolved snapshot"
        );

        let entries = self.backend.list_tree(&self.repository_id, snapshot).await?;
        let collected = ChangeAggregator::new(self.backend.clone(), self.fetch_concurrency)
            .collect_all(&self.repository_id, &entries, snapshot)
            .await?;

        let units = DeployUnits {
            rules: unify(&collected.rules),
            databases: unify_databases(&collected.databases),
            pages: unify(&collected.pages),
        };

        info!(
            snapshot = %snapshot,
            files = entries.len(),
            rules = units.rules.len(),
            databases = units.databases.len(),
            pages = units.pages.len(),
            "Deploy context initialized"
        );

        Ok(units)
    }

    /// 解析后的快照 ID（`init()` 之前为 None）
    pub fn snapshot(&self) -> Option<&SnapshotId> {
        self.snapshot.get()
    }

    pub fn rules(&self) -> &[UnifiedItem] {
        self.units.get().map(|u| u.rules.as_slice()).unwrap_or_default()
    }

    pub fn databases(&self) -> &[UnifiedDatabase] {
        self.units
            .get()
            .map(|u| u.databases.as_slice())
            .unwrap_or_default()
    }

    pub fn pages(&self) -> &[UnifiedItem] {
        self.units.get().map(|u| u.pages.as_slice()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::services::fakes::FakeBackend;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_init_is_memoized() {
        let backend = Arc::new(
            FakeBackend::git()
                .branch("master", "0123456789abcdef0123456789abcdef01234567")
                .file("rules/a.js", "a")
                .file("database-connections/db/login.js", "login")
                .file("pages/login.html", "<html/>"),
        );
        let context = DeployContext::new(backend.clone(), "repo", "master", 2);

        assert!(context.rules().is_empty());
        assert!(context.snapshot().is_none());

        context.init().await.unwrap();
        context.init().await.unwrap();

        assert_eq!(backend.resolves.load(Ordering::SeqCst), 1);
        assert_eq!(backend.listings.load(Ordering::SeqCst), 1);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 3);

        assert_eq!(context.rules()[0].name, "a");
        assert_eq!(context.databases()[0].scripts[0].name, "login");
        assert_eq!(context.pages()[0].name, "login");
        assert_eq!(
            context.snapshot().map(|s| s.as_str()),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
    }

    #[tokio::test]
    async fn test_unknown_branch_fails_init() {
        let backend = Arc::new(FakeBackend::git().file("rules/a.js", "a"));
        let context = DeployContext::new(backend.clone(), "repo", "missing", 2);

        assert!(matches!(context.init().await, Err(SyncError::NotFound(_))));
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
    }
}
