//! 测试用的内存后端与 apply 实现

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::EnvConfig;
use crate::domain::deploy::{ChangeCounts, ChangeSet, DeployIdentity, DeploymentStats};
use crate::domain::path::PathClassifier;
use crate::domain::units::{FileContent, SnapshotId, TreeEntry};
use crate::error::{SyncError, SyncResult};
use crate::services::backend::{touches_deployable, SourceBackend, VcsType};
use crate::infra::ManagementClient;
use crate::services::deploy::{Applier, ApplyRequest, Deployer};
use crate::state::{AppState, MemoryStorage, Storage};

/// 内存仓库，记录各操作的调用次数和下载的峰值并发
pub struct FakeBackend {
    kind: VcsType,
    classifier: PathClassifier,
    branches: HashMap<String, String>,
    files: BTreeMap<String, String>,
    failing: HashSet<String>,
    changed: Vec<String>,
    repositories: HashMap<String, String>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub fetches: AtomicUsize,
    pub resolves: AtomicUsize,
    pub listings: AtomicUsize,
    pub change_checks: AtomicUsize,
}

impl FakeBackend {
    fn new(kind: VcsType) -> Self {
        Self {
            kind,
            classifier: PathClassifier::repository_root(),
            branches: HashMap::new(),
            files: BTreeMap::new(),
            failing: HashSet::new(),
            changed: Vec::new(),
            repositories: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            resolves: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            change_checks: AtomicUsize::new(0),
        }
    }

    pub fn git() -> Self {
        Self::new(VcsType::Git)
    }

    pub fn tfvc() -> Self {
        Self::new(VcsType::Tfvc)
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn branch(mut self, name: &str, commit_id: &str) -> Self {
        self.branches.insert(name.to_string(), commit_id.to_string());
        self
    }

    pub fn repository(mut self, name: &str, id: &str) -> Self {
        self.repositories.insert(name.to_string(), id.to_string());
        self
    }

    /// has_changes 看到的变更路径
    pub fn changed(mut self, path: &str) -> Self {
        self.changed.push(path.to_string());
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl SourceBackend for FakeBackend {
    fn kind(&self) -> VcsType {
        self.kind
    }

    fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    async fn resolve_snapshot(&self, _repository: &str, revision: &str) -> SyncResult<SnapshotId> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if let Some(commit_id) = self.branches.get(revision) {
            return Ok(SnapshotId(commit_id.clone()));
        }
        let numeric = self.kind == VcsType::Tfvc && revision.parse::<u64>().is_ok();
        if revision.len() == 40 || numeric {
            return Ok(SnapshotId(revision.to_string()));
        }
        Err(SyncError::not_found(format!("Branch '{}'", revision)))
    }

    async fn list_tree(&self, _repository: &str, _snapshot: &SnapshotId) -> SyncResult<Vec<TreeEntry>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .keys()
            .filter(|path| self.classifier.is_valid_file(path))
            .map(|path| TreeEntry::new(path.as_str(), format!("blob:{}", path)))
            .collect())
    }

    async fn fetch_file(
        &self,
        _repository: &str,
        entry: &TreeEntry,
        _revision: &SnapshotId,
    ) -> SyncResult<FileContent> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&entry.path) {
            return Err(SyncError::fetch(&entry.path, "status 500"));
        }

        match self.files.get(&entry.path) {
            Some(content) => Ok(FileContent {
                path: entry.path.clone(),
                content: content.clone(),
            }),
            None => Err(SyncError::fetch(&entry.path, "no content returned")),
        }
    }

    async fn has_changes(&self, _changes: &ChangeSet) -> SyncResult<bool> {
        self.change_checks.fetch_add(1, Ordering::SeqCst);
        Ok(touches_deployable(&self.classifier, &self.changed))
    }

    async fn resolve_repository_id(&self, name: &str) -> SyncResult<Option<String>> {
        Ok(self.repositories.get(name).cloned())
    }
}

/// apply 收到的内容摘要
#[derive(Clone, Debug)]
pub struct SeenApply {
    pub identity: DeployIdentity,
    pub rules: Vec<String>,
    pub databases: Vec<String>,
    pub pages: Vec<String>,
    pub template_text: String,
}

/// 可控结果的 apply 实现
pub struct FakeApplier {
    outcome: Result<DeploymentStats, String>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Option<SeenApply>>,
}

impl FakeApplier {
    pub fn succeeding() -> Self {
        Self {
            outcome: Ok(DeploymentStats {
                rules: ChangeCounts {
                    created: 1,
                    ..ChangeCounts::default()
                },
                ..DeploymentStats::default()
            }),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Applier for FakeApplier {
    async fn apply(&self, request: ApplyRequest<'_>) -> anyhow::Result<DeploymentStats> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let units = request.context.init().await?;

        *self.seen.lock().unwrap() = Some(SeenApply {
            identity: request.identity.clone(),
            rules: units.rules.iter().map(|r| r.name.clone()).collect(),
            databases: units.databases.iter().map(|d| d.name.clone()).collect(),
            pages: units.pages.iter().map(|p| p.name.clone()).collect(),
            template_text: request.template.text.clone(),
        });

        match &self.outcome {
            Ok(stats) => Ok(stats.clone()),
            Err(message) => Err(anyhow::anyhow!(message.clone())),
        }
    }
}

/// 使用内存存储和给定后端组装应用状态
pub fn app_state(
    config: EnvConfig,
    backend: Option<Arc<FakeBackend>>,
    applier: Arc<FakeApplier>,
) -> Arc<AppState> {
    let config = Arc::new(config);
    let deployer = backend.map(|backend| {
        let backend: Arc<dyn SourceBackend> = backend;
        let applier: Arc<dyn Applier> = applier;
        Arc::new(Deployer::new(backend, applier, config.clone()))
    });
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let management = ManagementClient::new(config.management.clone());

    Arc::new(AppState::with_parts(config, deployer, storage, management))
}
