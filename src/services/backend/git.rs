//! git 后端适配器
//!
//! 分支 → commit → tree，一次递归列出整棵树，按 blob id 下载文件

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use super::{touches_deployable, SourceBackend, VcsType};
use crate::domain::deploy::ChangeSet;
use crate::domain::path::PathClassifier;
use crate::domain::units::{FileContent, SnapshotId, TreeEntry};
use crate::error::{SyncError, SyncResult};
use crate::infra::git_api::{changes_for_commits, GitApi, GitObjectType};

/// git 后端
pub struct GitBackend {
    api: Arc<dyn GitApi>,
    classifier: PathClassifier,
}

impl GitBackend {
    pub fn new(api: Arc<dyn GitApi>) -> Self {
        Self {
            api,
            classifier: PathClassifier::repository_root(),
        }
    }
}

/// 完整的 40 位 commit id 无需解析
fn is_commit_id(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl SourceBackend for GitBackend {
    fn kind(&self) -> VcsType {
        VcsType::Git
    }

    fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    async fn resolve_snapshot(&self, repository: &str, revision: &str) -> SyncResult<SnapshotId> {
        if is_commit_id(revision) {
            return Ok(SnapshotId(revision.to_string()));
        }

        match self.api.branch_commit(repository, revision).await? {
            Some(commit_id) => {
                debug!(branch = %revision, commit = %commit_id, "Resolved branch");
                Ok(SnapshotId(commit_id))
            }
            None => {
                error!(branch = %revision, "Branch not found");
                Err(SyncError::not_found(format!("Branch '{}'", revision)))
            }
        }
    }

    async fn list_tree(&self, repository: &str, snapshot: &SnapshotId) -> SyncResult<Vec<TreeEntry>> {
        let tree_id = self.api.commit_tree_id(repository, snapshot.as_str()).await?;
        let entries = self.api.tree(repository, &tree_id).await?;

        Ok(entries
            .into_iter()
            .filter(|e| e.git_object_type == GitObjectType::Blob)
            .filter(|e| self.classifier.is_valid_file(&e.relative_path))
            .map(|e| TreeEntry::new(e.relative_path, e.object_id))
            .collect())
    }

    async fn fetch_file(
        &self,
        repository: &str,
        entry: &TreeEntry,
        _revision: &SnapshotId,
    ) -> SyncResult<FileContent> {
        let content = self
            .api
            .blob_content(repository, &entry.id, &entry.path)
            .await?
            .ok_or_else(|| SyncError::fetch(&entry.path, "no content returned"))?;

        Ok(FileContent {
            path: entry.path.clone(),
            content,
        })
    }

    async fn has_changes(&self, changes: &ChangeSet) -> SyncResult<bool> {
        let ChangeSet::Commits {
            repository_id,
            commit_ids,
        } = changes
        else {
            return Err(SyncError::Argument(
                "A git repository cannot inspect a tfvc changeset".to_string(),
            ));
        };

        let mut paths = changes_for_commits(self.api.as_ref(), repository_id, commit_ids).await?;
        paths.sort();
        paths.dedup();

        Ok(touches_deployable(&self.classifier, &paths))
    }

    async fn resolve_repository_id(&self, name: &str) -> SyncResult<Option<String>> {
        let repositories = self.api.repositories().await?;
        Ok(repositories
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.id))
    }
}
