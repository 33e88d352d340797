//! 源码后端适配器
//!
//! git 与 tfvc 两种后端实现同一个 `SourceBackend` 契约，输出相同的 `TreeEntry` / `FileContent`，
//! 聚合、统一和部署流程与后端无关。

pub mod git;
pub mod tfvc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::deploy::ChangeSet;
use crate::domain::path::PathClassifier;
use crate::domain::units::{FileContent, SnapshotId, TreeEntry};
use crate::error::SyncResult;

pub use git::GitBackend;
pub use tfvc::TfvcBackend;

/// 仓库类型（封闭枚举，只有两种后端）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsType {
    Git,
    Tfvc,
}

impl VcsType {
    /// 解析 `TFS_TYPE`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "git" => Some(VcsType::Git),
            "tfvc" => Some(VcsType::Tfvc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VcsType::Git => "git",
            VcsType::Tfvc => "tfvc",
        }
    }
}

impl std::fmt::Display for VcsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 后端适配器契约
#[async_trait]
pub trait SourceBackend: Send + Sync {
    /// 后端类型
    fn kind(&self) -> VcsType;

    /// 该后端使用的路径分类器
    fn classifier(&self) -> &PathClassifier;

    /// 将版本（分支名 / latest / 完整 id）解析为快照 ID
    async fn resolve_snapshot(&self, repository: &str, revision: &str) -> SyncResult<SnapshotId>;

    /// 列出快照中所有需要部署的文件（只含文件，已按分类器过滤）
    async fn list_tree(&self, repository: &str, snapshot: &SnapshotId) -> SyncResult<Vec<TreeEntry>>;

    /// 下载单个文件
    async fn fetch_file(
        &self,
        repository: &str,
        entry: &TreeEntry,
        revision: &SnapshotId,
    ) -> SyncResult<FileContent>;

    /// 变更集是否涉及需要部署的文件（只查路径列表，不下载内容）
    async fn has_changes(&self, changes: &ChangeSet) -> SyncResult<bool>;

    /// 按名称查找仓库 ID；没有完全匹配时返回 None
    async fn resolve_repository_id(&self, name: &str) -> SyncResult<Option<String>>;
}

/// 路径集合中是否至少有一个需要部署的文件
pub fn touches_deployable(classifier: &PathClassifier, paths: &[String]) -> bool {
    paths.iter().any(|p| classifier.is_valid_file(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcs_type_parse() {
        assert_eq!(VcsType::parse("git"), Some(VcsType::Git));
        assert_eq!(VcsType::parse(" TFVC "), Some(VcsType::Tfvc));
        assert_eq!(VcsType::parse("svn"), None);
        assert_eq!(VcsType::Tfvc.to_string(), "tfvc");
    }

    #[test]
    fn test_touches_deployable() {
        let classifier = PathClassifier::repository_root();
        let rejected = vec!["/README.md".to_string(), "/src/app.js".to_string()];
        assert!(!touches_deployable(&classifier, &rejected));

        let mut mixed = rejected.clone();
        mixed.push("/rules/a.js".to_string());
        assert!(touches_deployable(&classifier, &mixed));
    }
}
