//! VSTS git REST API

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;

use super::vsts::{Change, RepositoryInfo, ValueList, VstsClient};
use crate::error::SyncResult;

/// git 对象类型
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GitObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
    #[serde(other)]
    Other,
}

/// 树条目
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitTreeEntry {
    pub relative_path: String,
    pub object_id: String,
    pub git_object_type: GitObjectType,
}

/// git REST API 抽象
///
/// 适配器只依赖这个 trait，便于在测试中替换为内存实现
#[async_trait]
pub trait GitApi: Send + Sync {
    /// 分支最新提交；分支不存在时返回 None
    async fn branch_commit(&self, repository_id: &str, branch: &str) -> SyncResult<Option<String>>;

    /// 提交对应的 tree id
    async fn commit_tree_id(&self, repository_id: &str, commit_id: &str) -> SyncResult<String>;

    /// 递归列出整个树
    async fn tree(&self, repository_id: &str, tree_id: &str) -> SyncResult<Vec<GitTreeEntry>>;

    /// 下载 blob 内容；无内容时返回 None
    async fn blob_content(
        &self,
        repository_id: &str,
        object_id: &str,
        path: &str,
    ) -> SyncResult<Option<String>>;

    /// 一个提交修改过的路径
    async fn commit_changes(&self, repository_id: &str, commit_id: &str) -> SyncResult<Vec<String>>;

    /// 凭据可见的全部仓库
    async fn repositories(&self) -> SyncResult<Vec<RepositoryInfo>>;
}

#[derive(Debug, Deserialize)]
struct BranchStats {
    commit: CommitSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitSummary {
    commit_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitDetail {
    tree_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeResponse {
    #[serde(default)]
    tree_entries: Vec<GitTreeEntry>,
}

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    #[serde(default)]
    changes: Vec<Change>,
}

/// 基于 reqwest 的 git REST 客户端
#[derive(Clone)]
pub struct GitRestClient {
    vsts: VstsClient,
}

impl GitRestClient {
    pub fn new(vsts: VstsClient) -> Self {
        Self { vsts }
    }

    fn repo_url(&self, repository_id: &str, rest: &str) -> String {
        self.vsts
            .url(&format!("_apis/git/repositories/{}/{}", repository_id, rest))
    }
}

#[async_trait]
impl GitApi for GitRestClient {
    async fn branch_commit(&self, repository_id: &str, branch: &str) -> SyncResult<Option<String>> {
        let url = self.repo_url(repository_id, "stats/branches");
        let stats: Option<BranchStats> = self
            .vsts
            .get_optional_json(self.vsts.get(&url).query(&[("name", branch)]))
            .await?;
        Ok(stats.map(|s| s.commit.commit_id))
    }

    async fn commit_tree_id(&self, repository_id: &str, commit_id: &str) -> SyncResult<String> {
        let url = self.repo_url(repository_id, &format!("commits/{}", commit_id));
        let commit: CommitDetail = self.vsts.get_json(self.vsts.get(&url)).await?;
        Ok(commit.tree_id)
    }

    async fn tree(&self, repository_id: &str, tree_id: &str) -> SyncResult<Vec<GitTreeEntry>> {
        let url = self.repo_url(repository_id, &format!("trees/{}", tree_id));
        let tree: TreeResponse = self
            .vsts
            .get_json(self.vsts.get(&url).query(&[("recursive", "true")]))
            .await?;
        Ok(tree.tree_entries)
    }

    async fn blob_content(
        &self,
        repository_id: &str,
        object_id: &str,
        path: &str,
    ) -> SyncResult<Option<String>> {
        let url = self.repo_url(repository_id, &format!("blobs/{}", object_id));
        let request = self
            .vsts
            .get(&url)
            .query(&[("download", "true")])
            .header(reqwest::header::ACCEPT, "application/octet-stream");
        self.vsts.download_text(request, path).await
    }

    async fn commit_changes(&self, repository_id: &str, commit_id: &str) -> SyncResult<Vec<String>> {
        let url = self.repo_url(repository_id, &format!("commits/{}/changes", commit_id));
        let changes: ChangesResponse = self.vsts.get_json(self.vsts.get(&url)).await?;
        Ok(changes.changes.into_iter().map(|c| c.item.path).collect())
    }

    async fn repositories(&self) -> SyncResult<Vec<RepositoryInfo>> {
        let url = self.vsts.url("_apis/git/repositories");
        let list: ValueList<RepositoryInfo> = self.vsts.get_json(self.vsts.get(&url)).await?;
        Ok(list.value)
    }
}

/// 并发获取多个提交的修改路径
pub async fn changes_for_commits(
    api: &dyn GitApi,
    repository_id: &str,
    commit_ids: &[String],
) -> SyncResult<Vec<String>> {
    let lists = try_join_all(
        commit_ids
            .iter()
            .map(|commit_id| api.commit_changes(repository_id, commit_id)),
    )
    .await?;
    Ok(lists.into_iter().flatten().collect())
}
