//! VSTS tfvc REST API
//!
//! tfvc 不支持一次性递归列出整棵树，只能按目录逐层列出

use async_trait::async_trait;
use serde::Deserialize;

use super::vsts::{Change, RepositoryInfo, ValueList, VstsClient};
use crate::error::SyncResult;

/// tfvc 条目（文件或目录）
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TfvcItem {
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesetSummary {
    changeset_id: u64,
}

/// tfvc REST API 抽象
#[async_trait]
pub trait TfvcApi: Send + Sync {
    /// 列出目录下一层的条目（包含目录自身）
    async fn items(
        &self,
        project: &str,
        scope_path: &str,
        version: Option<u64>,
    ) -> SyncResult<Vec<TfvcItem>>;

    /// 最新的 changeset 号
    async fn latest_changeset(&self) -> SyncResult<Option<u64>>;

    /// changeset 修改过的路径
    async fn changeset_changes(&self, changeset_id: &str) -> SyncResult<Vec<String>>;

    /// 按路径和版本下载文件内容；无内容时返回 None
    async fn item_content(&self, path: &str, version: Option<u64>) -> SyncResult<Option<String>>;

    /// 凭据可见的全部项目
    async fn projects(&self) -> SyncResult<Vec<RepositoryInfo>>;
}

/// 基于 reqwest 的 tfvc REST 客户端
#[derive(Clone)]
pub struct TfvcRestClient {
    vsts: VstsClient,
}

impl TfvcRestClient {
    pub fn new(vsts: VstsClient) -> Self {
        Self { vsts }
    }
}

#[async_trait]
impl TfvcApi for TfvcRestClient {
    async fn items(
        &self,
        project: &str,
        scope_path: &str,
        version: Option<u64>,
    ) -> SyncResult<Vec<TfvcItem>> {
        let url = self.vsts.url(&format!("{}/_apis/tfvc/items", project));
        let mut request = self
            .vsts
            .get(&url)
            .query(&[("scopePath", scope_path), ("recursionLevel", "OneLevel")]);

        if let Some(version) = version {
            request = request.query(&[
                ("versionDescriptor.version", version.to_string().as_str()),
                ("versionDescriptor.versionType", "changeset"),
            ]);
        }

        let list: Option<ValueList<TfvcItem>> = self.vsts.get_optional_json(request).await?;
        Ok(list.map(|l| l.value).unwrap_or_default())
    }

    async fn latest_changeset(&self) -> SyncResult<Option<u64>> {
        let url = self.vsts.url("_apis/tfvc/changesets");
        let list: ValueList<ChangesetSummary> = self
            .vsts
            .get_json(self.vsts.get(&url).query(&[("$top", "1")]))
            .await?;
        Ok(list.value.first().map(|c| c.changeset_id))
    }

    async fn changeset_changes(&self, changeset_id: &str) -> SyncResult<Vec<String>> {
        let url = self
            .vsts
            .url(&format!("_apis/tfvc/changesets/{}/changes", changeset_id));
        let list: ValueList<Change> = self.vsts.get_json(self.vsts.get(&url)).await?;
        Ok(list.value.into_iter().map(|c| c.item.path).collect())
    }

    async fn item_content(&self, path: &str, version: Option<u64>) -> SyncResult<Option<String>> {
        let url = self.vsts.url("_apis/tfvc/items");
        let mut request = self
            .vsts
            .get(&url)
            .query(&[("path", path)])
            .header(reqwest::header::CONTENT_TYPE, "text/html");

        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }

        self.vsts.download_text(request, path).await
    }

    async fn projects(&self) -> SyncResult<Vec<RepositoryInfo>> {
        let url = self.vsts.url("_apis/projects");
        let list: ValueList<RepositoryInfo> = self.vsts.get_json(self.vsts.get(&url)).await?;
        Ok(list.value)
    }
}
