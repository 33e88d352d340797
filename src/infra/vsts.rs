//! VSTS HTTP Client
//!
//! git / tfvc REST 客户端共用的连接池、认证和 JSON 解析

use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::env::constants::API_VERSION;
use crate::config::Credentials;
use crate::error::{SyncError, SyncResult};

/// VSTS collection 客户端
///
/// 由部署服务在启动时显式构造并持有，不使用全局单例
#[derive(Clone)]
pub struct VstsClient {
    client: Client,
    collection_url: String,
    credentials: Credentials,
}

/// `{ "value": [...] }` 列表响应
#[derive(Debug, Deserialize)]
pub struct ValueList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// 仓库 / 项目的 id 与名称
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub id: String,
    pub name: String,
}

/// 变更列表中的一项
#[derive(Debug, Deserialize)]
pub struct Change {
    pub item: ChangeItem,
}

#[derive(Debug, Deserialize)]
pub struct ChangeItem {
    #[serde(default)]
    pub path: String,
}

impl VstsClient {
    /// 创建新的 VSTS 客户端
    ///
    /// # Arguments
    /// * `collection_url` - 如 `https://contoso.visualstudio.com/DefaultCollection`
    /// * `credentials` - 用户名（可选）与 personal access token
    pub fn new(collection_url: impl Into<String>, credentials: Credentials) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            collection_url: collection_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// 拼接 collection 下的 API 路径
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.collection_url, path.trim_start_matches('/'))
    }

    /// 带认证和 api-version 的 GET 请求
    pub fn get(&self, url: &str) -> RequestBuilder {
        let username = self.credentials.username.as_deref().unwrap_or_default();
        self.client
            .get(url)
            .basic_auth(username, Some(&self.credentials.token))
            .query(&[("api-version", API_VERSION)])
    }

    /// 发送请求并解析 JSON；非成功状态码返回传输错误
    pub async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    /// 发送请求并解析 JSON；404 返回 None
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> SyncResult<Option<T>> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json::<T>().await?))
    }

    /// 下载文本内容（流式累积）
    ///
    /// 非成功状态码或空内容返回 None，由调用方决定如何报错
    pub async fn download_text(&self, request: RequestBuilder, label: &str) -> SyncResult<Option<String>> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(path = %label, status = %status, "Download returned non-success status");
            return Ok(None);
        }

        let content = read_body(response, label).await?;
        debug!(path = %label, bytes = content.len(), "Downloaded file");

        if content.is_empty() {
            Ok(None)
        } else {
            Ok(Some(content))
        }
    }
}

/// 累积响应体
async fn read_body(response: Response, label: &str) -> SyncResult<String> {
    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    decode_utf8(buf, label)
}

/// 脚本和页面按原样部署，非 UTF-8 内容视为下载失败
fn decode_utf8(buf: Vec<u8>, label: &str) -> SyncResult<String> {
    String::from_utf8(buf).map_err(|_| SyncError::fetch(label, "invalid UTF-8"))
}
