//! Auth0 Management API Client
//!
//! 部署流程只把它原样交给 apply 步骤；dashboard 的 `/api/config` 用它判断租户里是否已有规则。

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ManagementConfig;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Management API 客户端
#[derive(Clone)]
pub struct ManagementClient {
    client: Client,
    config: ManagementConfig,
}

impl ManagementClient {
    /// 创建新的 Management API 客户端
    ///
    /// # Arguments
    /// * `config` - 租户域名、client credentials 与 apply 端点
    pub fn new(config: ManagementConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// 是否配置了 client credentials
    pub fn is_configured(&self) -> bool {
        !self.config.domain.is_empty()
            && !self.config.client_id.is_empty()
            && !self.config.client_secret.is_empty()
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    /// apply 端点（可选）
    pub fn apply_url(&self) -> Option<&str> {
        self.config.apply_url.as_deref()
    }

    /// 共享的 HTTP 连接池
    pub fn http(&self) -> &Client {
        &self.client
    }

    fn api_url(&self, path: &str) -> String {
        format!("https://{}/api/v2/{}", self.config.domain, path)
    }

    /// client credentials 换取 access token
    pub async fn access_token(&self) -> SyncResult<String> {
        let url = format!("https://{}/oauth/token", self.config.domain);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "audience": self.api_url(""),
            }))
            .send()
            .await?
            .error_for_status()?;

        let token: TokenResponse = response.json().await?;
        debug!(domain = %self.config.domain, "Obtained management API token");
        Ok(token.access_token)
    }

    /// 租户中现有规则的数量
    pub async fn rule_count(&self) -> SyncResult<usize> {
        if !self.is_configured() {
            warn!("Management API credentials are not configured");
            return Err(SyncError::Argument(
                "AUTH0_DOMAIN, AUTH0_CLIENT_ID and AUTH0_CLIENT_SECRET are required".to_string(),
            ));
        }

        let token = self.access_token().await?;
        let rules: Vec<serde_json::Value> = self
            .client
            .get(self.api_url("rules"))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rules.len())
    }
}
