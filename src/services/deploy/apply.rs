//! HTTP apply 步骤
//!
//! 把统一后的部署单元 POST 到 `APPLY_URL`，由外部服务完成与租户的对比和增删改，
//! 响应体即部署统计。

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::{Applier, ApplyRequest};
use crate::domain::deploy::{DeployIdentity, DeploymentStats, NotificationTemplate};
use crate::domain::units::{UnifiedDatabase, UnifiedItem};

/// 发送给 apply 端点的请求体
#[derive(Debug, Serialize)]
struct ApplyPayload<'a> {
    deployment: &'a DeployIdentity,
    domain: &'a str,
    rules: &'a [UnifiedItem],
    databases: &'a [UnifiedDatabase],
    pages: &'a [UnifiedItem],
    notification: &'a NotificationTemplate,
}

/// 基于 HTTP 的 apply 实现
#[derive(Default)]
pub struct HttpApplier;

impl HttpApplier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Applier for HttpApplier {
    async fn apply(&self, request: ApplyRequest<'_>) -> anyhow::Result<DeploymentStats> {
        let url = request
            .client
            .apply_url()
            .ok_or_else(|| anyhow!("APPLY_URL is not configured"))?
            .to_string();

        let units = request.context.init().await?;

        let payload = ApplyPayload {
            deployment: request.identity,
            domain: request.client.domain(),
            rules: &units.rules,
            databases: &units.databases,
            pages: &units.pages,
            notification: request.template,
        };

        let mut http = request.client.http().post(&url).json(&payload);
        if request.client.is_configured() {
            http = http.bearer_auth(request.client.access_token().await?);
        }

        let response = http
            .send()
            .await
            .with_context(|| format!("Failed to reach apply endpoint {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Apply endpoint returned {}: {}", status, body));
        }

        let stats: DeploymentStats = response
            .json()
            .await
            .context("Apply endpoint returned an invalid stats payload")?;

        info!(
            task_id = %request.identity.id,
            rules_created = stats.rules.created,
            rules_updated = stats.rules.updated,
            rules_deleted = stats.rules.deleted,
            "Apply step finished"
        );

        Ok(stats)
    }
}
