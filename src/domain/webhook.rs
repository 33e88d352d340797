//! VSTS service hook 请求体
//!
//! 外部请求体先反序列化为宽松结构，再校验转换为内部 webhook 结构。

use serde::Deserialize;
use uuid::Uuid;

use crate::error::SyncError;

/// git push 事件类型
pub const GIT_PUSH_EVENT: &str = "git.push";
/// tfvc checkin 事件类型
pub const TFVC_CHECKIN_EVENT: &str = "tfvc.checkin";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPushPayload {
    #[serde(default)]
    pub notification_id: Option<serde_json::Value>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub resource: Option<GitPushResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPushResource {
    #[serde(default)]
    pub ref_updates: Vec<RefUpdate>,
    pub repository: Option<RepositoryRef>,
    #[serde(default)]
    pub commits: Vec<CommitRef>,
    pub pushed_by: Option<IdentityRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefUpdate {
    pub name: String,
    pub new_object_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    pub commit_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    #[serde(default)]
    pub unique_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TfvcCheckinPayload {
    #[serde(default)]
    pub notification_id: Option<serde_json::Value>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub resource: Option<TfvcCheckinResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TfvcCheckinResource {
    pub changeset_id: Option<serde_json::Value>,
    pub checked_in_by: Option<IdentityRef>,
}

/// 解析后的 git push webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitWebhook {
    pub id: String,
    pub event: String,
    pub repository_id: String,
    pub repository: String,
    pub branch: String,
    pub commits: Vec<String>,
    pub user: String,
    pub sha: String,
}

/// 解析后的 tfvc checkin webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TfvcWebhook {
    pub id: String,
    pub event: String,
    pub changeset: String,
    pub user: String,
}

/// notificationId 在 VSTS 中是数字，兼容字符串；缺失时生成一个部署 ID
fn notification_id(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

impl GitWebhook {
    /// 从原始请求体解析
    pub fn parse(body: &[u8]) -> Result<Self, SyncError> {
        let payload: GitPushPayload = serde_json::from_slice(body)
            .map_err(|e| SyncError::Argument(format!("The webhook payload is invalid: {}", e)))?;
        Self::try_from(payload)
    }
}

impl TryFrom<GitPushPayload> for GitWebhook {
    type Error = SyncError;

    fn try_from(payload: GitPushPayload) -> Result<Self, Self::Error> {
        let incorrect = || SyncError::Argument("The webhook details are incorrect.".to_string());

        let resource = payload.resource.ok_or_else(incorrect)?;
        let ref_update = resource.ref_updates.into_iter().next().ok_or_else(incorrect)?;
        let repository = resource.repository.ok_or_else(incorrect)?;

        // refs/heads/<branch>
        let ref_parts: Vec<&str> = ref_update.name.split('/').collect();
        let branch = if ref_parts.len() == 3 {
            ref_parts[2].to_string()
        } else {
            String::new()
        };

        Ok(Self {
            id: notification_id(payload.notification_id),
            event: payload.event_type,
            repository_id: repository.id,
            repository: repository.name,
            branch,
            commits: resource.commits.into_iter().map(|c| c.commit_id).collect(),
            user: resource.pushed_by.map(|p| p.unique_name).unwrap_or_default(),
            sha: ref_update.new_object_id,
        })
    }
}

impl TfvcWebhook {
    /// 从原始请求体解析
    pub fn parse(body: &[u8]) -> Result<Self, SyncError> {
        let payload: TfvcCheckinPayload = serde_json::from_slice(body)
            .map_err(|e| SyncError::Argument(format!("The webhook payload is invalid: {}", e)))?;
        Self::try_from(payload)
    }
}

impl TryFrom<TfvcCheckinPayload> for TfvcWebhook {
    type Error = SyncError;

    fn try_from(payload: TfvcCheckinPayload) -> Result<Self, Self::Error> {
        let incorrect = || SyncError::Argument("The webhook details are incorrect.".to_string());

        let resource = payload.resource.ok_or_else(incorrect)?;
        let changeset = match resource.changeset_id {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            _ => return Err(incorrect()),
        };

        Ok(Self {
            id: notification_id(payload.notification_id),
            event: payload.event_type,
            changeset,
            user: resource.checked_in_by.map(|p| p.unique_name).unwrap_or_default(),
        })
    }
}
