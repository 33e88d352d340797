//! 部署相关领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 部署结果状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Success,
    Failed,
}

/// 一次部署的身份信息（谁、从哪里、部署哪个版本）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeployIdentity {
    /// 部署 ID（webhook notificationId 或 "manual"）
    pub id: String,
    pub branch: String,
    /// 仓库名称（人类可读）
    pub repository: String,
    pub sha: String,
    pub user: String,
}

/// 部署请求
#[derive(Clone, Debug)]
pub struct DeployRequest {
    pub id: String,
    /// 后端使用的仓库引用：git 为 repository id，tfvc 为 project
    pub repository_id: String,
    pub branch: String,
    pub repository: String,
    /// 要部署的版本（可以是分支名 / latest 等符号引用）
    pub sha: String,
    pub user: String,
}

impl DeployRequest {
    pub fn identity(&self) -> DeployIdentity {
        DeployIdentity {
            id: self.id.clone(),
            branch: self.branch.clone(),
            repository: self.repository.clone(),
            sha: self.sha.clone(),
            user: self.user.clone(),
        }
    }
}

/// 变更集引用（用于 has_changes 判断）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeSet {
    /// git push 中包含的提交
    Commits {
        repository_id: String,
        commit_ids: Vec<String>,
    },
    /// tfvc checkin 的 changeset
    Changeset(String),
}

/// 单类资源的变更计数
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChangeCounts {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub unchanged: u32,
}

/// apply 步骤返回的统计信息
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeploymentStats {
    pub rules: ChangeCounts,
    pub databases: ChangeCounts,
    pub pages: ChangeCounts,
}

/// 部署历史记录（持久化到 storage，供 dashboard 展示）
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub repository: String,
    pub branch: String,
    pub sha: String,
    pub user: String,
    pub status: DeployStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DeploymentStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentRecord {
    /// 成功记录
    pub fn success(identity: &DeployIdentity, stats: DeploymentStats) -> Self {
        Self::build(identity, DeployStatus::Success, Some(stats), None)
    }

    /// 失败记录
    pub fn failure(identity: &DeployIdentity, error: impl Into<String>) -> Self {
        Self::build(identity, DeployStatus::Failed, None, Some(error.into()))
    }

    fn build(
        identity: &DeployIdentity,
        status: DeployStatus,
        stats: Option<DeploymentStats>,
        error: Option<String>,
    ) -> Self {
        Self {
            id: identity.id.clone(),
            date: Utc::now(),
            repository: identity.repository.clone(),
            branch: identity.branch.clone(),
            sha: identity.sha.clone(),
            user: identity.user.clone(),
            status,
            stats,
            error,
        }
    }
}

/// 部署通知模板（由 apply 步骤发送 Slack 等通知时使用）
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NotificationTemplate {
    pub fallback: String,
    pub text: String,
}

impl NotificationTemplate {
    pub fn for_vcs(vcs: &str) -> Self {
        Self {
            fallback: "Visual Studio to Auth0 Deployment".to_string(),
            text: format!("Visual Studio ({}) to Auth0 Deployment", vcs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeployIdentity {
        DeployIdentity {
            id: "manual".to_string(),
            branch: "master".to_string(),
            repository: "auth0-config".to_string(),
            sha: "abc".to_string(),
            user: "admin".to_string(),
        }
    }

    #[test]
    fn test_deploy_status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(DeployStatus::Success).unwrap(), "success");
        assert_eq!(serde_json::to_value(DeployStatus::Failed).unwrap(), "failed");
    }

    #[test]
    fn test_stats_tolerate_partial_payload() {
        let stats: DeploymentStats =
            serde_json::from_str(r#"{"rules":{"created":2},"extra":true}"#).unwrap();
        assert_eq!(stats.rules.created, 2);
        assert_eq!(stats.pages, ChangeCounts::default());
    }

    #[test]
    fn test_failure_record_omits_stats() {
        let record = DeploymentRecord::failure(&identity(), "Branch 'x' not found");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json.get("stats").is_none());
        assert_eq!(json["error"], "Branch 'x' not found");
    }

    #[test]
    fn test_notification_template() {
        let template = NotificationTemplate::for_vcs("tfvc");
        assert_eq!(template.text, "Visual Studio (tfvc) to Auth0 Deployment");
    }
}
