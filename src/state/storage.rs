//! 持久化存储
//!
//! 单个 JSON 文档 `{ isNotified, deployments }`，每次操作整体读出再整体写回。
//! 读改写之间没有并发保护：两个并发写入者可能互相覆盖。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::env::constants::MAX_DEPLOYMENT_HISTORY;
use crate::domain::deploy::DeploymentRecord;
use crate::error::{SyncError, SyncResult};

/// 存储文档
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageDocument {
    #[serde(rename = "isNotified", default)]
    pub is_notified: bool,
    #[serde(default)]
    pub deployments: Vec<DeploymentRecord>,
}

/// 存储抽象
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self) -> anyhow::Result<StorageDocument>;

    async fn write(&self, document: &StorageDocument) -> anyhow::Result<()>;
}

/// 追加一条部署记录（超出上限时丢弃最旧的记录）
pub async fn append_deployment(storage: &dyn Storage, record: DeploymentRecord) -> SyncResult<()> {
    let mut document = storage.read().await.map_err(SyncError::Storage)?;
    document.deployments.push(record);

    if document.deployments.len() > MAX_DEPLOYMENT_HISTORY {
        document.deployments.sort_by(|a, b| a.date.cmp(&b.date));
        let excess = document.deployments.len() - MAX_DEPLOYMENT_HISTORY;
        document.deployments.drain(..excess);
    }

    storage.write(&document).await.map_err(SyncError::Storage)
}

/// 部署历史，按时间倒序
pub async fn deployments(storage: &dyn Storage) -> SyncResult<Vec<DeploymentRecord>> {
    let mut records = storage.read().await.map_err(SyncError::Storage)?.deployments;
    records.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(records)
}

/// 标记提示已展示
pub async fn set_notified(storage: &dyn Storage) -> SyncResult<()> {
    let mut document = storage.read().await.map_err(SyncError::Storage)?;
    document.is_notified = true;
    storage.write(&document).await.map_err(SyncError::Storage)
}

/// 本地 JSON 文件存储
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self) -> anyhow::Result<StorageDocument> {
        if !self.path.exists() {
            return Ok(StorageDocument::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            warn!(path = %self.path.display(), "Storage file is empty, starting fresh");
            return Ok(StorageDocument::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// 原子写入：先写临时文件再重命名
    async fn write(&self, document: &StorageDocument) -> anyhow::Result<()> {
        let temp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(document)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        info!(
            path = %self.path.display(),
            deployments = document.deployments.len(),
            "Saved storage"
        );

        Ok(())
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStorage {
    document: RwLock<StorageDocument>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self) -> anyhow::Result<StorageDocument> {
        Ok(self.document.read().await.clone())
    }

    async fn write(&self, document: &StorageDocument) -> anyhow::Result<()> {
        *self.document.write().await = document.clone();
        Ok(())
    }
}
