//! 部署单元
//!
//! 每次部署时从仓库快照重新组装，apply 完成后丢弃，不做跨请求缓存。

use serde::{Deserialize, Serialize};

/// 解析后的快照 ID（git commit id / tfvc changeset 号）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 快照树中的一个文件
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    /// git blob id；tfvc 为文件版本号
    pub id: String,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
        }
    }
}

/// 下载后的文件内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}

/// 规则：同名的 `.js` 脚本与 `.json` 元数据
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUnit {
    pub name: String,
    pub has_script: bool,
    pub script_content: Option<String>,
    pub has_metadata: bool,
    pub metadata_content: Option<serde_json::Value>,
}

/// 数据库连接脚本
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseScript {
    pub stage: String,
    pub content: String,
}

/// 数据库连接：一组按阶段命名的脚本
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseUnit {
    pub name: String,
    pub scripts: Vec<DatabaseScript>,
}

/// 托管页面：页面内容与可选的 `.json` 元数据
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUnit {
    pub name: String,
    pub has_metadata: bool,
    pub html_content: Option<String>,
    pub metadata_content: Option<String>,
}

/// 一次聚合的全部结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectedUnits {
    pub rules: Vec<RuleUnit>,
    pub databases: Vec<DatabaseUnit>,
    pub pages: Vec<PageUnit>,
}

/// 统一后的规则 / 页面
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedItem {
    pub name: String,
    pub script: bool,
    pub script_file: Option<String>,
    pub metadata: bool,
    pub metadata_file: Option<serde_json::Value>,
}

/// 统一后的数据库脚本
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedScript {
    pub name: String,
    pub script_file: String,
}

/// 统一后的数据库连接
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnifiedDatabase {
    pub name: String,
    pub scripts: Vec<UnifiedScript>,
}

/// 交给 apply 步骤的三类单元
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeployUnits {
    pub rules: Vec<UnifiedItem>,
    pub databases: Vec<UnifiedDatabase>,
    pub pages: Vec<UnifiedItem>,
}
