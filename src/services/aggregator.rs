//! 变更聚合
//!
//! 把快照树中的文件分组为规则、数据库连接和页面，并发下载后组装成部署单元。
//! 所有下载共享一个信号量，同时在途的下载数不超过 `FETCH_CONCURRENCY`，
//! 避免触发 VSTS 的限流。任何一个文件下载失败都会中止整个聚合。

use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::domain::path::{file_stem, has_extension, PathKind, PAGE_NAMES};
use crate::domain::units::{
    CollectedUnits, DatabaseScript, DatabaseUnit, FileContent, PageUnit, RuleUnit, SnapshotId,
    TreeEntry,
};
use crate::error::{SyncError, SyncResult};
use crate::services::backend::SourceBackend;

/// 同名的脚本与元数据文件
#[derive(Default)]
struct FileGroup<'a> {
    script: Option<&'a TreeEntry>,
    metadata: Option<&'a TreeEntry>,
}

/// 变更聚合器
pub struct ChangeAggregator {
    backend: Arc<dyn SourceBackend>,
    permits: Arc<Semaphore>,
    max_concurrent_fetches: usize,
}

impl ChangeAggregator {
    pub fn new(backend: Arc<dyn SourceBackend>, max_concurrent_fetches: usize) -> Self {
        let max_concurrent_fetches = max_concurrent_fetches.max(1);
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrent_fetches)),
            max_concurrent_fetches,
        }
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    /// 下载单个文件（占用一个许可）
    async fn fetch(
        &self,
        repository: &str,
        entry: &TreeEntry,
        snapshot: &SnapshotId,
    ) -> SyncResult<FileContent> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SyncError::fetch(&entry.path, "fetch pool closed"))?;

        self.backend.fetch_file(repository, entry, snapshot).await
    }

    async fn fetch_optional(
        &self,
        repository: &str,
        entry: Option<&TreeEntry>,
        snapshot: &SnapshotId,
    ) -> SyncResult<Option<FileContent>> {
        match entry {
            Some(entry) => self.fetch(repository, entry, snapshot).await.map(Some),
            None => Ok(None),
        }
    }

    /// 收集规则：`rules/<name>.js` 与 `rules/<name>.json`
    pub async fn collect_rules(
        &self,
        repository: &str,
        entries: &[TreeEntry],
        snapshot: &SnapshotId,
    ) -> SyncResult<Vec<RuleUnit>> {
        let classifier = self.backend.classifier();
        let mut groups: BTreeMap<&str, FileGroup> = BTreeMap::new();

        for entry in entries.iter().filter(|e| classifier.classify(&e.path) == PathKind::Rule) {
            let group = groups.entry(file_stem(&entry.path)).or_default();
            if has_extension(&entry.path, "js") {
                group.script = Some(entry);
            } else if has_extension(&entry.path, "json") {
                group.metadata = Some(entry);
            }
        }

        try_join_all(groups.into_iter().map(|(name, group)| async move {
            let (script, metadata) = tokio::try_join!(
                self.fetch_optional(repository, group.script, snapshot),
                self.fetch_optional(repository, group.metadata, snapshot),
            )?;

            let metadata_content = metadata
                .map(|file| {
                    serde_json::from_str::<serde_json::Value>(&file.content).map_err(|source| {
                        SyncError::InvalidMetadata {
                            path: file.path,
                            source,
                        }
                    })
                })
                .transpose()?;

            Ok::<_, SyncError>(RuleUnit {
                name: name.to_string(),
                has_script: script.is_some(),
                script_content: script.map(|f| f.content),
                has_metadata: metadata_content.is_some(),
                metadata_content,
            })
        }))
        .await
    }

    /// 收集数据库连接脚本，每个连接目录为一个单元
    pub async fn collect_databases(
        &self,
        repository: &str,
        entries: &[TreeEntry],
        snapshot: &SnapshotId,
    ) -> SyncResult<Vec<DatabaseUnit>> {
        let classifier = self.backend.classifier();
        let mut databases: BTreeMap<String, BTreeMap<String, &TreeEntry>> = BTreeMap::new();

        for entry in entries {
            // 非法阶段名在这里静默丢弃；没有任何合法阶段的连接不会产生单元
            if let Some(script) = classifier.database_script(&entry.path) {
                databases
                    .entry(script.database)
                    .or_default()
                    .insert(script.stage, entry);
            }
        }

        try_join_all(databases.into_iter().map(|(name, stages)| async move {
            let scripts = try_join_all(stages.into_iter().map(|(stage, entry)| async move {
                let file = self.fetch(repository, entry, snapshot).await?;
                Ok::<_, SyncError>(DatabaseScript {
                    stage,
                    content: file.content,
                })
            }))
            .await?;

            Ok::<_, SyncError>(DatabaseUnit { name, scripts })
        }))
        .await
    }

    /// 收集托管页面：`.json` 为元数据，其他扩展名为页面内容
    pub async fn collect_pages(
        &self,
        repository: &str,
        entries: &[TreeEntry],
        snapshot: &SnapshotId,
    ) -> SyncResult<Vec<PageUnit>> {
        let classifier = self.backend.classifier();
        let mut groups: BTreeMap<&str, FileGroup> = BTreeMap::new();

        for entry in entries.iter().filter(|e| classifier.classify(&e.path) == PathKind::Page) {
            let name = file_stem(&entry.path);
            if !PAGE_NAMES.contains(&name) {
                continue;
            }

            let group = groups.entry(name).or_default();
            if has_extension(&entry.path, "json") {
                group.metadata = Some(entry);
            } else {
                group.script = Some(entry);
            }
        }

        try_join_all(groups.into_iter().map(|(name, group)| async move {
            let (html, metadata) = tokio::try_join!(
                self.fetch_optional(repository, group.script, snapshot),
                self.fetch_optional(repository, group.metadata, snapshot),
            )?;

            Ok::<_, SyncError>(PageUnit {
                name: name.to_string(),
                has_metadata: metadata.is_some(),
                html_content: html.map(|f| f.content),
                metadata_content: metadata.map(|f| f.content),
            })
        }))
        .await
    }

    /// 三类单元同时收集
    pub async fn collect_all(
        &self,
        repository: &str,
        entries: &[TreeEntry],
        snapshot: &SnapshotId,
    ) -> SyncResult<CollectedUnits> {
        debug!(
            snapshot = %snapshot,
            files = entries.len(),
            concurrency = self.max_concurrent_fetches,
            "Collecting deploy units"
        );

        let (rules, databases, pages) = tokio::try_join!(
            self.collect_rules(repository, entries, snapshot),
            self.collect_databases(repository, entries, snapshot),
            self.collect_pages(repository, entries, snapshot),
        )?;

        info!(
            snapshot = %snapshot,
            rules = rules.len(),
            databases = databases.len(),
            pages = pages.len(),
            "Collected deploy units"
        );

        Ok(CollectedUnits {
            rules,
            databases,
            pages,
        })
    }
}
