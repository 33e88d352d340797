//! tfvc 后端适配器
//!
//! tfvc 没有递归列树接口：分别列出 rules、pages、database-connections，
//! 再逐个列出每个数据库连接子目录，最后合并去重。漏掉任何一个子目录都会静默丢文件。

use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

use super::{touches_deployable, SourceBackend, VcsType};
use crate::domain::deploy::ChangeSet;
use crate::domain::path::{
    PathClassifier, DATABASE_CONNECTIONS_DIRECTORY, PAGES_DIRECTORY, RULES_DIRECTORY,
};
use crate::domain::units::{FileContent, SnapshotId, TreeEntry};
use crate::error::{SyncError, SyncResult};
use crate::infra::tfvc_api::{TfvcApi, TfvcItem};

/// tfvc 后端
pub struct TfvcBackend {
    api: Arc<dyn TfvcApi>,
    classifier: PathClassifier,
}

impl TfvcBackend {
    /// `root_path` 为 `TFS_PATH`，如 `$/Project/auth0`
    pub fn new(api: Arc<dyn TfvcApi>, root_path: &str) -> Self {
        Self {
            api,
            classifier: PathClassifier::new(Some(root_path)),
        }
    }

    /// 列出一个目录下的文件和子目录（不含目录自身）
    async fn list_dir(
        &self,
        project: &str,
        dir: &str,
        version: Option<u64>,
    ) -> SyncResult<(Vec<TfvcItem>, Vec<TfvcItem>)> {
        let items = self.api.items(project, dir, version).await?;
        let dir = dir.trim_end_matches('/');

        Ok(items
            .into_iter()
            .filter(|item| item.path.trim_end_matches('/') != dir)
            .partition(|item| !item.is_folder))
    }

    /// 单个目录下通过分类器的文件
    async fn list_files(
        &self,
        project: &str,
        dir: &str,
        version: Option<u64>,
    ) -> SyncResult<Vec<TfvcItem>> {
        let (files, _) = self.list_dir(project, dir, version).await?;
        Ok(files
            .into_iter()
            .filter(|f| self.classifier.is_valid_file(&f.path))
            .collect())
    }

    /// database-connections 下每个子目录各列一次
    async fn list_connections(&self, project: &str, version: Option<u64>) -> SyncResult<Vec<TfvcItem>> {
        let root = self.classifier.directory(DATABASE_CONNECTIONS_DIRECTORY);
        let (_, subdirs) = self.list_dir(project, &root, version).await?;

        debug!(root = %root, connections = subdirs.len(), "Listing database connection folders");

        let per_connection = try_join_all(
            subdirs
                .iter()
                .map(|subdir| self.list_files(project, &subdir.path, version)),
        )
        .await?;

        Ok(per_connection.into_iter().flatten().collect())
    }
}

fn parse_changeset(revision: &str) -> Option<u64> {
    revision.trim().parse::<u64>().ok()
}

#[async_trait]
impl SourceBackend for TfvcBackend {
    fn kind(&self) -> VcsType {
        VcsType::Tfvc
    }

    fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    async fn resolve_snapshot(&self, _repository: &str, revision: &str) -> SyncResult<SnapshotId> {
        if let Some(changeset) = parse_changeset(revision) {
            return Ok(SnapshotId(changeset.to_string()));
        }

        if revision.is_empty() || revision.eq_ignore_ascii_case("latest") {
            return match self.api.latest_changeset().await? {
                Some(changeset) => Ok(SnapshotId(changeset.to_string())),
                None => Err(SyncError::not_found("Latest changeset")),
            };
        }

        error!(revision = %revision, "Changeset not found");
        Err(SyncError::not_found(format!("Changeset '{}'", revision)))
    }

    async fn list_tree(&self, project: &str, snapshot: &SnapshotId) -> SyncResult<Vec<TreeEntry>> {
        let version = parse_changeset(snapshot.as_str());
        let rules_dir = self.classifier.directory(RULES_DIRECTORY);
        let pages_dir = self.classifier.directory(PAGES_DIRECTORY);

        let (rules, pages, connections) = tokio::try_join!(
            self.list_files(project, &rules_dir, version),
            self.list_files(project, &pages_dir, version),
            self.list_connections(project, version),
        )?;

        // 按路径合并去重
        let merged: BTreeMap<String, TfvcItem> = rules
            .into_iter()
            .chain(pages)
            .chain(connections)
            .map(|item| (item.path.clone(), item))
            .collect();

        Ok(merged
            .into_values()
            .map(|item| TreeEntry::new(item.path, item.version.to_string()))
            .collect())
    }

    async fn fetch_file(
        &self,
        _project: &str,
        entry: &TreeEntry,
        revision: &SnapshotId,
    ) -> SyncResult<FileContent> {
        let content = self
            .api
            .item_content(&entry.path, parse_changeset(revision.as_str()))
            .await?
            .ok_or_else(|| SyncError::fetch(&entry.path, "no content returned"))?;

        Ok(FileContent {
            path: entry.path.clone(),
            content,
        })
    }

    async fn has_changes(&self, changes: &ChangeSet) -> SyncResult<bool> {
        let ChangeSet::Changeset(changeset_id) = changes else {
            return Err(SyncError::Argument(
                "A tfvc repository cannot inspect git commits".to_string(),
            ));
        };

        let mut paths = self.api.changeset_changes(changeset_id).await?;
        paths.sort();
        paths.dedup();

        Ok(touches_deployable(&self.classifier, &paths))
    }

    async fn resolve_repository_id(&self, name: &str) -> SyncResult<Option<String>> {
        let projects = self.api.projects().await?;
        Ok(projects.into_iter().find(|p| p.name == name).map(|p| p.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::vsts::RepositoryInfo;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ROOT: &str = "$/Project/auth0";

    /// 内存 tfvc 仓库：按目录保存一层条目
    #[derive(Default)]
    struct FakeTfvcApi {
        folders: HashMap<String, Vec<TfvcItem>>,
        contents: HashMap<String, String>,
        changesets: HashMap<String, Vec<String>>,
        latest: Option<u64>,
        listed: Mutex<Vec<String>>,
        versions_requested: Mutex<Vec<Option<u64>>>,
    }

    impl FakeTfvcApi {
        fn parent(path: &str) -> String {
            match path.rfind('/') {
                Some(idx) => path[..idx].to_string(),
                None => String::new(),
            }
        }

        fn folder(mut self, path: &str) -> Self {
            let item = TfvcItem {
                path: path.to_string(),
                is_folder: true,
                size: 0,
                version: 9,
            };
            self.folders.entry(path.to_string()).or_default().insert(0, item.clone());
            self.folders.entry(Self::parent(path)).or_default().push(item);
            self
        }

        fn file(mut self, path: &str, content: &str) -> Self {
            self.folders.entry(Self::parent(path)).or_default().push(TfvcItem {
                path: path.to_string(),
                is_folder: false,
                size: content.len() as u64,
                version: 7,
            });
            self.contents.insert(path.to_string(), content.to_string());
            self
        }
    }

    #[async_trait]
    impl TfvcApi for FakeTfvcApi {
        async fn items(&self, _project: &str, scope: &str, _v: Option<u64>) -> SyncResult<Vec<TfvcItem>> {
            self.listed.lock().unwrap().push(scope.to_string());
            Ok(self.folders.get(scope).cloned().unwrap_or_default())
        }

        async fn latest_changeset(&self) -> SyncResult<Option<u64>> {
            Ok(self.latest)
        }

        async fn changeset_changes(&self, id: &str) -> SyncResult<Vec<String>> {
            Ok(self.changesets.get(id).cloned().unwrap_or_default())
        }

        async fn item_content(&self, path: &str, version: Option<u64>) -> SyncResult<Option<String>> {
            self.versions_requested.lock().unwrap().push(version);
            Ok(self.contents.get(path).cloned())
        }

        async fn projects(&self) -> SyncResult<Vec<RepositoryInfo>> {
            Ok(vec![RepositoryInfo {
                id: "p-1".to_string(),
                name: "Project".to_string(),
            }])
        }
    }

    fn connections_repo(connections: usize) -> FakeTfvcApi {
        let mut api = FakeTfvcApi::default()
            .folder(ROOT)
            .folder(&format!("{}/rules", ROOT))
            .file(&format!("{}/rules/add-roles.js", ROOT), "function () {}")
            .file(&format!("{}/rules/notes.txt", ROOT), "ignored")
            .folder(&format!("{}/database-connections", ROOT));

        for i in 0..connections {
            let dir = format!("{}/database-connections/conn-{}", ROOT, i);
            api = api.folder(&dir);
            for stage in ["create", "delete", "login", "verify"] {
                api = api.file(&format!("{}/{}.js", dir, stage), stage);
            }
            // 不在允许列表中的阶段
            api = api.file(&format!("{}/helper.js", dir), "helper");
        }
        api
    }

    #[tokio::test]
    async fn test_fan_out_lists_every_connection_folder() {
        let api = connections_repo(3)
            // conn-1 的兄弟目录下嵌套的子目录
            .folder(&format!("{}/database-connections/conn-2/legacy", ROOT))
            .file(&format!("{}/database-connections/conn-2/legacy/login.js", ROOT), "old");
        let api = Arc::new(api);
        let backend = TfvcBackend::new(api.clone(), ROOT);

        let tree = backend
            .list_tree("Project", &SnapshotId("12".to_string()))
            .await
            .unwrap();

        let db_entries: Vec<&str> = tree
            .iter()
            .map(|e| e.path.as_str())
            .filter(|p| p.contains("/database-connections/"))
            .collect();
        assert_eq!(db_entries.len(), 3 * 4);
        for i in 0..3 {
            for stage in ["create", "delete", "login", "verify"] {
                let expected = format!("{}/database-connections/conn-{}/{}.js", ROOT, i, stage);
                assert!(db_entries.contains(&expected.as_str()), "missing {}", expected);
            }
        }
        assert!(!db_entries.iter().any(|p| p.contains("legacy")));

        let rule_entries: Vec<&str> = tree
            .iter()
            .map(|e| e.path.as_str())
            .filter(|p| p.contains("/rules/"))
            .collect();
        assert_eq!(rule_entries, vec![format!("{}/rules/add-roles.js", ROOT).as_str()]);

        let listed = api.listed.lock().unwrap().clone();
        for i in 0..3 {
            let dir = format!("{}/database-connections/conn-{}", ROOT, i);
            assert_eq!(listed.iter().filter(|l| **l == dir).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_list_tree_is_repeatable() {
        let backend = TfvcBackend::new(Arc::new(connections_repo(2)), ROOT);
        let snapshot = SnapshotId("5".to_string());

        let first = backend.list_tree("Project", &snapshot).await.unwrap();
        let second = backend.list_tree("Project", &snapshot).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_directories_yield_empty_tree() {
        let backend = TfvcBackend::new(Arc::new(FakeTfvcApi::default()), ROOT);
        let tree = backend
            .list_tree("Project", &SnapshotId("1".to_string()))
            .await
            .unwrap();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_snapshot() {
        let api = FakeTfvcApi {
            latest: Some(99),
            ..FakeTfvcApi::default()
        };
        let backend = TfvcBackend::new(Arc::new(api), ROOT);

        assert_eq!(backend.resolve_snapshot("Project", "42").await.unwrap().as_str(), "42");
        assert_eq!(backend.resolve_snapshot("Project", "latest").await.unwrap().as_str(), "99");
        assert!(matches!(
            backend.resolve_snapshot("Project", "release-label").await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_uses_numeric_version() {
        let path = format!("{}/rules/add-roles.js", ROOT);
        let api = Arc::new(FakeTfvcApi::default().file(&path, "function () {}"));
        let backend = TfvcBackend::new(api.clone(), ROOT);

        let file = backend
            .fetch_file("Project", &TreeEntry::new(&path, "7"), &SnapshotId("42".to_string()))
            .await
            .unwrap();
        assert_eq!(file.content, "function () {}");

        let missing = backend
            .fetch_file(
                "Project",
                &TreeEntry::new(format!("{}/rules/none.js", ROOT), "7"),
                &SnapshotId("42".to_string()),
            )
            .await;
        assert!(matches!(missing, Err(SyncError::Fetch { .. })));
        assert_eq!(api.versions_requested.lock().unwrap()[0], Some(42));
    }

    #[tokio::test]
    async fn test_has_changes() {
        let mut api = FakeTfvcApi::default();
        api.changesets.insert(
            "10".to_string(),
            vec![format!("{}/docs/readme.md", ROOT), "$/Other/rules/a.js".to_string()],
        );
        api.changesets.insert(
            "11".to_string(),
            vec![
                format!("{}/docs/readme.md", ROOT),
                format!("{}/database-connections/db/login.js", ROOT),
            ],
        );
        let backend = TfvcBackend::new(Arc::new(api), ROOT);

        assert!(!backend.has_changes(&ChangeSet::Changeset("10".to_string())).await.unwrap());
        assert!(backend.has_changes(&ChangeSet::Changeset("11".to_string())).await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_repository_id_matches_project() {
        let backend = TfvcBackend::new(Arc::new(FakeTfvcApi::default()), ROOT);
        assert_eq!(
            backend.resolve_repository_id("Project").await.unwrap(),
            Some("p-1".to_string())
        );
        assert_eq!(backend.resolve_repository_id("Nope").await.unwrap(), None);
    }
}
