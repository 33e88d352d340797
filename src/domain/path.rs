//! 仓库路径分类
//!
//! 纯函数，不做任何 I/O：判断一个仓库相对路径属于 rules / database-connections / pages
//! 中的哪一类，以及文件名是否合法。

use std::path::Path;

/// 规则目录
pub const RULES_DIRECTORY: &str = "rules";
/// 数据库连接目录
pub const DATABASE_CONNECTIONS_DIRECTORY: &str = "database-connections";
/// 托管页面目录
pub const PAGES_DIRECTORY: &str = "pages";

/// 允许的数据库脚本阶段
pub const DATABASE_SCRIPTS: &[&str] = &[
    "change_email",
    "change_password",
    "create",
    "delete",
    "get_user",
    "login",
    "verify",
];

/// 允许的页面名称
pub const PAGE_NAMES: &[&str] = &["error_page", "guardian_multifactor", "login", "password_reset"];

/// 路径类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    Rule,
    DatabaseConnection,
    Page,
    None,
}

/// 数据库脚本定位信息
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseScriptRef {
    /// 连接名称（database-connections 下的目录名）
    pub database: String,
    /// 阶段名称（如 login / create）
    pub stage: String,
}

/// 路径分类器
///
/// git 仓库路径相对于仓库根目录；tfvc 路径以配置的 `TFS_PATH` 为根（如 `$/Project/auth0`）。
#[derive(Clone, Debug, Default)]
pub struct PathClassifier {
    base: Option<String>,
}

impl PathClassifier {
    /// 创建分类器，`base` 为 tfvc 根路径
    pub fn new(base: Option<&str>) -> Self {
        let base = base
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        Self { base }
    }

    /// git 仓库使用的分类器（无根路径）
    pub fn repository_root() -> Self {
        Self { base: None }
    }

    /// 某个类别目录的完整路径
    pub fn directory(&self, name: &str) -> String {
        match &self.base {
            Some(base) => format!("{}/{}", base, name),
            None => name.to_string(),
        }
    }

    /// 去掉根路径后的相对路径；不在根路径下时返回 None
    fn relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        let path = match &self.base {
            Some(base) => path.strip_prefix(base.as_str())?.strip_prefix('/')?,
            None => path,
        };
        Some(path.trim_start_matches('/'))
    }

    /// 判断路径类别
    pub fn classify(&self, path: &str) -> PathKind {
        let Some(relative) = self.relative(path) else {
            return PathKind::None;
        };

        let under = |dir: &str| {
            relative
                .strip_prefix(dir)
                .and_then(|rest| rest.strip_prefix('/'))
        };
        // rules / pages 只认目录下的直接文件，子目录中的同名文件不参与部署
        let direct_child = |dir: &str| {
            under(dir).map_or(false, |name| !name.is_empty() && !name.contains('/'))
        };

        if direct_child(RULES_DIRECTORY) {
            PathKind::Rule
        } else if under(DATABASE_CONNECTIONS_DIRECTORY).is_some() {
            PathKind::DatabaseConnection
        } else if direct_child(PAGES_DIRECTORY) {
            PathKind::Page
        } else {
            PathKind::None
        }
    }

    /// 解析数据库脚本路径：必须正好是 `database-connections/<连接>/<阶段>.js`
    pub fn database_script(&self, path: &str) -> Option<DatabaseScriptRef> {
        if self.classify(path) != PathKind::DatabaseConnection {
            return None;
        }

        let parts: Vec<&str> = self.relative(path)?.split('/').collect();
        if parts.len() != 3 || parts[1].is_empty() || !has_extension(parts[2], "js") {
            return None;
        }

        let stage = file_stem(parts[2]);
        if !DATABASE_SCRIPTS.contains(&stage) {
            return None;
        }

        Some(DatabaseScriptRef {
            database: parts[1].to_string(),
            stage: stage.to_string(),
        })
    }

    /// 文件是否应当参与部署
    pub fn is_valid_file(&self, path: &str) -> bool {
        match self.classify(path) {
            PathKind::Rule => has_extension(path, "js") || has_extension(path, "json"),
            PathKind::DatabaseConnection => self.database_script(path).is_some(),
            PathKind::Page => PAGE_NAMES.contains(&file_stem(path)),
            PathKind::None => false,
        }
    }
}

/// 文件名（不含扩展名）
pub fn file_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
}

/// 扩展名比较（忽略大小写）
pub fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}
