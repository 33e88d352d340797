//! 环境变量配置加载
//!
//! 所有配置项只在这里读取；核心逻辑通过 `EnvConfig` 访问，不直接读环境变量。

use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::services::backend::VcsType;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 仓库类型（git / tfvc），未配置或无法识别时为 None
    pub vcs_type: Option<VcsType>,
    /// VSTS 账户名（https://<instance>.visualstudio.com）
    pub instance: String,
    /// VSTS collection
    pub collection: String,
    /// VSTS project（git 下为仓库名，tfvc 下为 project）
    pub project: String,
    /// tfvc 根路径（如 `$/Project/auth0`）
    pub path: String,
    /// 默认分支
    pub branch: String,
    /// 凭据
    pub credentials: Credentials,
    /// 自定义 collection URL（本地部署的 TFS）
    pub base_url_override: Option<String>,
    /// webhook 共享密钥
    pub extension_secret: String,
    /// 管理 API 的 API Key
    pub api_key: String,
    /// 服务监听端口
    pub port: u16,
    /// 数据目录（storage.json 所在位置）
    pub data_dir: PathBuf,
    /// 并发下载上限
    pub fetch_concurrency: usize,
    /// 身份平台管理 API
    pub management: ManagementConfig,
}

/// VSTS 凭据
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// 用户名（tfvc 内容下载使用 `username:token` 认证）
    pub username: Option<String>,
    /// Personal access token
    pub token: String,
}

/// 身份平台管理 API 配置
#[derive(Clone, Debug, Default)]
pub struct ManagementConfig {
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    /// apply 端点（接收统一后的部署单元）
    pub apply_url: Option<String>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let vcs_type = match env::var("TFS_TYPE") {
            Ok(v) => {
                let parsed = VcsType::parse(&v);
                if parsed.is_none() {
                    warn!(value = %v, "Unrecognized TFS_TYPE, expected 'git' or 'tfvc'");
                }
                parsed
            }
            Err(_) => None,
        };

        let api_key = load_with_fallback("DEPLOY_AGENT_API_KEY", "API_KEY")
            .unwrap_or_else(|| "change-me-in-production".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9877);

        let data_dir = env::var("DEPLOY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let fetch_concurrency = parse_concurrency(env::var("FETCH_CONCURRENCY").ok().as_deref());

        Self {
            vcs_type,
            instance: env_or_default("TFS_INSTANCE"),
            collection: env_or_default("TFS_COLLECTION"),
            project: env_or_default("TFS_PROJECT"),
            path: env_or_default("TFS_PATH"),
            branch: env_or_default("TFS_BRANCH"),
            credentials: Credentials {
                username: env::var("TFS_USERNAME").ok().filter(|s| !s.is_empty()),
                token: env_or_default("TFS_TOKEN"),
            },
            base_url_override: env::var("TFS_BASE_URL").ok().filter(|s| !s.is_empty()),
            extension_secret: env_or_default("EXTENSION_SECRET"),
            api_key,
            port,
            data_dir,
            fetch_concurrency,
            management: ManagementConfig {
                domain: env_or_default("AUTH0_DOMAIN"),
                client_id: env_or_default("AUTH0_CLIENT_ID"),
                client_secret: env_or_default("AUTH0_CLIENT_SECRET"),
                apply_url: env::var("APPLY_URL").ok().filter(|s| !s.is_empty()),
            },
        }
    }

    /// collection URL，如 `https://contoso.visualstudio.com/DefaultCollection`
    pub fn collection_url(&self) -> String {
        match &self.base_url_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.visualstudio.com/{}",
                self.instance, self.collection
            ),
        }
    }

    /// dashboard 展示用的分支（tfvc 下没有分支时展示根路径）
    pub fn display_branch(&self) -> &str {
        if self.branch.is_empty() {
            &self.path
        } else {
            &self.branch
        }
    }

    /// storage.json 路径
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(constants::STORAGE_FILE_NAME)
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            vcs_type: None,
            instance: String::new(),
            collection: String::new(),
            project: String::new(),
            path: String::new(),
            branch: String::new(),
            credentials: Credentials::default(),
            base_url_override: None,
            extension_secret: String::new(),
            api_key: String::new(),
            port: 9877,
            data_dir: default_data_dir(),
            fetch_concurrency: constants::DEFAULT_FETCH_CONCURRENCY,
            management: ManagementConfig::default(),
        }
    }
}

fn env_or_default(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

/// 加载环境变量，支持 fallback
fn load_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

/// 并发数至少为 1
fn parse_concurrency(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(constants::DEFAULT_FETCH_CONCURRENCY)
}

fn default_data_dir() -> PathBuf {
    // 可执行文件所在目录
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 常量
pub mod constants {
    /// 默认并发下载数（VSTS API 限流）
    pub const DEFAULT_FETCH_CONCURRENCY: usize = 2;

    /// 部署历史最大保存数量
    pub const MAX_DEPLOYMENT_HISTORY: usize = 100;

    /// 持久化文件名
    pub const STORAGE_FILE_NAME: &str = "storage.json";

    /// VSTS REST API 版本
    pub const API_VERSION: &str = "1.0";

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
