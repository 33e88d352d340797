//! 基础设施模块
//!
//! 封装外部依赖（VSTS REST API、Management API）

pub mod git_api;
pub mod management;
pub mod tfvc_api;
pub mod vsts;

pub use git_api::{GitApi, GitRestClient};
pub use management::ManagementClient;
pub use tfvc_api::{TfvcApi, TfvcRestClient};
pub use vsts::VstsClient;
