//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod deploy;
pub mod path;
pub mod units;
pub mod webhook;

// Re-exports for convenience
pub use deploy::{DeployRequest, DeployStatus, DeploymentRecord, DeploymentStats};
pub use path::{PathClassifier, PathKind};
pub use units::{DeployUnits, SnapshotId, TreeEntry};
