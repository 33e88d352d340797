//! 运行时状态模块
//!
//! 管理应用状态和持久化存储

pub mod app_state;
pub mod storage;

pub use app_state::AppState;
pub use storage::{FileStorage, MemoryStorage, Storage};
