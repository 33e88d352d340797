//! 服务层模块
//!
//! 包含核心业务逻辑：后端适配、变更聚合、统一与部署编排

pub mod aggregator;
pub mod backend;
pub mod deploy;
pub mod manual;
pub mod unify;

#[cfg(test)]
pub(crate) mod fakes;
