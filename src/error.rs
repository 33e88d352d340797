//! 统一错误处理
//!
//! - `SyncError`：同步流水线（后端适配器、聚合、部署）的领域错误
//! - `ApiError`：HTTP 层错误，实现 `IntoResponse`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 同步流水线错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// webhook 密钥缺失或不匹配
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// webhook 请求体缺少必要字段
    #[error("invalid argument: {0}")]
    Argument(String),

    /// 分支 / 版本 / 仓库无法解析
    #[error("{0} not found")]
    NotFound(String),

    /// 文件下载失败或内容为空
    #[error("failed to download '{path}': {reason}")]
    Fetch { path: String, reason: String },

    /// 元数据文件不是合法 JSON
    #[error("invalid metadata in '{path}': {source}")]
    InvalidMetadata {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// 底层 HTTP 传输错误
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 持久化存储读写失败
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// apply 步骤返回的错误，原样透传
    #[error(transparent)]
    Apply(anyhow::Error),
}

impl SyncError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn fetch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// 便捷类型别名
pub type SyncResult<T> = Result<T, SyncError>;

/// API 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 401 - 未授权（API Key / hook secret 无效或缺失）
    Unauthorized(String),
    /// 404 - 资源未找到
    NotFound(String),
    /// 400 - 请求无效
    BadRequest(String),
    /// 500 - 内部错误
    Internal(String),
    /// 502 - 上游（VSTS / apply 端点）错误
    BadGateway(String),
}

impl ApiError {
    /// 创建未授权错误
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// 创建请求无效错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 状态码
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            SyncError::Argument(msg) => ApiError::BadRequest(msg),
            SyncError::NotFound(what) => ApiError::NotFound(what),
            e @ (SyncError::Fetch { .. } | SyncError::Transport(_) | SyncError::Apply(_)) => {
                ApiError::BadGateway(e.to_string())
            }
            e @ (SyncError::InvalidMetadata { .. } | SyncError::Storage(_)) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message) = match self {
            ApiError::Unauthorized(msg) => ("unauthorized", msg),
            ApiError::NotFound(resource) => ("not_found", format!("{} not found", resource)),
            ApiError::BadRequest(msg) => ("bad_request", msg),
            ApiError::Internal(msg) => ("internal_error", msg),
            ApiError::BadGateway(msg) => ("bad_gateway", msg),
        };

        let body = ErrorResponse::new(error_type, message);
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized(m) => write!(f, "Unauthorized: {}", m),
            ApiError::NotFound(r) => write!(f, "Not found: {}", r),
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
            ApiError::BadGateway(m) => write!(f, "Bad gateway: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_status_mapping() {
        let cases = [
            (SyncError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (SyncError::Argument("x".into()), StatusCode::BAD_REQUEST),
            (SyncError::not_found("Repository 'x'"), StatusCode::NOT_FOUND),
            (SyncError::fetch("rules/a.js", "empty"), StatusCode::BAD_GATEWAY),
            (
                SyncError::Apply(anyhow::anyhow!("boom")),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_apply_error_is_transparent() {
        let err = SyncError::Apply(anyhow::anyhow!("rule 'x' rejected"));
        assert_eq!(err.to_string(), "rule 'x' rejected");
    }
}
