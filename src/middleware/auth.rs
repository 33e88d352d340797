//! 认证 Extractor
//!
//! - `RequireApiKey`：`/api/*` 使用，校验 `x-api-key`
//! - `RequireHookSecret`：webhook 使用，校验 `x-hook-secret` 与 `EXTENSION_SECRET`
//!
//! 两者都在读取请求体之前执行，认证失败时不会解析 payload，也不会访问仓库。

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts},
};
use std::sync::Arc;

use crate::error::{ApiError, SyncError, SyncResult};
use crate::state::AppState;

/// 手动部署调用方的标识 header
pub const DEPLOY_USER_HEADER: &str = "x-deploy-user";

/// API Key 认证 Extractor
///
/// 在需要认证的 handler 中使用此 extractor，自动验证 `x-api-key` header
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(
///     _auth: RequireApiKey,
///     State(state): State<Arc<AppState>>,
/// ) -> impl IntoResponse {
///     // handler 逻辑...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireApiKey {
    /// 调用方（`x-deploy-user`，缺省为 admin）
    pub user: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        verify_api_key(&parts.headers, &state.api_key)
    }
}

/// 验证 API Key
///
/// 检查 `x-api-key` header 是否与配置的 API key 匹配
pub fn verify_api_key(headers: &HeaderMap, expected_key: &str) -> Result<RequireApiKey, ApiError> {
    let provided_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided_key {
        Some(key) if !expected_key.is_empty() && key == expected_key => {
            let user = headers
                .get(DEPLOY_USER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or("admin")
                .to_string();
            Ok(RequireApiKey { user })
        }
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(ApiError::unauthorized("Invalid or missing API key"))
        }
        None => {
            tracing::warn!("Missing x-api-key header");
            Err(ApiError::unauthorized("Invalid or missing API key"))
        }
    }
}

/// webhook 共享密钥 Extractor
#[derive(Debug, Clone)]
pub struct RequireHookSecret;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireHookSecret {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        verify_hook_secret(&parts.headers, &state.config.extension_secret)
            .map_err(ApiError::from)
    }
}

/// 验证 webhook 密钥
///
/// 未配置密钥时一律拒绝，而不是放行
pub fn verify_hook_secret(headers: &HeaderMap, secret: &str) -> SyncResult<RequireHookSecret> {
    if secret.is_empty() {
        tracing::warn!("EXTENSION_SECRET is not set, rejecting webhook");
        return Err(SyncError::Unauthorized(
            "The extension secret is not set, unable to verify webhook signature.".to_string(),
        ));
    }

    let provided = headers
        .get("x-hook-secret")
        .and_then(|v| v.to_str().ok());

    if provided == Some(secret) {
        Ok(RequireHookSecret)
    } else {
        tracing::warn!(provided = provided.is_some(), "Webhook secret mismatch");
        Err(SyncError::Unauthorized("The webhook secret is incorrect.".to_string()))
    }
}
