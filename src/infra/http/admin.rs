//! Operational handlers: rate-limit inspection and reset.

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use serde::Serialize;

use super::error::ApiError;
use super::middleware::ClientIp;
use super::models::{RateLimitResetRequest, RateLimitStatusQuery};
use super::state::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetResponse<T: Serialize> {
    success: bool,
    message: &'static str,
    reset_info: T,
}

pub async fn reset_rate_limits(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<RateLimitResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Default to the caller's own address, for self-service unblocking.
    let target_ip = payload.ip.or(Some(ip));
    let reset = state
        .admin
        .reset_rate_limits(target_ip, payload.email)
        .await?;

    Ok(Json(ResetResponse {
        success: true,
        message: "Rate limits reset successfully",
        reset_info: reset,
    }))
}

pub async fn rate_limit_status(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Query(query): Query<RateLimitStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let email = query.email.unwrap_or_default();
    let status = state.admin.login_rate_limit_status(&ip, &email).await?;
    Ok(Json(status))
}
