//! Authentication and account-lifecycle handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use uuid::Uuid;

use crate::application::auth::{
    AuthenticatedUser, ForgotPasswordOutcome, RegisterCommand, Whoami,
};

use super::error::ApiError;
use super::middleware::ClientIp;
use super::models::{
    CreateUserRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, LoginUserSummary,
    MessageResponse, MutationResponse, ResetPasswordRequest,
};
use super::state::ApiState;

const GENERIC_RESET_MESSAGE: &str = "If this email exists, a reset link has been sent.";

fn session_value<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|err| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            .with_detail(err.to_string())
    })
}

/// Profile or session payload with its cache provenance flattened alongside.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoamiResponse<T: Serialize> {
    #[serde(flatten)]
    data: T,
    from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_type: Option<&'static str>,
}

pub async fn register(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = RegisterCommand {
        full_name: payload.full_name,
        email: payload.email,
        password: payload.password,
        dob: payload.dob,
        phone_number: payload.phone_number,
        landline_number: payload.landline_number,
        country_code: payload.country_code,
        gender: payload.gender,
    };

    let user = state.auth.register(&ip, command).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new(user).with_message("Account created successfully.")),
    ))
}

pub async fn login(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.auth.login(&ip, payload.email, payload.password).await?;

    Ok(Json(LoginResponse {
        user: LoginUserSummary {
            id: outcome.user_id,
            email: outcome.email,
        },
        token: outcome.token,
    }))
}

pub async fn logout(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.logout(&principal).await?;
    Ok(Json(MessageResponse::new("Logged out successfully.")))
}

pub async fn whoami(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let response = match state.auth.whoami(&principal).await? {
        Whoami::Session(session) => Json(WhoamiResponse {
            data: session_value(&session)?,
            from_cache: true,
            cache_type: Some("session"),
        }),
        Whoami::Profile { data, lookup } => Json(WhoamiResponse {
            data: session_value(&data)?,
            from_cache: lookup.from_cache(),
            cache_type: lookup.from_cache().then_some("profile"),
        }),
    };
    Ok(response)
}

pub async fn forgot_password(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Sent and Suppressed render identically so the endpoint never reveals
    // whether the address is registered.
    let _: ForgotPasswordOutcome = state.auth.forgot_password(&ip, payload.email).await?;
    Ok(Json(MessageResponse::new(GENERIC_RESET_MESSAGE)))
}

pub async fn reset_password_validate(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.reset_password_validate(&ip, &code).await?;
    Ok(Json(MessageResponse::new("Validation code is valid.")))
}

pub async fn reset_password(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(code): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth
        .reset_password(&ip, &code, payload.password, payload.password_confirmation)
        .await?;
    Ok(Json(MutationResponse::<()>::message_only(
        "Password reset successfully.",
    )))
}

pub async fn validate_account(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.validate_account(&code).await?;
    Ok(Json(MutationResponse::<()>::message_only(
        "Account validated successfully.",
    )))
}

pub async fn suspend_account(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.suspend(&principal).await?;
    Ok(Json(MutationResponse::<()>::message_only(
        "Account suspended.",
    )))
}

pub async fn delete_account(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.delete_account(&principal).await?;
    Ok(Json(MutationResponse::<()>::message_only(
        "Account deleted successfully.",
    )))
}

pub async fn delete_account_by_user_id(
    State(state): State<ApiState>,
    _principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.delete_account_by_user_id(id).await?;
    Ok(Json(MutationResponse::<()>::message_only(
        "Account deleted successfully.",
    )))
}
