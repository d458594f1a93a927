//! User CRUD handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::application::models::UserPublic;
use crate::application::users::{CreateUserCommand, PatchUserCommand, UpdateUserCommand};

use super::error::ApiError;
use super::middleware::ClientIp;
use super::models::{
    CachedResponse, CreateUserRequest, MutationResponse, PatchUserRequest, UpdateUserRequest,
};
use super::state::ApiState;

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation("Invalid UUID"))
}

pub async fn list_users(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
) -> Result<impl IntoResponse, ApiError> {
    let (users, lookup) = state.users.list(&ip).await?;
    let count = users.len();
    Ok(Json(CachedResponse::new(users, lookup).with_count(count)))
}

pub async fn get_user(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;
    let (user, lookup) = state.users.get(&ip, id).await?;
    Ok(Json(CachedResponse::new(user, lookup)))
}

pub async fn create_user(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateUserCommand {
        full_name: payload.full_name,
        email: payload.email,
        password: payload.password,
        dob: payload.dob,
        phone_number: payload.phone_number,
        landline_number: payload.landline_number,
        country_code: payload.country_code,
        gender: payload.gender,
    };

    let user = state.users.create(&ip, command).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new(user).with_message("User created successfully")),
    ))
}

pub async fn update_user(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;
    let command = UpdateUserCommand {
        full_name: payload.full_name,
        email: payload.email,
        dob: payload.dob,
        phone_number: payload.phone_number,
        landline_number: payload.landline_number,
        country_code: payload.country_code,
        gender: payload.gender,
    };

    let user = state.users.update(&ip, id, command).await?;
    Ok(Json(
        MutationResponse::new(user).with_message("User updated successfully"),
    ))
}

pub async fn patch_user(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(payload): Json<PatchUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;
    let command = PatchUserCommand {
        full_name: payload.full_name,
        email: payload.email,
        password: payload.password,
    };

    let user = state.users.patch(&ip, id, command).await?;
    Ok(Json(
        MutationResponse::new(user).with_message("User updated successfully"),
    ))
}

pub async fn delete_user(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;
    let deleted: UserPublic = state.users.delete(&ip, id).await?;
    Ok(Json(
        MutationResponse::new(deleted).with_message("User deleted successfully"),
    ))
}
