//! Event handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::auth::AuthenticatedUser;
use crate::application::events::{CreateEventCommand, UpdateEventCommand};

use super::error::ApiError;
use super::middleware::ClientIp;
use super::models::{CachedResponse, EventRequest, MutationResponse};
use super::state::ApiState;

pub async fn list_events(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
) -> Result<impl IntoResponse, ApiError> {
    let (events, lookup) = state.events.list(&ip).await?;
    Ok(Json(CachedResponse::new(events, lookup)))
}

pub async fn get_event(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (event, lookup) = state.events.get(&ip, id).await?;
    Ok(Json(CachedResponse::new(event, lookup)))
}

pub async fn list_published_events(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
) -> Result<impl IntoResponse, ApiError> {
    let (events, lookup) = state.events.list_published(&ip).await?;
    Ok(Json(CachedResponse::new(events, lookup)))
}

pub async fn list_upcoming_events(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
) -> Result<impl IntoResponse, ApiError> {
    let (events, lookup) = state.events.list_upcoming(&ip).await?;
    Ok(Json(CachedResponse::new(events, lookup)))
}

pub async fn create_event(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Json(payload): Json<EventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateEventCommand {
        title: payload.title,
        description: payload.description,
        start_date: payload.start_date,
        end_date: payload.end_date,
        location: payload.location,
        subject_id: payload.subject_id,
        post_id: payload.post_id,
        status: payload.status,
        published_at: payload.published_at,
    };

    let event = state.events.create(principal.user_id, command).await?;
    Ok((StatusCode::CREATED, Json(MutationResponse::new(event))))
}

pub async fn update_event(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateEventCommand {
        title: payload.title,
        description: payload.description,
        start_date: payload.start_date,
        end_date: payload.end_date,
        location: payload.location,
        subject_id: payload.subject_id,
        post_id: payload.post_id,
        status: payload.status,
        published_at: payload.published_at,
    };

    let event = state.events.update(principal.user_id, id, command).await?;
    Ok(Json(MutationResponse::new(event)))
}

pub async fn delete_event(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.events.delete(principal.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_event(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.events.publish(principal.user_id, id).await?;
    Ok(Json(MutationResponse::new(event)))
}
