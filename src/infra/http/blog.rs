//! Blog handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::auth::AuthenticatedUser;
use crate::application::blog::{CreatePostCommand, UpdatePostCommand};

use super::error::ApiError;
use super::middleware::ClientIp;
use super::models::{AddCommentRequest, CachedResponse, CreatePostRequest, MutationResponse};
use super::state::ApiState;

pub async fn list_subjects(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
) -> Result<impl IntoResponse, ApiError> {
    let (subjects, lookup) = state.blog.list_subjects(&ip).await?;
    Ok(Json(CachedResponse::new(subjects, lookup)))
}

pub async fn list_posts_by_subject(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(subject_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (posts, lookup) = state.blog.list_posts_by_subject(&ip, subject_id).await?;
    Ok(Json(CachedResponse::new(posts, lookup)))
}

pub async fn create_post(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreatePostCommand {
        title: payload.title,
        content: payload.content,
        cover_image: payload.cover_image,
    };

    let post = state
        .blog
        .create_post(principal.user_id, subject_id, command)
        .await?;
    Ok((StatusCode::CREATED, Json(MutationResponse::new(post))))
}

pub async fn update_post(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdatePostCommand {
        title: payload.title,
        content: payload.content,
        cover_image: payload.cover_image,
    };

    let post = state
        .blog
        .update_post(principal.user_id, post_id, command)
        .await?;
    Ok(Json(MutationResponse::new(post)))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.blog.delete_post(principal.user_id, post_id).await?;
    Ok(Json(MutationResponse::<()>::empty()))
}

pub async fn list_comments(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (comments, lookup) = state.blog.list_comments(&ip, post_id).await?;
    Ok(Json(CachedResponse::new(comments, lookup)))
}

pub async fn add_comment(
    State(state): State<ApiState>,
    principal: AuthenticatedUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .blog
        .add_comment(principal.user_id, post_id, payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(MutationResponse::new(comment))))
}

pub async fn list_tags(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
) -> Result<impl IntoResponse, ApiError> {
    let (tags, lookup) = state.blog.list_tags(&ip).await?;
    Ok(Json(CachedResponse::new(tags, lookup)))
}

pub async fn list_posts_by_tag(
    State(state): State<ApiState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(tag_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (posts, lookup) = state.blog.list_posts_by_tag(&ip, tag_id).await?;
    Ok(Json(CachedResponse::new(posts, lookup)))
}
