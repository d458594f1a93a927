//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::models::{
    CommentWithAuthor, PostWithRelations, ProfileData, SubjectWithPosts,
};
use crate::domain::entities::{
    AccessTokenRecord, CommentRecord, EventRecord, PostRecord, TagRecord, UserAccountRecord,
    UserRecord,
};
use crate::domain::types::{AccountStatus, EventStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub validation_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateUserAccountParams {
    pub user_id: Uuid,
    pub is_verified: bool,
    pub status: AccountStatus,
    pub dob: Date,
    pub gender: String,
    pub avatar_url: String,
    pub phone_number: String,
    pub landline_number: Option<String>,
    pub country_code: String,
}

#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatchUserParams {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<UserRecord>, RepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;
    async fn find_by_validation_code(&self, code: &str)
    -> Result<Option<UserRecord>, RepoError>;
    async fn create(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
    async fn update(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;
    async fn patch(&self, id: Uuid, params: PatchUserParams) -> Result<UserRecord, RepoError>;
    /// Overwrite the password hash and clear any outstanding validation code.
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepoError>;
    async fn set_validation_code(&self, id: Uuid, code: Option<&str>) -> Result<(), RepoError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;

    async fn create_account(
        &self,
        params: CreateUserAccountParams,
    ) -> Result<UserAccountRecord, RepoError>;
    async fn find_account(&self, user_id: Uuid) -> Result<Option<UserAccountRecord>, RepoError>;
    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> Result<(), RepoError>;
    async fn mark_account_verified(&self, user_id: Uuid) -> Result<(), RepoError>;
    /// User joined to its account, in the profile shape the cache stores.
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<ProfileData>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

#[async_trait]
pub trait BlogRepo: Send + Sync {
    /// Subjects with their posts, tags, and authors preloaded.
    async fn list_subjects_with_posts(&self) -> Result<Vec<SubjectWithPosts>, RepoError>;
    async fn subject_exists(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn list_posts_by_subject(
        &self,
        subject_id: Uuid,
    ) -> Result<Vec<PostWithRelations>, RepoError>;
    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError>;
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError>;
    async fn find_tag(&self, id: Uuid) -> Result<Option<TagRecord>, RepoError>;
    async fn list_posts_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostWithRelations>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateEventParams {
    pub title: String,
    pub description: Option<String>,
    pub start_date: OffsetDateTime,
    pub end_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub subject_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub status: EventStatus,
    pub published_at: Option<OffsetDateTime>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdateEventParams {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub subject_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub status: Option<EventStatus>,
    pub published_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait EventsRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<EventRecord>, RepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError>;
    async fn create(&self, params: CreateEventParams) -> Result<EventRecord, RepoError>;
    async fn update(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;
    async fn publish(&self, id: Uuid, at: OffsetDateTime) -> Result<EventRecord, RepoError>;
    async fn list_published(&self) -> Result<Vec<EventRecord>, RepoError>;
    /// Published events starting after `now`, soonest first, capped.
    async fn list_upcoming(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<EventRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateAccessTokenParams {
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
}

#[async_trait]
pub trait AccessTokensRepo: Send + Sync {
    async fn create(&self, params: CreateAccessTokenParams)
    -> Result<AccessTokenRecord, RepoError>;
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<AccessTokenRecord>, RepoError>;
    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;
    async fn update_last_used(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;
}
