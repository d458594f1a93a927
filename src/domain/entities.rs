//! Persistent records backed by the system of record.
//!
//! Records carry everything the database stores; the serialized shapes the
//! HTTP layer (and therefore the cache) exposes live in
//! `application::models`.

use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::types::{AccountStatus, EventStatus};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    /// SHA-256 digest of the password, hex-encoded.
    pub password_hash: String,
    /// Pending verification or password-reset code, when one is outstanding.
    pub validation_code: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UserAccountRecord {
    pub user_id: Uuid,
    pub is_verified: bool,
    pub status: AccountStatus,
    pub dob: Date,
    pub gender: String,
    pub avatar_url: String,
    pub phone_number: String,
    pub landline_number: Option<String>,
    pub country_code: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct SubjectRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct PostRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct TagRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: Uuid,
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
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// An opaque bearer token issued at login, hashed at rest.
#[derive(Debug, Clone)]
pub struct AccessTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
}
