//! Serialized shapes the HTTP layer returns and the cache stores.
//!
//! A cache hit must reproduce a live query field-for-field, so these structs
//! are the single source of truth for both paths: repositories assemble them
//! (including preloaded relations) and the accessor serializes them verbatim.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{CommentRecord, EventRecord, PostRecord, TagRecord, UserRecord};
use crate::domain::types::{AccountStatus, EventStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<UserRecord> for UserPublic {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            full_name: record.full_name,
            email: record.email,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Profile snapshot cached under `user_profile:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub status: AccountStatus,
    pub gender: String,
    pub avatar_url: String,
    pub dob: String,
    pub phone_number: String,
    pub landline_number: Option<String>,
    pub country_code: String,
}

/// Session snapshot cached under `user_session:<id>` at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(flatten)]
    pub profile: ProfileData,
    #[serde(with = "time::serde::rfc3339")]
    pub last_login: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPublic {
    pub id: Uuid,
    pub name: String,
}

impl From<TagRecord> for TagPublic {
    fn from(record: TagRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
        }
    }
}

/// A post with its preloaded tags and author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithRelations {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub tags: Vec<TagPublic>,
    pub author: Option<UserPublic>,
}

/// A post without preloaded relations, as returned by write endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPublic {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<PostRecord> for PostPublic {
    fn from(record: PostRecord) -> Self {
        Self {
            id: record.id,
            subject_id: record.subject_id,
            author_id: record.author_id,
            title: record.title,
            content: record.content,
            cover_image: record.cover_image,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPublic {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentRecord> for CommentPublic {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            post_id: record.post_id,
            author_id: record.author_id,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectWithPosts {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub posts: Vec<PostWithRelations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithAuthor {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: Option<UserPublic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPublic {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub subject_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub status: EventStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<EventRecord> for EventPublic {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            start_date: record.start_date,
            end_date: record.end_date,
            location: record.location,
            subject_id: record.subject_id,
            post_id: record.post_id,
            status: record.status,
            published_at: record.published_at,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn user_public_serializes_camel_case_rfc3339() {
        let user = UserPublic {
            id: Uuid::nil(),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            created_at: datetime!(2024-06-01 12:00:00 UTC),
            updated_at: datetime!(2024-06-02 08:30:00 UTC),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["createdAt"], "2024-06-01T12:00:00Z");
    }

    #[test]
    fn session_data_flattens_profile_fields() {
        let session = SessionData {
            profile: ProfileData {
                id: Uuid::nil(),
                full_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                status: AccountStatus::Active,
                gender: "female".to_string(),
                avatar_url: "https://example.com/a.png".to_string(),
                dob: "1990-01-01".to_string(),
                phone_number: "+33123456789".to_string(),
                landline_number: None,
                country_code: "FR".to_string(),
            },
            last_login: datetime!(2024-06-01 12:00:00 UTC),
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["lastLogin"], "2024-06-01T12:00:00Z");
        // Flattened: no nested `profile` object.
        assert!(json.get("profile").is_none());

        let back: SessionData = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
