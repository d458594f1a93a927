//! Request payloads and response envelopes.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::cache::Lookup;
use crate::domain::types::EventStatus;

/// Envelope for cached reads: `fromCache` always, `cachedAt` on hits.
///
/// `cachedAt` is stamped at response time, matching the behavior the clients
/// already depend on, rather than recording when the entry was stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<String>,
}

impl<T: Serialize> CachedResponse<T> {
    pub fn new(data: T, lookup: Lookup) -> Self {
        let cached_at = lookup.from_cache().then(now_rfc3339);
        Self {
            success: true,
            data,
            count: None,
            from_cache: lookup.from_cache(),
            cached_at,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Envelope for writes: flags that derived cache entries were dropped.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub cache_invalidated: bool,
}

impl<T: Serialize> MutationResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            cache_invalidated: true,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Writes that return no payload, only the invalidation flag.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            cache_invalidated: true,
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
            cache_invalidated: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub dob: Option<String>,
    pub phone_number: Option<String>,
    pub landline_number: Option<String>,
    pub country_code: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub phone_number: Option<String>,
    pub landline_number: Option<String>,
    pub country_code: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub subject_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub status: Option<EventStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResetRequest {
    pub ip: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatusQuery {
    pub email: Option<String>,
}

// ============================================================================
// Auth responses
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUserSummary {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: LoginUserSummary,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_response_marks_hits_with_timestamp() {
        let hit = CachedResponse::new(vec![1, 2, 3], Lookup::Hit).with_count(3);
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["fromCache"], true);
        assert_eq!(json["count"], 3);
        assert!(json["cachedAt"].is_string());

        let miss = CachedResponse::new(vec![1], Lookup::Miss);
        let json = serde_json::to_value(&miss).unwrap();
        assert_eq!(json["fromCache"], false);
        assert!(json.get("cachedAt").is_none());
        assert!(json.get("count").is_none());
    }

    #[test]
    fn mutation_response_flags_invalidation() {
        let response = MutationResponse::new("payload").with_message("created");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["cacheInvalidated"], true);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "created");
    }
}
