//! Cache key definitions.
//!
//! Keys are colon-delimited strings derived deterministically from entity
//! identity. All key construction goes through [`CacheKey`] so the namespace
//! is auditable in one place.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

/// Per-resource cache lifetimes, chosen by presumed write frequency.
pub mod ttl {
    use std::time::Duration;

    pub const USERS_ALL: Duration = Duration::from_secs(1800);
    pub const USER: Duration = Duration::from_secs(3600);
    pub const USER_PROFILE: Duration = Duration::from_secs(1800);
    pub const USER_SESSION: Duration = Duration::from_secs(7200);
    pub const BLOG_SUBJECTS: Duration = Duration::from_secs(2700);
    pub const SUBJECT_POSTS: Duration = Duration::from_secs(1800);
    pub const POST_COMMENTS: Duration = Duration::from_secs(900);
    pub const TAGS_ALL: Duration = Duration::from_secs(7200);
    pub const TAG_POSTS: Duration = Duration::from_secs(3600);
    pub const EVENTS_ALL: Duration = Duration::from_secs(1800);
    pub const EVENT: Duration = Duration::from_secs(3600);
    pub const EVENTS_PUBLISHED: Duration = Duration::from_secs(1200);
    pub const EVENTS_UPCOMING: Duration = Duration::from_secs(600);
}

/// A cache entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    User(Uuid),
    UsersAll,
    UserProfile(Uuid),
    UserSession(Uuid),
    BlogSubjectsAll,
    SubjectPosts(Uuid),
    BlogPost(Uuid),
    PostComments(Uuid),
    BlogTagsAll,
    TagPosts(Uuid),
    Event(Uuid),
    EventsAll,
    EventsPublished,
    EventsUpcoming,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::User(id) => write!(f, "user:{id}"),
            CacheKey::UsersAll => f.write_str("users:all"),
            CacheKey::UserProfile(id) => write!(f, "user_profile:{id}"),
            CacheKey::UserSession(id) => write!(f, "user_session:{id}"),
            CacheKey::BlogSubjectsAll => f.write_str("blog:subjects:all"),
            CacheKey::SubjectPosts(id) => write!(f, "blog:subject:{id}:posts"),
            CacheKey::BlogPost(id) => write!(f, "blog:post:{id}"),
            CacheKey::PostComments(id) => write!(f, "blog:post:{id}:comments"),
            CacheKey::BlogTagsAll => f.write_str("blog:tags:all"),
            CacheKey::TagPosts(id) => write!(f, "blog:tag:{id}:posts"),
            CacheKey::Event(id) => write!(f, "event:{id}"),
            CacheKey::EventsAll => f.write_str("events:all"),
            CacheKey::EventsPublished => f.write_str("events:published"),
            CacheKey::EventsUpcoming => f.write_str("events:upcoming"),
        }
    }
}

/// Rate-limited actions. One counter per `(action, scope, identity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    ForgotPassword,
    ResetValidate,
    ResetPassword,
    Login,
    GetUsers,
    GetUser,
    CreateUser,
    UpdateUser,
    PatchUser,
    DeleteUser,
    BlogSubjects,
    BlogPostsBySubject,
    BlogComments,
    BlogTags,
    BlogPostsByTag,
    CreatePost,
    UpdatePost,
    DeletePost,
    AddComment,
    EventsList,
    EventShow,
    EventsPublished,
    EventsUpcoming,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    PublishEvent,
}

impl RateLimitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitAction::Register => "register",
            RateLimitAction::ForgotPassword => "forgot_password",
            RateLimitAction::ResetValidate => "reset_validate",
            RateLimitAction::ResetPassword => "reset_password",
            RateLimitAction::Login => "login",
            RateLimitAction::GetUsers => "get_users",
            RateLimitAction::GetUser => "get_user",
            RateLimitAction::CreateUser => "create_user",
            RateLimitAction::UpdateUser => "update_user",
            RateLimitAction::PatchUser => "patch_user",
            RateLimitAction::DeleteUser => "delete_user",
            RateLimitAction::BlogSubjects => "blog_subjects",
            RateLimitAction::BlogPostsBySubject => "blog_posts_by_subject",
            RateLimitAction::BlogComments => "blog_comments",
            RateLimitAction::BlogTags => "blog_tags",
            RateLimitAction::BlogPostsByTag => "blog_posts_by_tag",
            RateLimitAction::CreatePost => "create_post",
            RateLimitAction::UpdatePost => "update_post",
            RateLimitAction::DeletePost => "delete_post",
            RateLimitAction::AddComment => "add_comment",
            RateLimitAction::EventsList => "events_list",
            RateLimitAction::EventShow => "event_show",
            RateLimitAction::EventsPublished => "events_published",
            RateLimitAction::EventsUpcoming => "events_upcoming",
            RateLimitAction::CreateEvent => "create_event",
            RateLimitAction::UpdateEvent => "update_event",
            RateLimitAction::DeleteEvent => "delete_event",
            RateLimitAction::PublishEvent => "publish_event",
        }
    }
}

impl fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of identity a rate-limit counter is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    Ip,
    Email,
    User,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Ip => "ip",
            RateLimitScope::Email => "email",
            RateLimitScope::User => "user",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render the counter key for `(action, scope, identity)`.
pub fn rate_limit_key(action: RateLimitAction, scope: RateLimitScope, identity: &str) -> String {
    format!("rate_limit:{action}:{scope}:{identity}")
}

/// Pattern matching every counter for one IP, regardless of action.
pub fn rate_limit_ip_pattern(ip: &str) -> String {
    format!("rate_limit:*:ip:{ip}")
}

/// Pattern matching every counter for one email, regardless of action.
pub fn rate_limit_email_pattern(email: &str) -> String {
    format!("rate_limit:*:email:{email}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_keys_render_colon_delimited() {
        let id = Uuid::nil();
        assert_eq!(
            CacheKey::User(id).to_string(),
            "user:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(CacheKey::UsersAll.to_string(), "users:all");
        assert_eq!(
            CacheKey::SubjectPosts(id).to_string(),
            "blog:subject:00000000-0000-0000-0000-000000000000:posts"
        );
        assert_eq!(
            CacheKey::PostComments(id).to_string(),
            "blog:post:00000000-0000-0000-0000-000000000000:comments"
        );
        assert_eq!(CacheKey::EventsUpcoming.to_string(), "events:upcoming");
    }

    #[test]
    fn rate_limit_keys_carry_action_scope_identity() {
        assert_eq!(
            rate_limit_key(RateLimitAction::Login, RateLimitScope::Email, "a@b.c"),
            "rate_limit:login:email:a@b.c"
        );
        assert_eq!(
            rate_limit_key(RateLimitAction::Register, RateLimitScope::Ip, "1.2.3.4"),
            "rate_limit:register:ip:1.2.3.4"
        );
    }

    #[test]
    fn reset_patterns_span_all_actions() {
        assert_eq!(rate_limit_ip_pattern("1.2.3.4"), "rate_limit:*:ip:1.2.3.4");
        assert_eq!(
            rate_limit_email_pattern("user@example.com"),
            "rate_limit:*:email:user@example.com"
        );
    }
}
