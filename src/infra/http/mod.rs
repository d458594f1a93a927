//! HTTP surface: router, middleware, handlers.

pub mod admin;
pub mod auth;
pub mod blog;
pub mod error;
pub mod events;
pub mod middleware;
pub mod models;
pub mod state;
pub mod users;

pub use middleware::ClientIp;
pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

/// Build the `/v1` router.
///
/// Handlers that act on behalf of a user declare an `AuthenticatedUser`
/// argument and are guarded by the bearer-token extractor; everything else is
/// public and rate limited per client IP. Serve the result with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the client-IP
/// middleware can fall back to the peer address.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/users", get(users::list_users).post(users::create_user))
        .route(
            "/v1/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        )
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/whoami", get(auth::whoami))
        .route("/v1/auth/forgot-password", post(auth::forgot_password))
        .route(
            "/v1/auth/reset-password-validate/{code}",
            get(auth::reset_password_validate),
        )
        .route("/v1/auth/reset-password/{code}", post(auth::reset_password))
        .route(
            "/v1/auth/validate-account/{code}",
            get(auth::validate_account),
        )
        .route("/v1/auth/suspend", post(auth::suspend_account))
        .route("/v1/auth/account", delete(auth::delete_account))
        .route(
            "/v1/auth/account/{id}",
            delete(auth::delete_account_by_user_id),
        )
        .route("/v1/blog/subjects", get(blog::list_subjects))
        .route(
            "/v1/blog/subjects/{id}/posts",
            get(blog::list_posts_by_subject).post(blog::create_post),
        )
        .route(
            "/v1/blog/posts/{id}",
            put(blog::update_post).delete(blog::delete_post),
        )
        .route(
            "/v1/blog/posts/{id}/comments",
            get(blog::list_comments).post(blog::add_comment),
        )
        .route("/v1/blog/tags", get(blog::list_tags))
        .route("/v1/blog/tags/{id}/posts", get(blog::list_posts_by_tag))
        .route(
            "/v1/events",
            get(events::list_events).post(events::create_event),
        )
        .route("/v1/events/published", get(events::list_published_events))
        .route("/v1/events/upcoming", get(events::list_upcoming_events))
        .route(
            "/v1/events/{id}",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/v1/events/{id}/publish", post(events::publish_event))
        .route("/v1/admin/rate-limits/reset", post(admin::reset_rate_limits))
        .route("/v1/admin/rate-limits/status", get(admin::rate_limit_status))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(axum_middleware::from_fn(middleware::set_client_ip))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}
