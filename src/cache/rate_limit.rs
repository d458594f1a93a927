//! Fixed-window rate limiting on shared counters.
//!
//! Each `(action, scope, identity)` pair owns one counter with a TTL equal to
//! the window. The increment happens before the threshold check, so a limit
//! of N admits exactly N requests and rejects the (N+1)th.
//!
//! The window is fixed, not sliding: every request between the first hit and
//! the counter's expiry shares one window, and a burst straddling the
//! boundary can admit up to twice the limit in a short span. Counters live in
//! the shared store only; there is no per-process fallback, so multiple
//! server instances see the same counts.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::debug;

use super::keys::{
    RateLimitAction, RateLimitScope, rate_limit_email_pattern, rate_limit_ip_pattern,
    rate_limit_key,
};
use super::store::{KeyValueStore, StoreError};

const TARGET: &str = "portico::rate_limit";

/// A single fixed-window limit for one action and identity scope.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub action: RateLimitAction,
    pub scope: RateLimitScope,
    pub limit: i64,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(
        action: RateLimitAction,
        scope: RateLimitScope,
        limit: i64,
        window_secs: u64,
    ) -> Self {
        Self {
            action,
            scope,
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn key(&self, identity: &str) -> String {
        rate_limit_key(self.action, self.scope, identity)
    }
}

/// Per-endpoint policies, limits and windows carried over from the deployed
/// behavior.
pub mod policies {
    use super::super::keys::{RateLimitAction as A, RateLimitScope as S};
    use super::RateLimitPolicy;

    pub const REGISTER: RateLimitPolicy = RateLimitPolicy::new(A::Register, S::Ip, 3, 3600);
    pub const FORGOT_PASSWORD_IP: RateLimitPolicy =
        RateLimitPolicy::new(A::ForgotPassword, S::Ip, 5, 3600);
    /// One request per address per five minutes; exceeding it yields the
    /// generic "maybe sent" response, not a 429, to avoid leaking whether the
    /// address exists.
    pub const FORGOT_PASSWORD_EMAIL: RateLimitPolicy =
        RateLimitPolicy::new(A::ForgotPassword, S::Email, 1, 300);
    pub const RESET_VALIDATE: RateLimitPolicy =
        RateLimitPolicy::new(A::ResetValidate, S::Ip, 10, 3600);
    pub const RESET_PASSWORD: RateLimitPolicy =
        RateLimitPolicy::new(A::ResetPassword, S::Ip, 5, 3600);
    pub const LOGIN_IP: RateLimitPolicy = RateLimitPolicy::new(A::Login, S::Ip, 10, 3600);
    pub const LOGIN_EMAIL: RateLimitPolicy = RateLimitPolicy::new(A::Login, S::Email, 5, 900);

    pub const GET_USERS: RateLimitPolicy = RateLimitPolicy::new(A::GetUsers, S::Ip, 100, 3600);
    pub const GET_USER: RateLimitPolicy = RateLimitPolicy::new(A::GetUser, S::Ip, 200, 3600);
    pub const CREATE_USER: RateLimitPolicy = RateLimitPolicy::new(A::CreateUser, S::Ip, 10, 3600);
    pub const UPDATE_USER: RateLimitPolicy = RateLimitPolicy::new(A::UpdateUser, S::Ip, 20, 3600);
    pub const PATCH_USER: RateLimitPolicy = RateLimitPolicy::new(A::PatchUser, S::Ip, 20, 3600);
    pub const DELETE_USER: RateLimitPolicy = RateLimitPolicy::new(A::DeleteUser, S::Ip, 5, 3600);

    pub const BLOG_SUBJECTS: RateLimitPolicy =
        RateLimitPolicy::new(A::BlogSubjects, S::Ip, 50, 3600);
    pub const BLOG_POSTS_BY_SUBJECT: RateLimitPolicy =
        RateLimitPolicy::new(A::BlogPostsBySubject, S::Ip, 100, 3600);
    pub const BLOG_COMMENTS: RateLimitPolicy =
        RateLimitPolicy::new(A::BlogComments, S::Ip, 200, 3600);
    pub const BLOG_TAGS: RateLimitPolicy = RateLimitPolicy::new(A::BlogTags, S::Ip, 100, 3600);
    pub const BLOG_POSTS_BY_TAG: RateLimitPolicy =
        RateLimitPolicy::new(A::BlogPostsByTag, S::Ip, 100, 3600);
    pub const CREATE_POST: RateLimitPolicy = RateLimitPolicy::new(A::CreatePost, S::User, 10, 3600);
    pub const UPDATE_POST: RateLimitPolicy = RateLimitPolicy::new(A::UpdatePost, S::User, 20, 3600);
    pub const DELETE_POST: RateLimitPolicy = RateLimitPolicy::new(A::DeletePost, S::User, 5, 3600);
    pub const ADD_COMMENT: RateLimitPolicy = RateLimitPolicy::new(A::AddComment, S::User, 30, 3600);

    pub const EVENTS_LIST: RateLimitPolicy = RateLimitPolicy::new(A::EventsList, S::Ip, 100, 3600);
    pub const EVENT_SHOW: RateLimitPolicy = RateLimitPolicy::new(A::EventShow, S::Ip, 200, 3600);
    pub const EVENTS_PUBLISHED: RateLimitPolicy =
        RateLimitPolicy::new(A::EventsPublished, S::Ip, 150, 3600);
    pub const EVENTS_UPCOMING: RateLimitPolicy =
        RateLimitPolicy::new(A::EventsUpcoming, S::Ip, 150, 3600);
    pub const CREATE_EVENT: RateLimitPolicy =
        RateLimitPolicy::new(A::CreateEvent, S::User, 5, 3600);
    pub const UPDATE_EVENT: RateLimitPolicy =
        RateLimitPolicy::new(A::UpdateEvent, S::User, 10, 3600);
    pub const DELETE_EVENT: RateLimitPolicy =
        RateLimitPolicy::new(A::DeleteEvent, S::User, 3, 3600);
    pub const PUBLISH_EVENT: RateLimitPolicy =
        RateLimitPolicy::new(A::PublishEvent, S::User, 10, 3600);
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Rejected { retry_after_secs: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Counts requests per `(action, identity)` inside a fixed window.
///
/// Store faults fail closed: a limiter that cannot count must not silently
/// admit traffic, so errors propagate to the endpoint.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Increment the counter for `identity` and decide.
    pub async fn check(
        &self,
        policy: &RateLimitPolicy,
        identity: &str,
    ) -> Result<Decision, StoreError> {
        let key = policy.key(identity);
        let count = self.store.incr(&key).await?;

        if count == 1 {
            // First hit in a fresh window: the counter was just created and
            // carries no expiry yet.
            self.store.expire(&key, policy.window).await?;
        }

        if count > policy.limit {
            let retry_after_secs = self.retry_after(&key, policy.window).await;
            counter!("portico_rate_limit_rejected_total", "action" => policy.action.as_str())
                .increment(1);
            debug!(
                target: TARGET,
                action = %policy.action,
                scope = %policy.scope,
                count,
                limit = policy.limit,
                "rate limit exceeded"
            );
            return Ok(Decision::Rejected { retry_after_secs });
        }

        Ok(Decision::Allowed)
    }

    /// Drop the counter for `identity`. A successful login forgives the
    /// accumulated failures for that email; failures keep counting.
    pub async fn forgive(
        &self,
        policy: &RateLimitPolicy,
        identity: &str,
    ) -> Result<(), StoreError> {
        self.store.del(&[policy.key(identity)]).await?;
        Ok(())
    }

    /// Current counter value and remaining TTL, for diagnostics.
    pub async fn status(
        &self,
        policy: &RateLimitPolicy,
        identity: &str,
    ) -> Result<(i64, Option<Duration>), StoreError> {
        let key = policy.key(identity);
        let count = match self.store.get(&key).await? {
            Some(raw) => raw.parse().unwrap_or(0),
            None => 0,
        };
        let ttl = self.store.ttl(&key).await?;
        Ok((count, ttl))
    }

    /// Delete every counter matching the given IP and/or email, across all
    /// actions. Administrative unblocking; returns the deleted keys.
    pub async fn reset_matching(
        &self,
        ip: Option<&str>,
        email: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        if let Some(ip) = ip {
            keys.extend(self.store.scan(&rate_limit_ip_pattern(ip)).await?);
        }
        if let Some(email) = email {
            keys.extend(self.store.scan(&rate_limit_email_pattern(email)).await?);
        }

        if !keys.is_empty() {
            self.store.del(&keys).await?;
        }
        Ok(keys)
    }

    async fn retry_after(&self, key: &str, window: Duration) -> u64 {
        match self.store.ttl(key).await {
            Ok(Some(remaining)) if remaining > Duration::ZERO => {
                // Round up so the hint never undershoots the reset.
                let secs = remaining
                    .as_secs()
                    .saturating_add(u64::from(remaining.subsec_nanos() > 0));
                secs.max(1)
            }
            // TTL unavailable: fall back to the full window.
            _ => window.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::store::MemoryStore;
    use super::*;

    fn limiter() -> (RateLimiter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (RateLimiter::new(store.clone()), store)
    }

    #[tokio::test]
    async fn limit_n_admits_n_and_rejects_the_next() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new(RateLimitAction::Register, RateLimitScope::Ip, 3, 3600);

        for _ in 0..3 {
            assert_eq!(
                limiter.check(&policy, "1.2.3.4").await.unwrap(),
                Decision::Allowed
            );
        }

        match limiter.check(&policy, "1.2.3.4").await.unwrap() {
            Decision::Rejected { retry_after_secs } => {
                assert!(retry_after_secs > 0);
                assert!(retry_after_secs <= 3600);
            }
            Decision::Allowed => panic!("fourth register within the window must be rejected"),
        }
    }

    #[tokio::test]
    async fn distinct_actions_use_independent_counters() {
        let (limiter, _) = limiter();
        let login_ip = RateLimitPolicy::new(RateLimitAction::Login, RateLimitScope::Ip, 2, 3600);
        let register = RateLimitPolicy::new(RateLimitAction::Register, RateLimitScope::Ip, 2, 3600);

        assert!(limiter.check(&login_ip, "9.9.9.9").await.unwrap().is_allowed());
        assert!(limiter.check(&login_ip, "9.9.9.9").await.unwrap().is_allowed());
        assert!(!limiter.check(&login_ip, "9.9.9.9").await.unwrap().is_allowed());

        // Same identity, different action: unaffected.
        assert!(limiter.check(&register, "9.9.9.9").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn distinct_identities_do_not_share_windows() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new(RateLimitAction::Login, RateLimitScope::Email, 1, 900);

        assert!(limiter.check(&policy, "a@x.test").await.unwrap().is_allowed());
        assert!(!limiter.check(&policy, "a@x.test").await.unwrap().is_allowed());
        assert!(limiter.check(&policy, "b@x.test").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn forgive_resets_only_the_forgiven_counter() {
        let (limiter, _) = limiter();
        let by_email = policies::LOGIN_EMAIL;
        let by_ip = policies::LOGIN_IP;

        // Exhaust the email window.
        for _ in 0..by_email.limit {
            assert!(limiter.check(&by_email, "u@x.test").await.unwrap().is_allowed());
        }
        assert!(!limiter.check(&by_email, "u@x.test").await.unwrap().is_allowed());
        for _ in 0..3 {
            assert!(limiter.check(&by_ip, "3.3.3.3").await.unwrap().is_allowed());
        }

        limiter.forgive(&by_email, "u@x.test").await.unwrap();

        // Email counter starts a fresh window; the IP counter kept its count.
        assert!(limiter.check(&by_email, "u@x.test").await.unwrap().is_allowed());
        let (ip_count, _) = limiter.status(&by_ip, "3.3.3.3").await.unwrap();
        assert_eq!(ip_count, 3);
    }

    #[tokio::test]
    async fn counters_reset_when_the_window_expires() {
        let (limiter, store) = limiter();
        let policy = RateLimitPolicy {
            action: RateLimitAction::Login,
            scope: RateLimitScope::Ip,
            limit: 1,
            window: Duration::from_millis(10),
        };

        assert!(limiter.check(&policy, "5.5.5.5").await.unwrap().is_allowed());
        assert!(!limiter.check(&policy, "5.5.5.5").await.unwrap().is_allowed());

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Counter expired with the window; the next hit recreates it at 1.
        assert!(limiter.check(&policy, "5.5.5.5").await.unwrap().is_allowed());
        assert!(store.exists(&policy.key("5.5.5.5")).await.unwrap());
    }

    #[tokio::test]
    async fn reset_matching_clears_ip_and_email_counters() {
        let (limiter, store) = limiter();

        limiter
            .check(&policies::LOGIN_IP, "1.2.3.4")
            .await
            .unwrap();
        limiter
            .check(&policies::REGISTER, "1.2.3.4")
            .await
            .unwrap();
        limiter
            .check(&policies::LOGIN_EMAIL, "u@x.test")
            .await
            .unwrap();
        limiter
            .check(&policies::LOGIN_IP, "8.8.8.8")
            .await
            .unwrap();

        let mut deleted = limiter
            .reset_matching(Some("1.2.3.4"), Some("u@x.test"))
            .await
            .unwrap();
        deleted.sort();
        assert_eq!(
            deleted,
            vec![
                "rate_limit:login:email:u@x.test".to_string(),
                "rate_limit:login:ip:1.2.3.4".to_string(),
                "rate_limit:register:ip:1.2.3.4".to_string(),
            ]
        );

        // The unrelated IP keeps its counter.
        assert!(
            store
                .exists(&policies::LOGIN_IP.key("8.8.8.8"))
                .await
                .unwrap()
        );

        // Resetting again matches nothing and succeeds.
        let deleted = limiter
            .reset_matching(Some("1.2.3.4"), None)
            .await
            .unwrap();
        assert!(deleted.is_empty());
    }
}
