//! End-to-end consistency checks for the cache-aside and rate-limiting layer,
//! run against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use portico::cache::{
    Cache, CacheKey, Decision, Invalidator, KeyValueStore, Lookup, MemoryStore, Mutation,
    RateLimiter, policies, ttl,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UserPayload {
    id: u64,
    name: String,
}

fn harness() -> (Arc<MemoryStore>, Cache, Invalidator, RateLimiter) {
    let store = Arc::new(MemoryStore::new());
    let cache = Cache::new(store.clone());
    let invalidator = Invalidator::new(store.clone());
    let limiter = RateLimiter::new(store.clone());
    (store, cache, invalidator, limiter)
}

#[tokio::test]
async fn register_limit_three_per_hour_rejects_the_fourth() {
    let (_, _, _, limiter) = harness();

    for _ in 0..3 {
        assert_eq!(
            limiter.check(&policies::REGISTER, "1.2.3.4").await.unwrap(),
            Decision::Allowed
        );
    }

    match limiter.check(&policies::REGISTER, "1.2.3.4").await.unwrap() {
        Decision::Rejected { retry_after_secs } => assert_eq!(retry_after_secs, 3600),
        Decision::Allowed => panic!("fourth registration must be rejected"),
    }
}

#[tokio::test]
async fn cache_miss_fills_and_second_read_hits_with_identical_payload() {
    let (_, cache, _, _) = harness();
    let key = CacheKey::User(Uuid::from_u128(123));
    let loads = AtomicUsize::new(0);

    let loader = || async {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok::<_, std::convert::Infallible>(UserPayload {
            id: 123,
            name: "A".to_string(),
        })
    };

    let (first, lookup) = cache
        .read_through(&key, Duration::from_secs(3600), loader)
        .await
        .unwrap();
    assert_eq!(lookup, Lookup::Miss);

    let (second, lookup) = cache
        .read_through(&key, Duration::from_secs(3600), || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(UserPayload {
                id: 0,
                name: "stale".to_string(),
            })
        })
        .await
        .unwrap();

    assert_eq!(lookup, Lookup::Hit);
    assert_eq!(second, first);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalidate_then_read_always_invokes_the_loader() {
    let (_, cache, invalidator, _) = harness();
    let id = Uuid::from_u128(7);
    let key = CacheKey::User(id);

    // Populate, invalidate, then confirm the loader runs again and its fresh
    // value is what comes back.
    let (_, _) = cache
        .read_through(&key, ttl::USER, || async {
            Ok::<_, std::convert::Infallible>(UserPayload {
                id: 7,
                name: "before".to_string(),
            })
        })
        .await
        .unwrap();

    invalidator.invalidate(Mutation::UserUpdated { id }).await;

    let loads = AtomicUsize::new(0);
    let (value, lookup) = cache
        .read_through(&key, ttl::USER, || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(UserPayload {
                id: 7,
                name: "after".to_string(),
            })
        })
        .await
        .unwrap();

    assert_eq!(lookup, Lookup::Miss);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(value.name, "after");
}

#[tokio::test]
async fn write_then_read_never_returns_the_pre_write_value() {
    let (_, cache, invalidator, _) = harness();
    let id = Uuid::from_u128(9);
    let key = CacheKey::User(id);

    let (_, _) = cache
        .read_through(&key, ttl::USER, || async {
            Ok::<_, std::convert::Infallible>(UserPayload {
                id: 9,
                name: "old name".to_string(),
            })
        })
        .await
        .unwrap();

    // The write commits, then its invalidation runs.
    invalidator.invalidate(Mutation::UserUpdated { id }).await;

    let (value, _) = cache
        .read_through(&key, ttl::USER, || async {
            Ok::<_, std::convert::Infallible>(UserPayload {
                id: 9,
                name: "new name".to_string(),
            })
        })
        .await
        .unwrap();
    assert_eq!(value.name, "new name");
}

#[tokio::test]
async fn post_update_clears_subjects_subject_posts_and_post_keys() {
    let (store, _, invalidator, _) = harness();
    let post = Uuid::from_u128(0xB1);
    let subject = Uuid::from_u128(0x51);

    let keys = [
        CacheKey::BlogSubjectsAll,
        CacheKey::SubjectPosts(subject),
        CacheKey::BlogPost(post),
    ];
    for key in &keys {
        store
            .set_ex(&key.to_string(), "[]", Duration::from_secs(1800))
            .await
            .unwrap();
    }

    invalidator
        .invalidate(Mutation::PostUpdated {
            id: post,
            subject_id: subject,
        })
        .await;

    for key in &keys {
        assert!(
            !store.exists(&key.to_string()).await.unwrap(),
            "{key} should be absent after a post update"
        );
    }
}

#[tokio::test]
async fn invalidation_is_idempotent_and_tolerates_missing_keys() {
    let (store, _, invalidator, _) = harness();
    let id = Uuid::from_u128(404);

    invalidator.invalidate(Mutation::UserDeleted { id }).await;
    invalidator.invalidate(Mutation::UserDeleted { id }).await;

    assert!(!store.exists(&CacheKey::User(id).to_string()).await.unwrap());
    assert!(!store.exists(&CacheKey::UsersAll.to_string()).await.unwrap());
}

#[tokio::test]
async fn login_forgiveness_reopens_the_email_window() {
    let (_, _, _, limiter) = harness();
    let email = "user@example.com";

    for _ in 0..policies::LOGIN_EMAIL.limit {
        assert!(
            limiter
                .check(&policies::LOGIN_EMAIL, email)
                .await
                .unwrap()
                .is_allowed()
        );
    }
    assert!(
        !limiter
            .check(&policies::LOGIN_EMAIL, email)
            .await
            .unwrap()
            .is_allowed()
    );

    // A successful authentication clears the counter.
    limiter.forgive(&policies::LOGIN_EMAIL, email).await.unwrap();

    for _ in 0..policies::LOGIN_EMAIL.limit {
        assert!(
            limiter
                .check(&policies::LOGIN_EMAIL, email)
                .await
                .unwrap()
                .is_allowed()
        );
    }
}

#[tokio::test]
async fn rejection_retry_after_is_positive_and_bounded_by_the_window() {
    let (_, _, _, limiter) = harness();

    for _ in 0..policies::LOGIN_IP.limit {
        limiter.check(&policies::LOGIN_IP, "6.6.6.6").await.unwrap();
    }

    match limiter.check(&policies::LOGIN_IP, "6.6.6.6").await.unwrap() {
        Decision::Rejected { retry_after_secs } => {
            assert!(retry_after_secs > 0);
            assert!(retry_after_secs <= policies::LOGIN_IP.window.as_secs());
        }
        Decision::Allowed => panic!("limit exhausted, check must reject"),
    }
}

#[tokio::test]
async fn admin_reset_unblocks_a_limited_client() {
    let (_, _, _, limiter) = harness();
    let ip = "10.0.0.1";

    for _ in 0..=policies::REGISTER.limit {
        limiter.check(&policies::REGISTER, ip).await.unwrap();
    }
    assert!(!limiter.check(&policies::REGISTER, ip).await.unwrap().is_allowed());

    let deleted = limiter.reset_matching(Some(ip), None).await.unwrap();
    assert_eq!(deleted.len(), 1);

    assert!(limiter.check(&policies::REGISTER, ip).await.unwrap().is_allowed());
}
