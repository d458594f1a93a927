//! Declarative cache invalidation.
//!
//! Every write names its [`Mutation`]; the full set of keys the write could
//! have staled lives in one table ([`Mutation::stale_keys`]) instead of being
//! scattered through the handlers. Under-invalidation serves stale data;
//! over-invalidation only costs a miss, so ambiguous cases err toward more
//! keys.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use super::keys::CacheKey;
use super::store::KeyValueStore;

const TARGET: &str = "portico::cache";

/// A committed write against the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    UserCreated,
    UserUpdated { id: Uuid },
    UserDeleted { id: Uuid },
    /// Password reset, suspension, account deletion, account validation:
    /// anything that must also drop the profile and session snapshots.
    UserSecurityChanged { id: Uuid },
    PostCreated { subject_id: Uuid },
    PostUpdated { id: Uuid, subject_id: Uuid },
    PostDeleted { id: Uuid, subject_id: Uuid },
    CommentCreated { post_id: Uuid },
    EventCreated,
    EventUpdated { id: Uuid },
    EventDeleted { id: Uuid },
    EventPublished,
}

impl Mutation {
    /// The complete set of cache keys this write could have staled.
    pub fn stale_keys(&self) -> Vec<CacheKey> {
        match *self {
            Mutation::UserCreated => vec![CacheKey::UsersAll],
            Mutation::UserUpdated { id } | Mutation::UserDeleted { id } => {
                vec![CacheKey::User(id), CacheKey::UsersAll]
            }
            Mutation::UserSecurityChanged { id } => vec![
                CacheKey::User(id),
                CacheKey::UserProfile(id),
                CacheKey::UserSession(id),
                CacheKey::UsersAll,
            ],
            Mutation::PostCreated { subject_id } => vec![
                CacheKey::BlogSubjectsAll,
                CacheKey::SubjectPosts(subject_id),
            ],
            Mutation::PostUpdated { id, subject_id } => vec![
                CacheKey::BlogSubjectsAll,
                CacheKey::SubjectPosts(subject_id),
                CacheKey::BlogPost(id),
            ],
            Mutation::PostDeleted { id, subject_id } => vec![
                CacheKey::BlogSubjectsAll,
                CacheKey::SubjectPosts(subject_id),
                CacheKey::BlogPost(id),
                CacheKey::PostComments(id),
            ],
            Mutation::CommentCreated { post_id } => vec![CacheKey::PostComments(post_id)],
            Mutation::EventCreated | Mutation::EventPublished => vec![
                CacheKey::EventsAll,
                CacheKey::EventsPublished,
                CacheKey::EventsUpcoming,
            ],
            Mutation::EventUpdated { id } | Mutation::EventDeleted { id } => vec![
                CacheKey::EventsAll,
                CacheKey::EventsPublished,
                CacheKey::EventsUpcoming,
                CacheKey::Event(id),
            ],
        }
    }
}

/// Deletes stale entries after a write commits.
#[derive(Clone)]
pub struct Invalidator {
    store: Arc<dyn KeyValueStore>,
}

impl Invalidator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Drop every key the mutation could have staled.
    ///
    /// Called only after the system-of-record write succeeded. Deleting an
    /// absent key is a no-op. A failed delete is logged but never fails the
    /// surrounding request: the write already committed, and the entry's TTL
    /// bounds how long it can stay stale.
    pub async fn invalidate(&self, mutation: Mutation) {
        let keys: Vec<String> = mutation
            .stale_keys()
            .iter()
            .map(CacheKey::to_string)
            .collect();

        match self.store.del(&keys).await {
            Ok(removed) => {
                counter!("portico_cache_invalidate_total").increment(keys.len() as u64);
                debug!(
                    target: TARGET,
                    ?mutation,
                    keys = keys.len(),
                    removed,
                    "cache invalidated"
                );
            }
            Err(error) => {
                warn!(
                    target: TARGET,
                    ?mutation,
                    error = %error,
                    "cache invalidation failed; entries will expire by TTL"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::store::MemoryStore;
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn user_mutations_map_to_spec_keys() {
        let id = uuid(1);
        assert_eq!(Mutation::UserCreated.stale_keys(), vec![CacheKey::UsersAll]);
        assert_eq!(
            Mutation::UserUpdated { id }.stale_keys(),
            vec![CacheKey::User(id), CacheKey::UsersAll]
        );
        assert_eq!(
            Mutation::UserSecurityChanged { id }.stale_keys(),
            vec![
                CacheKey::User(id),
                CacheKey::UserProfile(id),
                CacheKey::UserSession(id),
                CacheKey::UsersAll,
            ]
        );
    }

    #[test]
    fn post_mutations_cover_collection_and_parent_keys() {
        let id = uuid(2);
        let subject_id = uuid(3);
        assert_eq!(
            Mutation::PostCreated { subject_id }.stale_keys(),
            vec![CacheKey::BlogSubjectsAll, CacheKey::SubjectPosts(subject_id)]
        );
        assert_eq!(
            Mutation::PostUpdated { id, subject_id }.stale_keys(),
            vec![
                CacheKey::BlogSubjectsAll,
                CacheKey::SubjectPosts(subject_id),
                CacheKey::BlogPost(id),
            ]
        );
        assert_eq!(
            Mutation::PostDeleted { id, subject_id }.stale_keys(),
            vec![
                CacheKey::BlogSubjectsAll,
                CacheKey::SubjectPosts(subject_id),
                CacheKey::BlogPost(id),
                CacheKey::PostComments(id),
            ]
        );
    }

    #[test]
    fn event_mutations_drop_derived_lists() {
        let id = uuid(4);
        let lists = vec![
            CacheKey::EventsAll,
            CacheKey::EventsPublished,
            CacheKey::EventsUpcoming,
        ];
        assert_eq!(Mutation::EventCreated.stale_keys(), lists);
        assert_eq!(Mutation::EventPublished.stale_keys(), lists);

        let mut with_entity = Mutation::EventUpdated { id }.stale_keys();
        assert_eq!(with_entity.pop(), Some(CacheKey::Event(id)));
        assert_eq!(
            with_entity,
            vec![
                CacheKey::EventsAll,
                CacheKey::EventsPublished,
                CacheKey::EventsUpcoming,
            ]
        );
    }

    #[tokio::test]
    async fn invalidate_removes_exactly_the_stale_set() {
        let store = Arc::new(MemoryStore::new());
        let invalidator = Invalidator::new(store.clone());

        let post = uuid(10);
        let subject = uuid(11);
        let keys = [
            CacheKey::BlogSubjectsAll,
            CacheKey::SubjectPosts(subject),
            CacheKey::BlogPost(post),
            CacheKey::PostComments(post),
        ];
        for key in &keys {
            store
                .set_ex(&key.to_string(), "[]", Duration::from_secs(600))
                .await
                .unwrap();
        }

        invalidator
            .invalidate(Mutation::PostUpdated {
                id: post,
                subject_id: subject,
            })
            .await;

        assert!(!store.exists(&keys[0].to_string()).await.unwrap());
        assert!(!store.exists(&keys[1].to_string()).await.unwrap());
        assert!(!store.exists(&keys[2].to_string()).await.unwrap());
        // Comments were not part of an update's stale set.
        assert!(store.exists(&keys[3].to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn invalidating_absent_keys_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let invalidator = Invalidator::new(store.clone());

        // Nothing stored; both calls complete without error.
        invalidator
            .invalidate(Mutation::UserDeleted { id: uuid(42) })
            .await;
        invalidator
            .invalidate(Mutation::UserDeleted { id: uuid(42) })
            .await;
    }
}
