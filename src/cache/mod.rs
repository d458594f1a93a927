//! Cache-aside, invalidation, and rate-limiting layer.
//!
//! Every endpoint composes the same three pieces around its business logic:
//! a fixed-window [`rate_limit::RateLimiter`] gate, a read-through
//! [`accessor::Cache`] for reads, and a declarative
//! [`invalidation::Invalidator`] for writes. Keys are typed in [`keys`] and
//! the store seam is the [`store::KeyValueStore`] trait.

pub mod accessor;
pub mod invalidation;
pub mod keys;
pub mod rate_limit;
pub mod store;

pub use accessor::{Cache, Lookup};
pub use invalidation::{Invalidator, Mutation};
pub use keys::{CacheKey, RateLimitAction, RateLimitScope, ttl};
pub use rate_limit::{Decision, RateLimitPolicy, RateLimiter, policies};
pub use store::{KeyValueStore, MemoryStore, StoreError};
