//! Portico: a community-portal REST API.
//!
//! The crate is organized in layers:
//!
//! - [`domain`] holds persistent records and value types.
//! - [`application`] holds services, repository traits, and error taxonomy.
//! - [`cache`] is the cache-aside, invalidation, and rate-limiting layer
//!   shared by every endpoint.
//! - [`infra`] holds the MySQL repositories, the Redis store, the HTTP
//!   surface, telemetry, and the outbound mailer.
//! - [`config`] resolves deployment settings (file → environment → CLI).

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
