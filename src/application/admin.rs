//! Operational endpoints: rate-limit inspection and reset.

use serde::Serialize;
use thiserror::Error;

use crate::cache::{RateLimiter, StoreError, policies};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Login counter state for one IP/email pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRateLimitStatus {
    pub ip_attempts: i64,
    pub email_attempts: i64,
    pub rate_limits_active: bool,
    pub ip_reset_in_seconds: u64,
    pub email_reset_in_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitReset {
    pub ip: Option<String>,
    pub email: Option<String>,
    pub keys_deleted: usize,
    pub deleted_keys: Vec<String>,
}

#[derive(Clone)]
pub struct AdminService {
    limiter: RateLimiter,
}

impl AdminService {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    /// Delete every counter matching the IP and/or email, across all actions.
    pub async fn reset_rate_limits(
        &self,
        ip: Option<String>,
        email: Option<String>,
    ) -> Result<RateLimitReset, AdminError> {
        let deleted = self
            .limiter
            .reset_matching(ip.as_deref(), email.as_deref())
            .await?;

        Ok(RateLimitReset {
            ip,
            email,
            keys_deleted: deleted.len(),
            deleted_keys: deleted,
        })
    }

    /// Current login-counter values and TTLs for diagnostics.
    pub async fn login_rate_limit_status(
        &self,
        ip: &str,
        email: &str,
    ) -> Result<LoginRateLimitStatus, AdminError> {
        let (ip_attempts, ip_ttl) = self.limiter.status(&policies::LOGIN_IP, ip).await?;
        let (email_attempts, email_ttl) =
            self.limiter.status(&policies::LOGIN_EMAIL, email).await?;

        Ok(LoginRateLimitStatus {
            ip_attempts,
            email_attempts,
            rate_limits_active: ip_attempts > policies::LOGIN_IP.limit
                || email_attempts > policies::LOGIN_EMAIL.limit,
            ip_reset_in_seconds: ip_ttl.map(|ttl| ttl.as_secs()).unwrap_or(0),
            email_reset_in_seconds: email_ttl.map(|ttl| ttl.as_secs()).unwrap_or(0),
        })
    }
}
