//! Authentication and account-lifecycle service.
//!
//! Login is guarded by two independent fixed-window counters (per IP and per
//! email); a successful authentication forgives the email counter so a
//! legitimate user is not locked out by their own earlier failures, while the
//! IP counter keeps accumulating. Sessions and profiles are cached under
//! dedicated keys and dropped by every security-relevant mutation.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::mailer::{MailError, Mailer, OutboundMail};
use crate::application::models::{ProfileData, SessionData, UserPublic};
use crate::application::repos::{
    AccessTokensRepo, CreateAccessTokenParams, CreateUserAccountParams, CreateUserParams,
    RepoError, UsersRepo,
};
use crate::application::users::DEFAULT_AVATAR_URL;
use crate::cache::{
    Cache, CacheKey, Decision, Invalidator, Lookup, Mutation, RateLimitPolicy, RateLimiter,
    StoreError, policies, ttl,
};
use crate::domain::types::AccountStatus;

const TARGET: &str = "portico::auth";
const TOKEN_PREFIX: &str = "pk";
const MIN_SECRET_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;

/// SHA-256 digest of a password, hex-encoded for storage.
pub fn hash_password(password: &str) -> String {
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Constant-time comparison of a candidate password against a stored hash.
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    let candidate_hash = hash_password(candidate);
    stored_hash
        .as_bytes()
        .ct_eq(candidate_hash.as_bytes())
        .unwrap_u8()
        == 1
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email already in use")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    Unauthorized,
    #[error("account not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub dob: Option<String>,
    pub phone_number: Option<String>,
    pub landline_number: Option<String>,
    pub country_code: Option<String>,
    pub gender: Option<String>,
}

/// The authenticated caller, attached to requests by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub token_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Outcome of a forgot-password request. Both variants render the same
/// generic response so the endpoint never reveals whether an email exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgotPasswordOutcome {
    Sent,
    /// Email window already consumed or address unknown.
    Suppressed,
}

/// What `whoami` resolved and where it came from.
#[derive(Debug, Clone)]
pub enum Whoami {
    Session(SessionData),
    Profile { data: ProfileData, lookup: Lookup },
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<dyn AccessTokensRepo>,
    cache: Cache,
    limiter: RateLimiter,
    invalidator: Invalidator,
    mailer: Arc<dyn Mailer>,
    /// Public base URL used in verification and reset links.
    app_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        tokens: Arc<dyn AccessTokensRepo>,
        cache: Cache,
        limiter: RateLimiter,
        invalidator: Invalidator,
        mailer: Arc<dyn Mailer>,
        app_url: String,
    ) -> Self {
        Self {
            users,
            tokens,
            cache,
            limiter,
            invalidator,
            mailer,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    // ========================================================================
    // Registration and account validation
    // ========================================================================

    pub async fn register(
        &self,
        client_ip: &str,
        command: RegisterCommand,
    ) -> Result<UserPublic, AuthError> {
        self.gate(&policies::REGISTER, client_ip).await?;

        let full_name = required(command.full_name)?;
        let email = required(command.email)?;
        let password = required(command.password)?;
        let dob = required(command.dob)?;
        let phone_number = required(command.phone_number)?;
        let country_code = required(command.country_code)?;
        let gender = required(command.gender)?;

        let dob = time::Date::parse(
            &dob,
            &time::macros::format_description!("[year]-[month]-[day]"),
        )
        .map_err(|_| AuthError::validation("dob must be an ISO date (YYYY-MM-DD)"))?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let validation_code = Uuid::new_v4().to_string();
        let user = self
            .users
            .create(CreateUserParams {
                full_name,
                email,
                password_hash: hash_password(&password),
                validation_code: Some(validation_code.clone()),
            })
            .await?;

        self.users
            .create_account(CreateUserAccountParams {
                user_id: user.id,
                is_verified: false,
                status: AccountStatus::Inactive,
                dob,
                gender,
                avatar_url: DEFAULT_AVATAR_URL.to_string(),
                phone_number,
                landline_number: command.landline_number,
                country_code,
            })
            .await?;

        self.invalidator.invalidate(Mutation::UserCreated).await;

        let validation_url = format!("{}/v1/auth/validate-account/{validation_code}", self.app_url);
        self.send_mail(OutboundMail::account_verification(
            &user.email,
            &user.full_name,
            &validation_url,
        ));

        Ok(UserPublic::from(user))
    }

    pub async fn validate_account(&self, code: &str) -> Result<(), AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::validation("validation code is required"));
        }

        let user = self
            .users
            .find_by_validation_code(code)
            .await?
            .ok_or(AuthError::NotFound)?;

        self.users.set_validation_code(user.id, None).await?;
        self.users.mark_account_verified(user.id).await?;
        self.users
            .set_account_status(user.id, AccountStatus::Active)
            .await?;

        self.invalidator
            .invalidate(Mutation::UserSecurityChanged { id: user.id })
            .await;

        Ok(())
    }

    // ========================================================================
    // Login / logout / whoami
    // ========================================================================

    pub async fn login(
        &self,
        client_ip: &str,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<LoginOutcome, AuthError> {
        let email = required(email)?;
        let password = required(password)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation("password is not valid"));
        }

        // Two independent brute-force counters; both must pass.
        self.gate(&policies::LOGIN_IP, client_ip).await?;
        self.gate(&policies::LOGIN_EMAIL, &email).await?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&user.password_hash, &password) {
            return Err(AuthError::InvalidCredentials);
        }

        // Success forgives the email counter; failures keep accumulating and
        // the IP counter is left untouched.
        self.limiter.forgive(&policies::LOGIN_EMAIL, &email).await?;

        let token = self.issue_token(user.id).await?;

        if let Some(account) = self.users.find_account(user.id).await? {
            let session = SessionData {
                profile: ProfileData {
                    id: user.id,
                    full_name: user.full_name.clone(),
                    email: user.email.clone(),
                    status: account.status,
                    gender: account.gender,
                    avatar_url: account.avatar_url,
                    dob: account.dob.to_string(),
                    phone_number: account.phone_number,
                    landline_number: account.landline_number,
                    country_code: account.country_code,
                },
                last_login: OffsetDateTime::now_utc(),
            };
            self.cache
                .put(&CacheKey::UserSession(user.id), &session, ttl::USER_SESSION)
                .await;
        }

        Ok(LoginOutcome {
            user_id: user.id,
            email: user.email,
            token,
        })
    }

    pub async fn logout(&self, auth: &AuthenticatedUser) -> Result<(), AuthError> {
        self.cache
            .evict(&[
                CacheKey::UserSession(auth.user_id),
                CacheKey::UserProfile(auth.user_id),
            ])
            .await;

        self.tokens
            .revoke(auth.token_id, OffsetDateTime::now_utc())
            .await?;
        Ok(())
    }

    pub async fn whoami(&self, auth: &AuthenticatedUser) -> Result<Whoami, AuthError> {
        // Session snapshot first (filled at login), then the profile cache,
        // then the system of record.
        if let Some(session) = self
            .cache
            .peek::<SessionData>(&CacheKey::UserSession(auth.user_id))
            .await
        {
            return Ok(Whoami::Session(session));
        }

        let users = self.users.clone();
        let user_id = auth.user_id;
        let (profile, lookup) = self
            .cache
            .read_through_opt(
                &CacheKey::UserProfile(user_id),
                ttl::USER_PROFILE,
                || async move { Ok::<_, AuthError>(users.load_profile(user_id).await?) },
            )
            .await?;

        match profile {
            Some(data) => Ok(Whoami::Profile { data, lookup }),
            None => Err(AuthError::NotFound),
        }
    }

    // ========================================================================
    // Password reset flow
    // ========================================================================

    pub async fn forgot_password(
        &self,
        client_ip: &str,
        email: Option<String>,
    ) -> Result<ForgotPasswordOutcome, AuthError> {
        self.gate(&policies::FORGOT_PASSWORD_IP, client_ip).await?;

        let email = match email {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(AuthError::validation("email is required")),
        };

        // Over the per-email window the endpoint stays generic instead of
        // returning 429, so callers cannot probe which addresses exist.
        if let Decision::Rejected { .. } = self
            .limiter
            .check(&policies::FORGOT_PASSWORD_EMAIL, &email)
            .await?
        {
            return Ok(ForgotPasswordOutcome::Suppressed);
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Ok(ForgotPasswordOutcome::Suppressed);
        };

        let reset_code = Uuid::new_v4().simple().to_string();
        self.users
            .set_validation_code(user.id, Some(&reset_code))
            .await?;

        // The pending code changed what `user:<id>` and the profile snapshot
        // would serialize to; the session stays valid until the reset lands.
        self.cache
            .evict(&[CacheKey::User(user.id), CacheKey::UserProfile(user.id)])
            .await;

        let reset_url = format!("{}/v1/auth/reset-password-validate/{reset_code}", self.app_url);
        self.send_mail(OutboundMail::password_reset(
            &user.email,
            &user.full_name,
            &reset_url,
        ));

        Ok(ForgotPasswordOutcome::Sent)
    }

    pub async fn reset_password_validate(
        &self,
        client_ip: &str,
        code: &str,
    ) -> Result<(), AuthError> {
        self.gate(&policies::RESET_VALIDATE, client_ip).await?;

        if code.trim().is_empty() {
            return Err(AuthError::validation("validation code is required"));
        }

        self.users
            .find_by_validation_code(code)
            .await?
            .map(|_| ())
            .ok_or(AuthError::Unauthorized)
    }

    pub async fn reset_password(
        &self,
        client_ip: &str,
        code: &str,
        password: Option<String>,
        password_confirmation: Option<String>,
    ) -> Result<(), AuthError> {
        self.gate(&policies::RESET_PASSWORD, client_ip).await?;

        if code.trim().is_empty() {
            return Err(AuthError::validation("validation code is required"));
        }

        let user = self
            .users
            .find_by_validation_code(code)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let password = match password {
            Some(password) => password,
            None => return Err(AuthError::validation("password is required")),
        };
        let confirmation = match password_confirmation {
            Some(confirmation) => confirmation,
            None => return Err(AuthError::validation("password confirmation is required")),
        };
        if password.len() < MIN_PASSWORD_LEN || confirmation.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation(
                "password must be at least 8 characters",
            ));
        }
        if verify_password(&user.password_hash, &password) {
            return Err(AuthError::validation(
                "new password must differ from the current one",
            ));
        }
        if password != confirmation {
            return Err(AuthError::validation("passwords do not match"));
        }

        self.users
            .set_password(user.id, &hash_password(&password))
            .await?;

        self.invalidator
            .invalidate(Mutation::UserSecurityChanged { id: user.id })
            .await;

        Ok(())
    }

    // ========================================================================
    // Account state changes
    // ========================================================================

    pub async fn suspend(&self, auth: &AuthenticatedUser) -> Result<(), AuthError> {
        if self.users.find_account(auth.user_id).await?.is_none() {
            return Err(AuthError::NotFound);
        }

        self.users
            .set_account_status(auth.user_id, AccountStatus::Suspended)
            .await?;

        self.invalidator
            .invalidate(Mutation::UserSecurityChanged { id: auth.user_id })
            .await;

        Ok(())
    }

    pub async fn delete_account(&self, auth: &AuthenticatedUser) -> Result<(), AuthError> {
        self.delete_user(auth.user_id).await?;
        self.tokens
            .revoke(auth.token_id, OffsetDateTime::now_utc())
            .await?;
        Ok(())
    }

    pub async fn delete_account_by_user_id(&self, user_id: Uuid) -> Result<(), AuthError> {
        if self.users.find_account(user_id).await?.is_none() {
            return Err(AuthError::NotFound);
        }
        self.delete_user(user_id).await
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.users.delete(user_id).await?;
        self.invalidator
            .invalidate(Mutation::UserSecurityChanged { id: user_id })
            .await;
        Ok(())
    }

    // ========================================================================
    // Token handling
    // ========================================================================

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let parsed = Self::parse_token(token).ok_or(AuthError::Unauthorized)?;

        let record = self
            .tokens
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| AuthError::Unauthorized)?
            .ok_or(AuthError::Unauthorized)?;

        let now = OffsetDateTime::now_utc();
        if let Some(revoked_at) = record.revoked_at
            && revoked_at <= now
        {
            return Err(AuthError::Unauthorized);
        }

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Unauthorized);
        }

        // Best-effort last_used update; never blocks authentication.
        let tokens = self.tokens.clone();
        let token_id = record.id;
        tokio::spawn(async move {
            let _ = tokens.update_last_used(token_id, now).await;
        });

        Ok(AuthenticatedUser {
            user_id: record.user_id,
            token_id: record.id,
        })
    }

    async fn issue_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let prefix = Uuid::new_v4().simple().to_string()[..12].to_string();
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");

        self.tokens
            .create(CreateAccessTokenParams {
                user_id,
                prefix,
                hashed_secret: Self::hash_secret(&secret),
            })
            .await?;

        Ok(token)
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.splitn(3, '_');
        let tag = parts.next()?;
        if tag != TOKEN_PREFIX {
            return None;
        }
        let prefix = parts.next()?;
        let secret = parts.next()?;
        if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
            return None;
        }
        Some(ParsedToken {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
        })
    }

    fn send_mail(&self, mail: OutboundMail) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            metrics::counter!("portico_mail_send_total").increment(1);
            if let Err(MailError::Delivery(reason)) = mailer.send(mail).await {
                metrics::counter!("portico_mail_failed_total").increment(1);
                warn!(target: TARGET, reason, "outbound mail failed");
            }
        });
    }

    async fn gate(&self, policy: &RateLimitPolicy, identity: &str) -> Result<(), AuthError> {
        match self.limiter.check(policy, identity).await? {
            Decision::Allowed => Ok(()),
            Decision::Rejected { retry_after_secs } => {
                Err(AuthError::RateLimited { retry_after_secs })
            }
        }
    }
}

fn required(value: Option<String>) -> Result<String, AuthError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthError::validation("all fields are required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashing_is_deterministic_and_verifiable() {
        let hash = hash_password("correct horse battery");
        assert_eq!(hash.len(), 64);
        assert!(verify_password(&hash, "correct horse battery"));
        assert!(!verify_password(&hash, "wrong horse"));
    }

    #[test]
    fn token_parsing_enforces_shape() {
        let secret = "a".repeat(MIN_SECRET_LEN);
        assert!(AuthService::parse_token(&format!("pk_abc123_{secret}")).is_some());
        // Wrong tag, missing sections, short secret.
        assert!(AuthService::parse_token(&format!("sk_abc123_{secret}")).is_none());
        assert!(AuthService::parse_token("pk_onlyprefix").is_none());
        assert!(AuthService::parse_token("pk_abc123_short").is_none());
    }
}
