//! User CRUD service.
//!
//! Every operation gates on the shared rate limiter first, then either reads
//! through the cache or mutates the system of record and invalidates the
//! derived entries.

use std::sync::Arc;

use thiserror::Error;
use time::Date;
use time::macros::format_description;
use uuid::Uuid;

use crate::application::auth::hash_password;
use crate::application::models::UserPublic;
use crate::application::repos::{
    CreateUserAccountParams, CreateUserParams, PatchUserParams, RepoError, UpdateUserParams,
    UsersRepo,
};
use crate::cache::{
    Cache, CacheKey, Decision, Invalidator, Lookup, Mutation, RateLimitPolicy, RateLimiter,
    StoreError, policies, ttl,
};
use crate::domain::types::AccountStatus;

pub(crate) const DEFAULT_AVATAR_URL: &str = "https://www.w3schools.com/w3images/avatar2.png";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email already in use")]
    EmailTaken,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UserError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub dob: Option<String>,
    pub phone_number: Option<String>,
    pub landline_number: Option<String>,
    pub country_code: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub phone_number: Option<String>,
    pub landline_number: Option<String>,
    pub country_code: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PatchUserCommand {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
    cache: Cache,
    limiter: RateLimiter,
    invalidator: Invalidator,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        cache: Cache,
        limiter: RateLimiter,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            users,
            cache,
            limiter,
            invalidator,
        }
    }

    pub async fn list(&self, client_ip: &str) -> Result<(Vec<UserPublic>, Lookup), UserError> {
        self.gate(&policies::GET_USERS, client_ip).await?;

        let users = self.users.clone();
        self.cache
            .read_through(&CacheKey::UsersAll, ttl::USERS_ALL, || async move {
                let records = users.list_all().await?;
                Ok::<_, UserError>(records.into_iter().map(UserPublic::from).collect::<Vec<_>>())
            })
            .await
    }

    pub async fn get(&self, client_ip: &str, id: Uuid) -> Result<(UserPublic, Lookup), UserError> {
        self.gate(&policies::GET_USER, client_ip).await?;

        let users = self.users.clone();
        let (found, lookup) = self
            .cache
            .read_through_opt(&CacheKey::User(id), ttl::USER, || async move {
                Ok::<_, UserError>(users.find_by_id(id).await?.map(UserPublic::from))
            })
            .await?;

        match found {
            Some(user) => Ok((user, lookup)),
            None => Err(UserError::NotFound),
        }
    }

    pub async fn create(
        &self,
        client_ip: &str,
        command: CreateUserCommand,
    ) -> Result<UserPublic, UserError> {
        self.gate(&policies::CREATE_USER, client_ip).await?;

        let full_name = required(command.full_name)?;
        let email = required(command.email)?;
        let password = required(command.password)?;
        let dob = parse_dob(&required(command.dob)?)?;
        let phone_number = required(command.phone_number)?;
        let country_code = required(command.country_code)?;
        let gender = required(command.gender)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(UserError::EmailTaken);
        }

        let user = self
            .users
            .create(CreateUserParams {
                full_name,
                email,
                password_hash: hash_password(&password),
                validation_code: None,
            })
            .await?;

        self.users
            .create_account(CreateUserAccountParams {
                user_id: user.id,
                is_verified: true,
                status: AccountStatus::Active,
                dob,
                gender,
                avatar_url: DEFAULT_AVATAR_URL.to_string(),
                phone_number,
                landline_number: command.landline_number,
                country_code,
            })
            .await?;

        self.invalidator.invalidate(Mutation::UserCreated).await;

        // Prime the point cache for the user that was just created.
        let public = UserPublic::from(user);
        self.cache
            .put(&CacheKey::User(public.id), &public, ttl::USER)
            .await;

        Ok(public)
    }

    pub async fn update(
        &self,
        client_ip: &str,
        id: Uuid,
        command: UpdateUserCommand,
    ) -> Result<UserPublic, UserError> {
        self.gate(&policies::UPDATE_USER, client_ip).await?;

        let full_name = required(command.full_name)?;
        let email = required(command.email)?;
        // PUT replaces the whole resource; account fields must be present
        // even though only name and email land on the user row.
        required(command.dob)?;
        required(command.phone_number)?;
        required(command.country_code)?;
        required(command.gender)?;

        let user = self.users.find_by_id(id).await?.ok_or(UserError::NotFound)?;

        if email != user.email && self.email_taken_by_other(&email, id).await? {
            return Err(UserError::EmailTaken);
        }

        let updated = self
            .users
            .update(UpdateUserParams {
                id,
                full_name,
                email,
            })
            .await?;

        self.invalidator
            .invalidate(Mutation::UserUpdated { id })
            .await;

        Ok(UserPublic::from(updated))
    }

    pub async fn patch(
        &self,
        client_ip: &str,
        id: Uuid,
        command: PatchUserCommand,
    ) -> Result<UserPublic, UserError> {
        self.gate(&policies::PATCH_USER, client_ip).await?;

        let user = self.users.find_by_id(id).await?.ok_or(UserError::NotFound)?;

        if let Some(email) = &command.email
            && email != &user.email
            && self.email_taken_by_other(email, id).await?
        {
            return Err(UserError::EmailTaken);
        }

        let params = PatchUserParams {
            full_name: command.full_name,
            email: command.email,
            password_hash: command.password.as_deref().map(hash_password),
        };
        let updated = self.users.patch(id, params).await?;

        self.invalidator
            .invalidate(Mutation::UserUpdated { id })
            .await;

        Ok(UserPublic::from(updated))
    }

    /// Deletes the user and returns the pre-delete snapshot.
    pub async fn delete(&self, client_ip: &str, id: Uuid) -> Result<UserPublic, UserError> {
        self.gate(&policies::DELETE_USER, client_ip).await?;

        let user = self.users.find_by_id(id).await?.ok_or(UserError::NotFound)?;
        let snapshot = UserPublic::from(user);

        self.users.delete(id).await?;

        self.invalidator
            .invalidate(Mutation::UserDeleted { id })
            .await;

        Ok(snapshot)
    }

    async fn gate(&self, policy: &RateLimitPolicy, identity: &str) -> Result<(), UserError> {
        match self.limiter.check(policy, identity).await? {
            Decision::Allowed => Ok(()),
            Decision::Rejected { retry_after_secs } => {
                Err(UserError::RateLimited { retry_after_secs })
            }
        }
    }

    async fn email_taken_by_other(&self, email: &str, id: Uuid) -> Result<bool, UserError> {
        Ok(self
            .users
            .find_by_email(email)
            .await?
            .is_some_and(|other| other.id != id))
    }
}

fn required(value: Option<String>) -> Result<String, UserError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(UserError::validation("all fields are required")),
    }
}

fn parse_dob(raw: &str) -> Result<Date, UserError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format)
        .map_err(|_| UserError::validation("dob must be an ISO date (YYYY-MM-DD)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dob_parses_iso_dates_only() {
        assert!(parse_dob("1990-06-15").is_ok());
        assert!(parse_dob("15/06/1990").is_err());
        assert!(parse_dob("").is_err());
    }

    #[test]
    fn required_rejects_missing_and_blank() {
        assert!(required(Some("value".to_string())).is_ok());
        assert!(required(Some("   ".to_string())).is_err());
        assert!(required(None).is_err());
    }
}
