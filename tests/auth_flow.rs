//! Auth service flows exercised against stub repositories and the in-memory
//! key-value store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::date;
use uuid::Uuid;

use portico::application::auth::{AuthError, AuthService, RegisterCommand, Whoami, hash_password};
use portico::application::mailer::NoopMailer;
use portico::application::models::ProfileData;
use portico::application::repos::{
    AccessTokensRepo, CreateAccessTokenParams, CreateUserAccountParams, CreateUserParams,
    PatchUserParams, RepoError, UpdateUserParams, UsersRepo,
};
use portico::cache::{Cache, CacheKey, Invalidator, KeyValueStore, MemoryStore, RateLimiter};
use portico::domain::entities::{AccessTokenRecord, UserAccountRecord, UserRecord};
use portico::domain::types::AccountStatus;

#[derive(Default)]
struct StubUsersRepo {
    users: Mutex<HashMap<Uuid, UserRecord>>,
    accounts: Mutex<HashMap<Uuid, UserAccountRecord>>,
}

impl StubUsersRepo {
    fn seed_user(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        self.users.lock().unwrap().insert(
            id,
            UserRecord {
                id,
                full_name: "Seeded User".to_string(),
                email: email.to_string(),
                password_hash: hash_password(password),
                validation_code: None,
                created_at: now,
                updated_at: now,
            },
        );
        self.accounts.lock().unwrap().insert(
            id,
            UserAccountRecord {
                user_id: id,
                is_verified: true,
                status: AccountStatus::Active,
                dob: date!(1990 - 01 - 01),
                gender: "female".to_string(),
                avatar_url: "https://example.com/avatar.png".to_string(),
                phone_number: "+33123456789".to_string(),
                landline_number: None,
                country_code: "FR".to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn validation_code_for(&self, email: &str) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.email == email)
            .and_then(|user| user.validation_code.clone())
    }
}

#[async_trait]
impl UsersRepo for StubUsersRepo {
    async fn list_all(&self) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_validation_code(
        &self,
        code: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.validation_code.as_deref() == Some(code))
            .cloned())
    }

    async fn create(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id,
            full_name: params.full_name,
            email: params.email,
            password_hash: params.password_hash,
            validation_code: params.validation_code,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        user.full_name = params.full_name;
        user.email = params.email;
        Ok(user.clone())
    }

    async fn patch(&self, id: Uuid, params: PatchUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(full_name) = params.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = params.email {
            user.email = email;
        }
        if let Some(password_hash) = params.password_hash {
            user.password_hash = password_hash;
        }
        Ok(user.clone())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.validation_code = None;
        Ok(())
    }

    async fn set_validation_code(&self, id: Uuid, code: Option<&str>) -> Result<(), RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.validation_code = code.map(str::to_string);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.users
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(RepoError::NotFound)?;
        self.accounts.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn create_account(
        &self,
        params: CreateUserAccountParams,
    ) -> Result<UserAccountRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = UserAccountRecord {
            user_id: params.user_id,
            is_verified: params.is_verified,
            status: params.status,
            dob: params.dob,
            gender: params.gender,
            avatar_url: params.avatar_url,
            phone_number: params.phone_number,
            landline_number: params.landline_number,
            country_code: params.country_code,
            created_at: now,
            updated_at: now,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(params.user_id, record.clone());
        Ok(record)
    }

    async fn find_account(&self, user_id: Uuid) -> Result<Option<UserAccountRecord>, RepoError> {
        Ok(self.accounts.lock().unwrap().get(&user_id).cloned())
    }

    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> Result<(), RepoError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        account.status = status;
        Ok(())
    }

    async fn mark_account_verified(&self, user_id: Uuid) -> Result<(), RepoError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        account.is_verified = true;
        Ok(())
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<Option<ProfileData>, RepoError> {
        let users = self.users.lock().unwrap();
        let accounts = self.accounts.lock().unwrap();
        let (Some(user), Some(account)) = (users.get(&user_id), accounts.get(&user_id)) else {
            return Ok(None);
        };

        Ok(Some(ProfileData {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            status: account.status,
            gender: account.gender.clone(),
            avatar_url: account.avatar_url.clone(),
            dob: account.dob.to_string(),
            phone_number: account.phone_number.clone(),
            landline_number: account.landline_number.clone(),
            country_code: account.country_code.clone(),
        }))
    }
}

#[derive(Default)]
struct StubTokensRepo {
    tokens: Mutex<HashMap<Uuid, AccessTokenRecord>>,
}

#[async_trait]
impl AccessTokensRepo for StubTokensRepo {
    async fn create(
        &self,
        params: CreateAccessTokenParams,
    ) -> Result<AccessTokenRecord, RepoError> {
        let record = AccessTokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            last_used_at: None,
            revoked_at: None,
        };
        self.tokens
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<AccessTokenRecord>, RepoError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .values()
            .find(|token| token.prefix == prefix)
            .cloned())
    }

    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens.get_mut(&id).ok_or(RepoError::NotFound)?;
        if token.revoked_at.is_none() {
            token.revoked_at = Some(at);
        }
        Ok(())
    }

    async fn update_last_used(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens.get_mut(&id).ok_or(RepoError::NotFound)?;
        token.last_used_at = Some(at);
        Ok(())
    }
}

struct Harness {
    service: AuthService,
    users: Arc<StubUsersRepo>,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    let users = Arc::new(StubUsersRepo::default());
    let tokens = Arc::new(StubTokensRepo::default());
    let store = Arc::new(MemoryStore::new());

    let service = AuthService::new(
        users.clone(),
        tokens,
        Cache::new(store.clone()),
        RateLimiter::new(store.clone()),
        Invalidator::new(store.clone()),
        Arc::new(NoopMailer),
        "http://localhost:3000".to_string(),
    );

    Harness {
        service,
        users,
        store,
    }
}

fn register_command(email: &str) -> RegisterCommand {
    RegisterCommand {
        full_name: Some("New Member".to_string()),
        email: Some(email.to_string()),
        password: Some("long-enough-password".to_string()),
        dob: Some("1991-05-20".to_string()),
        phone_number: Some("+33600000000".to_string()),
        landline_number: None,
        country_code: Some("FR".to_string()),
        gender: Some("male".to_string()),
    }
}

#[tokio::test]
async fn login_issues_token_caches_session_and_forgives_email_counter() {
    let h = harness();
    let user_id = h.users.seed_user("ada@example.com", "super-secret-pw");

    // Burn some failed attempts first.
    for _ in 0..3 {
        let result = h
            .service
            .login(
                "1.2.3.4",
                Some("ada@example.com".to_string()),
                Some("wrong-password".to_string()),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    let outcome = h
        .service
        .login(
            "1.2.3.4",
            Some("ada@example.com".to_string()),
            Some("super-secret-pw".to_string()),
        )
        .await
        .expect("valid credentials must log in");

    assert_eq!(outcome.user_id, user_id);
    assert!(outcome.token.starts_with("pk_"));

    // Session snapshot was primed at login.
    let session_key = CacheKey::UserSession(user_id).to_string();
    assert!(h.store.exists(&session_key).await.unwrap());

    // Success cleared the email counter; a fresh window opens.
    let email_key = "rate_limit:login:email:ada@example.com";
    assert!(!h.store.exists(email_key).await.unwrap());
    // The IP counter kept accumulating.
    assert!(h.store.exists("rate_limit:login:ip:1.2.3.4").await.unwrap());
}

#[tokio::test]
async fn whoami_prefers_session_then_profile_cache() {
    let h = harness();
    h.users.seed_user("grace@example.com", "super-secret-pw");

    let outcome = h
        .service
        .login(
            "2.2.2.2",
            Some("grace@example.com".to_string()),
            Some("super-secret-pw".to_string()),
        )
        .await
        .unwrap();

    let principal = h.service.authenticate(&outcome.token).await.unwrap();

    match h.service.whoami(&principal).await.unwrap() {
        Whoami::Session(session) => assert_eq!(session.profile.email, "grace@example.com"),
        Whoami::Profile { .. } => panic!("session snapshot should win right after login"),
    }

    // Drop the session snapshot: whoami falls back to the profile path,
    // missing once and hitting afterwards.
    h.store
        .del(&[CacheKey::UserSession(principal.user_id).to_string()])
        .await
        .unwrap();

    match h.service.whoami(&principal).await.unwrap() {
        Whoami::Profile { data, lookup } => {
            assert_eq!(data.email, "grace@example.com");
            assert!(!lookup.from_cache());
        }
        Whoami::Session(_) => panic!("session snapshot was deleted"),
    }
    match h.service.whoami(&principal).await.unwrap() {
        Whoami::Profile { lookup, .. } => assert!(lookup.from_cache()),
        Whoami::Session(_) => panic!("session snapshot was deleted"),
    }

    // Logout revokes the token outright.
    h.service.logout(&principal).await.unwrap();
    let err = h
        .service
        .authenticate(&outcome.token)
        .await
        .expect_err("revoked token must not authenticate");
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn fourth_registration_from_one_ip_is_rejected() {
    let h = harness();

    for n in 0..3 {
        h.service
            .register("9.9.9.9", register_command(&format!("user{n}@example.com")))
            .await
            .expect("first three registrations pass");
    }

    let result = h
        .service
        .register("9.9.9.9", register_command("user4@example.com"))
        .await;
    match result {
        Err(AuthError::RateLimited { retry_after_secs }) => {
            assert_eq!(retry_after_secs, 3600);
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn register_then_validate_activates_the_account() {
    let h = harness();

    let user = h
        .service
        .register("3.3.3.3", register_command("new@example.com"))
        .await
        .unwrap();

    let code = h
        .users
        .validation_code_for("new@example.com")
        .expect("registration stores a validation code");

    h.service.validate_account(&code).await.unwrap();

    let account = h.users.find_account(user.id).await.unwrap().unwrap();
    assert!(account.is_verified);
    assert_eq!(account.status, AccountStatus::Active);

    // The code is single-use.
    assert!(matches!(
        h.service.validate_account(&code).await,
        Err(AuthError::NotFound)
    ));
}

#[tokio::test]
async fn forgot_password_is_generic_past_the_email_window() {
    let h = harness();
    h.users.seed_user("kay@example.com", "super-secret-pw");

    let first = h
        .service
        .forgot_password("4.4.4.4", Some("kay@example.com".to_string()))
        .await
        .unwrap();
    assert_eq!(
        first,
        portico::application::auth::ForgotPasswordOutcome::Sent
    );

    // Second request inside five minutes: suppressed, not 429.
    let second = h
        .service
        .forgot_password("4.4.4.4", Some("kay@example.com".to_string()))
        .await
        .unwrap();
    assert_eq!(
        second,
        portico::application::auth::ForgotPasswordOutcome::Suppressed
    );

    // Unknown addresses are indistinguishable from throttled ones.
    let unknown = h
        .service
        .forgot_password("4.4.4.4", Some("ghost@example.com".to_string()))
        .await
        .unwrap();
    assert_eq!(
        unknown,
        portico::application::auth::ForgotPasswordOutcome::Suppressed
    );
}
