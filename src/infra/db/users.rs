use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::models::ProfileData;
use crate::application::repos::{
    CreateUserAccountParams, CreateUserParams, PatchUserParams, RepoError, UpdateUserParams,
    UsersRepo,
};
use crate::domain::entities::{UserAccountRecord, UserRecord};
use crate::domain::types::AccountStatus;

use super::{MySqlRepositories, map_sqlx_error, parse_uuid};

const USER_COLUMNS: &str =
    "id, full_name, email, password_hash, validation_code, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    full_name: String,
    email: String,
    password_hash: String,
    validation_code: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            full_name: row.full_name,
            email: row.email,
            password_hash: row.password_hash,
            validation_code: row.validation_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserAccountRow {
    user_id: String,
    is_verified: bool,
    status: String,
    dob: Date,
    gender: String,
    avatar_url: String,
    phone_number: String,
    landline_number: Option<String>,
    country_code: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserAccountRow> for UserAccountRecord {
    type Error = RepoError;

    fn try_from(row: UserAccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: parse_uuid(&row.user_id)?,
            is_verified: row.is_verified,
            status: row
                .status
                .parse::<AccountStatus>()
                .map_err(|err| RepoError::integrity(err.to_string()))?,
            dob: row.dob,
            gender: row.gender,
            avatar_url: row.avatar_url,
            phone_number: row.phone_number,
            landline_number: row.landline_number,
            country_code: row.country_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl MySqlRepositories {
    async fn fetch_user(&self, id: &str) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        UserRecord::try_from(row)
    }
}

#[async_trait]
impl UsersRepo for MySqlRepositories {
    async fn list_all(&self) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_validation_code(
        &self,
        code: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE validation_code = ?"
        ))
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn create(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO users (id, full_name, email, password_hash, validation_code) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&params.full_name)
        .bind(&params.email)
        .bind(&params.password_hash)
        .bind(&params.validation_code)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.fetch_user(&id).await
    }

    async fn update(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let id = params.id.to_string();

        let result = sqlx::query("UPDATE users SET full_name = ?, email = ? WHERE id = ?")
            .bind(&params.full_name)
            .bind(&params.email)
            .bind(&id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.fetch_user(&id).await
    }

    async fn patch(&self, id: Uuid, params: PatchUserParams) -> Result<UserRecord, RepoError> {
        let id = id.to_string();

        if params.full_name.is_some() || params.email.is_some() || params.password_hash.is_some() {
            let mut qb = QueryBuilder::new("UPDATE users SET ");
            let mut fields = qb.separated(", ");
            if let Some(full_name) = &params.full_name {
                fields.push("full_name = ").push_bind_unseparated(full_name);
            }
            if let Some(email) = &params.email {
                fields.push("email = ").push_bind_unseparated(email);
            }
            if let Some(password_hash) = &params.password_hash {
                fields
                    .push("password_hash = ")
                    .push_bind_unseparated(password_hash);
            }
            qb.push(" WHERE id = ").push_bind(&id);

            qb.build()
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        }

        self.fetch_user(&id).await
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepoError> {
        sqlx::query("UPDATE users SET password_hash = ?, validation_code = NULL WHERE id = ?")
            .bind(password_hash)
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn set_validation_code(&self, id: Uuid, code: Option<&str>) -> Result<(), RepoError> {
        sqlx::query("UPDATE users SET validation_code = ? WHERE id = ?")
            .bind(code)
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn create_account(
        &self,
        params: CreateUserAccountParams,
    ) -> Result<UserAccountRecord, RepoError> {
        let user_id = params.user_id.to_string();

        sqlx::query(
            "INSERT INTO user_accounts \
             (user_id, is_verified, status, dob, gender, avatar_url, phone_number, \
              landline_number, country_code) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user_id)
        .bind(params.is_verified)
        .bind(params.status.as_str())
        .bind(params.dob)
        .bind(&params.gender)
        .bind(&params.avatar_url)
        .bind(&params.phone_number)
        .bind(&params.landline_number)
        .bind(&params.country_code)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, UserAccountRow>(
            "SELECT user_id, is_verified, status, dob, gender, avatar_url, phone_number, \
                    landline_number, country_code, created_at, updated_at \
             FROM user_accounts WHERE user_id = ?",
        )
        .bind(&user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        UserAccountRecord::try_from(row)
    }

    async fn find_account(&self, user_id: Uuid) -> Result<Option<UserAccountRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserAccountRow>(
            "SELECT user_id, is_verified, status, dob, gender, avatar_url, phone_number, \
                    landline_number, country_code, created_at, updated_at \
             FROM user_accounts WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserAccountRecord::try_from).transpose()
    }

    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE user_accounts SET status = ? WHERE user_id = ?")
            .bind(status.as_str())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn mark_account_verified(&self, user_id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE user_accounts SET is_verified = TRUE WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<Option<ProfileData>, RepoError> {
        #[derive(sqlx::FromRow)]
        struct ProfileRow {
            id: String,
            full_name: String,
            email: String,
            status: String,
            gender: String,
            avatar_url: String,
            dob: Date,
            phone_number: String,
            landline_number: Option<String>,
            country_code: String,
        }

        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT u.id, u.full_name, u.email, a.status, a.gender, a.avatar_url, a.dob, \
                    a.phone_number, a.landline_number, a.country_code \
             FROM users u \
             INNER JOIN user_accounts a ON a.user_id = u.id \
             WHERE u.id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| {
            Ok(ProfileData {
                id: parse_uuid(&row.id)?,
                full_name: row.full_name,
                email: row.email,
                status: row
                    .status
                    .parse::<AccountStatus>()
                    .map_err(|err| RepoError::integrity(err.to_string()))?,
                gender: row.gender,
                avatar_url: row.avatar_url,
                dob: row.dob.to_string(),
                phone_number: row.phone_number,
                landline_number: row.landline_number,
                country_code: row.country_code,
            })
        })
        .transpose()
    }
}
