use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{AccessTokensRepo, CreateAccessTokenParams, RepoError};
use crate::domain::entities::AccessTokenRecord;

use super::{MySqlRepositories, map_sqlx_error, parse_uuid};

const TOKEN_COLUMNS: &str =
    "id, user_id, prefix, hashed_secret, created_at, last_used_at, revoked_at";

#[derive(sqlx::FromRow)]
struct AccessTokenRow {
    id: String,
    user_id: String,
    prefix: String,
    hashed_secret: Vec<u8>,
    created_at: OffsetDateTime,
    last_used_at: Option<OffsetDateTime>,
    revoked_at: Option<OffsetDateTime>,
}

impl TryFrom<AccessTokenRow> for AccessTokenRecord {
    type Error = RepoError;

    fn try_from(row: AccessTokenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        })
    }
}

#[async_trait]
impl AccessTokensRepo for MySqlRepositories {
    async fn create(
        &self,
        params: CreateAccessTokenParams,
    ) -> Result<AccessTokenRecord, RepoError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO access_tokens (id, user_id, prefix, hashed_secret) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(params.user_id.to_string())
        .bind(&params.prefix)
        .bind(&params.hashed_secret)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, AccessTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM access_tokens WHERE id = ?"
        ))
        .bind(&id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        AccessTokenRecord::try_from(row)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<AccessTokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, AccessTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM access_tokens WHERE prefix = ?"
        ))
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(AccessTokenRecord::try_from).transpose()
    }

    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query("UPDATE access_tokens SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
            .bind(at)
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_last_used(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query("UPDATE access_tokens SET last_used_at = ? WHERE id = ?")
            .bind(at)
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
