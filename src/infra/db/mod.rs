//! MySQL-backed repository implementations.

mod blog;
mod events;
mod tokens;
mod users;

use std::sync::Arc;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use uuid::Uuid;

use crate::application::repos::RepoError;

#[derive(Clone)]
pub struct MySqlRepositories {
    pool: Arc<MySqlPool>,
}

impl MySqlRepositories {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
        MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &MySqlPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }
}

/// Ids are stored as CHAR(36); a row that fails to parse is corrupt data,
/// not a caller error.
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(raw).map_err(|err| RepoError::integrity(format!("malformed uuid `{raw}`: {err}")))
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => RepoError::Duplicate {
            constraint: db_err.constraint().unwrap_or("unknown").to_string(),
        },
        _ => RepoError::from_persistence(err),
    }
}
