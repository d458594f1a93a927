use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateEventParams, EventsRepo, RepoError, UpdateEventParams};
use crate::domain::entities::EventRecord;
use crate::domain::types::EventStatus;

use super::{MySqlRepositories, map_sqlx_error, parse_uuid};

const EVENT_COLUMNS: &str = "id, title, description, start_date, end_date, location, subject_id, \
     post_id, status, published_at, created_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    title: String,
    description: Option<String>,
    start_date: OffsetDateTime,
    end_date: Option<OffsetDateTime>,
    location: Option<String>,
    subject_id: Option<String>,
    post_id: Option<String>,
    status: String,
    published_at: Option<OffsetDateTime>,
    created_by: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = RepoError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            title: row.title,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            location: row.location,
            subject_id: row.subject_id.as_deref().map(parse_uuid).transpose()?,
            post_id: row.post_id.as_deref().map(parse_uuid).transpose()?,
            status: row
                .status
                .parse::<EventStatus>()
                .map_err(|err| RepoError::integrity(err.to_string()))?,
            published_at: row.published_at,
            created_by: parse_uuid(&row.created_by)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl MySqlRepositories {
    async fn fetch_event(&self, id: &str) -> Result<EventRecord, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        EventRecord::try_from(row)
    }
}

#[async_trait]
impl EventsRepo for MySqlRepositories {
    async fn list_all(&self) -> Result<Vec<EventRecord>, RepoError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY start_date ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(EventRecord::try_from).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(EventRecord::try_from).transpose()
    }

    async fn create(&self, params: CreateEventParams) -> Result<EventRecord, RepoError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO events \
             (id, title, description, start_date, end_date, location, subject_id, post_id, \
              status, published_at, created_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&params.title)
        .bind(&params.description)
        .bind(params.start_date)
        .bind(params.end_date)
        .bind(&params.location)
        .bind(params.subject_id.map(|value| value.to_string()))
        .bind(params.post_id.map(|value| value.to_string()))
        .bind(params.status.as_str())
        .bind(params.published_at)
        .bind(params.created_by.to_string())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.fetch_event(&id).await
    }

    async fn update(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError> {
        let id = params.id.to_string();

        let has_changes = params.title.is_some()
            || params.description.is_some()
            || params.start_date.is_some()
            || params.end_date.is_some()
            || params.location.is_some()
            || params.subject_id.is_some()
            || params.post_id.is_some()
            || params.status.is_some()
            || params.published_at.is_some();

        if has_changes {
            let mut qb = QueryBuilder::new("UPDATE events SET ");
            let mut fields = qb.separated(", ");
            if let Some(title) = &params.title {
                fields.push("title = ").push_bind_unseparated(title);
            }
            if let Some(description) = &params.description {
                fields
                    .push("description = ")
                    .push_bind_unseparated(description);
            }
            if let Some(start_date) = params.start_date {
                fields
                    .push("start_date = ")
                    .push_bind_unseparated(start_date);
            }
            if let Some(end_date) = params.end_date {
                fields.push("end_date = ").push_bind_unseparated(end_date);
            }
            if let Some(location) = &params.location {
                fields.push("location = ").push_bind_unseparated(location);
            }
            if let Some(subject_id) = params.subject_id {
                fields
                    .push("subject_id = ")
                    .push_bind_unseparated(subject_id.to_string());
            }
            if let Some(post_id) = params.post_id {
                fields
                    .push("post_id = ")
                    .push_bind_unseparated(post_id.to_string());
            }
            if let Some(status) = params.status {
                fields.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(published_at) = params.published_at {
                fields
                    .push("published_at = ")
                    .push_bind_unseparated(published_at);
            }
            qb.push(" WHERE id = ").push_bind(&id);

            qb.build()
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        }

        self.fetch_event(&id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn publish(&self, id: Uuid, at: OffsetDateTime) -> Result<EventRecord, RepoError> {
        let id = id.to_string();

        let result = sqlx::query("UPDATE events SET status = ?, published_at = ? WHERE id = ?")
            .bind(EventStatus::Published.as_str())
            .bind(at)
            .bind(&id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.fetch_event(&id).await
    }

    async fn list_published(&self) -> Result<Vec<EventRecord>, RepoError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE status = ? \
             ORDER BY published_at DESC"
        ))
        .bind(EventStatus::Published.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(EventRecord::try_from).collect()
    }

    async fn list_upcoming(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<EventRecord>, RepoError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE status = ? AND start_date > ? \
             ORDER BY start_date ASC \
             LIMIT ?"
        ))
        .bind(EventStatus::Published.as_str())
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(EventRecord::try_from).collect()
    }
}
