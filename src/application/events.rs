//! Event service.
//!
//! The three list views (`all`, `published`, `upcoming`) are cached under
//! separate keys with lifetimes matched to how quickly each goes stale;
//! every event write drops all three.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::models::EventPublic;
use crate::application::repos::{CreateEventParams, EventsRepo, RepoError, UpdateEventParams};
use crate::cache::{
    Cache, CacheKey, Decision, Invalidator, Lookup, Mutation, RateLimitPolicy, RateLimiter,
    StoreError, policies, ttl,
};
use crate::domain::types::EventStatus;

const UPCOMING_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("event not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EventError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct CreateEventCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub subject_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub status: Option<EventStatus>,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEventCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub subject_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub status: Option<EventStatus>,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventsRepo>,
    cache: Cache,
    limiter: RateLimiter,
    invalidator: Invalidator,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventsRepo>,
        cache: Cache,
        limiter: RateLimiter,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            events,
            cache,
            limiter,
            invalidator,
        }
    }

    pub async fn list(&self, client_ip: &str) -> Result<(Vec<EventPublic>, Lookup), EventError> {
        self.gate(&policies::EVENTS_LIST, client_ip).await?;

        let events = self.events.clone();
        self.cache
            .read_through(&CacheKey::EventsAll, ttl::EVENTS_ALL, || async move {
                let records = events.list_all().await?;
                Ok::<_, EventError>(records.into_iter().map(EventPublic::from).collect::<Vec<_>>())
            })
            .await
    }

    pub async fn get(
        &self,
        client_ip: &str,
        id: Uuid,
    ) -> Result<(EventPublic, Lookup), EventError> {
        self.gate(&policies::EVENT_SHOW, client_ip).await?;

        let events = self.events.clone();
        let (found, lookup) = self
            .cache
            .read_through_opt(&CacheKey::Event(id), ttl::EVENT, || async move {
                Ok::<_, EventError>(events.find_by_id(id).await?.map(EventPublic::from))
            })
            .await?;

        match found {
            Some(event) => Ok((event, lookup)),
            None => Err(EventError::NotFound),
        }
    }

    pub async fn list_published(
        &self,
        client_ip: &str,
    ) -> Result<(Vec<EventPublic>, Lookup), EventError> {
        self.gate(&policies::EVENTS_PUBLISHED, client_ip).await?;

        let events = self.events.clone();
        self.cache
            .read_through(
                &CacheKey::EventsPublished,
                ttl::EVENTS_PUBLISHED,
                || async move {
                    let records = events.list_published().await?;
                    Ok::<_, EventError>(
                        records.into_iter().map(EventPublic::from).collect::<Vec<_>>(),
                    )
                },
            )
            .await
    }

    pub async fn list_upcoming(
        &self,
        client_ip: &str,
    ) -> Result<(Vec<EventPublic>, Lookup), EventError> {
        self.gate(&policies::EVENTS_UPCOMING, client_ip).await?;

        let events = self.events.clone();
        self.cache
            .read_through(
                &CacheKey::EventsUpcoming,
                ttl::EVENTS_UPCOMING,
                || async move {
                    let records = events
                        .list_upcoming(OffsetDateTime::now_utc(), UPCOMING_LIMIT)
                        .await?;
                    Ok::<_, EventError>(
                        records.into_iter().map(EventPublic::from).collect::<Vec<_>>(),
                    )
                },
            )
            .await
    }

    pub async fn create(
        &self,
        created_by: Uuid,
        command: CreateEventCommand,
    ) -> Result<EventPublic, EventError> {
        self.gate_user(&policies::CREATE_EVENT, created_by).await?;

        let title = match command.title {
            Some(title) if !title.trim().is_empty() => title,
            _ => return Err(EventError::validation("title is required")),
        };
        let start_date = command
            .start_date
            .ok_or_else(|| EventError::validation("startDate is required"))?;

        let event = self
            .events
            .create(CreateEventParams {
                title,
                description: command.description,
                start_date,
                end_date: command.end_date,
                location: command.location,
                subject_id: command.subject_id,
                post_id: command.post_id,
                status: command.status.unwrap_or(EventStatus::Draft),
                published_at: command.published_at,
                created_by,
            })
            .await?;

        self.invalidator.invalidate(Mutation::EventCreated).await;

        Ok(EventPublic::from(event))
    }

    pub async fn update(
        &self,
        actor: Uuid,
        id: Uuid,
        command: UpdateEventCommand,
    ) -> Result<EventPublic, EventError> {
        self.gate_user(&policies::UPDATE_EVENT, actor).await?;

        if self.events.find_by_id(id).await?.is_none() {
            return Err(EventError::NotFound);
        }

        let event = self
            .events
            .update(UpdateEventParams {
                id,
                title: command.title,
                description: command.description,
                start_date: command.start_date,
                end_date: command.end_date,
                location: command.location,
                subject_id: command.subject_id,
                post_id: command.post_id,
                status: command.status,
                published_at: command.published_at,
            })
            .await?;

        self.invalidator
            .invalidate(Mutation::EventUpdated { id })
            .await;

        Ok(EventPublic::from(event))
    }

    pub async fn delete(&self, actor: Uuid, id: Uuid) -> Result<(), EventError> {
        self.gate_user(&policies::DELETE_EVENT, actor).await?;

        if self.events.find_by_id(id).await?.is_none() {
            return Err(EventError::NotFound);
        }

        self.events.delete(id).await?;

        self.invalidator
            .invalidate(Mutation::EventDeleted { id })
            .await;

        Ok(())
    }

    pub async fn publish(&self, actor: Uuid, id: Uuid) -> Result<EventPublic, EventError> {
        self.gate_user(&policies::PUBLISH_EVENT, actor).await?;

        if self.events.find_by_id(id).await?.is_none() {
            return Err(EventError::NotFound);
        }

        let event = self.events.publish(id, OffsetDateTime::now_utc()).await?;

        self.invalidator.invalidate(Mutation::EventPublished).await;

        Ok(EventPublic::from(event))
    }

    async fn gate(&self, policy: &RateLimitPolicy, identity: &str) -> Result<(), EventError> {
        match self.limiter.check(policy, identity).await? {
            Decision::Allowed => Ok(()),
            Decision::Rejected { retry_after_secs } => {
                Err(EventError::RateLimited { retry_after_secs })
            }
        }
    }

    async fn gate_user(&self, policy: &RateLimitPolicy, user_id: Uuid) -> Result<(), EventError> {
        self.gate(policy, &user_id.to_string()).await
    }
}
