//! Blog service: subjects, posts, tags, comments.
//!
//! Reads are rate limited per client IP and served read-through; writes are
//! rate limited per authenticated user and feed the invalidation table.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::models::{
    CommentPublic, CommentWithAuthor, PostPublic, PostWithRelations, SubjectWithPosts, TagPublic,
};
use crate::application::repos::{
    BlogRepo, CreateCommentParams, CreatePostParams, RepoError, UpdatePostParams,
};
use crate::cache::{
    Cache, CacheKey, Decision, Invalidator, Lookup, Mutation, RateLimitPolicy, RateLimiter,
    StoreError, policies, ttl,
};

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("resource not found")]
    NotFound,
    #[error("not the author of this resource")]
    Forbidden,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BlogError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePostCommand {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Clone)]
pub struct BlogService {
    blog: Arc<dyn BlogRepo>,
    cache: Cache,
    limiter: RateLimiter,
    invalidator: Invalidator,
}

impl BlogService {
    pub fn new(
        blog: Arc<dyn BlogRepo>,
        cache: Cache,
        limiter: RateLimiter,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            blog,
            cache,
            limiter,
            invalidator,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn list_subjects(
        &self,
        client_ip: &str,
    ) -> Result<(Vec<SubjectWithPosts>, Lookup), BlogError> {
        self.gate(&policies::BLOG_SUBJECTS, client_ip).await?;

        let blog = self.blog.clone();
        self.cache
            .read_through(
                &CacheKey::BlogSubjectsAll,
                ttl::BLOG_SUBJECTS,
                || async move { Ok::<_, BlogError>(blog.list_subjects_with_posts().await?) },
            )
            .await
    }

    pub async fn list_posts_by_subject(
        &self,
        client_ip: &str,
        subject_id: Uuid,
    ) -> Result<(Vec<PostWithRelations>, Lookup), BlogError> {
        self.gate(&policies::BLOG_POSTS_BY_SUBJECT, client_ip).await?;

        let blog = self.blog.clone();
        self.cache
            .read_through(
                &CacheKey::SubjectPosts(subject_id),
                ttl::SUBJECT_POSTS,
                || async move { Ok::<_, BlogError>(blog.list_posts_by_subject(subject_id).await?) },
            )
            .await
    }

    pub async fn list_comments(
        &self,
        client_ip: &str,
        post_id: Uuid,
    ) -> Result<(Vec<CommentWithAuthor>, Lookup), BlogError> {
        self.gate(&policies::BLOG_COMMENTS, client_ip).await?;

        let blog = self.blog.clone();
        self.cache
            .read_through(
                &CacheKey::PostComments(post_id),
                ttl::POST_COMMENTS,
                || async move { Ok::<_, BlogError>(blog.list_comments(post_id).await?) },
            )
            .await
    }

    pub async fn list_tags(&self, client_ip: &str) -> Result<(Vec<TagPublic>, Lookup), BlogError> {
        self.gate(&policies::BLOG_TAGS, client_ip).await?;

        let blog = self.blog.clone();
        self.cache
            .read_through(&CacheKey::BlogTagsAll, ttl::TAGS_ALL, || async move {
                let tags = blog.list_tags().await?;
                Ok::<_, BlogError>(tags.into_iter().map(TagPublic::from).collect::<Vec<_>>())
            })
            .await
    }

    pub async fn list_posts_by_tag(
        &self,
        client_ip: &str,
        tag_id: Uuid,
    ) -> Result<(Vec<PostWithRelations>, Lookup), BlogError> {
        self.gate(&policies::BLOG_POSTS_BY_TAG, client_ip).await?;

        if self.blog.find_tag(tag_id).await?.is_none() {
            return Err(BlogError::NotFound);
        }

        let blog = self.blog.clone();
        self.cache
            .read_through(
                &CacheKey::TagPosts(tag_id),
                ttl::TAG_POSTS,
                || async move { Ok::<_, BlogError>(blog.list_posts_by_tag(tag_id).await?) },
            )
            .await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn create_post(
        &self,
        author_id: Uuid,
        subject_id: Uuid,
        command: CreatePostCommand,
    ) -> Result<PostPublic, BlogError> {
        self.gate_user(&policies::CREATE_POST, author_id).await?;

        let title = required(command.title, "title")?;
        let content = required(command.content, "content")?;

        if !self.blog.subject_exists(subject_id).await? {
            return Err(BlogError::NotFound);
        }

        let post = self
            .blog
            .create_post(CreatePostParams {
                id: Uuid::now_v7(),
                subject_id,
                author_id,
                title,
                content,
                cover_image: command.cover_image,
            })
            .await?;

        self.invalidator
            .invalidate(Mutation::PostCreated { subject_id })
            .await;

        Ok(PostPublic::from(post))
    }

    pub async fn update_post(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        command: UpdatePostCommand,
    ) -> Result<PostPublic, BlogError> {
        self.gate_user(&policies::UPDATE_POST, author_id).await?;

        let post = self
            .blog
            .find_post(post_id)
            .await?
            .ok_or(BlogError::NotFound)?;
        if post.author_id != author_id {
            return Err(BlogError::Forbidden);
        }

        let updated = self
            .blog
            .update_post(UpdatePostParams {
                id: post_id,
                title: command.title,
                content: command.content,
                cover_image: command.cover_image,
            })
            .await?;

        self.invalidator
            .invalidate(Mutation::PostUpdated {
                id: post_id,
                subject_id: post.subject_id,
            })
            .await;

        Ok(PostPublic::from(updated))
    }

    pub async fn delete_post(&self, author_id: Uuid, post_id: Uuid) -> Result<(), BlogError> {
        self.gate_user(&policies::DELETE_POST, author_id).await?;

        let post = self
            .blog
            .find_post(post_id)
            .await?
            .ok_or(BlogError::NotFound)?;
        if post.author_id != author_id {
            return Err(BlogError::Forbidden);
        }

        let subject_id = post.subject_id;
        self.blog.delete_post(post_id).await?;

        self.invalidator
            .invalidate(Mutation::PostDeleted {
                id: post_id,
                subject_id,
            })
            .await;

        Ok(())
    }

    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        content: Option<String>,
    ) -> Result<CommentPublic, BlogError> {
        self.gate_user(&policies::ADD_COMMENT, author_id).await?;

        let content = required(content, "content")?;

        if self.blog.find_post(post_id).await?.is_none() {
            return Err(BlogError::NotFound);
        }

        let comment = self
            .blog
            .create_comment(CreateCommentParams {
                id: Uuid::now_v7(),
                post_id,
                author_id,
                content,
            })
            .await?;

        self.invalidator
            .invalidate(Mutation::CommentCreated { post_id })
            .await;

        Ok(CommentPublic::from(comment))
    }

    async fn gate(&self, policy: &RateLimitPolicy, identity: &str) -> Result<(), BlogError> {
        match self.limiter.check(policy, identity).await? {
            Decision::Allowed => Ok(()),
            Decision::Rejected { retry_after_secs } => {
                Err(BlogError::RateLimited { retry_after_secs })
            }
        }
    }

    async fn gate_user(&self, policy: &RateLimitPolicy, user_id: Uuid) -> Result<(), BlogError> {
        self.gate(policy, &user_id.to_string()).await
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, BlogError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BlogError::validation(format!("{field} is required"))),
    }
}
