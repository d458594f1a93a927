use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::models::{
    CommentWithAuthor, PostWithRelations, SubjectWithPosts, TagPublic, UserPublic,
};
use crate::application::repos::{
    BlogRepo, CreateCommentParams, CreatePostParams, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};

use super::{MySqlRepositories, map_sqlx_error, parse_uuid};

const POST_COLUMNS: &str =
    "p.id, p.subject_id, p.author_id, p.title, p.content, p.cover_image, p.created_at, p.updated_at";
const AUTHOR_COLUMNS: &str = "u.full_name AS author_full_name, u.email AS author_email, \
     u.created_at AS author_created_at, u.updated_at AS author_updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: String,
    subject_id: String,
    author_id: String,
    title: String,
    content: String,
    cover_image: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            subject_id: parse_uuid(&row.subject_id)?,
            author_id: parse_uuid(&row.author_id)?,
            title: row.title,
            content: row.content,
            cover_image: row.cover_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A post with its author columns joined in; tags are attached separately.
#[derive(sqlx::FromRow)]
struct PostAuthorRow {
    id: String,
    subject_id: String,
    author_id: String,
    title: String,
    content: String,
    cover_image: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_full_name: Option<String>,
    author_email: Option<String>,
    author_created_at: Option<OffsetDateTime>,
    author_updated_at: Option<OffsetDateTime>,
}

impl PostAuthorRow {
    fn into_post(self, tags: Vec<TagPublic>) -> Result<PostWithRelations, RepoError> {
        let author_id = parse_uuid(&self.author_id)?;
        let author = match (
            self.author_full_name,
            self.author_email,
            self.author_created_at,
            self.author_updated_at,
        ) {
            (Some(full_name), Some(email), Some(created_at), Some(updated_at)) => {
                Some(UserPublic {
                    id: author_id,
                    full_name,
                    email,
                    created_at,
                    updated_at,
                })
            }
            _ => None,
        };

        Ok(PostWithRelations {
            id: parse_uuid(&self.id)?,
            subject_id: parse_uuid(&self.subject_id)?,
            author_id,
            title: self.title,
            content: self.content,
            cover_image: self.cover_image,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tags,
            author,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: String,
    name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<TagRow> for TagRecord {
    type Error = RepoError;

    fn try_from(row: TagRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: String,
    tag_id: String,
    tag_name: String,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    post_id: String,
    author_id: String,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CommentRow> for CommentRecord {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            post_id: parse_uuid(&row.post_id)?,
            author_id: parse_uuid(&row.author_id)?,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn tag_map(rows: Vec<PostTagRow>) -> Result<HashMap<String, Vec<TagPublic>>, RepoError> {
    let mut by_post: HashMap<String, Vec<TagPublic>> = HashMap::new();
    for row in rows {
        by_post.entry(row.post_id).or_default().push(TagPublic {
            id: parse_uuid(&row.tag_id)?,
            name: row.tag_name,
        });
    }
    Ok(by_post)
}

fn assemble_posts(
    rows: Vec<PostAuthorRow>,
    mut tags_by_post: HashMap<String, Vec<TagPublic>>,
) -> Result<Vec<PostWithRelations>, RepoError> {
    rows.into_iter()
        .map(|row| {
            let tags = tags_by_post.remove(&row.id).unwrap_or_default();
            row.into_post(tags)
        })
        .collect()
}

impl MySqlRepositories {
    async fn fetch_post(&self, id: &str) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        PostRecord::try_from(row)
    }
}

#[async_trait]
impl BlogRepo for MySqlRepositories {
    async fn list_subjects_with_posts(&self) -> Result<Vec<SubjectWithPosts>, RepoError> {
        #[derive(sqlx::FromRow)]
        struct SubjectRow {
            id: String,
            name: String,
            description: Option<String>,
        }

        let subjects = sqlx::query_as::<_, SubjectRow>(
            "SELECT id, name, description FROM subjects ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let posts = sqlx::query_as::<_, PostAuthorRow>(&format!(
            "SELECT {POST_COLUMNS}, {AUTHOR_COLUMNS} \
             FROM posts p \
             LEFT JOIN users u ON u.id = p.author_id \
             ORDER BY p.created_at DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let tag_rows = sqlx::query_as::<_, PostTagRow>(
            "SELECT pt.post_id, t.id AS tag_id, t.name AS tag_name \
             FROM post_tags pt \
             INNER JOIN tags t ON t.id = pt.tag_id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let tags_by_post = tag_map(tag_rows)?;

        let mut posts_by_subject: HashMap<String, Vec<PostWithRelations>> = HashMap::new();
        for row in posts {
            let subject_key = row.subject_id.clone();
            let tags = tags_by_post.get(&row.id).cloned().unwrap_or_default();
            posts_by_subject
                .entry(subject_key)
                .or_default()
                .push(row.into_post(tags)?);
        }

        subjects
            .into_iter()
            .map(|subject| {
                let posts = posts_by_subject.remove(&subject.id).unwrap_or_default();
                Ok(SubjectWithPosts {
                    id: parse_uuid(&subject.id)?,
                    name: subject.name,
                    description: subject.description,
                    posts,
                })
            })
            .collect()
    }

    async fn subject_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM subjects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.is_some())
    }

    async fn list_posts_by_subject(
        &self,
        subject_id: Uuid,
    ) -> Result<Vec<PostWithRelations>, RepoError> {
        let subject_id = subject_id.to_string();

        let posts = sqlx::query_as::<_, PostAuthorRow>(&format!(
            "SELECT {POST_COLUMNS}, {AUTHOR_COLUMNS} \
             FROM posts p \
             LEFT JOIN users u ON u.id = p.author_id \
             WHERE p.subject_id = ? \
             ORDER BY p.created_at DESC"
        ))
        .bind(&subject_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let tag_rows = sqlx::query_as::<_, PostTagRow>(
            "SELECT pt.post_id, t.id AS tag_id, t.name AS tag_name \
             FROM post_tags pt \
             INNER JOIN tags t ON t.id = pt.tag_id \
             INNER JOIN posts p ON p.id = pt.post_id \
             WHERE p.subject_id = ?",
        )
        .bind(&subject_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        assemble_posts(posts, tag_map(tag_rows)?)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::try_from).transpose()
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id = params.id.to_string();

        sqlx::query(
            "INSERT INTO posts (id, subject_id, author_id, title, content, cover_image) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(params.subject_id.to_string())
        .bind(params.author_id.to_string())
        .bind(&params.title)
        .bind(&params.content)
        .bind(&params.cover_image)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.fetch_post(&id).await
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let id = params.id.to_string();

        if params.title.is_some() || params.content.is_some() || params.cover_image.is_some() {
            let mut qb = QueryBuilder::new("UPDATE posts SET ");
            let mut fields = qb.separated(", ");
            if let Some(title) = &params.title {
                fields.push("title = ").push_bind_unseparated(title);
            }
            if let Some(content) = &params.content {
                fields.push("content = ").push_bind_unseparated(content);
            }
            if let Some(cover_image) = &params.cover_image {
                fields
                    .push("cover_image = ")
                    .push_bind_unseparated(cover_image);
            }
            qb.push(" WHERE id = ").push_bind(&id);

            qb.build()
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        }

        self.fetch_post(&id).await
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError> {
        #[derive(sqlx::FromRow)]
        struct CommentAuthorRow {
            id: String,
            post_id: String,
            author_id: String,
            content: String,
            created_at: OffsetDateTime,
            author_full_name: Option<String>,
            author_email: Option<String>,
            author_created_at: Option<OffsetDateTime>,
            author_updated_at: Option<OffsetDateTime>,
        }

        let rows = sqlx::query_as::<_, CommentAuthorRow>(&format!(
            "SELECT c.id, c.post_id, c.author_id, c.content, c.created_at, {AUTHOR_COLUMNS} \
             FROM comments c \
             LEFT JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ? \
             ORDER BY c.created_at ASC"
        ))
        .bind(post_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let author_id = parse_uuid(&row.author_id)?;
                let author = match (
                    row.author_full_name,
                    row.author_email,
                    row.author_created_at,
                    row.author_updated_at,
                ) {
                    (Some(full_name), Some(email), Some(created_at), Some(updated_at)) => {
                        Some(UserPublic {
                            id: author_id,
                            full_name,
                            email,
                            created_at,
                            updated_at,
                        })
                    }
                    _ => None,
                };

                Ok(CommentWithAuthor {
                    id: parse_uuid(&row.id)?,
                    post_id: parse_uuid(&row.post_id)?,
                    author_id,
                    content: row.content,
                    created_at: row.created_at,
                    author,
                })
            })
            .collect()
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let id = params.id.to_string();

        sqlx::query("INSERT INTO comments (id, post_id, author_id, content) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(params.post_id.to_string())
            .bind(params.author_id.to_string())
            .bind(&params.content)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, author_id, content, created_at, updated_at \
             FROM comments WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        CommentRecord::try_from(row)
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, created_at, updated_at FROM tags ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(TagRecord::try_from).collect()
    }

    async fn find_tag(&self, id: Uuid) -> Result<Option<TagRecord>, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, created_at, updated_at FROM tags WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(TagRecord::try_from).transpose()
    }

    async fn list_posts_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostWithRelations>, RepoError> {
        let tag_id = tag_id.to_string();

        let posts = sqlx::query_as::<_, PostAuthorRow>(&format!(
            "SELECT {POST_COLUMNS}, {AUTHOR_COLUMNS} \
             FROM posts p \
             INNER JOIN post_tags pt ON pt.post_id = p.id \
             LEFT JOIN users u ON u.id = p.author_id \
             WHERE pt.tag_id = ? \
             ORDER BY p.created_at DESC"
        ))
        .bind(&tag_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let tag_rows = sqlx::query_as::<_, PostTagRow>(
            "SELECT pt.post_id, t.id AS tag_id, t.name AS tag_name \
             FROM post_tags pt \
             INNER JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id IN (SELECT post_id FROM post_tags WHERE tag_id = ?)",
        )
        .bind(&tag_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        assemble_posts(posts, tag_map(tag_rows)?)
    }
}
