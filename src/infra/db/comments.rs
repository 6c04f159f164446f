use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{AddCommentParams, CommentsRepo, RepoError};
use crate::domain::entities::CommentRecord;

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.author_id, \
    u.username AS author_username, c.text, c.created_at";

#[derive(FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    author_username: String,
    text: String,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        CommentRecord {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            author_username: row.author_username,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c \
             INNER JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC"
        );
        let rows: Vec<CommentRow> = sqlx::query_as(&sql)
            .bind(post_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn add_comment(&self, params: AddCommentParams) -> Result<CommentRecord, RepoError> {
        let sql = format!(
            "WITH inserted AS (\
                 INSERT INTO comments (post_id, author_id, text) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, post_id, author_id, text, created_at\
             ) \
             SELECT {COMMENT_COLUMNS} FROM inserted c \
             INNER JOIN users u ON u.id = c.author_id"
        );
        let row: CommentRow = sqlx::query_as(&sql)
            .bind(params.post_id)
            .bind(params.author_id)
            .bind(&params.text)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(CommentRecord::from(row))
    }
}
