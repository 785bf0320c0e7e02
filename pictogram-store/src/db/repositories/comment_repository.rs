use chrono::Utc;
use rusqlite::OptionalExtension;

use pictogram_types::{Comment, CommentId, NewComment, PostId, UserId};

use crate::db::{parse_datetime, DbPool};
use crate::error::{is_foreign_key_violation, Result, StoreError};

/// Content store for comments. `likes_count` starts at zero and is only ever
/// written by the counter synchronizer.
pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a comment on an existing post by an existing user.
    pub fn create(&self, new_comment: &NewComment) -> Result<Comment> {
        if new_comment.text.is_empty() {
            return Err(StoreError::InvalidOperation(
                "comment text must not be empty".to_string(),
            ));
        }

        let conn = self.pool.get()?;
        if !exists(&conn, "users", new_comment.user_id.0)? {
            return Err(StoreError::not_found("user", new_comment.user_id.0));
        }
        if !exists(&conn, "posts", new_comment.post_id.0)? {
            return Err(StoreError::not_found("post", new_comment.post_id.0));
        }

        let created_at = Utc::now();
        let result = conn.execute(
            "INSERT INTO comments (user_id, post_id, comment, created_at, likes_count)
             VALUES (?, ?, ?, ?, 0)",
            (
                new_comment.user_id.0,
                new_comment.post_id.0,
                &new_comment.text,
                created_at.to_rfc3339(),
            ),
        );

        match result {
            Ok(_) => {
                let id = CommentId(conn.last_insert_rowid());
                tracing::debug!(
                    comment_id = id.0,
                    post_id = new_comment.post_id.0,
                    "Created comment"
                );
                Ok(Comment {
                    id,
                    user_id: new_comment.user_id,
                    post_id: new_comment.post_id,
                    comment: new_comment.text.clone(),
                    created_at,
                    likes_count: 0,
                })
            }
            // A referent vanished between the checks and the insert. SQLite
            // does not say which reference failed, so re-probe.
            Err(err) if is_foreign_key_violation(&err) => {
                Err(missing_referent(&conn, new_comment)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get a single comment by id, failing with `NotFound` if absent.
    pub fn get(&self, comment_id: CommentId) -> Result<Comment> {
        let conn = self.pool.get()?;
        let comment = conn
            .query_row(
                "SELECT id, user_id, post_id, comment, created_at, likes_count
                 FROM comments
                 WHERE id = ?",
                [comment_id.0],
                map_comment,
            )
            .optional()?;

        comment.ok_or_else(|| StoreError::not_found("comment", comment_id.0))
    }

    /// Get comments on a post in chronological order.
    pub fn on_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, post_id, comment, created_at, likes_count
             FROM comments
             WHERE post_id = ?
             ORDER BY created_at ASC, id ASC",
        )?;

        let comments = stmt
            .query_map([post_id.0], map_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(comments)
    }
}

fn exists(conn: &rusqlite::Connection, table: &str, id: i64) -> Result<bool> {
    let found: Option<bool> = conn
        .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?"), [id], |_| {
            Ok(true)
        })
        .optional()?;
    Ok(found.unwrap_or(false))
}

/// Name the referent a foreign key violation was about: the user if their
/// row is gone, otherwise the post.
fn missing_referent(conn: &rusqlite::Connection, new_comment: &NewComment) -> Result<StoreError> {
    if !exists(conn, "users", new_comment.user_id.0)? {
        return Ok(StoreError::not_found("user", new_comment.user_id.0));
    }
    Ok(StoreError::not_found("post", new_comment.post_id.0))
}

fn map_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        post_id: PostId(row.get(2)?),
        comment: row.get(3)?,
        created_at: parse_datetime(4, row.get::<_, String>(4)?)?,
        likes_count: row.get(5)?,
    })
}
