use chrono::Utc;
use rusqlite::OptionalExtension;

use pictogram_types::{NewPost, Post, PostId, UserId};

use crate::db::{parse_datetime, DbPool};
use crate::error::{is_foreign_key_violation, Result, StoreError};

const MAX_URL_LEN: usize = 250;
const MAX_LOCATION_LEN: usize = 120;

/// Content store for posts. Rows are immutable after creation except for the
/// cached like aggregate, which belongs to the counter synchronizer.
pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new post owned by an existing user.
    pub fn create(&self, new_post: &NewPost) -> Result<Post> {
        validate_new_post(new_post)?;

        let conn = self.pool.get()?;
        let user_exists: bool = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?",
                [new_post.user_id.0],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !user_exists {
            return Err(StoreError::not_found("user", new_post.user_id.0));
        }

        let created_at = Utc::now();
        let result = conn.execute(
            "INSERT INTO posts (user_id, url, text, created_at, location)
             VALUES (?, ?, ?, ?, ?)",
            (
                new_post.user_id.0,
                &new_post.url,
                &new_post.text,
                created_at.to_rfc3339(),
                new_post.location.as_deref(),
            ),
        );

        match result {
            Ok(_) => {
                let id = PostId(conn.last_insert_rowid());
                tracing::debug!(post_id = id.0, user_id = new_post.user_id.0, "Created post");
                Ok(Post {
                    id,
                    user_id: new_post.user_id,
                    url: new_post.url.clone(),
                    text: new_post.text.clone(),
                    created_at,
                    location: new_post.location.clone(),
                })
            }
            // The owning user vanished between the check and the insert.
            Err(err) if is_foreign_key_violation(&err) => {
                Err(StoreError::not_found("user", new_post.user_id.0))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get a single post by id, failing with `NotFound` if absent.
    pub fn get(&self, post_id: PostId) -> Result<Post> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                "SELECT id, user_id, url, text, created_at, location
                 FROM posts
                 WHERE id = ?",
                [post_id.0],
                map_post,
            )
            .optional()?;

        post.ok_or_else(|| StoreError::not_found("post", post_id.0))
    }

    /// Get posts by a specific user, newest first.
    pub fn by_user(&self, user_id: UserId) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, url, text, created_at, location
             FROM posts
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )?;

        let posts = stmt
            .query_map([user_id.0], map_post)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(posts)
    }
}

fn validate_new_post(new_post: &NewPost) -> Result<()> {
    if new_post.text.is_empty() {
        return Err(StoreError::InvalidOperation(
            "post text must not be empty".to_string(),
        ));
    }
    if new_post.url.is_empty() || new_post.url.chars().count() > MAX_URL_LEN {
        return Err(StoreError::InvalidOperation(format!(
            "post url must be 1..={MAX_URL_LEN} characters"
        )));
    }
    if let Some(location) = &new_post.location {
        if location.chars().count() > MAX_LOCATION_LEN {
            return Err(StoreError::InvalidOperation(format!(
                "location must be at most {MAX_LOCATION_LEN} characters"
            )));
        }
    }
    Ok(())
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        url: row.get(2)?,
        text: row.get(3)?,
        created_at: parse_datetime(4, row.get::<_, String>(4)?)?,
        location: row.get(5)?,
    })
}
