use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Custom serde module for DateTime to ensure RFC3339 string format
pub mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// Primary key for a user row. Monotonically assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Primary key for a post row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Primary key for a follower edge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FollowerId(pub i64);

impl fmt::Display for FollowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Primary key for a like edge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikeId(pub i64);

impl fmt::Display for LikeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Primary key for a comment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered account. `handle` and `mail` are unique and immutable after
/// creation; `password` holds an opaque credential hash and never appears in
/// projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: String,
    pub first_name: String,
    pub last_name: String,
    pub mail: String,
    pub password: String,
}

/// A piece of content owned by a user. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub url: String,
    pub text: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub location: Option<String>,
}

/// Directed User -> User toggle edge. At most one row exists per ordered
/// pair; repeat follow requests flip `is_active` instead of inserting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follower {
    pub id: FollowerId,
    pub user_from_id: UserId,
    pub user_to_id: UserId,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub follow_source: Option<String>,
}

/// Directed User -> Post toggle edge with the same per-pair uniqueness and
/// toggle semantics as [`Follower`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: LikeId,
    pub user_id: UserId,
    pub post_id: PostId,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub source: Option<String>,
}

/// A comment on a post. `likes_count` is a cached aggregate maintained by
/// the counter synchronizer, never written by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub user_id: UserId,
    pub post_id: PostId,
    pub comment: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
}

// Creation payloads. Ids and timestamps are assigned by the store.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub handle: String,
    pub first_name: String,
    pub last_name: String,
    pub mail: String,
    /// Opaque hash produced by the caller; the core never hashes passwords.
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: UserId,
    pub url: String,
    pub text: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub user_id: UserId,
    pub post_id: PostId,
    pub text: String,
}
