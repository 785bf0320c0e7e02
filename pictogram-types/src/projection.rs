//! External read views.
//!
//! Pure mappings from stored entities to the field subset callers may see.
//! No side effects and no authorization logic; notably, a user's password
//! hash never crosses this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    datetime_format, Comment, CommentId, Follower, FollowerId, Like, LikeId, Post, PostId, User,
    UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub handle: String,
    pub first_name: String,
    pub last_name: String,
    pub mail: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            handle: user.handle.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            mail: user.mail.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub user_id: UserId,
    pub url: String,
    pub text: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub location: Option<String>,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            url: post.url.clone(),
            text: post.text.clone(),
            created_at: post.created_at,
            location: post.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerView {
    pub id: FollowerId,
    pub user_from_id: UserId,
    pub user_to_id: UserId,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub follow_source: Option<String>,
}

impl From<&Follower> for FollowerView {
    fn from(edge: &Follower) -> Self {
        Self {
            id: edge.id,
            user_from_id: edge.user_from_id,
            user_to_id: edge.user_to_id,
            created_at: edge.created_at,
            is_active: edge.is_active,
            follow_source: edge.follow_source.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeView {
    pub id: LikeId,
    pub user_id: UserId,
    pub post_id: PostId,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub source: Option<String>,
}

impl From<&Like> for LikeView {
    fn from(edge: &Like) -> Self {
        Self {
            id: edge.id,
            user_id: edge.user_id,
            post_id: edge.post_id,
            created_at: edge.created_at,
            is_active: edge.is_active,
            source: edge.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: CommentId,
    pub user_id: UserId,
    pub post_id: PostId,
    pub comment: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            user_id: comment.user_id,
            post_id: comment.post_id,
            comment: comment.comment.clone(),
            created_at: comment.created_at,
            likes_count: comment.likes_count,
        }
    }
}
