//! Counter synchronizer.
//!
//! Keeps denormalized like aggregates in step with edge state. Updates run
//! as atomic in-database increments inside the same transaction as the edge
//! write that produced the event, so readers never observe one without the
//! other.

use rusqlite::Connection;

use pictogram_types::{CommentId, EdgeKind, EdgeState, PostId};

use crate::engine::EdgeEvent;
use crate::error::{Result, StoreError};

/// A denormalized counter fed by edge transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTarget {
    /// `posts.likes_count`, fed by User -> Post like edges.
    PostLikes(PostId),
    /// `comments.likes_count`. No edge kind in the current schema targets a
    /// comment, so this arm has no live feeder; it is the routing an
    /// extended comment-directed edge kind would use.
    CommentLikes(CommentId),
}

/// Drift between a cached aggregate and the edge rows it summarizes,
/// reported by [`CounterSync::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDrift {
    pub target: CounterTarget,
    pub cached: i64,
    pub actual: i64,
}

/// Applies edge change events to the counters they feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterSync;

impl CounterSync {
    pub fn new() -> Self {
        Self
    }

    /// Route an edge event to its counter, if it feeds one.
    /// Must be called on the same transaction that wrote the edge.
    pub fn apply(&self, conn: &Connection, event: &EdgeEvent) -> Result<()> {
        match Self::target_of(event) {
            Some(target) => self.apply_to(conn, target, event.state),
            None => Ok(()),
        }
    }

    fn target_of(event: &EdgeEvent) -> Option<CounterTarget> {
        match event.kind {
            // No follower aggregate column exists in this schema.
            EdgeKind::Follow => None,
            EdgeKind::Like => Some(CounterTarget::PostLikes(PostId(event.object_id))),
        }
    }

    /// Apply a single transition to a counter: activation adds one,
    /// deactivation removes one. Never drops a counter below zero.
    pub fn apply_to(
        &self,
        conn: &Connection,
        target: CounterTarget,
        state: EdgeState,
    ) -> Result<()> {
        let (table, id) = match target {
            CounterTarget::PostLikes(post_id) => ("posts", post_id.0),
            CounterTarget::CommentLikes(comment_id) => ("comments", comment_id.0),
        };

        let updated = match state {
            EdgeState::Active => conn.execute(
                &format!("UPDATE {table} SET likes_count = likes_count + 1 WHERE id = ?"),
                [id],
            )?,
            EdgeState::Inactive => conn.execute(
                &format!(
                    "UPDATE {table} SET likes_count = likes_count - 1
                     WHERE id = ? AND likes_count > 0"
                ),
                [id],
            )?,
        };

        if updated == 0 {
            tracing::error!(
                table,
                id,
                state = state.as_str(),
                "Counter update touched no row"
            );
            return Err(StoreError::InvariantViolation(format!(
                "counter on {table} row {id} missing or would go negative"
            )));
        }

        Ok(())
    }

    /// Post-hoc reconciliation scan: compare every cached like aggregate
    /// against the active edge rows it summarizes. Read-only; an empty
    /// result means the counters are consistent.
    pub fn reconcile(&self, conn: &Connection) -> Result<Vec<CounterDrift>> {
        let mut drift = Vec::new();

        let mut stmt = conn.prepare(
            "SELECT p.id, p.likes_count,
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id AND l.is_active = 1)
             FROM posts p",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (id, cached, actual) = row?;
            if cached != actual {
                drift.push(CounterDrift {
                    target: CounterTarget::PostLikes(PostId(id)),
                    cached,
                    actual,
                });
            }
        }

        // No comment-directed edge kind exists, so the active edge count for
        // every comment is zero by definition.
        let mut stmt = conn.prepare("SELECT id, likes_count FROM comments WHERE likes_count <> 0")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, cached) = row?;
            drift.push(CounterDrift {
                target: CounterTarget::CommentLikes(CommentId(id)),
                cached,
                actual: 0,
            });
        }

        Ok(drift)
    }
}
