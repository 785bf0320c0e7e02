//! Relationship engine.
//!
//! Both Follower and Like are instances of one toggle-edge state machine
//! over a directed pair: absent -> active <-> inactive. The first toggle
//! creates the row; every later toggle flips `is_active` in place, so the
//! original `created_at` and source provenance survive toggle cycles.
//!
//! The whole read-check-write sequence for a pair runs inside a single
//! `BEGIN IMMEDIATE` transaction, so concurrent toggles on the same pair
//! serialize and can neither lose an update nor insert a duplicate row.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use pictogram_types::{EdgeKind, EdgeState, Follower, FollowerId, Like, LikeId, PostId, UserId};

use crate::counter::CounterSync;
use crate::db::{parse_datetime, DbPool};
use crate::error::{is_busy, is_unique_violation, Result, StoreError};

const MAX_WRITE_ATTEMPTS: u32 = 3;
const MAX_SOURCE_LEN: usize = 50;

/// Change notification emitted on every transition into or out of `active`,
/// consumed by the counter synchronizer within the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub kind: EdgeKind,
    pub subject_id: i64,
    pub object_id: i64,
    pub state: EdgeState,
}

/// Result of a toggle: the state the edge landed in and the row's original
/// creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub state: EdgeState,
    pub created_at: DateTime<Utc>,
}

struct EdgeColumns {
    table: &'static str,
    subject: &'static str,
    object: &'static str,
    source: &'static str,
}

fn columns(kind: EdgeKind) -> EdgeColumns {
    match kind {
        EdgeKind::Follow => EdgeColumns {
            table: "followers",
            subject: "user_from_id",
            object: "user_to_id",
            source: "follow_source",
        },
        EdgeKind::Like => EdgeColumns {
            table: "likes",
            subject: "user_id",
            object: "post_id",
            source: "source",
        },
    }
}

pub struct RelationshipEngine {
    pool: DbPool,
    counters: CounterSync,
}

impl RelationshipEngine {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            counters: CounterSync::new(),
        }
    }

    /// Toggle a follow edge. First call on a pair activates it, each later
    /// call flips it. Self-follows are rejected.
    pub fn toggle_follow(
        &self,
        from: UserId,
        to: UserId,
        source: Option<&str>,
    ) -> Result<ToggleOutcome> {
        if from == to {
            return Err(StoreError::InvalidOperation(
                "users cannot follow themselves".to_string(),
            ));
        }
        self.toggle(EdgeKind::Follow, from.0, to.0, source)
    }

    /// Toggle a like edge on a post.
    pub fn toggle_like(
        &self,
        user: UserId,
        post: PostId,
        source: Option<&str>,
    ) -> Result<ToggleOutcome> {
        self.toggle(EdgeKind::Like, user.0, post.0, source)
    }

    fn toggle(
        &self,
        kind: EdgeKind,
        subject: i64,
        object: i64,
        source: Option<&str>,
    ) -> Result<ToggleOutcome> {
        if let Some(source) = source {
            // Character limit, matching SQLite length() in the schema CHECK.
            if source.is_empty() || source.chars().count() > MAX_SOURCE_LEN {
                return Err(StoreError::InvalidOperation(format!(
                    "source tag must be 1..={MAX_SOURCE_LEN} characters"
                )));
            }
        }

        let mut conn = self.pool.get()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_toggle(&mut conn, kind, subject, object, source) {
                Err(StoreError::Database(err)) if is_busy(&err) => {
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        return Err(StoreError::Busy);
                    }
                    tracing::debug!(
                        attempt,
                        kind = kind.as_str(),
                        "Toggle hit write contention, retrying"
                    );
                    std::thread::sleep(std::time::Duration::from_millis(10 * attempt as u64));
                }
                other => return other,
            }
        }
    }

    fn try_toggle(
        &self,
        conn: &mut Connection,
        kind: EdgeKind,
        subject: i64,
        object: i64,
        source: Option<&str>,
    ) -> Result<ToggleOutcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Referential integrity is checked under the write lock so a
        // concurrent delete cannot slip between check and insert.
        match kind {
            EdgeKind::Follow => {
                ensure_exists(&tx, "users", "user", subject)?;
                ensure_exists(&tx, "users", "user", object)?;
            }
            EdgeKind::Like => {
                ensure_exists(&tx, "users", "user", subject)?;
                ensure_exists(&tx, "posts", "post", object)?;
            }
        }

        let cols = columns(kind);
        let existing: Option<(i64, String, bool)> = tx
            .query_row(
                &format!(
                    "SELECT id, created_at, is_active FROM {} WHERE {} = ? AND {} = ?",
                    cols.table, cols.subject, cols.object
                ),
                [subject, object],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (state, created_at) = match existing {
            None => {
                let now = Utc::now();
                let inserted = tx.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}, created_at, is_active, {})
                         VALUES (?, ?, ?, 1, ?)",
                        cols.table, cols.subject, cols.object, cols.source
                    ),
                    (subject, object, now.to_rfc3339(), source),
                );
                match inserted {
                    Ok(_) => {}
                    // The lookup said absent, so a pair collision here means
                    // two writers slipped past transaction serialization.
                    Err(err) if is_unique_violation(&err) => {
                        return Err(StoreError::InvariantViolation(format!(
                            "duplicate {} edge for pair ({subject}, {object})",
                            kind.as_str()
                        )));
                    }
                    Err(err) => return Err(err.into()),
                }
                (EdgeState::Active, now)
            }
            Some((id, raw_created, false)) => {
                // Reactivation keeps the original creation provenance; the
                // source tag is refreshed only when a new one is supplied.
                tx.execute(
                    &format!(
                        "UPDATE {} SET is_active = 1, {} = COALESCE(?, {}) WHERE id = ?",
                        cols.table, cols.source, cols.source
                    ),
                    (source, id),
                )?;
                (EdgeState::Active, parse_datetime(1, raw_created)?)
            }
            Some((id, raw_created, true)) => {
                tx.execute(
                    &format!("UPDATE {} SET is_active = 0 WHERE id = ?", cols.table),
                    [id],
                )?;
                (EdgeState::Inactive, parse_datetime(1, raw_created)?)
            }
        };

        let event = EdgeEvent {
            kind,
            subject_id: subject,
            object_id: object,
            state,
        };
        self.counters.apply(&tx, &event)?;
        tx.commit()?;

        tracing::debug!(
            kind = kind.as_str(),
            subject,
            object,
            state = state.as_str(),
            "Edge transition committed"
        );
        Ok(ToggleOutcome { state, created_at })
    }

    /// Users actively following the given user, in chronological order.
    pub fn list_followers(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT user_from_id FROM followers
             WHERE user_to_id = ? AND is_active = 1
             ORDER BY created_at ASC, id ASC",
        )?;
        let ids = stmt
            .query_map([user_id.0], |row| Ok(UserId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Users the given user actively follows, in chronological order.
    pub fn list_following(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT user_to_id FROM followers
             WHERE user_from_id = ? AND is_active = 1
             ORDER BY created_at ASC, id ASC",
        )?;
        let ids = stmt
            .query_map([user_id.0], |row| Ok(UserId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Users with an active like on the given post, in chronological order.
    pub fn list_likers(&self, post_id: PostId) -> Result<Vec<UserId>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM likes
             WHERE post_id = ? AND is_active = 1
             ORDER BY created_at ASC, id ASC",
        )?;
        let ids = stmt
            .query_map([post_id.0], |row| Ok(UserId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Check whether an active follow edge exists for the ordered pair.
    pub fn is_following(&self, from: UserId, to: UserId) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM followers
             WHERE user_from_id = ? AND user_to_id = ? AND is_active = 1",
            [from.0, to.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Number of users actively following the given user.
    pub fn follower_count(&self, user_id: UserId) -> Result<i64> {
        let conn = self.pool.get()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM followers WHERE user_to_id = ? AND is_active = 1",
            [user_id.0],
            |row| row.get(0),
        )?)
    }

    /// Number of users the given user actively follows.
    pub fn following_count(&self, user_id: UserId) -> Result<i64> {
        let conn = self.pool.get()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM followers WHERE user_from_id = ? AND is_active = 1",
            [user_id.0],
            |row| row.get(0),
        )?)
    }

    /// Number of active likes on the given post, counted from edge rows.
    pub fn like_count(&self, post_id: PostId) -> Result<i64> {
        let conn = self.pool.get()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ? AND is_active = 1",
            [post_id.0],
            |row| row.get(0),
        )?)
    }

    /// Fetch the full follow edge row for an ordered pair, if one was ever
    /// created. Used by read-side projections.
    pub fn get_follow_edge(&self, from: UserId, to: UserId) -> Result<Option<Follower>> {
        let conn = self.pool.get()?;
        let edge = conn
            .query_row(
                "SELECT id, user_from_id, user_to_id, created_at, is_active, follow_source
                 FROM followers
                 WHERE user_from_id = ? AND user_to_id = ?",
                [from.0, to.0],
                |row| {
                    Ok(Follower {
                        id: FollowerId(row.get(0)?),
                        user_from_id: UserId(row.get(1)?),
                        user_to_id: UserId(row.get(2)?),
                        created_at: parse_datetime(3, row.get::<_, String>(3)?)?,
                        is_active: row.get(4)?,
                        follow_source: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(edge)
    }

    /// Fetch the full like edge row for an ordered pair, if one was ever
    /// created.
    pub fn get_like_edge(&self, user: UserId, post: PostId) -> Result<Option<Like>> {
        let conn = self.pool.get()?;
        let edge = conn
            .query_row(
                "SELECT id, user_id, post_id, created_at, is_active, source
                 FROM likes
                 WHERE user_id = ? AND post_id = ?",
                [user.0, post.0],
                |row| {
                    Ok(Like {
                        id: LikeId(row.get(0)?),
                        user_id: UserId(row.get(1)?),
                        post_id: PostId(row.get(2)?),
                        created_at: parse_datetime(3, row.get::<_, String>(3)?)?,
                        is_active: row.get(4)?,
                        source: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(edge)
    }
}

fn ensure_exists(conn: &Connection, table: &str, entity: &'static str, id: i64) -> Result<()> {
    let found: Option<bool> = conn
        .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?"), [id], |_| {
            Ok(true)
        })
        .optional()?;
    if found.unwrap_or(false) {
        Ok(())
    } else {
        Err(StoreError::not_found(entity, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CounterSync;
    use crate::db::repositories::{PostRepository, UserRepository};
    use crate::db::Database;
    use pictogram_types::{NewPost, NewUser};

    struct Fixture {
        db: Database,
        engine: RelationshipEngine,
        alice: UserId,
        bob: UserId,
        carol: UserId,
        post: PostId,
    }

    fn setup() -> Fixture {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize schema");

        let users = UserRepository::new(db.pool.clone());
        let mut ids = Vec::new();
        for (handle, mail) in [("alice", "a@x.com"), ("bob", "b@x.com"), ("carol", "c@x.com")] {
            let user = users
                .create(&NewUser {
                    handle: handle.to_string(),
                    first_name: handle.to_string(),
                    last_name: "T".to_string(),
                    mail: mail.to_string(),
                    password_hash: "hash".to_string(),
                })
                .expect("Failed to create fixture user");
            ids.push(user.id);
        }

        let posts = PostRepository::new(db.pool.clone());
        let post = posts
            .create(&NewPost {
                user_id: ids[0],
                url: "https://cdn.example/p.jpg".to_string(),
                text: "a post".to_string(),
                location: None,
            })
            .expect("Failed to create fixture post");

        let engine = RelationshipEngine::new(db.pool.clone());
        Fixture {
            db,
            engine,
            alice: ids[0],
            bob: ids[1],
            carol: ids[2],
            post: post.id,
        }
    }

    fn follower_rows(db: &Database) -> i64 {
        let conn = db.connection().unwrap();
        conn.query_row("SELECT COUNT(*) FROM followers", [], |row| row.get(0))
            .unwrap()
    }

    fn cached_post_likes(db: &Database, post: PostId) -> i64 {
        let conn = db.connection().unwrap();
        conn.query_row(
            "SELECT likes_count FROM posts WHERE id = ?",
            [post.0],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn first_toggle_activates_and_later_toggles_flip_in_place() {
        let f = setup();

        let first = f.engine.toggle_follow(f.bob, f.alice, None).unwrap();
        assert_eq!(first.state, EdgeState::Active);
        assert_eq!(follower_rows(&f.db), 1);

        let second = f.engine.toggle_follow(f.bob, f.alice, None).unwrap();
        assert_eq!(second.state, EdgeState::Inactive);
        assert_eq!(follower_rows(&f.db), 1);

        let third = f.engine.toggle_follow(f.bob, f.alice, None).unwrap();
        assert_eq!(third.state, EdgeState::Active);
        assert_eq!(follower_rows(&f.db), 1);
    }

    #[test]
    fn creation_provenance_survives_toggle_cycles() {
        let f = setup();

        let first = f
            .engine
            .toggle_follow(f.bob, f.alice, Some("suggested"))
            .unwrap();
        f.engine.toggle_follow(f.bob, f.alice, None).unwrap();
        let reactivated = f.engine.toggle_follow(f.bob, f.alice, None).unwrap();

        assert_eq!(reactivated.created_at, first.created_at);

        let edge = f
            .engine
            .get_follow_edge(f.bob, f.alice)
            .unwrap()
            .expect("edge row must exist");
        assert_eq!(edge.follow_source.as_deref(), Some("suggested"));
        assert!(edge.is_active);
    }

    #[test]
    fn reactivation_with_new_source_updates_it() {
        let f = setup();

        f.engine
            .toggle_follow(f.bob, f.alice, Some("suggested"))
            .unwrap();
        f.engine.toggle_follow(f.bob, f.alice, None).unwrap();
        f.engine
            .toggle_follow(f.bob, f.alice, Some("search"))
            .unwrap();

        let edge = f.engine.get_follow_edge(f.bob, f.alice).unwrap().unwrap();
        assert_eq!(edge.follow_source.as_deref(), Some("search"));
    }

    #[test]
    fn self_follow_is_rejected_and_writes_nothing() {
        let f = setup();
        let err = f
            .engine
            .toggle_follow(f.alice, f.alice, None)
            .expect_err("self-follow must fail");
        assert!(matches!(err, StoreError::InvalidOperation(_)));
        assert_eq!(follower_rows(&f.db), 0);
    }

    #[test]
    fn toggling_edges_with_unknown_referents_is_not_found() {
        let f = setup();

        let err = f
            .engine
            .toggle_follow(f.alice, UserId(999), None)
            .expect_err("unknown target");
        assert!(matches!(err, StoreError::NotFound { entity: "user", .. }));

        let err = f
            .engine
            .toggle_like(f.alice, PostId(999), None)
            .expect_err("unknown post");
        assert!(matches!(err, StoreError::NotFound { entity: "post", .. }));

        let err = f
            .engine
            .toggle_like(UserId(999), f.post, None)
            .expect_err("unknown user");
        assert!(matches!(err, StoreError::NotFound { entity: "user", .. }));

        assert_eq!(follower_rows(&f.db), 0);
    }

    #[test]
    fn list_followers_returns_only_active_edges_in_order() {
        let f = setup();

        f.engine.toggle_follow(f.bob, f.alice, None).unwrap();
        f.engine.toggle_follow(f.carol, f.alice, None).unwrap();
        // Second call deactivates bob's edge.
        f.engine.toggle_follow(f.bob, f.alice, None).unwrap();

        let followers = f.engine.list_followers(f.alice).unwrap();
        assert_eq!(followers, vec![f.carol]);

        assert!(f.engine.is_following(f.carol, f.alice).unwrap());
        assert!(!f.engine.is_following(f.bob, f.alice).unwrap());
        assert_eq!(f.engine.follower_count(f.alice).unwrap(), 1);
        assert_eq!(f.engine.following_count(f.carol).unwrap(), 1);
    }

    #[test]
    fn list_following_tracks_the_other_direction() {
        let f = setup();

        f.engine.toggle_follow(f.alice, f.bob, None).unwrap();
        f.engine.toggle_follow(f.alice, f.carol, None).unwrap();

        let following = f.engine.list_following(f.alice).unwrap();
        assert_eq!(following.len(), 2);
        assert!(f.engine.list_followers(f.alice).unwrap().is_empty());
    }

    #[test]
    fn like_toggles_keep_the_post_aggregate_in_step() {
        let f = setup();

        f.engine
            .toggle_like(f.bob, f.post, Some("search"))
            .unwrap();
        f.engine.toggle_like(f.carol, f.post, None).unwrap();
        assert_eq!(cached_post_likes(&f.db, f.post), 2);
        assert_eq!(f.engine.like_count(f.post).unwrap(), 2);

        f.engine.toggle_like(f.bob, f.post, None).unwrap();
        assert_eq!(cached_post_likes(&f.db, f.post), 1);
        assert_eq!(f.engine.list_likers(f.post).unwrap(), vec![f.carol]);

        // Edge write and counter update land in one atomic unit of work.
        let sync = CounterSync::new();
        let conn = f.db.connection().unwrap();
        assert!(sync.reconcile(&conn).unwrap().is_empty());
    }

    #[test]
    fn likers_are_listed_in_chronological_order() {
        let f = setup();

        f.engine.toggle_like(f.carol, f.post, None).unwrap();
        f.engine.toggle_like(f.bob, f.post, None).unwrap();

        assert_eq!(f.engine.list_likers(f.post).unwrap(), vec![f.carol, f.bob]);
    }

    #[test]
    fn oversized_source_tag_is_rejected() {
        let f = setup();
        let tag = "x".repeat(51);
        let err = f
            .engine
            .toggle_follow(f.bob, f.alice, Some(&tag))
            .expect_err("oversized source must fail");
        assert!(matches!(err, StoreError::InvalidOperation(_)));
    }

    #[test]
    fn source_tag_limit_counts_characters_not_bytes() {
        let f = setup();

        // 50 two-byte characters: at the limit, not over it.
        let tag = "ü".repeat(50);
        f.engine
            .toggle_follow(f.bob, f.alice, Some(&tag))
            .expect("multibyte tag at the limit should be accepted");

        let edge = f.engine.get_follow_edge(f.bob, f.alice).unwrap().unwrap();
        assert_eq!(edge.follow_source.as_deref(), Some(tag.as_str()));
    }

    #[test]
    fn like_edge_row_is_projectable() {
        let f = setup();
        f.engine
            .toggle_like(f.bob, f.post, Some("suggested"))
            .unwrap();

        let edge = f
            .engine
            .get_like_edge(f.bob, f.post)
            .unwrap()
            .expect("edge row must exist");
        assert!(edge.is_active);
        assert_eq!(edge.source.as_deref(), Some("suggested"));
        assert!(f.engine.get_like_edge(f.carol, f.post).unwrap().is_none());
    }
}
