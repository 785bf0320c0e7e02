/// SQL schema for the Pictogram database
/// Creates all tables with proper constraints, foreign keys, and indexes
pub const SCHEMA: &str = r#"
-- Users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    handle TEXT UNIQUE NOT NULL CHECK(length(handle) > 0 AND length(handle) <= 50),
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    mail TEXT UNIQUE NOT NULL CHECK(length(mail) > 0 AND length(mail) <= 120),
    password TEXT NOT NULL
);

-- Posts table
-- likes_count is a cached aggregate owned by the counter synchronizer.
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    url TEXT NOT NULL CHECK(length(url) <= 250),
    text TEXT NOT NULL CHECK(length(text) > 0),
    created_at TEXT NOT NULL,
    location TEXT CHECK(location IS NULL OR length(location) <= 120),
    likes_count INTEGER NOT NULL DEFAULT 0 CHECK(likes_count >= 0),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC);

-- Followers table (directed User -> User toggle edges)
-- One row per ordered pair; repeat follows flip is_active in place.
CREATE TABLE IF NOT EXISTS followers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_from_id INTEGER NOT NULL,
    user_to_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    follow_source TEXT CHECK(follow_source IS NULL OR length(follow_source) <= 50),
    UNIQUE (user_from_id, user_to_id),
    CHECK (user_from_id <> user_to_id),
    FOREIGN KEY (user_from_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (user_to_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_followers_from ON followers(user_from_id);
CREATE INDEX IF NOT EXISTS idx_followers_to ON followers(user_to_id);

-- Likes table (directed User -> Post toggle edges)
CREATE TABLE IF NOT EXISTS likes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    source TEXT CHECK(source IS NULL OR length(source) <= 50),
    UNIQUE (user_id, post_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_likes_user ON likes(user_id);
CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id);

-- Comments table
-- likes_count mirrors active comment-directed like edges; only the counter
-- synchronizer writes it.
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    comment TEXT NOT NULL CHECK(length(comment) > 0),
    created_at TEXT NOT NULL,
    likes_count INTEGER NOT NULL DEFAULT 0 CHECK(likes_count >= 0),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);
"#;
