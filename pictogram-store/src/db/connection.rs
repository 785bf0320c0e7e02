use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use super::schema::SCHEMA;
use crate::config::Settings;
use crate::error::Result;

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_pool_size(path, DEFAULT_POOL_SIZE, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Create a database pool from loaded settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::with_pool_size(
            &settings.database.path,
            settings.database.pool_size,
            settings.database.busy_timeout_ms,
        )
    }

    fn with_pool_size<P: AsRef<Path>>(
        path: P,
        pool_size: u32,
        busy_timeout_ms: u32,
    ) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let trimmed = path_str.trim();

        // An in-memory database exists per connection, so the pool must be
        // pinned to a single connection or every checkout would see an
        // independent empty database.
        let (manager, max_size) = if trimmed.eq_ignore_ascii_case(MEMORY_DB_PATH) {
            (SqliteConnectionManager::memory(), 1)
        } else {
            (SqliteConnectionManager::file(path.as_ref()), pool_size)
        };

        let manager = manager.with_init(move |conn| {
            conn.execute_batch(&format!(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = {busy_timeout_ms};"
            ))
        });

        let pool = Pool::builder().max_size(max_size).build(manager)?;
        Ok(Self { pool })
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!("Database schema initialized");
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_all_five_tables() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("Failed to get connection");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .expect("Failed to prepare statement");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("Failed to query tables")
            .collect::<std::result::Result<Vec<_>, _>>()
            .expect("Failed to collect tables");

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"followers".to_string()));
        assert!(tables.contains(&"likes".to_string()));
        assert!(tables.contains(&"comments".to_string()));
    }

    #[test]
    fn edge_tables_have_pair_uniqueness() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("Failed to get connection");
        for table in ["followers", "likes"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type='index' AND tbl_name = ? AND sql LIKE '%unique%'",
                    [table],
                    |row| row.get(0),
                )
                .unwrap_or(0);
            // SQLite materializes inline UNIQUE constraints as autoindexes
            let autoindex: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type='index' AND tbl_name = ? AND name LIKE 'sqlite_autoindex%'",
                    [table],
                    |row| row.get(0),
                )
                .expect("Failed to count autoindexes");
            assert!(
                count + autoindex > 0,
                "{table} should enforce pair uniqueness"
            );
        }
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("Failed to get connection");
        let result = conn.execute(
            "INSERT INTO posts (user_id, url, text, created_at) VALUES (999, 'u', 't', 'now')",
            [],
        );
        assert!(result.is_err(), "orphan post insert should be rejected");
    }

    #[test]
    fn configured_busy_timeout_reaches_the_connection() {
        let settings = Settings {
            database: crate::config::DatabaseSettings {
                path: MEMORY_DB_PATH.to_string(),
                pool_size: 1,
                busy_timeout_ms: 50,
            },
        };
        let db = Database::from_settings(&settings).expect("Failed to create database");

        let conn = db.connection().expect("Failed to get connection");
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .expect("Failed to read busy_timeout");
        assert_eq!(timeout, 50);
    }

    #[test]
    fn initialize_is_idempotent() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("first initialize");
        db.initialize().expect("second initialize");
    }
}
