use rusqlite::OptionalExtension;

use pictogram_types::{NewUser, User, UserId};

use crate::db::DbPool;
use crate::error::{is_unique_violation, Result, StoreError};

const MAX_HANDLE_LEN: usize = 50;
const MAX_MAIL_LEN: usize = 120;

/// Identity store. Owns user rows; every other entity references them.
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user. Handle and mail are unique; a duplicate of either
    /// fails with `Conflict` and writes nothing.
    pub fn create(&self, new_user: &NewUser) -> Result<User> {
        validate_new_user(new_user)?;

        let conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT INTO users (handle, first_name, last_name, mail, password)
             VALUES (?, ?, ?, ?, ?)",
            (
                &new_user.handle,
                &new_user.first_name,
                &new_user.last_name,
                &new_user.mail,
                &new_user.password_hash,
            ),
        );

        match result {
            Ok(_) => {
                let id = UserId(conn.last_insert_rowid());
                tracing::debug!(user_id = id.0, handle = %new_user.handle, "Created user");
                Ok(User {
                    id,
                    handle: new_user.handle.clone(),
                    first_name: new_user.first_name.clone(),
                    last_name: new_user.last_name.clone(),
                    mail: new_user.mail.clone(),
                    password: new_user.password_hash.clone(),
                })
            }
            Err(err) if is_unique_violation(&err) => {
                let field = if err.to_string().contains("users.handle") {
                    "handle"
                } else {
                    "mail"
                };
                Err(StoreError::Conflict(format!(
                    "user with this {field} already exists"
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get a user by id, failing with `NotFound` if absent.
    pub fn get(&self, user_id: UserId) -> Result<User> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, handle, first_name, last_name, mail, password
                 FROM users
                 WHERE id = ?",
                [user_id.0],
                map_user,
            )
            .optional()?;

        user.ok_or_else(|| StoreError::not_found("user", user_id.0))
    }

    /// Get a user by handle.
    pub fn get_by_handle(&self, handle: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, handle, first_name, last_name, mail, password
                 FROM users
                 WHERE handle = ?",
                [handle],
                map_user,
            )
            .optional()?;
        Ok(user)
    }
}

// Limits are in characters, matching SQLite length() in the schema CHECKs.
fn validate_new_user(new_user: &NewUser) -> Result<()> {
    if new_user.handle.is_empty() || new_user.handle.chars().count() > MAX_HANDLE_LEN {
        return Err(StoreError::InvalidOperation(format!(
            "handle must be 1..={MAX_HANDLE_LEN} characters"
        )));
    }
    if new_user.mail.is_empty() || new_user.mail.chars().count() > MAX_MAIL_LEN {
        return Err(StoreError::InvalidOperation(format!(
            "mail must be 1..={MAX_MAIL_LEN} characters"
        )));
    }
    Ok(())
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        handle: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        mail: row.get(4)?,
        password: row.get(5)?,
    })
}
