pub mod connection;
pub mod repositories;
pub mod schema;

pub use connection::{Database, DbConnection, DbPool};

use chrono::{DateTime, Utc};

/// Parse an RFC3339 TEXT column into a timestamp, surfacing malformed data
/// as a rusqlite conversion error instead of panicking in the row mapper.
pub(crate) fn parse_datetime(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
