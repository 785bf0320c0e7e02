// Library exports for pictogram-store
// This allows consumers to reach the repositories, the relationship engine,
// and the counter synchronizer without digging through module paths.

pub mod config;
pub mod counter;
pub mod db;
pub mod engine;
pub mod error;

pub use config::Settings;
pub use counter::{CounterDrift, CounterSync, CounterTarget};
pub use db::repositories::{CommentRepository, PostRepository, UserRepository};
pub use db::{Database, DbConnection, DbPool};
pub use engine::{EdgeEvent, RelationshipEngine, ToggleOutcome};
pub use error::{Result, StoreError};
