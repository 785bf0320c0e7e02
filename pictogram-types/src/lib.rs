pub mod enums;
pub mod models;
pub mod projection;

pub use enums::*;
pub use models::*;
pub use projection::*;
