//! Data models
//!
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), timestamps are Unix millis.

pub mod dining_table;
pub mod order;
pub mod product;
pub mod restaurant;
pub mod table_session;

// Re-exports
pub use dining_table::*;
pub use order::*;
pub use product::*;
pub use restaurant::*;
pub use table_session::*;
