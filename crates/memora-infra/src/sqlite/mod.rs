//! SQLite storage layer.
//!
//! One `records` table behind split read/write connection pools in WAL mode.

pub mod pool;
pub mod record;
