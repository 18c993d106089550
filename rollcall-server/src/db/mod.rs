//! Database access for rollcall-server
//!
//! Free async functions over `&SqlitePool` (or a transaction). Services own
//! the business rules; these functions only read and write rows.

pub mod attendance;
pub mod predictions;
pub mod retry;
pub mod roster;
pub mod sessions;
