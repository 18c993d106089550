//! # Rollcall Common Library
//!
//! Shared code for the rollcall attendance service:
//! - Error type used by every storage and configuration call
//! - Configuration loading (TOML bootstrap + root folder resolution)
//! - The server-side clock and canonical timestamp handling
//! - SQLite schema initialization and row models
//! - Credential hashing and the credential verification seam

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};
