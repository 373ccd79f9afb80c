pub mod common;
pub mod domain;
pub mod storage;

#[cfg(feature = "db")]
pub mod database;

pub use common::error::{LookupError, Result};
pub use domain::*;

// Re-export database manager when db feature is enabled
#[cfg(feature = "db")]
pub use database::{DatabaseConfig, DatabaseManager};
