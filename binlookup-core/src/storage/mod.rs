pub mod traits;
pub mod in_memory;

#[cfg(feature = "db")]
pub mod database;

pub use traits::Storage;
pub use in_memory::InMemoryStorage;

#[cfg(feature = "db")]
pub use database::DatabaseStorage;
