//! Infrastructure adapters for booking and class storage.

pub mod store;

pub use store::InMemoryStore;
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
