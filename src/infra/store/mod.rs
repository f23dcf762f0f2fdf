//! Store backends.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{InMemoryStore, InMemoryTx};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresStore, PostgresTx};
