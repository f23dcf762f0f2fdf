//! Builders to construct a capacity manager from configuration.

pub mod manager_builder;

pub use manager_builder::{build_in_memory, Assembled, ManagerBuilder};
#[cfg(feature = "postgres")]
pub use manager_builder::build_postgres;
