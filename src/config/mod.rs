//! Configuration models for the capacity manager and its store backend.

pub mod manager;

pub use manager::{ManagerConfig, StoreBackendConfig};
