//! Unit tests organized by component.

mod api_test;
mod audit_test;
mod builders_test;
mod config_test;
mod error_test;
mod util_test;
