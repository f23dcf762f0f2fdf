//! Configuration parsing and validation tests.

use std::collections::HashMap;
use std::time::Duration;

use class_capacity::config::{ManagerConfig, StoreBackendConfig};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_defaults_are_valid() {
    let cfg = ManagerConfig::default();
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
    assert_eq!(cfg.max_conflict_retries, 3);
    assert_eq!(cfg.transaction_timeout(), Duration::from_secs(5));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_json_fills_missing_fields_with_defaults() {
    let cfg = ManagerConfig::from_json_str(r#"{"store":"in_memory","audit_buffer":0}"#).unwrap();
    assert_eq!(cfg.audit_buffer, 0);
    assert_eq!(cfg.max_connections, 10);
}

#[test]
fn test_json_rejects_postgres_without_url() {
    let err = ManagerConfig::from_json_str(r#"{"store":"postgres"}"#).unwrap_err();
    assert!(err.contains("database_url"), "{err}");
}

#[test]
fn test_json_rejects_malformed_input() {
    let err = ManagerConfig::from_json_str("{").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_lookup_overrides_defaults() {
    let cfg = ManagerConfig::from_lookup(lookup(&[
        ("CAPACITY_STORE", "postgres"),
        ("DATABASE_URL", "postgres://localhost/gym"),
        ("CAPACITY_MAX_CONNECTIONS", "4"),
        ("CAPACITY_MAX_CONFLICT_RETRIES", " 6 "),
        ("CAPACITY_TRANSACTION_TIMEOUT_SECS", "2"),
    ]))
    .unwrap();
    assert_eq!(cfg.store, StoreBackendConfig::Postgres);
    assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/gym"));
    assert_eq!(cfg.max_connections, 4);
    assert_eq!(cfg.max_conflict_retries, 6);
    assert_eq!(cfg.transaction_timeout_secs, 2);
    assert_eq!(cfg.audit_buffer, 1024);
}

#[test]
fn test_lookup_accepts_memory_alias() {
    let cfg = ManagerConfig::from_lookup(lookup(&[("CAPACITY_STORE", "memory")])).unwrap();
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
}

#[test]
fn test_lookup_reports_bad_value_with_key() {
    let err = ManagerConfig::from_lookup(lookup(&[("CAPACITY_AUDIT_BUFFER", "lots")])).unwrap_err();
    assert!(err.starts_with("CAPACITY_AUDIT_BUFFER: invalid value `lots`"), "{err}");
}

#[test]
fn test_zero_timeout_is_rejected() {
    let err = ManagerConfig::from_lookup(lookup(&[("CAPACITY_TRANSACTION_TIMEOUT_SECS", "0")]))
        .unwrap_err();
    assert!(err.contains("transaction_timeout_secs"), "{err}");
}

#[test]
fn test_empty_database_url_is_treated_as_unset() {
    let err = ManagerConfig::from_lookup(lookup(&[
        ("CAPACITY_STORE", "postgres"),
        ("DATABASE_URL", ""),
    ]))
    .unwrap_err();
    assert!(err.contains("database_url"), "{err}");
}
