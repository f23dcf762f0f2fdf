//! Capacity manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::capacity::DEFAULT_MAX_CONFLICT_RETRIES;

/// Store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-process store for development/testing.
    InMemory,
    /// Postgres store (requires the `postgres` feature).
    Postgres,
}

impl std::str::FromStr for StoreBackendConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_memory" | "memory" => Ok(Self::InMemory),
            "postgres" => Ok(Self::Postgres),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}

const fn default_transaction_timeout_secs() -> u64 {
    5
}

const fn default_audit_buffer() -> usize {
    1024
}

/// Capacity manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Store backend selection.
    pub store: StoreBackendConfig,
    /// Connection URL for the Postgres backend.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Pool size for the Postgres backend.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Re-runs of a cancellation that hit a serialization conflict.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Bound on waiting for, and running inside, a class transaction.
    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,
    /// Events kept by the in-memory audit sink; 0 disables auditing.
    #[serde(default = "default_audit_buffer")]
    pub audit_buffer: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            store: StoreBackendConfig::InMemory,
            database_url: None,
            max_connections: default_max_connections(),
            max_conflict_retries: default_max_conflict_retries(),
            transaction_timeout_secs: default_transaction_timeout_secs(),
            audit_buffer: default_audit_buffer(),
        }
    }
}

impl ManagerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.transaction_timeout_secs == 0 {
            return Err("transaction_timeout_secs must be greater than 0".into());
        }
        if self.store == StoreBackendConfig::Postgres {
            if self.database_url.as_deref().is_none_or(str::is_empty) {
                return Err("database_url is required for the postgres store".into());
            }
            if self.max_connections == 0 {
                return Err("max_connections must be greater than 0".into());
            }
        }
        Ok(())
    }

    /// Transaction timeout as a duration.
    pub const fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the process environment, reading a `.env` file first if one
    /// exists.
    ///
    /// Recognised variables: `CAPACITY_STORE`, `DATABASE_URL`,
    /// `CAPACITY_MAX_CONNECTIONS`, `CAPACITY_MAX_CONFLICT_RETRIES`,
    /// `CAPACITY_TRANSACTION_TIMEOUT_SECS`, `CAPACITY_AUDIT_BUFFER`.
    ///
    /// # Errors
    ///
    /// Unparseable values or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Unparseable values or validation failure.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            raw.map_or(Ok(default), |value| {
                value
                    .trim()
                    .parse()
                    .map_err(|e| format!("{key}: invalid value `{value}`: {e}"))
            })
        }

        let defaults = Self::default();
        let cfg = Self {
            store: parse("CAPACITY_STORE", lookup("CAPACITY_STORE"), defaults.store)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            max_connections: parse(
                "CAPACITY_MAX_CONNECTIONS",
                lookup("CAPACITY_MAX_CONNECTIONS"),
                defaults.max_connections,
            )?,
            max_conflict_retries: parse(
                "CAPACITY_MAX_CONFLICT_RETRIES",
                lookup("CAPACITY_MAX_CONFLICT_RETRIES"),
                defaults.max_conflict_retries,
            )?,
            transaction_timeout_secs: parse(
                "CAPACITY_TRANSACTION_TIMEOUT_SECS",
                lookup("CAPACITY_TRANSACTION_TIMEOUT_SECS"),
                defaults.transaction_timeout_secs,
            )?,
            audit_buffer: parse(
                "CAPACITY_AUDIT_BUFFER",
                lookup("CAPACITY_AUDIT_BUFFER"),
                defaults.audit_buffer,
            )?,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
