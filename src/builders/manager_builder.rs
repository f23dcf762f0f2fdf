//! Builders to assemble a capacity manager from configuration.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};

use crate::config::{ManagerConfig, StoreBackendConfig};
use crate::core::{
    AppResult, AuditSink, BookingStore, CapacityManager, ClassStore, SharedAuditSink,
};
use crate::infra::InMemoryStore;
use crate::util::clock::Clock;

/// A manager plus the handle to its in-memory audit log, when one was created.
pub struct Assembled<B, C> {
    /// The configured manager.
    pub manager: CapacityManager<B, C>,
    /// Readable audit log, present when no explicit sink was supplied and
    /// `audit_buffer` is non-zero.
    pub audit_log: Option<SharedAuditSink>,
}

/// Step-by-step construction of a [`CapacityManager`].
pub struct ManagerBuilder<B, C> {
    bookings: B,
    classes: C,
    config: ManagerConfig,
    clock: Option<Arc<dyn Clock>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl<B, C> ManagerBuilder<B, C>
where
    B: BookingStore,
    C: ClassStore,
{
    /// Start from the given stores and default configuration.
    pub fn new(bookings: B, classes: C) -> Self {
        Self {
            bookings,
            classes,
            config: ManagerConfig::default(),
            clock: None,
            audit: None,
        }
    }

    /// Use `config` for retry and audit settings.
    #[must_use]
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Install an explicit audit sink instead of the configured in-memory one.
    #[must_use]
    pub fn audit(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Configuration the builder will apply.
    pub const fn config_ref(&self) -> &ManagerConfig {
        &self.config
    }

    /// Validate configuration and assemble the manager.
    ///
    /// # Errors
    ///
    /// Invalid configuration.
    pub fn build(self) -> AppResult<Assembled<B, C>> {
        self.config
            .validate()
            .map_err(|e| anyhow!("config invalid: {e}"))?;

        let mut manager = CapacityManager::new(self.bookings, self.classes)
            .with_max_conflict_retries(self.config.max_conflict_retries);
        if let Some(clock) = self.clock {
            manager = manager.with_clock(clock);
        }

        let mut audit_log = None;
        if let Some(sink) = self.audit {
            manager = manager.with_audit(sink);
        } else if self.config.audit_buffer > 0 {
            let log = SharedAuditSink::new(self.config.audit_buffer);
            manager = manager.with_audit(Box::new(log.clone()));
            audit_log = Some(log);
        }

        tracing::debug!(
            store = ?self.config.store,
            max_conflict_retries = self.config.max_conflict_retries,
            audit = audit_log.is_some(),
            "capacity manager assembled"
        );
        Ok(Assembled { manager, audit_log })
    }
}

/// Build a manager over a fresh [`InMemoryStore`], returning the store handle
/// for seeding classes and bookings.
///
/// # Errors
///
/// Invalid configuration, or a configuration that selects another backend.
pub fn build_in_memory(
    config: ManagerConfig,
) -> AppResult<(Assembled<InMemoryStore, InMemoryStore>, InMemoryStore)> {
    if config.store != StoreBackendConfig::InMemory {
        bail!("config selects the {:?} store, not in_memory", config.store);
    }
    let store = InMemoryStore::with_lock_timeout(config.transaction_timeout());
    let assembled = ManagerBuilder::new(store.clone(), store.clone())
        .config(config)
        .build()
        .context("building in-memory capacity manager")?;
    Ok((assembled, store))
}

/// Connect to Postgres, apply migrations and build a manager over it.
///
/// # Errors
///
/// Invalid configuration, connection or migration failure.
#[cfg(feature = "postgres")]
pub async fn build_postgres(
    config: ManagerConfig,
) -> AppResult<Assembled<crate::infra::PostgresStore, crate::infra::PostgresStore>> {
    if config.store != StoreBackendConfig::Postgres {
        bail!("config selects the {:?} store, not postgres", config.store);
    }
    config.validate().map_err(|e| anyhow!("config invalid: {e}"))?;
    let url = config
        .database_url
        .clone()
        .ok_or_else(|| anyhow!("database_url is required for the postgres store"))?;
    let store = crate::infra::PostgresStore::connect(&url, config.max_connections)
        .await
        .context("connecting to postgres")?
        .with_statement_timeout(config.transaction_timeout());
    store.migrate().await.context("applying migrations")?;
    ManagerBuilder::new(store.clone(), store)
        .config(config)
        .build()
}
