//! Connection registry: one cached handle per logical service for a run.
//!
//! The registry is owned by whoever owns the run. The first `resolve` for a
//! name connects and caches; later calls reuse the handle. `close` releases
//! every cached handle exactly once and leaves the registry empty, so a
//! second `close` is a no-op.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{ConnectionParams, ConnectionSet};
use crate::core::Connector;
use crate::error::{MigrateError, Result};

/// Lazily connecting, run-scoped handle cache.
pub struct ConnectionRegistry<C: Connector> {
    connector: C,
    params: ConnectionSet,
    handles: BTreeMap<String, C::Handle>,
}

impl<C: Connector> ConnectionRegistry<C> {
    /// Create a registry over resolved connection parameters. Nothing connects yet.
    pub fn new(connector: C, params: ConnectionSet) -> Self {
        Self {
            connector,
            params,
            handles: BTreeMap::new(),
        }
    }

    /// Return the handle for `service`, connecting on first use.
    pub async fn resolve(&mut self, service: &str) -> Result<&C::Handle> {
        if !self.handles.contains_key(service) {
            let params = self.params.get(service).ok_or_else(|| {
                MigrateError::connectivity(service, "no connection parameters configured")
            })?;
            check_params(service, params)?;

            debug!(
                "Connecting to service {} at {}:{}/{}",
                service, params.host, params.port, params.database
            );
            let handle = self.connector.connect(service, params).await?;
            self.handles.insert(service.to_string(), handle);
        }

        self.handles
            .get(service)
            .ok_or_else(|| MigrateError::connectivity(service, "handle missing after connect"))
    }

    /// Resolve `service` and probe it.
    pub async fn check(&mut self, service: &str) -> Result<()> {
        self.resolve(service).await?;
        let handle = self
            .handles
            .get(service)
            .ok_or_else(|| MigrateError::connectivity(service, "handle missing after connect"))?;
        self.connector.probe(service, handle).await
    }

    /// Whether a handle for `service` is currently cached.
    pub fn is_cached(&self, service: &str) -> bool {
        self.handles.contains_key(service)
    }

    /// Release every cached handle.
    pub async fn close(&mut self) {
        let handles = std::mem::take(&mut self.handles);
        for (service, handle) in handles {
            debug!("Releasing connection for {}", service);
            self.connector.release(&service, handle).await;
        }
    }
}

fn check_params(service: &str, params: &ConnectionParams) -> Result<()> {
    let missing = if params.host.is_empty() {
        Some("host")
    } else if params.database.is_empty() {
        Some("database")
    } else if params.username.is_empty() {
        Some("username")
    } else {
        None
    };

    if let Some(field) = missing {
        return Err(MigrateError::connectivity(
            service,
            format!("malformed connection parameters: empty {}", field),
        ));
    }
    if params.port == 0 {
        return Err(MigrateError::connectivity(
            service,
            "malformed connection parameters: port 0",
        ));
    }
    Ok(())
}
