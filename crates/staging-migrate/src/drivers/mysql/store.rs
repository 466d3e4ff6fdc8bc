//! [`DatasetStore`] backed by MySQL pools from a [`ConnectionRegistry`].

use async_trait::async_trait;
use tracing::{error, info};

use super::{reader, writer, MysqlConnector};
use crate::config::ConnectionSet;
use crate::core::{Dataset, DatasetStore};
use crate::error::Result;
use crate::registry::ConnectionRegistry;

/// Production dataset store. Owns the run's connection registry.
pub struct MysqlStore {
    registry: ConnectionRegistry<MysqlConnector>,
}

impl MysqlStore {
    pub fn new(connections: ConnectionSet) -> Self {
        Self {
            registry: ConnectionRegistry::new(MysqlConnector::new(), connections),
        }
    }
}

#[async_trait]
impl DatasetStore for MysqlStore {
    async fn ping(&mut self, service: &str) -> Result<()> {
        self.registry.check(service).await
    }

    async fn load(&mut self, service: &str, table: &str) -> Result<Dataset> {
        info!("Loading data from {}.{}", service, table);
        let pool = self.registry.resolve(service).await?;
        reader::load_table(pool, service, table).await
    }

    async fn write(&mut self, service: &str, table: &str, dataset: &Dataset) -> bool {
        info!("Writing {} rows to {}.{}", dataset.len(), service, table);
        if dataset.is_empty() {
            info!("No data to write for {}", table);
            return true;
        }

        let pool = match self.registry.resolve(service).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to write data to {}.{}: {}", service, table, e);
                return false;
            }
        };

        match writer::append_rows(pool, service, table, dataset).await {
            Ok(_) => {
                info!("Successfully wrote data to {}.{}", service, table);
                true
            }
            Err(e) => {
                error!("Failed to write data to {}.{}: {}", service, table, e);
                false
            }
        }
    }

    async fn close(&mut self) {
        self.registry.close().await;
    }
}
