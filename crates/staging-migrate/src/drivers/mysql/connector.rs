//! SQLx pool construction for MySQL services.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use tracing::{debug, info};

use crate::config::ConnectionParams;
use crate::core::Connector;
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Execution is sequential, so a service never needs more than a couple of connections.
const MAX_CONNECTIONS_PER_SERVICE: u32 = 2;

/// Builds one [`MySqlPool`] per service.
#[derive(Debug, Clone, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    type Handle = MySqlPool;

    async fn connect(&self, service: &str, params: &ConnectionParams) -> Result<MySqlPool> {
        let options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.database)
            .username(&params.username)
            .password(&params.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS_PER_SERVICE)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connectivity(service, e))?;

        info!(
            "Connected to {}: {}:{}/{}",
            service, params.host, params.port, params.database
        );

        Ok(pool)
    }

    async fn probe(&self, service: &str, pool: &MySqlPool) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| MigrateError::connectivity(service, e))?;
        Ok(())
    }

    async fn release(&self, service: &str, pool: MySqlPool) {
        pool.close().await;
        debug!("Closed pool for {}", service);
    }
}
