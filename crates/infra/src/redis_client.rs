//! Shared lazily-connected Redis handle with key namespacing.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone)]
pub struct RedisConnector {
    client: redis::Client,
    key_prefix: String,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl std::fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnector")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisConnector {
    pub fn open(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            key_prefix: key_prefix.into(),
            connection: Arc::new(Mutex::new(None)),
        })
    }

    /// `{prefix}:{suffix}`
    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{suffix}", self.key_prefix)
    }

    /// A multiplexed connection, opened on first use and shared afterwards.
    pub async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!(key_prefix = %self.key_prefix, "redis connection opened");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached connection so the next call reconnects.
    pub async fn reset(&self) {
        *self.connection.lock().await = None;
    }
}
