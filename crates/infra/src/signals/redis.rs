//! Redis-backed signal store.
//!
//! Plain string keys with `PX` expiry; `take` uses `GETDEL` (Redis >= 6.2) so a
//! two-factor code can be consumed exactly once.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use super::{SignalStore, SignalStoreError};
use crate::redis_client::RedisConnector;
use crate::retry::{RetryPolicy, retry};

#[derive(Debug, Clone)]
pub struct RedisSignalStore {
    redis: RedisConnector,
    retry: RetryPolicy,
}

impl RedisSignalStore {
    pub fn new(redis: RedisConnector) -> Self {
        Self {
            redis,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn run<T: redis::FromRedisValue + Send>(
        &self,
        cmd: &redis::Cmd,
    ) -> Result<T, SignalStoreError> {
        let mut conn = self.redis.connection().await.map_err(backend)?;
        match cmd.query_async::<_, T>(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_io_error() || err.is_connection_dropped() {
                    self.redis.reset().await;
                }
                Err(backend(err))
            }
        }
    }
}

fn backend(err: redis::RedisError) -> SignalStoreError {
    SignalStoreError::Backend(err.to_string())
}

#[async_trait]
impl SignalStore for RedisSignalStore {
    #[instrument(skip(self, value), err)]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SignalStoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.redis.key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64);
        retry(&self.retry, "signal_set", SignalStoreError::is_transient, || {
            self.run::<()>(&cmd)
        })
        .await
    }

    #[instrument(skip(self), err)]
    async fn get(&self, key: &str) -> Result<Option<String>, SignalStoreError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(self.redis.key(key));
        retry(&self.retry, "signal_get", SignalStoreError::is_transient, || {
            self.run::<Option<String>>(&cmd)
        })
        .await
    }

    // Not retried: a lost reply after GETDEL would silently drop the value.
    #[instrument(skip(self), err)]
    async fn take(&self, key: &str) -> Result<Option<String>, SignalStoreError> {
        let mut cmd = redis::cmd("GETDEL");
        cmd.arg(self.redis.key(key));
        self.run::<Option<String>>(&cmd).await
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, key: &str) -> Result<(), SignalStoreError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(self.redis.key(key));
        retry(&self.retry, "signal_delete", SignalStoreError::is_transient, || {
            self.run::<()>(&cmd)
        })
        .await
    }
}
