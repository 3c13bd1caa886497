//! Redis-backed work queue.
//!
//! ## Layout
//!
//! - `{prefix}:queue:waiting`: list of job ids (LPUSH in, RPOP out; a
//!   released item is RPUSHed back so it is claimed next).
//! - `{prefix}:queue:item:{job_id}`: hash `{state, payload}` where state is
//!   `waiting | active | done | removed`. The hash is the dedup record; it
//!   loses its payload and gets a TTL once the item is finished.
//!
//! Every state change is a single Lua script so that dedup, claim and
//! removal are atomic against concurrent API instances and workers.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use docket_core::JobId;
use docket_retrieval::WorkItem;

use super::{EnqueueOutcome, RemoveOutcome, WorkQueue, WorkQueueError};
use crate::redis_client::RedisConnector;
use crate::retry::{RetryPolicy, retry};

const ENQUEUE_SCRIPT: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 1 then
  return 0
end
redis.call("HSET", KEYS[1], "state", "waiting", "payload", ARGV[2])
redis.call("LPUSH", KEYS[2], ARGV[1])
return 1
"#;

const DEQUEUE_SCRIPT: &str = r#"
while true do
  local id = redis.call("RPOP", KEYS[1])
  if not id then
    return false
  end
  local key = ARGV[1] .. id
  if redis.call("HGET", key, "state") == "waiting" then
    redis.call("HSET", key, "state", "active")
    return redis.call("HGET", key, "payload")
  end
end
"#;

const ACK_SCRIPT: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 0 then
  return 0
end
redis.call("HSET", KEYS[1], "state", "done")
redis.call("HDEL", KEYS[1], "payload")
redis.call("PEXPIRE", KEYS[1], ARGV[1])
return 1
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call("HGET", KEYS[1], "state") ~= "active" then
  return 0
end
redis.call("HSET", KEYS[1], "state", "waiting")
redis.call("RPUSH", KEYS[2], ARGV[1])
return 1
"#;

const REMOVE_SCRIPT: &str = r#"
if redis.call("HGET", KEYS[1], "state") ~= "waiting" then
  return 0
end
redis.call("LREM", KEYS[2], 0, ARGV[1])
redis.call("HSET", KEYS[1], "state", "removed")
redis.call("HDEL", KEYS[1], "payload")
redis.call("PEXPIRE", KEYS[1], ARGV[2])
return 1
"#;

#[derive(Debug, Clone)]
pub struct RedisWorkQueue {
    redis: RedisConnector,
    retention: Duration,
    retry: RetryPolicy,
}

impl RedisWorkQueue {
    pub fn new(redis: RedisConnector, retention: Duration) -> Self {
        Self {
            redis,
            retention,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn waiting_key(&self) -> String {
        self.redis.key("queue:waiting")
    }

    fn item_prefix(&self) -> String {
        self.redis.key("queue:item:")
    }

    fn item_key(&self, job_id: JobId) -> String {
        format!("{}{job_id}", self.item_prefix())
    }

    fn retention_ms(&self) -> u64 {
        self.retention.as_millis().max(1) as u64
    }

    async fn eval<T: redis::FromRedisValue + Send>(
        &self,
        script: &str,
        keys: &[String],
        args: &[String],
    ) -> Result<T, WorkQueueError> {
        let mut conn = self
            .redis
            .connection()
            .await
            .map_err(|e| WorkQueueError::Unavailable(e.to_string()))?;

        let mut cmd = redis::cmd("EVAL");
        cmd.arg(script).arg(keys.len());
        for key in keys {
            cmd.arg(key);
        }
        for arg in args {
            cmd.arg(arg);
        }

        match cmd.query_async::<_, T>(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_io_error() || err.is_connection_dropped() {
                    self.redis.reset().await;
                }
                Err(WorkQueueError::Backend(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    #[instrument(skip(self, item), fields(job_id = %item.job_id), err)]
    async fn enqueue(&self, item: WorkItem) -> Result<EnqueueOutcome, WorkQueueError> {
        let payload = serde_json::to_string(&item)
            .map_err(|e| WorkQueueError::Serialization(e.to_string()))?;
        let keys = [self.item_key(item.job_id), self.waiting_key()];
        let args = [item.job_id.to_string(), payload];

        // Safe to retry: the script is a no-op for a known id.
        let queued: i64 = retry(&self.retry, "queue_enqueue", WorkQueueError::is_transient, || {
            self.eval(ENQUEUE_SCRIPT, &keys, &args)
        })
        .await?;

        Ok(if queued == 1 {
            EnqueueOutcome::Queued
        } else {
            EnqueueOutcome::AlreadyQueued
        })
    }

    #[instrument(skip(self), err)]
    async fn dequeue(&self) -> Result<Option<WorkItem>, WorkQueueError> {
        let keys = [self.waiting_key()];
        let args = [self.item_prefix()];
        let payload: Option<String> =
            retry(&self.retry, "queue_dequeue", WorkQueueError::is_transient, || {
                self.eval(DEQUEUE_SCRIPT, &keys, &args)
            })
            .await?;

        payload
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| WorkQueueError::Serialization(e.to_string()))
            })
            .transpose()
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn ack(&self, job_id: JobId) -> Result<(), WorkQueueError> {
        let keys = [self.item_key(job_id)];
        let args = [self.retention_ms().to_string()];
        let _: i64 = retry(&self.retry, "queue_ack", WorkQueueError::is_transient, || {
            self.eval(ACK_SCRIPT, &keys, &args)
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn release(&self, job_id: JobId) -> Result<(), WorkQueueError> {
        let keys = [self.item_key(job_id), self.waiting_key()];
        let args = [job_id.to_string()];
        // Safe to retry: the script only moves an item that is still active.
        let _: i64 = retry(&self.retry, "queue_release", WorkQueueError::is_transient, || {
            self.eval(RELEASE_SCRIPT, &keys, &args)
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn remove(&self, job_id: JobId) -> Result<RemoveOutcome, WorkQueueError> {
        let keys = [self.item_key(job_id), self.waiting_key()];
        let args = [job_id.to_string(), self.retention_ms().to_string()];
        let removed: i64 = retry(&self.retry, "queue_remove", WorkQueueError::is_transient, || {
            self.eval(REMOVE_SCRIPT, &keys, &args)
        })
        .await?;

        Ok(if removed == 1 {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotQueued
        })
    }
}
