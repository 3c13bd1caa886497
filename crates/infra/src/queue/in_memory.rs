use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use docket_core::JobId;
use docket_retrieval::WorkItem;

use super::{EnqueueOutcome, RemoveOutcome, WorkQueue, WorkQueueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Waiting,
    Active,
    Finished,
}

#[derive(Debug)]
struct Tracked {
    state: ItemState,
    payload: Option<WorkItem>,
    retained_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct QueueState {
    waiting: VecDeque<JobId>,
    items: HashMap<JobId, Tracked>,
}

/// In-process FIFO queue with id deduplication.
#[derive(Debug)]
pub struct InMemoryWorkQueue {
    state: Mutex<QueueState>,
    retention: Duration,
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

impl InMemoryWorkQueue {
    pub fn new(retention: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            retention,
        }
    }

    /// Number of items waiting to be claimed.
    pub fn waiting_len(&self) -> usize {
        self.state.lock().map(|s| s.waiting.len()).unwrap_or(0)
    }

    fn locked<T>(&self, f: impl FnOnce(&mut QueueState) -> T) -> Result<T, WorkQueueError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| WorkQueueError::Backend("lock poisoned".to_string()))?;
        let now = Instant::now();
        state
            .items
            .retain(|_, item| item.retained_until.is_none_or(|until| until > now));
        Ok(f(&mut state))
    }

    fn finish(&self, job_id: JobId, only_if: impl Fn(ItemState) -> bool) -> Result<bool, WorkQueueError> {
        let retention = self.retention;
        self.locked(|state| {
            let Some(item) = state.items.get_mut(&job_id) else {
                return false;
            };
            if !only_if(item.state) {
                return false;
            }
            let was_waiting = item.state == ItemState::Waiting;
            item.state = ItemState::Finished;
            item.payload = None;
            item.retained_until = Some(Instant::now() + retention);
            if was_waiting {
                state.waiting.retain(|id| *id != job_id);
            }
            true
        })
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, item: WorkItem) -> Result<EnqueueOutcome, WorkQueueError> {
        self.locked(|state| {
            if state.items.contains_key(&item.job_id) {
                return EnqueueOutcome::AlreadyQueued;
            }
            state.waiting.push_back(item.job_id);
            state.items.insert(
                item.job_id,
                Tracked {
                    state: ItemState::Waiting,
                    payload: Some(item),
                    retained_until: None,
                },
            );
            EnqueueOutcome::Queued
        })
    }

    async fn dequeue(&self) -> Result<Option<WorkItem>, WorkQueueError> {
        self.locked(|state| {
            while let Some(job_id) = state.waiting.pop_front() {
                match state.items.get_mut(&job_id) {
                    Some(item) if item.state == ItemState::Waiting => {
                        item.state = ItemState::Active;
                        return item.payload.clone();
                    }
                    _ => continue,
                }
            }
            None
        })
    }

    async fn ack(&self, job_id: JobId) -> Result<(), WorkQueueError> {
        self.finish(job_id, |_| true)?;
        Ok(())
    }

    async fn release(&self, job_id: JobId) -> Result<(), WorkQueueError> {
        self.locked(|state| {
            if let Some(item) = state.items.get_mut(&job_id) {
                if item.state == ItemState::Active {
                    item.state = ItemState::Waiting;
                    state.waiting.push_front(job_id);
                }
            }
        })
    }

    async fn remove(&self, job_id: JobId) -> Result<RemoveOutcome, WorkQueueError> {
        let removed = self.finish(job_id, |s| s == ItemState::Waiting)?;
        Ok(if removed {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotQueued
        })
    }
}
