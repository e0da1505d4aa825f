//! Work-queue plumbing: the queue contract, the scoped item claim, the
//! processing driver and queue population.

mod driver;
mod population;


pub use driver::{Clock, ItemOutcome, QueueDriver, RunSummary};
pub use population::{populate_queue, PopulationError, PopulationSummary};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    New,
    InProgress,
    Completed,
    Failed,
}

/// One unit of work, keyed by the citizen's national identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub reference: String,
    #[serde(default)]
    pub data: Value,
}

/// Transactional queue with exclusive item claims.
pub trait WorkQueue: Send + Sync {
    /// Claims the oldest `New` item, moving it to `InProgress`.
    fn claim_next(&self) -> Result<Option<WorkItem>, QueueError>;
    fn complete(&self, item_id: u64) -> Result<(), QueueError>;
    fn fail(&self, item_id: u64, message: &str) -> Result<(), QueueError>;
    fn add_item(&self, data: Value, reference: &str) -> Result<(), QueueError>;
    /// Removes every item in `state`, returning how many were removed.
    fn clear(&self, state: ItemState) -> Result<usize, QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("unknown work item {0}")]
    UnknownItem(u64),
    #[error("work item {id} is not in progress")]
    NotClaimed { id: u64 },
    #[error("queue storage failure: {0}")]
    Storage(String),
}

/// Exclusive hold on a claimed item. Dropping it without settling marks the
/// item failed, so early returns and panics never leave it in progress.
pub struct ClaimedItem<'q, Q: WorkQueue + ?Sized> {
    queue: &'q Q,
    item: WorkItem,
    settled: bool,
}

impl<'q, Q: WorkQueue + ?Sized> ClaimedItem<'q, Q> {
    pub fn claim(queue: &'q Q) -> Result<Option<Self>, QueueError> {
        Ok(queue.claim_next()?.map(|item| Self {
            queue,
            item,
            settled: false,
        }))
    }

    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    pub fn complete(mut self) -> Result<(), QueueError> {
        self.settled = true;
        self.queue.complete(self.item.id)
    }

    pub fn fail(mut self, message: &str) -> Result<(), QueueError> {
        self.settled = true;
        self.queue.fail(self.item.id, message)
    }
}

impl<Q: WorkQueue + ?Sized> Drop for ClaimedItem<'_, Q> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.queue.fail(self.item.id, "processing aborted") {
            warn!(item = self.item.id, reference = %self.item.reference, error = %err, "could not release abandoned work item");
        }
    }
}
