use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{ClaimedItem, QueueError, WorkItem, WorkQueue};
use crate::telemetry;
use crate::workflows::assignments::{
    AssignmentSyncService, BillingTracker, CaseManagementClient, Severity,
};

/// Source of the evaluation time for each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ItemOutcome {
    Completed { closed: usize, task_created: bool },
    /// Business-rule failure handed over to manual processing.
    Failed { message: String },
    /// Unexpected failure; the item is failed but not cleanly committed.
    Aborted { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub aborted: usize,
    pub closed_grants: usize,
    pub created_tasks: usize,
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.completed + self.failed + self.aborted
    }
}

/// Processes queue items one at a time until the queue is drained or a stop
/// is requested.
pub struct QueueDriver<Q, C, B> {
    queue: Arc<Q>,
    service: Arc<AssignmentSyncService<C, B>>,
    clock: Clock,
    stop: Arc<AtomicBool>,
}

impl<Q, C, B> QueueDriver<Q, C, B>
where
    Q: WorkQueue,
    C: CaseManagementClient + 'static,
    B: BillingTracker + 'static,
{
    pub fn new(queue: Arc<Q>, service: Arc<AssignmentSyncService<C, B>>) -> Self {
        Self {
            queue,
            service,
            clock: Clock::System,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Setting the returned flag stops the run before the next claim.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn run(&self) -> Result<RunSummary, QueueError> {
        let mut summary = RunSummary::default();

        loop {
            if self.stop.load(Ordering::Acquire) {
                warn!("stop requested, leaving remaining items queued");
                summary.stopped_early = true;
                break;
            }

            let Some(claimed) = ClaimedItem::claim(self.queue.as_ref())? else {
                break;
            };
            let _span = telemetry::item_span(claimed.item()).entered();

            match self.process(claimed.item()) {
                ItemOutcome::Completed {
                    closed,
                    task_created,
                } => {
                    claimed.complete()?;
                    summary.completed += 1;
                    summary.closed_grants += closed;
                    summary.created_tasks += usize::from(task_created);
                }
                ItemOutcome::Failed { message } => {
                    claimed.fail(&message)?;
                    summary.failed += 1;
                }
                ItemOutcome::Aborted { message } => {
                    claimed.fail(&format!("unexpected error: {message}"))?;
                    summary.aborted += 1;
                }
            }
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            aborted = summary.aborted,
            closed_grants = summary.closed_grants,
            created_tasks = summary.created_tasks,
            "queue run finished"
        );
        Ok(summary)
    }

    pub fn process(&self, item: &WorkItem) -> ItemOutcome {
        match self.service.process_citizen(&item.reference, self.clock.now()) {
            Ok(report) => ItemOutcome::Completed {
                closed: report.closed.len(),
                task_created: report.created.is_some(),
            },
            Err(err) => {
                let message = err.to_string();
                match err.severity() {
                    Severity::BusinessRule => {
                        error!(reference = %item.reference, data = %item.data, error = %message, "work item failed");
                        ItemOutcome::Failed { message }
                    }
                    Severity::Unexpected => {
                        error!(reference = %item.reference, data = %item.data, error = %message, "work item aborted");
                        ItemOutcome::Aborted { message }
                    }
                }
            }
        }
    }
}
