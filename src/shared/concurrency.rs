//! Bounded, unordered fan-out over independent items

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// What happened to one item of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Done,
    /// Nothing to do, e.g. the row already existed
    Skipped,
    /// The item was dropped after logging the error
    Failed,
}

/// Per-job tally of item outcomes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl JobSummary {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Done => self.done += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: JobSummary) {
        self.done += other.done;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

impl FromIterator<ItemOutcome> for JobSummary {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let mut summary = JobSummary::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

impl std::fmt::Display for JobSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.done, self.skipped, self.failed
        )
    }
}

/// Run `task` over every item with at most `limit` in flight, in no particular order.
///
/// A failing item never cancels its siblings; results come back in completion order.
pub async fn run_bounded<I, T, F, Fut, R>(items: I, limit: usize, task: F) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut futures = FuturesUnordered::new();

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let work = task(item);

        futures.push(async move {
            let _permit = semaphore.acquire().await;
            work.await
        });
    }

    let mut results = Vec::with_capacity(futures.len());
    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}
