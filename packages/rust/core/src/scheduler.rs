//! Batch scheduler: fixed-size groups, bounded concurrency, cooldown between
//! groups, per-row failure isolation.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, error, info, info_span};

use sheetwright_shared::Result;

use crate::selector::TaskRow;

/// Lifecycle of one row within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Selected, waiting for its group.
    Pending,
    /// Task spawned.
    Dispatched,
    /// Generation in progress.
    Generating,
    /// Result generated and written.
    Succeeded,
    /// Generation or write failed; the row stays eligible.
    Failed,
}

impl RowState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(self, next: RowState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched)
                | (Self::Dispatched, Self::Generating)
                | (Self::Dispatched, Self::Failed)
                | (Self::Generating, Self::Succeeded)
                | (Self::Generating, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Final state of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub row: u32,
    pub state: RowState,
    /// Failure message for `Failed` rows.
    pub error: Option<String>,
}

/// Outcomes of every dispatched row, in sheet order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RowOutcome>,
    /// Number of groups run.
    pub batches: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == RowState::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == RowState::Failed)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> + '_ {
        self.outcomes.iter().filter(|o| o.state == RowState::Failed)
    }
}

/// Move `row` from `from` to `to`, logging the transition.
fn advance(row: u32, from: RowState, to: RowState) -> RowState {
    debug_assert!(from.can_advance_to(to), "illegal row transition {from:?} -> {to:?}");
    debug!(row, from = ?from, to = ?to, "row state");
    to
}

/// Final outcome of a row that reached `state`.
fn settle(row: u32, from: RowState, state: RowState, error: Option<String>) -> RowOutcome {
    let state = advance(row, from, state);
    debug_assert!(state.is_terminal());
    RowOutcome { row, state, error }
}

/// Receives row completions as groups settle.
pub trait RowObserver: Send + Sync {
    fn row_finished(&self, outcome: &RowOutcome, done: usize, total: usize);
    fn cooling_down(&self, _cooldown: Duration) {}
}

/// Groups rows and runs each group concurrently.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    cooldown: Duration,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, cooldown: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cooldown,
        }
    }

    /// Run `job` for every row. Each row gets its own spawned task; a group
    /// must fully settle before the cooldown and the next group start.
    pub async fn run<F, Fut, O>(&self, rows: Vec<TaskRow>, job: F, observer: &O) -> BatchReport
    where
        F: Fn(TaskRow) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
        O: RowObserver + ?Sized,
    {
        let total = rows.len();
        let mut report = BatchReport::default();
        let mut queue = rows;

        while !queue.is_empty() {
            let group: Vec<TaskRow> = {
                let take = queue.len().min(self.batch_size);
                queue.drain(..take).collect()
            };
            report.batches += 1;
            let batch = report.batches;
            let started = Instant::now();
            debug!(batch, rows = group.len(), "dispatching batch");

            let mut handles = Vec::with_capacity(group.len());
            for task in group {
                let row = task.row;
                let span = info_span!("row", row);
                let fut = job(task);
                let dispatched = advance(row, RowState::Pending, RowState::Dispatched);
                let generating = async move {
                    advance(row, dispatched, RowState::Generating);
                    fut.await
                };
                handles.push((row, tokio::spawn(generating.instrument(span))));
            }

            for (row, handle) in handles {
                let outcome = match handle.await {
                    Ok(Ok(())) => settle(row, RowState::Generating, RowState::Succeeded, None),
                    Ok(Err(e)) => {
                        error!(row, batch, error = %e, "row failed");
                        settle(row, RowState::Generating, RowState::Failed, Some(e.to_string()))
                    }
                    Err(e) => {
                        error!(row, batch, error = %e, "row task aborted");
                        let error = Some(format!("row task aborted: {e}"));
                        settle(row, RowState::Generating, RowState::Failed, error)
                    }
                };
                observer.row_finished(&outcome, report.outcomes.len() + 1, total);
                report.outcomes.push(outcome);
            }

            info!(
                batch,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "batch settled"
            );

            if !queue.is_empty() && !self.cooldown.is_zero() {
                observer.cooling_down(self.cooldown);
                tokio::time::sleep(self.cooldown).await;
            }
        }

        report
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl RowObserver for NoopObserver {
    fn row_finished(&self, _outcome: &RowOutcome, _done: usize, _total: usize) {}
}
