//! # Result Aggregator / 结果聚合器
//!
//! The single consumer of the result channel. Keeps running counts while
//! results arrive in completion order and produces the final [`RunSummary`]
//! in discovery order.
//!
//! 结果通道的唯一消费者。在结果按完成顺序到达时维护计数，
//! 并按发现顺序生成最终的 [`RunSummary`]。

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::core::models::{ExecutionResult, Outcome};

/// Exit code of a run where nothing failed.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code of a run with failures or an interruption.
pub const EXIT_FAILURE: u8 = 1;

/// Accumulates results as they arrive.
#[derive(Debug, Default)]
pub struct Aggregator {
    results: Vec<ExecutionResult>,
    counts: BTreeMap<Outcome, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: ExecutionResult) {
        *self.counts.entry(result.outcome).or_default() += 1;
        self.results.push(result);
    }

    /// Running count for `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn recorded(&self) -> usize {
        self.results.len()
    }

    /// Drains `rx` until every sender is gone, calling `on_result` for each
    /// result before it is recorded.
    pub async fn collect<F>(rx: mpsc::UnboundedReceiver<ExecutionResult>, mut on_result: F) -> Self
    where
        F: FnMut(&ExecutionResult),
    {
        let mut aggregator = Self::new();
        let mut stream = UnboundedReceiverStream::new(rx);
        while let Some(result) = stream.next().await {
            on_result(&result);
            aggregator.record(result);
        }
        aggregator
    }

    pub fn finish(self, not_run: usize, interrupted: bool, elapsed: Duration) -> RunSummary {
        RunSummary::from_results(self.results, not_run, interrupted, elapsed)
    }
}

/// The result of a whole run.
/// 整个运行的结果。
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// One entry per executed test, in discovery order.
    pub results: Vec<ExecutionResult>,
    pub counts: BTreeMap<Outcome, usize>,
    /// Tests that never started because the run was interrupted.
    pub not_run: usize,
    pub interrupted: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_results(
        mut results: Vec<ExecutionResult>,
        not_run: usize,
        interrupted: bool,
        elapsed: Duration,
    ) -> Self {
        results.sort_by_key(|r| r.index);
        let mut counts = BTreeMap::new();
        for result in &results {
            *counts.entry(result.outcome).or_default() += 1;
        }
        Self {
            results,
            counts,
            not_run,
            interrupted,
            elapsed,
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Whether any result counts as a failure.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failure())
    }

    /// Results that make the run fail, in discovery order.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }

    /// Non-zero iff some test failed or the run was interrupted.
    pub fn exit_code(&self) -> u8 {
        if self.interrupted || self.has_failures() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
