//! # Execution Scheduler / 执行调度器
//!
//! A fixed pool of `jobs` worker tasks pulls tests from a shared queue by
//! advancing an atomic cursor. Each test's run-lines run sequentially inside
//! the worker that pulled it; results flow through one channel to a single
//! collector.
//!
//! 固定数量的工作任务通过推进原子游标从共享队列中拉取测试。
//! 每个测试的运行行在拉取它的工作任务内按顺序运行；结果通过一个通道流向单个收集器。

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::core::aggregator::{Aggregator, RunSummary};
use crate::core::config::Config;
use crate::core::execution::{CommandRunner, run_test};
use crate::core::models::{ExecutionResult, Outcome, TestSpec};
use crate::infra::t;

/// An ordered list of work items handed out exactly once each.
/// 一个有序的工作项列表，每一项只分发一次。
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claims the next item. Every item is returned to exactly one caller.
    pub fn next(&self) -> Option<&T> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(index)
    }

    /// Items nobody has claimed yet.
    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Runs planned tests on a worker pool.
pub struct Scheduler<R> {
    config: Arc<Config>,
    runner: Arc<R>,
    jobs: usize,
    cancel: CancellationToken,
}

impl<R: CommandRunner + 'static> Scheduler<R> {
    /// `jobs` is clamped to at least one worker.
    pub fn new(config: Arc<Config>, runner: Arc<R>, jobs: usize) -> Self {
        Self {
            config,
            runner,
            jobs: jobs.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to abort the run (e.g. fired by a Ctrl-C handler).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Runs every test and aggregates the results. `on_result` is called by
    /// the collector once per result, in completion order.
    ///
    /// # Returns
    /// The summary of the run, with results in discovery order
    pub async fn run<F>(&self, tests: Vec<TestSpec>, on_result: F) -> RunSummary
    where
        F: FnMut(&ExecutionResult),
    {
        let started = Instant::now();
        let (tx, rx) = mpsc::unbounded_channel();
        let (not_run, aggregator) =
            tokio::join!(self.dispatch(tests, tx), Aggregator::collect(rx, on_result));
        let interrupted = self.cancel.is_cancelled();
        aggregator.finish(not_run, interrupted, started.elapsed())
    }

    /// Spawns the workers and waits for them. Returns the number of tests no
    /// worker started because the run was cancelled.
    pub async fn dispatch(
        &self,
        tests: Vec<TestSpec>,
        tx: mpsc::UnboundedSender<ExecutionResult>,
    ) -> usize {
        let queue = Arc::new(WorkQueue::new(tests));
        let workers = self.jobs.min(queue.len());
        debug!(tests = queue.len(), workers, "dispatching");

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let config = Arc::clone(&self.config);
            let runner = Arc::clone(&self.runner);
            let cancel = self.cancel.clone();
            let tx = tx.clone();
            set.spawn(async move {
                while !cancel.is_cancelled() {
                    let Some(spec) = queue.next() else {
                        break;
                    };
                    let result = AssertUnwindSafe(run_test(spec, &config, &*runner, &cancel))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!(worker, test = %spec.relative_path, "test execution panicked");
                            ExecutionResult::without_run(
                                spec,
                                Outcome::Error,
                                t!("execution.panicked").to_string(),
                            )
                        });
                    if tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("worker task failed: {e}");
            }
        }
        queue.remaining()
    }
}
