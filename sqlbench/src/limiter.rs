//! Bounded-parallelism task runner.
//!
//! [`AtMost`] owns a fixed set of `limit` worker threads fed through a
//! rendezvous channel: [`AtMost::submit`] only returns once a worker has
//! taken the task, so callers block while every worker is busy and at most
//! `limit` tasks ever run at the same time. [`AtMost::wait`] is a barrier
//! over everything submitted so far; the pool can be reused after it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::{BenchError, BenchResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Counters for observing the pool.
#[derive(Debug, Default)]
pub struct LimiterMetrics {
    /// Total tasks submitted
    pub tasks_submitted: AtomicU64,
    /// Tasks that ran to completion (including ones that panicked)
    pub tasks_completed: AtomicU64,
    /// Tasks that panicked
    pub tasks_panicked: AtomicU64,
    /// Workers currently running a task
    pub active_workers: AtomicUsize,
    /// Highest `active_workers` seen
    pub peak_active: AtomicUsize,
}

struct Shared {
    pending: Mutex<usize>,
    idle: Condvar,
    metrics: LimiterMetrics,
}

impl Shared {
    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

pub struct AtMost {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl AtMost {
    /// Start a pool that runs at most `limit` tasks at once.
    pub fn new(limit: usize) -> BenchResult<Self> {
        if limit == 0 {
            return Err(BenchError::Config(
                "concurrency limit must be at least 1".into(),
            ));
        }

        let (sender, receiver) = bounded::<Task>(0);
        let shared = Arc::new(Shared {
            pending: Mutex::new(0),
            idle: Condvar::new(),
            metrics: LimiterMetrics::default(),
        });

        let mut workers = Vec::with_capacity(limit);
        for i in 0..limit {
            let receiver = receiver.clone();
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("sqlbench-worker-{}", i))
                .spawn(move || Self::worker_loop(receiver, shared))?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
            shared,
        })
    }

    fn worker_loop(receiver: Receiver<Task>, shared: Arc<Shared>) {
        let metrics = &shared.metrics;
        while let Ok(task) = receiver.recv() {
            let active = metrics.active_workers.fetch_add(1, Ordering::SeqCst) + 1;
            metrics.peak_active.fetch_max(active, Ordering::SeqCst);

            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                metrics.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker = thread::current().name().unwrap_or("?"),
                    "benchmark task panicked"
                );
            }

            metrics.active_workers.fetch_sub(1, Ordering::SeqCst);
            metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
            shared.finish_one();
        }
    }

    /// Hand `task` to a worker, blocking until one is free.
    ///
    /// Failures inside the task are the task's own business; a panic is
    /// caught and counted but never surfaces here.
    pub fn submit<F>(&self, task: F) -> BenchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(BenchError::PoolShutdown)?;

        *self.shared.pending.lock() += 1;
        self.shared.metrics.tasks_submitted.fetch_add(1, Ordering::Relaxed);

        if sender.send(Box::new(task)).is_err() {
            self.shared.finish_one();
            return Err(BenchError::PoolShutdown);
        }
        Ok(())
    }

    /// Block until every task submitted so far has finished.
    pub fn wait(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }

    pub fn metrics(&self) -> &LimiterMetrics {
        &self.shared.metrics
    }
}

impl Drop for AtMost {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop once it is idle.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
