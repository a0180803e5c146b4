//! Benchmark orchestration.
//!
//! A run moves through `Idle → (Warmup) → Measuring → Reporting → Done`.
//! Every pass submits one task per parameter row to an [`AtMost`] pool, so
//! no more than `concurrency` queries are in flight at any instant across
//! all rounds. Successful timings go to the [`MetricRecorder`], failures to
//! the [`ErrorGroup`].
//!
//! With `failfast` set, the first failure raises a shared abort flag: no
//! further task is submitted, tasks already handed to a worker skip their
//! query, and the run returns [`BenchError::FailFast`] instead of a report.
//! Queries already executing are never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error_group::{ErrorGroup, ErrorList, DEFAULT_ERROR_CAPACITY};
use crate::limiter::AtMost;
use crate::metrics::{MemoryMetrics, MetricRecorder};
use crate::report::Report;
use crate::stats::DEFAULT_BUCKETS;
use crate::{BenchError, BenchResult, ParameterSet, QueryExecutor};

#[derive(Debug, Clone)]
pub struct BenchOptions {
    /// Maximum queries in flight at once.
    pub concurrency: usize,
    /// Times the parameter set is run through.
    pub repeat: usize,
    /// Run the parameter set once, unmeasured, before measuring.
    pub warmup: bool,
    /// Abort on the first failed query.
    pub failfast: bool,
    /// Errors kept for the final listing.
    pub error_capacity: usize,
    /// Histogram buckets in the report.
    pub buckets: usize,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            repeat: 1,
            warmup: false,
            failfast: false,
            error_capacity: DEFAULT_ERROR_CAPACITY,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl BenchOptions {
    pub fn validate(&self) -> BenchResult<()> {
        if self.concurrency == 0 {
            return Err(BenchError::Config("concurrency must be at least 1".into()));
        }
        if self.repeat == 0 {
            return Err(BenchError::Config("repeat must be at least 1".into()));
        }
        if self.buckets == 0 {
            return Err(BenchError::Config("buckets must be at least 1".into()));
        }
        if self.error_capacity == 0 {
            return Err(BenchError::Config("error capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Warmup,
    Measuring,
    Reporting,
    Done,
}

/// What a completed (non-aborted) run produces.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    /// Failures captured while measuring, up to the error capacity.
    pub errors: ErrorList,
}

/// State shared by every task of one run.
struct RunContext {
    executor: Arc<dyn QueryExecutor>,
    recorder: Arc<dyn MetricRecorder>,
    errors: Arc<ErrorGroup>,
    abort: Arc<AtomicBool>,
    query: Arc<str>,
    failfast: bool,
}

pub struct Benchmark {
    executor: Arc<dyn QueryExecutor>,
    recorder: Arc<dyn MetricRecorder>,
    options: BenchOptions,
    phase: Phase,
}

impl Benchmark {
    pub fn new(executor: Arc<dyn QueryExecutor>, options: BenchOptions) -> Self {
        Self {
            executor,
            recorder: Arc::new(MemoryMetrics::new()),
            options,
            phase: Phase::Idle,
        }
    }

    /// Record timings through `recorder` instead of the in-memory default.
    pub fn with_recorder(mut self, recorder: Arc<dyn MetricRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> &BenchOptions {
        &self.options
    }

    /// Run `query` for every row of `params`, `repeat` times, and report.
    pub fn run(&mut self, query: &str, params: &ParameterSet) -> BenchResult<RunOutcome> {
        self.options.validate()?;
        self.phase = Phase::Idle;
        self.recorder.reset();

        let limiter = AtMost::new(self.options.concurrency)?;
        let ctx = RunContext {
            executor: self.executor.clone(),
            recorder: self.recorder.clone(),
            errors: Arc::new(ErrorGroup::new(self.options.error_capacity)),
            abort: Arc::new(AtomicBool::new(false)),
            query: Arc::from(query),
            failfast: self.options.failfast,
        };

        let mut started = Instant::now();

        if self.options.warmup {
            self.phase = Phase::Warmup;
            tracing::info!(rows = params.len(), "warm-up pass");
            let result = Self::submit_round(&limiter, &ctx, params);
            limiter.wait();
            result?;

            if ctx.failfast && !ctx.errors.is_empty() {
                self.phase = Phase::Done;
                return Err(BenchError::FailFast(ctx.errors.take()));
            }
            if !ctx.errors.is_empty() {
                tracing::warn!(errors = ctx.errors.len(), "discarding warm-up errors");
            }
            ctx.errors.clear();
            self.recorder.reset();
            started = Instant::now();
        }

        self.phase = Phase::Measuring;
        tracing::info!(
            rows = params.len(),
            repeat = self.options.repeat,
            concurrency = self.options.concurrency,
            "measuring"
        );
        let mut result = Ok(());
        for _ in 0..self.options.repeat {
            if ctx.abort.load(Ordering::Acquire) {
                break;
            }
            result = Self::submit_round(&limiter, &ctx, params);
            if result.is_err() {
                break;
            }
        }
        limiter.wait();
        result?;

        if ctx.abort.load(Ordering::Acquire) {
            self.phase = Phase::Done;
            return Err(BenchError::FailFast(ctx.errors.take()));
        }

        self.phase = Phase::Reporting;
        let wall = started.elapsed();
        let times = self.recorder.snapshot(query);
        let report = Report::new(
            &times,
            wall,
            params.len(),
            self.options.repeat,
            self.options.buckets,
        );
        let errors = ctx.errors.take();
        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "some queries failed");
        }

        self.phase = Phase::Done;
        Ok(RunOutcome { report, errors })
    }

    /// Submit one task per row. Stops early once the abort flag is raised.
    fn submit_round(limiter: &AtMost, ctx: &RunContext, params: &ParameterSet) -> BenchResult<()> {
        for i in 0..params.len() {
            if ctx.abort.load(Ordering::Acquire) {
                break;
            }

            let executor = ctx.executor.clone();
            let recorder = ctx.recorder.clone();
            let errors = ctx.errors.clone();
            let abort = ctx.abort.clone();
            let query = ctx.query.clone();
            let params = params.clone();
            let failfast = ctx.failfast;

            limiter.submit(move || {
                if abort.load(Ordering::Acquire) {
                    return;
                }
                let row = &params[i];
                let result = executor
                    .execute(&query, row)
                    .map(|elapsed| recorder.record(elapsed, &query, row));
                if errors.append(result) && failfast {
                    abort.store(true, Ordering::Release);
                }
            })?;
        }
        Ok(())
    }
}
