//! Shared types, traits and the benchmark engine for sqlbench.
//!
//! The engine ([`runner::Benchmark`]) takes a query template, a
//! [`ParameterSet`], a concurrency limit and a repeat factor, times every
//! execution through a [`QueryExecutor`], and reduces the samples into a
//! [`report::Report`].

pub mod adapters;
pub mod config;
pub mod error_group;
pub mod limiter;
pub mod metrics;
pub mod params;
pub mod report;
pub mod runner;
pub mod setup;
pub mod stats;

use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

pub use error_group::{ErrorGroup, ErrorList};
pub use limiter::AtMost;
pub use metrics::{MemoryMetrics, MetricRecorder};
pub use report::Report;
pub use runner::{BenchOptions, Benchmark, Phase, RunOutcome};
pub use stats::{DistributionBucket, Durations};

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Params error: {0}")]
    Params(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("worker pool has been shut down")]
    PoolShutdown,

    /// A run stopped on its first failure; holds what was captured.
    #[error("aborted: {0}")]
    FailFast(ErrorList),
}

// ────────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────────

/// A scalar bound positionally to a query placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

/// One tuple of positional values for a single execution.
pub type ParameterRow = Vec<Value>;

/// The full, read-only list of rows a benchmark runs through.
///
/// Cloning is cheap: rows are shared between every worker that needs them.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    rows: Arc<[ParameterRow]>,
}

impl ParameterSet {
    pub fn new(rows: Vec<ParameterRow>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParameterRow> {
        self.rows.iter()
    }
}

impl Index<usize> for ParameterSet {
    type Output = ParameterRow;

    fn index(&self, i: usize) -> &ParameterRow {
        &self.rows[i]
    }
}

impl From<Vec<ParameterRow>> for ParameterSet {
    fn from(rows: Vec<ParameterRow>) -> Self {
        Self::new(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Executor traits
// ────────────────────────────────────────────────────────────────────────────────

/// Runs one query with one parameter row and reports how long it took.
///
/// Called concurrently from every worker of the limiter; implementations are
/// responsible for their own connection handling.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: &str, params: &[Value]) -> BenchResult<Duration>;
}

/// A connected database: query execution plus what setup and verbose
/// logging need.
pub trait Database: QueryExecutor {
    fn name(&self) -> &str;

    /// Run a script of one or more statements without parameters.
    fn execute_batch(&self, sql: &str) -> BenchResult<()>;

    /// Insert `rows` into `table` in a single transaction.
    fn bulk_insert(&self, table: &str, columns: &[String], rows: &[ParameterRow])
        -> BenchResult<usize>;

    /// The engine's query plan for `query`, one line per entry.
    fn explain(&self, query: &str, params: &[Value]) -> BenchResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_set_shares_rows() {
        let set = ParameterSet::new(vec![vec![Value::from("a"), Value::from(1i64)], vec![]]);
        let clone = set.clone();
        assert_eq!(clone.len(), 2);
        assert_eq!(clone[0][1], Value::Integer(1));
        assert!(Arc::ptr_eq(&set.rows, &clone.rows));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("host-1").to_string(), "\"host-1\"");
        assert_eq!(Value::from(2.5f64).to_string(), "2.5");
    }

    #[test]
    fn test_fail_fast_error_display() {
        let list = ErrorList::from(vec![BenchError::Database("boom".into())]);
        let err = BenchError::FailFast(list);
        assert_eq!(err.to_string(), "aborted: Database error: boom");
    }

    #[test]
    fn test_json_error_conversion() {
        fn parse(s: &str) -> BenchResult<serde_json::Value> {
            Ok(serde_json::from_str(s)?)
        }
        let err = parse("{").unwrap_err();
        assert!(matches!(err, BenchError::Json(_)));
        assert!(err.to_string().starts_with("JSON error: "));
    }
}
