//! Verbose-mode executor that logs each query before running it.

use std::sync::Arc;
use std::time::Duration;

use crate::{BenchResult, Database, QueryExecutor, Value};

/// What to log for every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off,
    Query,
    QueryAndPlan,
}

impl From<u8> for LogLevel {
    fn from(verbose: u8) -> Self {
        match verbose {
            0 => LogLevel::Off,
            1 => LogLevel::Query,
            _ => LogLevel::QueryAndPlan,
        }
    }
}

/// Wraps a [`Database`] as the benchmark's executor.
///
/// Logging happens outside the timed section, so it does not inflate the
/// recorded durations.
pub struct QueryLogger {
    db: Arc<dyn Database>,
    level: LogLevel,
}

impl QueryLogger {
    pub fn new(db: Arc<dyn Database>, level: LogLevel) -> Self {
        Self { db, level }
    }
}

impl QueryExecutor for QueryLogger {
    fn execute(&self, query: &str, params: &[Value]) -> BenchResult<Duration> {
        if self.level >= LogLevel::Query {
            let args: Vec<String> = params.iter().map(Value::to_string).collect();
            tracing::info!(db = self.db.name(), params = %args.join(", "), "{}", query);
        }
        if self.level >= LogLevel::QueryAndPlan {
            match self.db.explain(query, params) {
                Ok(plan) => {
                    for line in plan {
                        tracing::info!("  plan: {}", line);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "explain failed"),
            }
        }
        self.db.execute(query, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BenchError, ParameterRow};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        executed: Mutex<Vec<String>>,
        explained: Mutex<usize>,
    }

    impl QueryExecutor for Recording {
        fn execute(&self, query: &str, _params: &[Value]) -> BenchResult<Duration> {
            self.executed.lock().push(query.to_string());
            Ok(Duration::from_millis(1))
        }
    }

    impl Database for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn execute_batch(&self, _sql: &str) -> BenchResult<()> {
            Ok(())
        }

        fn bulk_insert(&self, _: &str, _: &[String], rows: &[ParameterRow]) -> BenchResult<usize> {
            Ok(rows.len())
        }

        fn explain(&self, _query: &str, _params: &[Value]) -> BenchResult<Vec<String>> {
            *self.explained.lock() += 1;
            Err(BenchError::Database("no plan".into()))
        }
    }

    #[test]
    fn test_level_from_verbosity() {
        assert_eq!(LogLevel::from(0), LogLevel::Off);
        assert_eq!(LogLevel::from(1), LogLevel::Query);
        assert_eq!(LogLevel::from(5), LogLevel::QueryAndPlan);
    }

    #[test]
    fn test_forwards_and_explains_only_when_asked() {
        let db = Arc::new(Recording::default());

        let quiet = QueryLogger::new(db.clone(), LogLevel::Query);
        assert_eq!(quiet.execute("select 1", &[]).unwrap(), Duration::from_millis(1));
        assert_eq!(*db.explained.lock(), 0);

        // A failing explain does not fail the query.
        let loud = QueryLogger::new(db.clone(), LogLevel::QueryAndPlan);
        loud.execute("select 2", &[Value::from("x")]).unwrap();
        assert_eq!(*db.explained.lock(), 1);
        assert_eq!(*db.executed.lock(), vec!["select 1", "select 2"]);
    }
}
