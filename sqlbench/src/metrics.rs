//! Timing sample storage, keyed by query.
//!
//! [`MetricRecorder`] is the seam the benchmark records through. The
//! production implementation is [`MemoryMetrics`]; tests inject their own to
//! substitute deterministic timings.

use std::time::Duration;

use parking_lot::Mutex;

use crate::stats::Durations;
use crate::Value;

/// All samples recorded for one query.
#[derive(Debug, Clone, Default)]
pub struct QueryTimes {
    pub query: String,
    pub times: Durations,
}

/// Thread-safe sink for successful execution timings.
pub trait MetricRecorder: Send + Sync {
    /// Append one sample. Called concurrently from every worker.
    fn record(&self, elapsed: Duration, query: &str, params: &[Value]);

    /// Discard every sample. Only called while no `record` is in flight.
    fn reset(&self);

    /// Samples grouped by query, in first-seen order.
    fn queries(&self) -> Vec<QueryTimes>;

    /// Samples for `query`, or an empty collection if it never ran.
    fn snapshot(&self, query: &str) -> Durations {
        self.queries()
            .into_iter()
            .find(|q| q.query == query)
            .map(|q| q.times)
            .unwrap_or_default()
    }
}

/// In-memory recorder.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    queries: Mutex<Vec<QueryTimes>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total samples across all queries.
    pub fn len(&self) -> usize {
        self.queries.lock().iter().map(|q| q.times.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricRecorder for MemoryMetrics {
    fn record(&self, elapsed: Duration, query: &str, _params: &[Value]) {
        let mut queries = self.queries.lock();
        match queries.iter_mut().find(|q| q.query == query) {
            Some(q) => q.times.push(elapsed),
            None => {
                let mut times = Durations::with_capacity(1024);
                times.push(elapsed);
                queries.push(QueryTimes {
                    query: query.to_string(),
                    times,
                });
            }
        }
    }

    fn reset(&self) {
        self.queries.lock().clear();
    }

    fn queries(&self) -> Vec<QueryTimes> {
        self.queries.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_groups_by_query() {
        let m = MemoryMetrics::new();
        m.record(Duration::from_millis(1), "select 1", &[]);
        m.record(Duration::from_millis(2), "select 2", &[]);
        m.record(Duration::from_millis(3), "select 1", &[]);

        let queries = m.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].query, "select 1");
        assert_eq!(queries[0].times.len(), 2);
        assert_eq!(m.snapshot("select 2").sum(), Duration::from_millis(2));
        assert!(m.snapshot("select 3").is_empty());
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let m = Arc::new(MemoryMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for i in 0..250u64 {
                        m.record(Duration::from_micros(i), "q", &[]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.snapshot("q").len(), 2000);
        assert_eq!(m.len(), 2000);
    }

    #[test]
    fn test_reset_empties_snapshot() {
        let m = MemoryMetrics::new();
        m.record(Duration::from_millis(5), "q", &[Value::from("x")]);
        assert!(!m.is_empty());
        m.reset();
        assert!(m.snapshot("q").is_empty());
        assert!(m.queries().is_empty());
    }
}
