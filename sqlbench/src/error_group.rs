//! Capacity-bounded error collection shared by concurrent workers.
//!
//! Once `capacity` errors are stored, further errors are still reported to
//! the caller (so fail-fast can trigger) but are not kept. How many were
//! dropped is not tracked.

use std::fmt;

use parking_lot::Mutex;

use crate::{BenchError, BenchResult};

/// Default number of errors kept by an [`ErrorGroup`].
pub const DEFAULT_ERROR_CAPACITY: usize = 10;

pub struct ErrorGroup {
    capacity: usize,
    errors: Mutex<Vec<BenchError>>,
}

impl ErrorGroup {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            errors: Mutex::new(Vec::with_capacity(capacity.min(64))),
        }
    }

    /// Record the error in `result`, if there is one.
    ///
    /// Returns `true` whenever `result` is an error, whether or not there was
    /// room to store it.
    pub fn append<T>(&self, result: BenchResult<T>) -> bool {
        let Err(err) = result else {
            return false;
        };
        let mut errors = self.errors.lock();
        if errors.len() < self.capacity {
            errors.push(err);
        }
        true
    }

    /// Number of stored errors, at most `capacity`.
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Drop everything stored so far.
    pub fn clear(&self) {
        self.errors.lock().clear();
    }

    /// Move the stored errors out, leaving the group empty.
    pub fn take(&self) -> ErrorList {
        ErrorList(std::mem::take(&mut *self.errors.lock()))
    }
}

impl Default for ErrorGroup {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}

/// An owned snapshot of the errors captured during a run.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<BenchError>);

impl ErrorList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BenchError> {
        self.0.iter()
    }
}

impl From<Vec<BenchError>> for ErrorList {
    fn from(errors: Vec<BenchError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no errors"),
            [only] => write!(f, "{}", only),
            all => {
                write!(f, "{} errors:", all.len())?;
                for err in all {
                    write!(f, "\n  - {}", err)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn db_err(n: usize) -> BenchResult<()> {
        Err(BenchError::Database(format!("failure {}", n)))
    }

    #[test]
    fn test_append_reports_errors_only() {
        let group = ErrorGroup::new(3);
        assert!(!group.append(Ok::<_, BenchError>(42)));
        assert!(group.is_empty());
        assert!(group.append(db_err(1)));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_capacity_drops_overflow_but_still_triggers() {
        let group = ErrorGroup::new(2);
        for n in 0..5 {
            assert!(group.append(db_err(n)));
        }
        assert_eq!(group.len(), 2);

        let list = group.take();
        let messages: Vec<String> = list.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages, vec!["Database error: failure 0", "Database error: failure 1"]);
        assert!(group.is_empty());
    }

    #[test]
    fn test_concurrent_append_is_capped() {
        let group = Arc::new(ErrorGroup::new(10));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let group = group.clone();
                thread::spawn(move || {
                    for n in 0..100 {
                        group.append(db_err(t * 100 + n));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(group.len(), 10);
    }

    #[test]
    fn test_error_list_display() {
        let list = ErrorList::from(vec![
            BenchError::Database("a".into()),
            BenchError::Params("b".into()),
        ]);
        assert_eq!(
            list.to_string(),
            "2 errors:\n  - Database error: a\n  - Params error: b"
        );
        assert_eq!(ErrorList::default().to_string(), "no errors");
    }
}
