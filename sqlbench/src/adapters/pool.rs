//! Fixed-size connection pool.
//!
//! Connections are checked out for one operation and returned when the
//! guard drops. With one connection per limiter slot a checkout never waits
//! during a benchmark; setup and logging may briefly contend.

use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};

pub struct ConnectionPool<C> {
    idle: Mutex<Vec<C>>,
    available: Condvar,
}

impl<C> ConnectionPool<C> {
    pub fn new(conns: Vec<C>) -> Self {
        Self {
            idle: Mutex::new(conns),
            available: Condvar::new(),
        }
    }

    /// Take a connection, blocking until one is idle.
    pub fn checkout(&self) -> Pooled<'_, C> {
        let mut idle = self.idle.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return Pooled {
                    pool: self,
                    conn: Some(conn),
                };
            }
            self.available.wait(&mut idle);
        }
    }

    fn give_back(&self, conn: C) {
        self.idle.lock().push(conn);
        self.available.notify_one();
    }
}

pub struct Pooled<'a, C> {
    pool: &'a ConnectionPool<C>,
    conn: Option<C>,
}

impl<C> Deref for Pooled<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        // Only `Drop` empties the slot.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<C> DerefMut for Pooled<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<C> Drop for Pooled<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}
