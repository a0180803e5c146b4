//! SQLite adapter (via rusqlite).
//!
//! Configuration: one connection per worker, WAL journal and a 5s busy
//! timeout for file databases. `:memory:` opens a named shared-cache
//! database so every pooled connection sees the same tables.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use super::insert_sql;
use super::pool::ConnectionPool;
use crate::{BenchError, BenchResult, Database, ParameterRow, QueryExecutor, Value};

static MEMORY_DB_SEQ: AtomicUsize = AtomicUsize::new(0);

pub struct SqliteAdapter {
    pool: ConnectionPool<Connection>,
}

impl SqliteAdapter {
    pub fn open(target: &str, pool_size: usize) -> BenchResult<Self> {
        let in_memory = target == ":memory:";
        let uri = if in_memory {
            format!(
                "file:sqlbench-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed)
            )
        } else {
            target.to_string()
        };

        let mut conns = Vec::with_capacity(pool_size.max(1));
        for i in 0..pool_size.max(1) {
            let conn = open_conn(&uri)?;
            if i == 0 && !in_memory {
                // Tune for concurrent readers.
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;",
                )
                .map_err(|e| db_err("SQLite pragma", e))?;
            }
            conns.push(conn);
        }

        Ok(Self {
            pool: ConnectionPool::new(conns),
        })
    }
}

fn open_conn(uri: &str) -> BenchResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(uri, flags).map_err(|e| db_err("SQLite open", e))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| db_err("SQLite busy_timeout", e))?;
    Ok(conn)
}

fn db_err(context: &str, e: rusqlite::Error) -> BenchError {
    BenchError::Database(format!("{}: {}", context, e))
}

impl QueryExecutor for SqliteAdapter {
    fn execute(&self, query: &str, params: &[Value]) -> BenchResult<Duration> {
        let conn = self.pool.checkout();
        let start = Instant::now();
        let mut stmt = conn
            .prepare_cached(query)
            .map_err(|e| db_err("prepare", e))?;
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|e| db_err("query", e))?;
        while rows.next().map_err(|e| db_err("row", e))?.is_some() {}
        Ok(start.elapsed())
    }
}

impl Database for SqliteAdapter {
    fn name(&self) -> &str {
        "SQLite"
    }

    fn execute_batch(&self, sql: &str) -> BenchResult<()> {
        self.pool
            .checkout()
            .execute_batch(sql)
            .map_err(|e| db_err("exec", e))
    }

    fn bulk_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[ParameterRow],
    ) -> BenchResult<usize> {
        let mut conn = self.pool.checkout();
        let tx = conn.transaction().map_err(|e| db_err("begin", e))?;
        {
            let mut stmt = tx
                .prepare(&insert_sql(table, columns))
                .map_err(|e| db_err("prepare insert", e))?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|e| db_err("insert", e))?;
            }
        }
        tx.commit().map_err(|e| db_err("commit", e))?;
        Ok(rows.len())
    }

    fn explain(&self, query: &str, params: &[Value]) -> BenchResult<Vec<String>> {
        let conn = self.pool.checkout();
        let mut stmt = conn
            .prepare(&format!("EXPLAIN QUERY PLAN {}", query))
            .map_err(|e| db_err("prepare explain", e))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(3))
            .map_err(|e| db_err("explain", e))?;
        let mut plan = Vec::new();
        for r in rows {
            plan.push(r.map_err(|e| db_err("row", e))?);
        }
        Ok(plan)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded(pool_size: usize) -> SqliteAdapter {
        let db = SqliteAdapter::open(":memory:", pool_size).unwrap();
        db.execute_batch(
            "CREATE TABLE t (host TEXT, n INTEGER);
             INSERT INTO t VALUES ('a', 1), ('b', 2), ('a', 3);",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_execute_binds_positional_params() {
        let db = seeded(1);
        let elapsed = db
            .execute("SELECT * FROM t WHERE host = ? AND n >= ?", &[Value::from("a"), Value::from(2i64)])
            .unwrap();
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_execute_errors() {
        let db = seeded(1);
        assert!(matches!(db.execute("SELEC nonsense", &[]), Err(BenchError::Database(_))));
        assert!(matches!(
            db.execute("SELECT * FROM t WHERE host = ?", &[]),
            Err(BenchError::Database(_))
        ));
        assert!(db.execute("SELECT * FROM missing", &[]).is_err());
    }

    #[test]
    fn test_memory_database_shared_by_all_connections() {
        let db = seeded(3);
        let held: Vec<_> = (0..3).map(|_| db.pool.checkout()).collect();
        for conn in &held {
            let n: i64 = conn
                .query_row("SELECT count(*) FROM t", [], |r| r.get(0))
                .unwrap();
            assert_eq!(n, 3);
        }
    }

    #[test]
    fn test_separate_memory_databases_are_isolated() {
        let _a = seeded(1);
        let b = SqliteAdapter::open(":memory:", 1).unwrap();
        assert!(b.execute("SELECT * FROM t", &[]).is_err());
    }

    #[test]
    fn test_bulk_insert_and_explain() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bench.sqlite3");
        let db = SqliteAdapter::open(path.to_str().unwrap(), 2).unwrap();
        db.execute_batch("CREATE TABLE cpu (host TEXT, usage REAL)").unwrap();

        let rows = vec![
            vec![Value::from("h1"), Value::from("0.5")],
            vec![Value::from("h2"), Value::from("0.7")],
        ];
        let n = db
            .bulk_insert("cpu", &["host".to_string(), "usage".to_string()], &rows)
            .unwrap();
        assert_eq!(n, 2);

        let count: i64 = db
            .pool
            .checkout()
            .query_row("SELECT count(*) FROM cpu WHERE usage > 0.6", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let plan = db.explain("SELECT * FROM cpu WHERE host = ?", &[Value::from("h1")]).unwrap();
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_bulk_insert_rolls_back_on_bad_row() {
        let db = seeded(1);
        let rows = vec![vec![Value::from("c"), Value::from(4i64)], vec![Value::from("d")]];
        assert!(db
            .bulk_insert("t", &["host".to_string(), "n".to_string()], &rows)
            .is_err());
        let count: i64 = db
            .pool
            .checkout()
            .query_row("SELECT count(*) FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
