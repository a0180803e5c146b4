//! DuckDB adapter.
//!
//! The first connection opens the database; the rest of the pool are
//! clones of it, so `:memory:` databases are shared across workers.

use std::time::{Duration, Instant};

use duckdb::types::{ToSql, ToSqlOutput, ValueRef};
use duckdb::{params_from_iter, Connection};

use super::insert_sql;
use super::pool::ConnectionPool;
use crate::{BenchError, BenchResult, Database, ParameterRow, QueryExecutor, Value};

pub struct DuckDbAdapter {
    pool: ConnectionPool<Connection>,
}

impl DuckDbAdapter {
    pub fn open(target: &str, pool_size: usize) -> BenchResult<Self> {
        let first = if target == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(target)
        }
        .map_err(|e| db_err("DuckDB open", e))?;

        let mut conns = Vec::with_capacity(pool_size.max(1));
        for _ in 1..pool_size.max(1) {
            conns.push(first.try_clone().map_err(|e| db_err("DuckDB clone", e))?);
        }
        conns.push(first);

        Ok(Self {
            pool: ConnectionPool::new(conns),
        })
    }
}

fn db_err(context: &str, e: duckdb::Error) -> BenchError {
    BenchError::Database(format!("{}: {}", context, e))
}

impl QueryExecutor for DuckDbAdapter {
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

impl Database for DuckDbAdapter {
    fn name(&self) -> &str {
        "DuckDB"
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
            .prepare(&format!("EXPLAIN {}", query))
            .map_err(|e| db_err("prepare explain", e))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(1))
            .map_err(|e| db_err("explain", e))?;
        let mut plan = Vec::new();
        for r in rows {
            plan.extend(r.map_err(|e| db_err("row", e))?.lines().map(str::to_string));
        }
        Ok(plan)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::BigInt(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Double(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}
