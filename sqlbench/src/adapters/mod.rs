//! Database adapter modules.
//!
//! Connection strings are `engine+connect`, e.g. `sqlite+/tmp/bench.sqlite3`.
//! A bare engine name connects to that engine's default target.

pub mod logging;
pub mod pool;
pub mod sqlite_adapter;

#[cfg(feature = "duckdb")]
pub mod duckdb_adapter;

use std::str::FromStr;
use std::sync::Arc;

use crate::{BenchError, BenchResult, Database};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Sqlite,
    DuckDb,
}

impl Engine {
    fn default_target(&self) -> &'static str {
        ":memory:"
    }
}

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub engine: Engine,
    pub target: String,
}

impl FromStr for ConnectOptions {
    type Err = BenchError;

    fn from_str(s: &str) -> BenchResult<Self> {
        let (engine, target) = s.split_once('+').unwrap_or((s, ""));
        let engine = match engine.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Engine::Sqlite,
            "duckdb" => Engine::DuckDb,
            other => {
                return Err(BenchError::Config(format!(
                    "unknown database engine {:?} in {:?}; supported: sqlite, duckdb",
                    other, s
                )))
            }
        };
        let target = if target.is_empty() {
            engine.default_target().to_string()
        } else {
            target.to_string()
        };
        Ok(Self { engine, target })
    }
}

/// Open a database with `pool_size` connections, one per concurrent worker.
pub fn connect(dsn: &str, pool_size: usize) -> BenchResult<Arc<dyn Database>> {
    let opts: ConnectOptions = dsn.parse()?;
    tracing::info!(engine = ?opts.engine, target = %opts.target, pool_size, "connecting");

    match opts.engine {
        Engine::Sqlite => Ok(Arc::new(sqlite_adapter::SqliteAdapter::open(
            &opts.target,
            pool_size,
        )?)),
        #[cfg(feature = "duckdb")]
        Engine::DuckDb => Ok(Arc::new(duckdb_adapter::DuckDbAdapter::open(
            &opts.target,
            pool_size,
        )?)),
        #[cfg(not(feature = "duckdb"))]
        Engine::DuckDb => Err(BenchError::Config(
            "DuckDB support is not compiled in; rebuild with --features duckdb".into(),
        )),
    }
}

/// Quote an SQL identifier with double quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `INSERT INTO table ("a", "b") VALUES (?, ?)`
pub(crate) fn insert_sql(table: &str, columns: &[String]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let marks = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", table, cols.join(", "), marks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_string() {
        let opts: ConnectOptions = "sqlite+/tmp/x.sqlite3".parse().unwrap();
        assert_eq!(opts.engine, Engine::Sqlite);
        assert_eq!(opts.target, "/tmp/x.sqlite3");

        let opts: ConnectOptions = "sqlite".parse().unwrap();
        assert_eq!(opts.target, ":memory:");

        let opts: ConnectOptions = "DuckDB+bench.duckdb".parse().unwrap();
        assert_eq!(opts.engine, Engine::DuckDb);
    }

    #[test]
    fn test_unknown_engine() {
        let err = "postgres+dbname=x".parse::<ConnectOptions>().unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_insert_sql() {
        let sql = insert_sql("cpu_usage", &["ts".into(), "ho\"st".into()]);
        assert_eq!(sql, "INSERT INTO cpu_usage (\"ts\", \"ho\"\"st\") VALUES (?, ?)");
    }
}
