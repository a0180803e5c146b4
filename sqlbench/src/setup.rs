//! Database setup steps run before benchmarking.
//!
//! `schema.sql` runs a SQL script as-is; `table:data.csv` loads a CSV file
//! (header row = column names) into `table`. Steps run in the order given.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{BenchError, BenchResult, Database, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupStep {
    Sql(PathBuf),
    Csv { table: String, path: PathBuf },
}

impl FromStr for SetupStep {
    type Err = BenchError;

    fn from_str(s: &str) -> BenchResult<Self> {
        let is_csv = Path::new(s)
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Ok(SetupStep::Sql(PathBuf::from(s)));
        }

        match s.split_once(':') {
            Some((table, file)) if !table.is_empty() && !file.is_empty() => Ok(SetupStep::Csv {
                table: table.to_string(),
                path: PathBuf::from(file),
            }),
            _ => Err(BenchError::Setup(format!(
                "wrong value for -setup: {:?}: csv files need to be as 'tablename:file.csv'",
                s
            ))),
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::Sql(path) => write!(f, "{}", path.display()),
            SetupStep::Csv { table, path } => write!(f, "{}:{}", table, path.display()),
        }
    }
}

impl SetupStep {
    pub fn path(&self) -> &Path {
        match self {
            SetupStep::Sql(path) | SetupStep::Csv { path, .. } => path,
        }
    }

    pub fn run(&self, db: &dyn Database) -> BenchResult<()> {
        let result = match self {
            SetupStep::Sql(path) => {
                tracing::info!(file = %path.display(), "running setup SQL");
                fs::read_to_string(path)
                    .map_err(BenchError::from)
                    .and_then(|sql| db.execute_batch(&sql))
            }
            SetupStep::Csv { table, path } => {
                tracing::info!(file = %path.display(), table, "loading setup CSV");
                load_csv(db, table, path).map(|n| {
                    tracing::info!(table, rows = n, "rows inserted");
                })
            }
        };
        result.map_err(|e| BenchError::Setup(format!("running {:?}: {}", self.path(), e)))
    }
}

/// Run every step in order, stopping at the first failure.
pub fn run_setup(db: &dyn Database, steps: &[SetupStep]) -> BenchResult<()> {
    for step in steps {
        step.run(db)?;
    }
    Ok(())
}

fn load_csv(db: &dyn Database, table: &str, path: &Path) -> BenchResult<usize> {
    let mut rdr = csv::Reader::from_path(path)?;
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(|f| Value::Text(f.to_string())).collect());
    }
    db.bulk_insert(table, &columns, &rows)
}
