//! sqlbench: benchmark an SQL query over a list of parameters.
//!
//! Usage:
//!   sqlbench -d sqlite+/tmp/test.sqlite3 \
//!       -s testdata/schema.sql -s cpu_usage:testdata/data.csv \
//!       -p testdata/params.csv \
//!       -q 'select * from cpu_usage where host=? and ts>=? and ts<=?'
//!   sqlbench --config bench.toml -c 8 -r 3   # flags override the file

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use colored::Colorize;
use sqlbench::adapters::logging::{LogLevel, QueryLogger};
use sqlbench::adapters;
use sqlbench::config::{BenchConfig, OutputFormat};
use sqlbench::params::read_params;
use sqlbench::setup::{run_setup, SetupStep};
use sqlbench::{BenchResult, Benchmark};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const AFTER_HELP: &str = "\
Setup steps run in order: *.sql files are run as-is, CSV files must be given
as \"table:file.csv\" and are inserted into that table (header row = columns).

Example:
    sqlbench -d sqlite+/tmp/test.sqlite3 \\
        -s testdata/schema.sql -s cpu_usage:testdata/data.csv \\
        -p testdata/params.csv \\
        -q 'select * from cpu_usage where host=? and ts>=? and ts<=?'";

#[derive(Parser, Debug)]
#[command(
    name = "sqlbench",
    version,
    about = "Run benchmarks on an SQL database",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Query to run; "?" placeholders are bound from each parameter row.
    #[arg(short, long)]
    query: Option<String>,

    /// CSV file with parameters, one row per execution ("-" reads stdin, the default).
    /// May be given more than once.
    #[arg(short, long = "params")]
    params: Vec<String>,

    /// Setup step: "file.sql" or "table:file.csv". May be given more than once.
    #[arg(short, long)]
    setup: Vec<String>,

    /// Connection string as engine+connect, e.g. sqlite+/tmp/bench.sqlite3 [default: sqlite+:memory:]
    #[arg(short, long)]
    db: Option<String>,

    /// Log each query; twice to also log its query plan.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Run the parameter list once before measuring anything.
    #[arg(short, long)]
    warmup: bool,

    /// Run this many queries concurrently (0 = one per CPU) [default: 1]
    #[arg(short = 'c', long = "concurrent")]
    concurrent: Option<usize>,

    /// Repeat the parameter list this many times [default: 1]
    #[arg(short, long)]
    repeat: Option<usize>,

    /// Exit on the first error without printing a report.
    #[arg(short, long)]
    failfast: bool,

    /// Read options from a TOML or YAML file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of histogram buckets [default: 4]
    #[arg(long)]
    buckets: Option<usize>,

    /// Report format.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "sqlbench:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> BenchResult<()> {
    let cfg = merge_config(&cli)?;
    init_tracing(cfg.verbose);
    cfg.validate()?;

    let steps = cfg
        .setup
        .iter()
        .map(|s| s.parse::<SetupStep>())
        .collect::<BenchResult<Vec<_>>>()?;

    let params = read_params(&cfg.param_sources())?;
    let options = cfg.bench_options();

    let db = adapters::connect(&cfg.db, options.concurrency)?;
    run_setup(db.as_ref(), &steps)?;

    let executor = Arc::new(QueryLogger::new(db, LogLevel::from(cfg.verbose)));
    let mut bench = Benchmark::new(executor, options);
    let outcome = bench.run(&cfg.query, &params)?;

    if !outcome.errors.is_empty() {
        eprintln!("{} {}", "errors:".yellow().bold(), outcome.errors);
    }

    match cfg.format {
        OutputFormat::Text => print!("{}", outcome.report.render_text()),
        OutputFormat::Json => println!("{}", outcome.report.to_json()?),
    }
    Ok(())
}

/// Option file (if any) with command-line flags applied on top.
fn merge_config(cli: &Cli) -> BenchResult<BenchConfig> {
    let mut cfg = match &cli.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };

    if let Some(query) = &cli.query {
        cfg.query = query.clone();
    }
    if !cli.params.is_empty() {
        cfg.params = cli.params.clone();
    }
    if !cli.setup.is_empty() {
        cfg.setup = cli.setup.clone();
    }
    if let Some(db) = &cli.db {
        cfg.db = db.clone();
    }
    if let Some(c) = cli.concurrent {
        cfg.concurrency = c;
    }
    if let Some(r) = cli.repeat {
        cfg.repeat = r;
    }
    if let Some(b) = cli.buckets {
        cfg.buckets = b;
    }
    if let Some(f) = cli.format {
        cfg.format = f;
    }
    cfg.verbose = cfg.verbose.max(cli.verbose);
    cfg.warmup |= cli.warmup;
    cfg.failfast |= cli.failfast;
    Ok(cfg)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Ignore the error if a subscriber is already installed.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "sqlbench", "-q", "select ?", "-p", "a.csv", "-p", "b.csv", "-s", "schema.sql",
            "-d", "sqlite+x.db", "-vv", "-w", "-c", "8", "-r", "2", "-f",
        ]);
        let cfg = merge_config(&cli).unwrap();
        assert_eq!(cfg.query, "select ?");
        assert_eq!(cfg.params, vec!["a.csv", "b.csv"]);
        assert_eq!(cfg.db, "sqlite+x.db");
        assert_eq!(cfg.verbose, 2);
        assert!(cfg.warmup && cfg.failfast);
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.repeat, 2);
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::parse_from(["sqlbench", "--query", "select 1"]);
        let cfg = merge_config(&cli).unwrap();
        assert_eq!(cfg.db, "sqlite+:memory:");
        assert_eq!(cfg.param_sources(), vec!["-"]);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.format, OutputFormat::Text);
    }
}
