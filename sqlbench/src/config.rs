//! Benchmark configuration: defaults, option files, validation.
//!
//! Every field has a default, so an option file only needs the values it
//! changes. Command-line flags are applied on top by the binary.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error_group::DEFAULT_ERROR_CAPACITY;
use crate::runner::BenchOptions;
use crate::stats::DEFAULT_BUCKETS;
use crate::{BenchError, BenchResult};

/// Connection string used when none is given.
pub const DEFAULT_DB: &str = "sqlite+:memory:";

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Connection string, `engine+connect`.
    pub db: String,
    /// Query to benchmark; `?` placeholders are bound from each row.
    pub query: String,
    /// Parameter CSV files; `-` reads stdin.
    pub params: Vec<String>,
    /// Setup steps: `file.sql` or `table:file.csv`.
    pub setup: Vec<String>,
    pub verbose: u8,
    pub warmup: bool,
    /// Queries in flight at once; 0 uses one per CPU.
    pub concurrency: usize,
    pub repeat: usize,
    pub failfast: bool,
    pub error_capacity: usize,
    pub buckets: usize,
    pub format: OutputFormat,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            db: DEFAULT_DB.to_string(),
            query: String::new(),
            params: Vec::new(),
            setup: Vec::new(),
            verbose: 0,
            warmup: false,
            concurrency: 1,
            repeat: 1,
            failfast: false,
            error_capacity: DEFAULT_ERROR_CAPACITY,
            buckets: DEFAULT_BUCKETS,
            format: OutputFormat::Text,
        }
    }
}

impl BenchConfig {
    /// Load from a `.toml`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BenchError::Config(format!("read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Err(BenchError::Config(format!(
                "unsupported config file {}: expected .toml, .yaml or .yml",
                path.display()
            ))),
        }
    }

    pub fn from_toml(content: &str) -> BenchResult<Self> {
        toml::from_str(content).map_err(|e| BenchError::Config(format!("parse TOML: {}", e)))
    }

    pub fn from_yaml(content: &str) -> BenchResult<Self> {
        serde_yaml::from_str(content).map_err(|e| BenchError::Config(format!("parse YAML: {}", e)))
    }

    /// Concurrency with `0` resolved to the CPU count.
    pub fn effective_concurrency(&self) -> usize {
        match self.concurrency {
            0 => num_cpus::get(),
            n => n,
        }
    }

    /// Parameter sources, defaulting to stdin.
    pub fn param_sources(&self) -> Vec<String> {
        if self.params.is_empty() {
            vec![crate::params::STDIN.to_string()]
        } else {
            self.params.clone()
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.query.trim().is_empty() {
            return Err(BenchError::Config("-query must be set".into()));
        }
        self.bench_options().validate()
    }

    pub fn bench_options(&self) -> BenchOptions {
        BenchOptions {
            concurrency: self.effective_concurrency(),
            repeat: self.repeat,
            warmup: self.warmup,
            failfast: self.failfast,
            error_capacity: self.error_capacity,
            buckets: self.buckets,
        }
    }
}
