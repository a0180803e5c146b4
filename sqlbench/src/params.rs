//! Load parameter rows from CSV files.
//!
//! The first record of each file is a header and is skipped. Every field is
//! bound as text; the database does any conversion.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::{BenchError, BenchResult, ParameterRow, ParameterSet, Value};

/// Source name that means "read standard input".
pub const STDIN: &str = "-";

/// Read every source in order and concatenate the rows.
pub fn read_params<S: AsRef<str>>(sources: &[S]) -> BenchResult<ParameterSet> {
    let mut all = Vec::with_capacity(128);
    for source in sources {
        let source = source.as_ref();
        let rows = if source == STDIN {
            read_rows(io::stdin().lock())
        } else {
            let file = File::open(Path::new(source))
                .map_err(|e| BenchError::Params(format!("open {:?}: {}", source, e)))?;
            read_rows(file)
        }
        .map_err(|e| BenchError::Params(format!("reading {:?}: {}", source, e)))?;

        tracing::info!(source, rows = rows.len(), "parameters read");
        all.extend(rows);
    }
    Ok(ParameterSet::new(all))
}

/// Parse one CSV stream into rows, skipping its header.
pub fn read_rows<R: Read>(reader: R) -> BenchResult<Vec<ParameterRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(|f| Value::Text(f.to_string())).collect());
    }
    Ok(rows)
}
