//! Render benchmark results as the plain-text report or a JSON summary.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::stats::{DistributionBucket, Durations};
use crate::BenchResult;

/// Width of the longest histogram bar, in glyphs.
const BAR_WIDTH: f64 = 50.0;
const BAR_GLYPH: &str = "▬";

/// Statistics derived from at least one recorded sample.
#[derive(Debug, Clone)]
pub struct Summary {
    pub run_time: Duration,
    pub min: Duration,
    pub max: Duration,
    pub median: Duration,
    pub mean: Duration,
    pub distribution: Vec<DistributionBucket>,
}

/// Everything the final report shows. Derived once, never mutated.
#[derive(Debug, Clone)]
pub struct Report {
    pub parameters: usize,
    pub repeat: usize,
    pub wall: Duration,
    pub recorded: usize,
    pub summary: Option<Summary>,
}

impl Report {
    pub fn new(
        times: &Durations,
        wall: Duration,
        parameters: usize,
        repeat: usize,
        buckets: usize,
    ) -> Self {
        let summary = match (times.min(), times.max(), times.median(), times.mean()) {
            (Some(min), Some(max), Some(median), Some(mean)) => Some(Summary {
                run_time: times.sum(),
                min,
                max,
                median,
                mean,
                distribution: times.distribute(buckets),
            }),
            _ => None,
        };
        Self {
            parameters,
            repeat,
            wall,
            recorded: times.len(),
            summary,
        }
    }

    /// Queries the run was asked to execute, failed or not.
    pub fn total_queries(&self) -> usize {
        self.parameters * self.repeat
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        write!(out, "Ran {} queries in total", self.total_queries())?;
        if self.repeat > 1 {
            write!(out, " ({} × {} parameters)", self.repeat, self.parameters)?;
        }
        writeln!(out)?;
        writeln!(out, "  Wall time: {:>6} ms", format_ms(self.wall))?;

        let Some(s) = &self.summary else {
            writeln!(out, "  No successful queries recorded.")?;
            return Ok(());
        };

        writeln!(out, "  Run time:  {:>6} ms", format_ms(s.run_time))?;
        writeln!(out, "  Min:       {:>6} ms", format_ms(s.min))?;
        writeln!(out, "  Max:       {:>6} ms", format_ms(s.max))?;
        writeln!(out, "  Median:    {:>6} ms", format_ms(s.median))?;
        writeln!(out, "  Mean:      {:>6} ms", format_ms(s.mean))?;

        writeln!(out, "\n  Distribution:")?;
        let width_dur = s
            .distribution
            .iter()
            .map(|b| format_ms(b.label()).len())
            .max()
            .unwrap_or(0);
        let width_num = s
            .distribution
            .iter()
            .map(|b| b.count.to_string().len())
            .max()
            .unwrap_or(0);

        let total = self.recorded as f64;
        for b in &s.distribution {
            writeln!(
                out,
                "    ≤ {:>wd$} ms → {:>wn$}  {} {:.1}%",
                format_ms(b.label()),
                b.count,
                BAR_GLYPH.repeat(bar_len(total, b.count)),
                b.count as f64 / total * 100.0,
                wd = width_dur,
                wn = width_num,
            )?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> BenchResult<String> {
        Ok(serde_json::to_string_pretty(&JsonReport::from(self))?)
    }
}

/// Glyph count for a bucket holding `count` of `total` samples, truncated.
fn bar_len(total: f64, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (BAR_WIDTH / (total / count as f64)) as usize
}

/// Round to the nearest millisecond, halves away from zero.
pub fn format_ms(d: Duration) -> String {
    let ms = (d.as_nanos() + 500_000) / 1_000_000;
    ms.to_string()
}

fn as_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

// ────────────────────────────────────────────────────────────────────────────────
// JSON
// ────────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonReport {
    queries: usize,
    repeat: usize,
    parameters: usize,
    recorded: usize,
    wall_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<JsonStats>,
}

#[derive(Debug, Serialize)]
struct JsonStats {
    run_time_ms: f64,
    min_ms: f64,
    max_ms: f64,
    median_ms: f64,
    mean_ms: f64,
    distribution: Vec<JsonBucket>,
}

#[derive(Debug, Serialize)]
struct JsonBucket {
    lower_ms: f64,
    upper_ms: f64,
    max_ms: Option<f64>,
    count: usize,
    percent: f64,
}

impl From<&Report> for JsonReport {
    fn from(r: &Report) -> Self {
        let total = r.recorded as f64;
        Self {
            queries: r.total_queries(),
            repeat: r.repeat,
            parameters: r.parameters,
            recorded: r.recorded,
            wall_ms: as_ms(r.wall),
            stats: r.summary.as_ref().map(|s| JsonStats {
                run_time_ms: as_ms(s.run_time),
                min_ms: as_ms(s.min),
                max_ms: as_ms(s.max),
                median_ms: as_ms(s.median),
                mean_ms: as_ms(s.mean),
                distribution: s
                    .distribution
                    .iter()
                    .map(|b| JsonBucket {
                        lower_ms: as_ms(b.lower),
                        upper_ms: as_ms(b.upper),
                        max_ms: b.max.map(as_ms),
                        count: b.count,
                        percent: b.count as f64 / total * 100.0,
                    })
                    .collect(),
            }),
        }
    }
}
