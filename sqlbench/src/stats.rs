//! Order-independent reductions over a collection of durations.
//!
//! Every result depends only on the multiset of samples, never on the order
//! they were recorded in. Averages are computed in whole nanoseconds and
//! truncated, so the same input always gives the same output.

use std::time::Duration;

/// Default number of histogram buckets in a report.
pub const DEFAULT_BUCKETS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Durations(Vec<Duration>);

/// One equal-width slice of the latency histogram.
///
/// A sample equal to `upper` belongs to this bucket; the first bucket also
/// includes its `lower` bound (the overall minimum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionBucket {
    pub lower: Duration,
    pub upper: Duration,
    pub count: usize,
    /// Largest sample that landed here.
    pub max: Option<Duration>,
}

impl DistributionBucket {
    /// The value printed as the bucket's `≤` label.
    pub fn label(&self) -> Duration {
        self.max.unwrap_or(self.upper)
    }
}

impl Durations {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(n: usize) -> Self {
        Self(Vec::with_capacity(n))
    }

    pub fn push(&mut self, d: Duration) {
        self.0.push(d);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Duration> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Duration] {
        &self.0
    }

    /// A copy sorted ascending.
    pub fn sorted(&self) -> Durations {
        let mut v = self.0.clone();
        v.sort_unstable();
        Durations(v)
    }

    pub fn sum(&self) -> Duration {
        self.0.iter().sum()
    }

    pub fn min(&self) -> Option<Duration> {
        self.0.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.0.iter().max().copied()
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.0.is_empty() {
            return None;
        }
        let total: u128 = self.0.iter().map(Duration::as_nanos).sum();
        Some(from_nanos(total / self.0.len() as u128))
    }

    /// Middle value; for an even count the mean of the two middle values,
    /// truncated to the nanosecond.
    pub fn median(&self) -> Option<Duration> {
        if self.0.is_empty() {
            return None;
        }
        let sorted = self.sorted();
        let n = sorted.0.len();
        let mid = n / 2;
        if n % 2 == 1 {
            Some(sorted.0[mid])
        } else {
            let a = sorted.0[mid - 1].as_nanos();
            let b = sorted.0[mid].as_nanos();
            Some(from_nanos((a + b) / 2))
        }
    }

    /// Split `[min, max]` into `bucket_count` equal-width buckets and count
    /// the samples in each.
    ///
    /// Bounds are computed in integer nanoseconds; the last bucket always
    /// ends exactly at `max`, absorbing any remainder. When every sample is
    /// equal a single bucket spanning that value is returned. An empty
    /// collection or a zero bucket count gives no buckets.
    pub fn distribute(&self, bucket_count: usize) -> Vec<DistributionBucket> {
        if self.0.is_empty() || bucket_count == 0 {
            return Vec::new();
        }
        let sorted = self.sorted();
        let (min, max) = (sorted.0[0], sorted.0[sorted.0.len() - 1]);

        if min == max {
            return vec![DistributionBucket {
                lower: min,
                upper: max,
                count: sorted.len(),
                max: Some(max),
            }];
        }

        let range = (max - min).as_nanos();
        let n = bucket_count as u128;
        let bound = |i: usize| {
            if i >= bucket_count {
                max
            } else {
                min + from_nanos(range * i as u128 / n)
            }
        };

        let mut buckets: Vec<DistributionBucket> = (0..bucket_count)
            .map(|i| DistributionBucket {
                lower: bound(i),
                upper: bound(i + 1),
                count: 0,
                max: None,
            })
            .collect();

        for &d in sorted.iter() {
            let idx = buckets
                .partition_point(|b| b.upper < d)
                .min(bucket_count - 1);
            let bucket = &mut buckets[idx];
            bucket.count += 1;
            // Input is sorted, so the last sample seen is the largest.
            bucket.max = Some(d);
        }
        buckets
    }
}

impl From<Vec<Duration>> for Durations {
    fn from(v: Vec<Duration>) -> Self {
        Self(v)
    }
}

impl FromIterator<Duration> for Durations {
    fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Duration> for Durations {
    fn extend<I: IntoIterator<Item = Duration>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for Durations {
    type Item = Duration;
    type IntoIter = std::vec::IntoIter<Duration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn from_nanos(nanos: u128) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
