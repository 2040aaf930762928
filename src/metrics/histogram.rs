//! Module implementing an Open Metrics histogram.
//!
//! See [`Histogram`] for details.

use super::{Labeled, Metric};
use crate::descriptor::{Descriptor, Opts};
use crate::error::{DescriptorError, HistogramError};
use crate::snapshot::{check_cardinality, Snapshot, Value};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::iter;
use std::sync::Arc;

/// Default upper bounds, tailored to request latencies in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Validated, strictly increasing bucket upper bounds, always ending in
/// `+Inf`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets(Arc<[f64]>);

impl Buckets {
    /// Validate the given upper bounds. `+Inf` is appended unless present.
    pub fn new(upper_bounds: impl IntoIterator<Item = f64>) -> Result<Self, HistogramError> {
        let mut bounds: Vec<f64> = upper_bounds.into_iter().collect();
        for w in bounds.windows(2) {
            if w[0].partial_cmp(&w[1]) != Some(Ordering::Less) {
                return Err(HistogramError::UnsortedBuckets {
                    previous: w[0],
                    next: w[1],
                });
            }
        }
        if bounds.last() != Some(&f64::INFINITY) {
            bounds.push(f64::INFINITY);
        }
        Ok(Buckets(bounds.into()))
    }

    /// Returns the upper bounds, including the final `+Inf`.
    pub fn upper_bounds(&self) -> &[f64] {
        &self.0
    }
}

impl Default for Buckets {
    fn default() -> Self {
        Buckets(
            DEFAULT_BUCKETS
                .iter()
                .copied()
                .chain(iter::once(f64::INFINITY))
                .collect(),
        )
    }
}

/// Open Metrics [`Histogram`] to measure distributions of discrete events.
///
/// ```
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::histogram::{Histogram, exponential_buckets};
/// let histogram = Histogram::new(
///     Opts::new("response_size_bytes", "Response sizes."),
///     exponential_buckets(1.0, 2.0, 10),
/// ).unwrap();
/// histogram.observe(4.2);
/// ```
// TODO: Consider using atomics. See
// https://github.com/tikv/rust-prometheus/pull/314.
#[derive(Debug)]
pub struct Histogram {
    desc: Descriptor,
    label_values: Arc<[String]>,
    upper_bounds: Buckets,
    inner: Arc<Mutex<Inner>>,
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        Histogram {
            desc: self.desc.clone(),
            label_values: self.label_values.clone(),
            upper_bounds: self.upper_bounds.clone(),
            inner: self.inner.clone(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    sum: f64,
    count: u64,
    // Non-cumulative, one per upper bound.
    buckets: Vec<u64>,
}

impl Histogram {
    /// Create a new [`Histogram`] without variable labels.
    pub fn new(opts: Opts, buckets: impl IntoIterator<Item = f64>) -> Result<Self, HistogramError> {
        let desc = opts.describe(&[])?;
        check_reserved_label(&desc)?;
        Ok(Self::with_buckets(desc, Vec::new(), Buckets::new(buckets)?))
    }

    /// Construct a [`Family`](super::family::Family) child with custom
    /// buckets.
    ///
    /// ```
    /// # use openmetrics_collector::descriptor::Opts;
    /// # use openmetrics_collector::metrics::family::Family;
    /// # use openmetrics_collector::metrics::histogram::{Buckets, Histogram, linear_buckets};
    /// let buckets = Buckets::new(linear_buckets(0.0, 10.0, 5)).unwrap();
    /// let desc = Opts::new("batch_size", "Items per batch.").describe(&["queue"]).unwrap();
    /// # use openmetrics_collector::descriptor::Descriptor;
    /// let family = Family::<Histogram, _>::new_with_constructor(
    ///     desc,
    ///     move |desc: Descriptor, label_values: Vec<String>| {
    ///         Histogram::with_buckets(desc, label_values, buckets.clone())
    ///     },
    /// );
    /// family.get_or_create(&["default"]).unwrap().observe(12.0);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the number of label values does not match the descriptor or
    /// if the descriptor uses the reserved label name `le`.
    pub fn with_buckets(desc: Descriptor, label_values: Vec<String>, buckets: Buckets) -> Self {
        if let Err(e) = check_cardinality(&desc, label_values.len()) {
            panic!("{e}");
        }
        if let Err(e) = check_reserved_label(&desc) {
            panic!("{e}");
        }

        let buckets_len = buckets.upper_bounds().len();
        Histogram {
            desc,
            label_values: label_values.into(),
            upper_bounds: buckets,
            inner: Arc::new(Mutex::new(Inner {
                sum: Default::default(),
                count: Default::default(),
                buckets: vec![0; buckets_len],
            })),
        }
    }

    /// Observe the given value.
    pub fn observe(&self, v: f64) {
        let upper_bounds = self.upper_bounds.upper_bounds();
        // NaN lands in the `+Inf` bucket.
        let bucket = if v.is_nan() {
            upper_bounds.len() - 1
        } else {
            upper_bounds.partition_point(|upper_bound| *upper_bound < v)
        };

        let mut inner = self.inner.lock();
        inner.sum += v;
        inner.count += 1;
        if let Some(count) = inner.buckets.get_mut(bucket) {
            *count += 1;
        }
    }

    /// Returns sum, count and the cumulative bucket counts.
    pub(crate) fn get(&self) -> (f64, u64, Vec<(f64, u64)>) {
        let inner = self.inner.lock();
        let mut cumulative = 0;
        let buckets = self
            .upper_bounds
            .upper_bounds()
            .iter()
            .zip(inner.buckets.iter())
            .map(|(upper_bound, count)| {
                cumulative += count;
                (*upper_bound, cumulative)
            })
            .collect();
        (inner.sum, inner.count, buckets)
    }
}

impl Labeled for Histogram {
    /// Uses [`DEFAULT_BUCKETS`].
    fn labeled(desc: Descriptor, label_values: Vec<String>) -> Self {
        Histogram::with_buckets(desc, label_values, Buckets::default())
    }

    fn check(desc: &Descriptor) -> Result<(), DescriptorError> {
        check_reserved_label(desc)
            .map_err(|_| DescriptorError::ReservedLabelName("le".to_string()))
    }
}

impl Metric for Histogram {
    fn desc(&self) -> &Descriptor {
        &self.desc
    }

    fn snapshot(&self) -> Snapshot {
        let (sum, count, buckets) = self.get();
        Snapshot::new_unchecked(
            self.desc.clone(),
            Value::Histogram {
                sum,
                count,
                buckets,
            },
            self.label_values.to_vec(),
        )
    }
}

fn check_reserved_label(desc: &Descriptor) -> Result<(), HistogramError> {
    let reserved = desc.variable_labels().iter().any(|l| l == "le")
        || desc.const_labels().iter().any(|(k, _)| k == "le");
    if reserved {
        return Err(HistogramError::ReservedLabel);
    }
    Ok(())
}

/// Exponential bucket distribution.
pub fn exponential_buckets(start: f64, factor: f64, length: u16) -> impl Iterator<Item = f64> {
    iter::repeat(())
        .enumerate()
        .map(move |(i, _)| start * factor.powf(i as f64))
        .take(length.into())
}

/// Linear bucket distribution.
pub fn linear_buckets(start: f64, width: f64, length: u16) -> impl Iterator<Item = f64> {
    iter::repeat(())
        .enumerate()
        .map(move |(i, _)| start + (width * (i as f64)))
        .take(length.into())
}
