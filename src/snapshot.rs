//! Concrete metric samples produced at collection time.
//!
//! See [`Snapshot`] for details.

use crate::descriptor::Descriptor;
use crate::error::CardinalityError;
use std::time::SystemTime;

/// OpenMetrics metric type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Unknown,
}

impl MetricType {
    /// Returns the given metric type's str representation.
    pub fn as_str(&self) -> &str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Unknown => "unknown",
        }
    }
}

/// The observed value of a [`Snapshot`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Monotonically increasing total.
    Counter(f64),
    /// Current measurement.
    Gauge(f64),
    /// Value of unknown type.
    Untyped(f64),
    /// Bucketed distribution.
    Histogram {
        /// Sum of all observations.
        sum: f64,
        /// Number of observations.
        count: u64,
        /// `(upper_bound, cumulative_count)` pairs in increasing bound order.
        /// The last bound is always `f64::INFINITY`.
        buckets: Vec<(f64, u64)>,
    },
    /// Quantile summary.
    Summary {
        /// Sum of all observations.
        sum: f64,
        /// Number of observations.
        count: u64,
        /// `(quantile, value)` pairs.
        quantiles: Vec<(f64, f64)>,
    },
}

impl Value {
    /// The OpenMetrics metric type of the value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            Value::Counter(_) => MetricType::Counter,
            Value::Gauge(_) => MetricType::Gauge,
            Value::Untyped(_) => MetricType::Unknown,
            Value::Histogram { .. } => MetricType::Histogram,
            Value::Summary { .. } => MetricType::Summary,
        }
    }

    /// The scalar value for counters, gauges and untyped values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Counter(v) | Value::Gauge(v) | Value::Untyped(v) => Some(*v),
            Value::Histogram { .. } | Value::Summary { .. } => None,
        }
    }
}

/// Numeric types that can be reported as a scalar [`Value`].
pub trait NumericValue: Copy {
    /// Lossy conversion to `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric_value {
    ($($t:ident),*) => {
        $(
            impl NumericValue for $t {
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_numeric_value!(u32, u64, i32, i64, f32, f64);

/// One concrete observation of a metric family.
///
/// A [`Snapshot`] references the [`Descriptor`] of its family, carries one
/// value per variable label of that descriptor (in declaration order), the
/// observed [`Value`], and optionally an explicit observation time. Without a
/// timestamp the observation time is the time of collection.
///
/// Snapshots are created fresh on every collection and handed off by value.
///
/// ```
/// # use openmetrics_collector::descriptor::Descriptor;
/// # use openmetrics_collector::snapshot::{Snapshot, Value};
/// let desc = Descriptor::new("queue_length", "Queued jobs.", &["queue"], &[]).unwrap();
///
/// let snapshot = Snapshot::new(desc.clone(), Value::Gauge(3.0), vec!["default".into()]).unwrap();
/// assert_eq!(vec![("queue", "default")], snapshot.label_pairs());
///
/// assert!(Snapshot::new(desc, Value::Gauge(3.0), vec![]).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    desc: Descriptor,
    label_values: Vec<String>,
    value: Value,
    timestamp: Option<SystemTime>,
}

impl Snapshot {
    /// Create a new [`Snapshot`], checking that one label value is supplied per
    /// variable label of the descriptor.
    pub fn new(
        desc: Descriptor,
        value: Value,
        label_values: Vec<String>,
    ) -> Result<Self, CardinalityError> {
        check_cardinality(&desc, label_values.len())?;
        Ok(Self::new_unchecked(desc, value, label_values))
    }

    /// Callers guarantee the label cardinality.
    pub(crate) fn new_unchecked(desc: Descriptor, value: Value, label_values: Vec<String>) -> Self {
        Snapshot {
            desc,
            label_values,
            value,
            timestamp: None,
        }
    }

    /// Attach an explicit observation time.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the [`Descriptor`] of the metric family.
    pub fn desc(&self) -> &Descriptor {
        &self.desc
    }

    /// Returns the variable label values, in the order the descriptor declares
    /// the variable label names.
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Returns the observed value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the explicit observation time, if any.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Constant and variable labels merged into `(name, value)` pairs, sorted
    /// by label name.
    pub fn label_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .desc
            .const_labels()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(
                self.desc
                    .variable_labels()
                    .iter()
                    .zip(self.label_values.iter())
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}

pub(crate) fn check_cardinality(desc: &Descriptor, got: usize) -> Result<(), CardinalityError> {
    let expected = desc.variable_labels().len();
    if expected != got {
        return Err(CardinalityError {
            metric: desc.name().to_string(),
            expected,
            got,
        });
    }
    Ok(())
}
