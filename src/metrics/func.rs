//! Module implementing metrics whose value is computed at collection time.
//!
//! See [`ValueFunc`] for details.

use super::Metric;
use crate::descriptor::{Descriptor, Opts};
use crate::error::DescriptorError;
use crate::snapshot::{Snapshot, Value};
use std::fmt;
use std::sync::Arc;

type ValueFn = dyn Fn() -> f64 + Send + Sync;

/// A counter or gauge without state of its own. The closure is called on every
/// [`Metric::snapshot`], i.e. once per collection.
///
/// Useful to expose a value that is already tracked elsewhere, e.g. the length
/// of a queue or the number of open connections of a pool.
///
/// ```
/// # use openmetrics_collector::collector::SelfCollector;
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::func::ValueFunc;
/// # use openmetrics_collector::metrics::Metric;
/// # use openmetrics_collector::snapshot::Value;
/// # use std::sync::Arc;
/// # use std::sync::atomic::{AtomicUsize, Ordering};
/// let pending = Arc::new(AtomicUsize::new(3));
/// let gauge = {
///     let pending = pending.clone();
///     ValueFunc::gauge(Opts::new("pending_jobs", "Pending jobs."), move || {
///         pending.load(Ordering::Relaxed) as f64
///     })
///     .unwrap()
/// };
///
/// pending.store(5, Ordering::Relaxed);
/// assert_eq!(&Value::Gauge(5.0), gauge.snapshot().value());
///
/// let _collector = SelfCollector::new(gauge);
/// ```
#[derive(Clone)]
pub struct ValueFunc {
    desc: Descriptor,
    kind: Kind,
    function: Arc<ValueFn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counter,
    Gauge,
}

impl ValueFunc {
    /// A counter computed by `f`. The function must be monotonically
    /// increasing across calls.
    pub fn counter<F>(opts: Opts, f: F) -> Result<Self, DescriptorError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::new(opts, Kind::Counter, f)
    }

    /// A gauge computed by `f`.
    pub fn gauge<F>(opts: Opts, f: F) -> Result<Self, DescriptorError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::new(opts, Kind::Gauge, f)
    }

    fn new<F>(opts: Opts, kind: Kind, f: F) -> Result<Self, DescriptorError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Ok(ValueFunc {
            desc: opts.describe(&[])?,
            kind,
            function: Arc::new(f),
        })
    }
}

impl fmt::Debug for ValueFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueFunc")
            .field("desc", &self.desc)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Metric for ValueFunc {
    fn desc(&self) -> &Descriptor {
        &self.desc
    }

    fn snapshot(&self) -> Snapshot {
        let v = (self.function)();
        let value = match self.kind {
            Kind::Counter => Value::Counter(v),
            Kind::Gauge => Value::Gauge(v),
        };
        Snapshot::new_unchecked(self.desc.clone(), value, Vec::new())
    }
}
