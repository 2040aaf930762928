//! Module implementing an Open Metrics counter.
//!
//! See [`Counter`] for details.

use super::{Labeled, Metric};
use crate::descriptor::{Descriptor, Opts};
use crate::error::DescriptorError;
use crate::snapshot::{check_cardinality, NumericValue, Snapshot, Value};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Open Metrics [`Counter`] to measure discrete events.
///
/// Single monotonically increasing value metric.
///
/// [`Counter`] is generic over the actual data type tracking the [`Counter`]
/// state as well as the data type used to interact with the [`Counter`]. Out
/// of convenience the generic type parameters are set to use an [`AtomicU64`]
/// as a storage and [`u64`] on the interface by default.
///
/// Clones share the same state, so one clone can be registered while another
/// is incremented.
///
/// # Examples
///
/// ## Using [`AtomicU64`] as storage and [`u64`] on the interface
///
/// ```
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::counter::Counter;
/// let counter: Counter = Counter::new(Opts::new("requests_total", "Requests.")).unwrap();
/// counter.inc();
/// let _value: u64 = counter.get();
/// ```
///
/// ## Using [`AtomicU64`] as storage and [`f64`] on the interface
///
/// ```
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::counter::Counter;
/// # use std::sync::atomic::AtomicU64;
/// let counter = Counter::<f64, AtomicU64>::new(Opts::new("busy_seconds_total", "Busy time.")).unwrap();
/// counter.inc_by(0.25);
/// let _value: f64 = counter.get();
/// ```
#[derive(Debug)]
pub struct Counter<N = u64, A = AtomicU64> {
    desc: Descriptor,
    label_values: Arc<[String]>,
    value: Arc<A>,
    phantom: PhantomData<N>,
}

impl<N, A> Clone for Counter<N, A> {
    fn clone(&self) -> Self {
        Self {
            desc: self.desc.clone(),
            label_values: self.label_values.clone(),
            value: self.value.clone(),
            phantom: PhantomData,
        }
    }
}

impl<N, A: Default> Counter<N, A> {
    /// Create a new [`Counter`] without variable labels.
    pub fn new(opts: Opts) -> Result<Self, DescriptorError> {
        Ok(Self::labeled(opts.describe(&[])?, Vec::new()))
    }
}

impl<N, A: Default> Labeled for Counter<N, A> {
    fn labeled(desc: Descriptor, label_values: Vec<String>) -> Self {
        if let Err(e) = check_cardinality(&desc, label_values.len()) {
            panic!("{e}");
        }
        Counter {
            desc,
            label_values: label_values.into(),
            value: Arc::new(A::default()),
            phantom: PhantomData,
        }
    }
}

impl<N, A: Atomic<N>> Counter<N, A> {
    /// Increase the [`Counter`] by 1, returning the previous value.
    pub fn inc(&self) -> N {
        self.value.inc()
    }

    /// Increase the [`Counter`] by `v`, returning the previous value.
    ///
    /// # Panics
    ///
    /// For `f64` counters, panics if `v` is negative, as a counter cannot
    /// decrease.
    pub fn inc_by(&self, v: N) -> N {
        self.value.inc_by(v)
    }

    /// Get the current value of the [`Counter`].
    pub fn get(&self) -> N {
        self.value.get()
    }

    /// Exposes the inner atomic type of the [`Counter`].
    ///
    /// This should only be used for advanced use-cases which are not directly
    /// supported by the library.
    ///
    /// The caller of this function has to uphold the property of an Open
    /// Metrics counter namely that the value is monotonically increasing, i.e.
    /// either stays the same or increases.
    pub fn inner(&self) -> &A {
        &self.value
    }
}

impl<N, A> Metric for Counter<N, A>
where
    N: NumericValue + Send + Sync,
    A: Atomic<N> + Send + Sync,
{
    fn desc(&self) -> &Descriptor {
        &self.desc
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new_unchecked(
            self.desc.clone(),
            Value::Counter(self.get().to_f64()),
            self.label_values.to_vec(),
        )
    }
}

/// Atomic operations for a [`Counter`] value store.
pub trait Atomic<N> {
    /// Increase the value by `1`.
    fn inc(&self) -> N;

    /// Increase the value.
    ///
    /// # Panics
    ///
    /// Implementations for floating point values panic on negative `v`.
    fn inc_by(&self, v: N) -> N;

    /// Get the the value.
    fn get(&self) -> N;
}

impl Atomic<u64> for AtomicU64 {
    fn inc(&self) -> u64 {
        self.inc_by(1)
    }

    fn inc_by(&self, v: u64) -> u64 {
        self.fetch_add(v, Ordering::Relaxed)
    }

    fn get(&self) -> u64 {
        self.load(Ordering::Relaxed)
    }
}

impl Atomic<u32> for AtomicU32 {
    fn inc(&self) -> u32 {
        self.inc_by(1)
    }

    fn inc_by(&self, v: u32) -> u32 {
        self.fetch_add(v, Ordering::Relaxed)
    }

    fn get(&self) -> u32 {
        self.load(Ordering::Relaxed)
    }
}

impl Atomic<f64> for AtomicU64 {
    fn inc(&self) -> f64 {
        self.inc_by(1.0)
    }

    fn inc_by(&self, v: f64) -> f64 {
        assert!(v >= 0.0, "counter cannot decrease in value");

        let mut old_u64 = self.load(Ordering::Relaxed);
        let mut old_f64;
        loop {
            old_f64 = f64::from_bits(old_u64);
            let new = f64::to_bits(old_f64 + v);
            match self.compare_exchange_weak(old_u64, new, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(x) => old_u64 = x,
            }
        }

        old_f64
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.load(Ordering::Relaxed))
    }
}
