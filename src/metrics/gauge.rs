//! Module implementing an Open Metrics gauge.
//!
//! See [`Gauge`] for details.

use super::{Labeled, Metric};
use crate::descriptor::{Descriptor, Opts};
use crate::error::DescriptorError;
use crate::snapshot::{check_cardinality, NumericValue, Snapshot, Value};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Open Metrics [`Gauge`] to record current measurements.
///
/// Single increasing, decreasing or constant value metric.
///
/// [`Gauge`] is generic over the actual data type tracking the [`Gauge`] state
/// as well as the data type used to interact with the [`Gauge`]. Out of
/// convenience the generic type parameters are set to use an [`AtomicI64`] as a
/// storage and [`i64`] on the interface by default.
///
/// # Examples
///
/// ## Using [`AtomicI64`] as storage and [`i64`] on the interface
///
/// ```
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::gauge::Gauge;
/// let gauge: Gauge = Gauge::new(Opts::new("in_flight", "In-flight requests.")).unwrap();
/// gauge.set(42);
/// let _value = gauge.get();
/// ```
///
/// ## Using [`AtomicU64`] as storage and [`f64`] on the interface
///
/// ```
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::gauge::Gauge;
/// # use std::sync::atomic::AtomicU64;
/// let gauge = Gauge::<f64, AtomicU64>::new(Opts::new("temperature", "Celsius.")).unwrap();
/// gauge.set(42.0);
/// let _value: f64 = gauge.get();
/// ```
#[derive(Debug)]
pub struct Gauge<N = i64, A = AtomicI64> {
    desc: Descriptor,
    label_values: Arc<[String]>,
    value: Arc<A>,
    phantom: PhantomData<N>,
}

impl<N, A> Clone for Gauge<N, A> {
    fn clone(&self) -> Self {
        Self {
            desc: self.desc.clone(),
            label_values: self.label_values.clone(),
            value: self.value.clone(),
            phantom: PhantomData,
        }
    }
}

impl<N, A: Default> Gauge<N, A> {
    /// Create a new [`Gauge`] without variable labels.
    pub fn new(opts: Opts) -> Result<Self, DescriptorError> {
        Ok(Self::labeled(opts.describe(&[])?, Vec::new()))
    }
}

impl<N, A: Default> Labeled for Gauge<N, A> {
    fn labeled(desc: Descriptor, label_values: Vec<String>) -> Self {
        if let Err(e) = check_cardinality(&desc, label_values.len()) {
            panic!("{e}");
        }
        Gauge {
            desc,
            label_values: label_values.into(),
            value: Arc::new(A::default()),
            phantom: PhantomData,
        }
    }
}

impl<N, A: Atomic<N>> Gauge<N, A> {
    /// Increase the [`Gauge`] by 1, returning the previous value.
    pub fn inc(&self) -> N {
        self.value.inc()
    }

    /// Increase the [`Gauge`] by `v`, returning the previous value.
    pub fn inc_by(&self, v: N) -> N {
        self.value.inc_by(v)
    }

    /// Decrease the [`Gauge`] by 1, returning the previous value.
    pub fn dec(&self) -> N {
        self.value.dec()
    }

    /// Decrease the [`Gauge`] by `v`, returning the previous value.
    pub fn dec_by(&self, v: N) -> N {
        self.value.dec_by(v)
    }

    /// Sets the [`Gauge`] to `v`, returning the previous value.
    pub fn set(&self, v: N) -> N {
        self.value.set(v)
    }

    /// Get the current value of the [`Gauge`].
    pub fn get(&self) -> N {
        self.value.get()
    }

    /// Exposes the inner atomic type of the [`Gauge`].
    ///
    /// This should only be used for advanced use-cases which are not directly
    /// supported by the library.
    pub fn inner(&self) -> &A {
        &self.value
    }
}

impl<N, A> Metric for Gauge<N, A>
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
            Value::Gauge(self.get().to_f64()),
            self.label_values.to_vec(),
        )
    }
}

/// Atomic operations for a [`Gauge`] value store.
pub trait Atomic<N> {
    /// Increase the value by `1`.
    fn inc(&self) -> N;

    /// Increase the value.
    fn inc_by(&self, v: N) -> N;

    /// Decrease the value by `1`.
    fn dec(&self) -> N;

    /// Decrease the value.
    fn dec_by(&self, v: N) -> N;

    /// Set the value.
    fn set(&self, v: N) -> N;

    /// Get the value.
    fn get(&self) -> N;
}

impl Atomic<i64> for AtomicI64 {
    fn inc(&self) -> i64 {
        self.inc_by(1)
    }

    fn inc_by(&self, v: i64) -> i64 {
        self.fetch_add(v, Ordering::Relaxed)
    }

    fn dec(&self) -> i64 {
        self.dec_by(1)
    }

    fn dec_by(&self, v: i64) -> i64 {
        self.fetch_sub(v, Ordering::Relaxed)
    }

    fn set(&self, v: i64) -> i64 {
        self.swap(v, Ordering::Relaxed)
    }

    fn get(&self) -> i64 {
        self.load(Ordering::Relaxed)
    }
}

impl Atomic<i32> for AtomicI32 {
    fn inc(&self) -> i32 {
        self.inc_by(1)
    }

    fn inc_by(&self, v: i32) -> i32 {
        self.fetch_add(v, Ordering::Relaxed)
    }

    fn dec(&self) -> i32 {
        self.dec_by(1)
    }

    fn dec_by(&self, v: i32) -> i32 {
        self.fetch_sub(v, Ordering::Relaxed)
    }

    fn set(&self, v: i32) -> i32 {
        self.swap(v, Ordering::Relaxed)
    }

    fn get(&self) -> i32 {
        self.load(Ordering::Relaxed)
    }
}

impl Atomic<f64> for AtomicU64 {
    fn inc(&self) -> f64 {
        self.inc_by(1.0)
    }

    fn inc_by(&self, v: f64) -> f64 {
        update_f64(self, |old| old + v)
    }

    fn dec(&self) -> f64 {
        self.dec_by(1.0)
    }

    fn dec_by(&self, v: f64) -> f64 {
        update_f64(self, |old| old - v)
    }

    fn set(&self, v: f64) -> f64 {
        f64::from_bits(self.swap(f64::to_bits(v), Ordering::Relaxed))
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.load(Ordering::Relaxed))
    }
}

/// Compare-and-swap loop over the bit pattern, returning the previous value.
fn update_f64(atomic: &AtomicU64, f: impl Fn(f64) -> f64) -> f64 {
    let mut old_u64 = atomic.load(Ordering::Relaxed);
    loop {
        let old_f64 = f64::from_bits(old_u64);
        let new = f64::to_bits(f(old_f64));
        match atomic.compare_exchange_weak(old_u64, new, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return old_f64,
            Err(x) => old_u64 = x,
        }
    }
}
