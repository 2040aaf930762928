//! Module implementing an Open Metrics metric family.
//!
//! See [`Family`] for details.

use super::{Labeled, Metric};
use crate::collector::Collector;
use crate::descriptor::Descriptor;
use crate::error::{CardinalityError, DescriptorError, SinkClosed};
use crate::sink::Sink;
use crate::snapshot::{check_cardinality, Snapshot};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Representation of the OpenMetrics *MetricFamily* data type.
///
/// A [`Family`] is a set of metrics with the same name, help text and type,
/// differentiated by their label values, thus spanning a multidimensional
/// space. All children share the one [`Descriptor`] of the family, whose
/// variable labels define the dimensions.
///
/// A [`Family`] is a [`Collector`] in its own right: it describes its single
/// descriptor and emits one snapshot per child on every collection.
///
/// ```
/// # use openmetrics_collector::collector::Collector;
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::counter::Counter;
/// # use openmetrics_collector::metrics::family::Family;
/// let desc = Opts::new("http_requests_total", "HTTP requests.")
///     .describe(&["method", "code"])
///     .unwrap();
/// let family = Family::<Counter>::new(desc).unwrap();
///
/// // Record a single HTTP GET request.
/// family.get_or_create(&["GET", "200"]).unwrap().inc();
///
/// let mut sink = Vec::new();
/// family.collect(&mut sink).unwrap();
/// assert_eq!(1, sink.len());
/// ```
pub struct Family<M, C = fn(Descriptor, Vec<String>) -> M> {
    desc: Descriptor,
    metrics: Arc<RwLock<HashMap<Vec<String>, M>>>,
    /// Function that when called constructs a new metric.
    ///
    /// For most metric types this would simply be its [`Labeled`]
    /// implementation set through [`Family::new`]. For metric types that need
    /// custom construction logic like
    /// [`Histogram`](super::histogram::Histogram) in order to set specific
    /// buckets, a custom constructor is set via [`Family::new_with_constructor`].
    constructor: C,
}

/// A constructor for creating new metrics in a [`Family`] when calling
/// [`Family::get_or_create`]. Such constructor is provided via
/// [`Family::new_with_constructor`].
///
/// ```
/// # use openmetrics_collector::descriptor::{Descriptor, Opts};
/// # use openmetrics_collector::metrics::family::{Family, MetricConstructor};
/// # use openmetrics_collector::metrics::histogram::{exponential_buckets, Buckets, Histogram};
/// struct CustomBuilder {
///     buckets: Buckets,
/// }
///
/// impl MetricConstructor<Histogram> for CustomBuilder {
///     fn new_metric(&self, desc: Descriptor, label_values: Vec<String>) -> Histogram {
///         // When a new histogram is created, this function will be called.
///         Histogram::with_buckets(desc, label_values, self.buckets.clone())
///     }
/// }
///
/// let custom_builder = CustomBuilder {
///     buckets: Buckets::new(exponential_buckets(1.0, 2.0, 10)).unwrap(),
/// };
/// let desc = Opts::new("latency", "Latency.").describe(&["path"]).unwrap();
/// let family = Family::<Histogram, _>::new_with_constructor(desc, custom_builder);
/// family.get_or_create(&["/"]).unwrap().observe(3.0);
/// ```
pub trait MetricConstructor<M> {
    /// Construct the child for `label_values`.
    fn new_metric(&self, desc: Descriptor, label_values: Vec<String>) -> M;
}

/// In cases in which the explicit type of the metric is not required, it is
/// possible to directly provide a closure even if it captures variables.
///
/// ```
/// # use openmetrics_collector::descriptor::{Descriptor, Opts};
/// # use openmetrics_collector::metrics::family::Family;
/// # use openmetrics_collector::metrics::histogram::{Buckets, Histogram};
/// let custom_buckets = Buckets::new([0.0, 10.0, 100.0]).unwrap();
/// let desc = Opts::new("payload_bytes", "Payload size.").describe(&[]).unwrap();
/// let family = Family::<Histogram, _>::new_with_constructor(desc, |desc: Descriptor, label_values: Vec<String>| {
///     Histogram::with_buckets(desc, label_values, custom_buckets.clone())
/// });
/// # family.get_or_create(&[]).unwrap();
/// ```
impl<M, F: Fn(Descriptor, Vec<String>) -> M> MetricConstructor<M> for F {
    fn new_metric(&self, desc: Descriptor, label_values: Vec<String>) -> M {
        self(desc, label_values)
    }
}

impl<M: Labeled> Family<M> {
    /// Create a metric family constructing children through [`Labeled`].
    ///
    /// Fails if `desc` uses a label name reserved by the metric type, e.g.
    /// `le` for a [`Histogram`](super::histogram::Histogram).
    pub fn new(desc: Descriptor) -> Result<Self, DescriptorError> {
        M::check(&desc)?;
        Ok(Self {
            desc,
            metrics: Arc::new(RwLock::new(Default::default())),
            constructor: M::labeled,
        })
    }
}

impl<M, C> Family<M, C> {
    /// Create a metric family using a custom constructor to construct new
    /// metrics.
    ///
    /// When calling [`Family::get_or_create`] a [`Family`] needs to be able to
    /// construct a new metric in case none exists for the given label values.
    /// In most cases, e.g. for [`Counter`](super::counter::Counter), the
    /// [`Labeled`] implementation is all that is needed, see [`Family::new`].
    /// For metric types such as [`Histogram`](super::histogram::Histogram)
    /// one might want custom buckets. For more involved constructors see
    /// [`MetricConstructor`].
    pub fn new_with_constructor(desc: Descriptor, constructor: C) -> Self {
        Self {
            desc,
            metrics: Arc::new(RwLock::new(Default::default())),
            constructor,
        }
    }

    /// Returns the [`Descriptor`] shared by all children.
    pub fn desc(&self) -> &Descriptor {
        &self.desc
    }

    /// Returns the number of children.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Whether no child exists yet.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

impl<M, C: MetricConstructor<M>> Family<M, C> {
    /// Access a metric with the given label values, creating it if one does
    /// not yet exist.
    ///
    /// Label values are given in the order of the variable labels of the
    /// family's [`Descriptor`]. Fails if their number does not match.
    ///
    /// ```
    /// # use openmetrics_collector::descriptor::Opts;
    /// # use openmetrics_collector::metrics::counter::Counter;
    /// # use openmetrics_collector::metrics::family::Family;
    /// #
    /// let desc = Opts::new("requests", "Requests.").describe(&["method"]).unwrap();
    /// let family = Family::<Counter>::new(desc).unwrap();
    ///
    /// // Will create the metric with label `method="GET"` on first call and
    /// // return a reference.
    /// family.get_or_create(&["GET"]).unwrap().inc();
    ///
    /// // Will return a reference to the existing metric on all subsequent
    /// // calls.
    /// family.get_or_create(&["GET"]).unwrap().inc();
    ///
    /// assert!(family.get_or_create(&["GET", "200"]).is_err());
    /// ```
    ///
    /// NB: The returned guard holds a read lock on the family. Creating new
    /// children blocks while it is alive.
    pub fn get_or_create(
        &self,
        label_values: &[&str],
    ) -> Result<MappedRwLockReadGuard<'_, M>, CardinalityError> {
        check_cardinality(&self.desc, label_values.len())?;
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();

        if let Ok(metric) =
            RwLockReadGuard::try_map(self.metrics.read(), |metrics| metrics.get(&key))
        {
            return Ok(metric);
        }

        let mut write_guard = self.metrics.write();
        if !write_guard.contains_key(&key) {
            let metric = self.constructor.new_metric(self.desc.clone(), key.clone());
            write_guard.insert(key.clone(), metric);
        }

        let read_guard = RwLockWriteGuard::downgrade(write_guard);

        Ok(RwLockReadGuard::map(read_guard, |metrics| {
            metrics
                .get(&key)
                .expect("Metric to exist after creating it.")
        }))
    }

    /// Remove the child with the given label values, returning whether it
    /// existed.
    ///
    /// The next collection no longer reports it.
    pub fn remove(&self, label_values: &[&str]) -> bool {
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.metrics.write().remove(&key).is_some()
    }

    /// Remove all children.
    pub fn clear(&self) {
        self.metrics.write().clear()
    }
}

impl<M, C: Clone> Clone for Family<M, C> {
    fn clone(&self) -> Self {
        Family {
            desc: self.desc.clone(),
            metrics: self.metrics.clone(),
            constructor: self.constructor.clone(),
        }
    }
}

impl<M, C> std::fmt::Debug for Family<M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Family")
            .field("desc", &self.desc)
            .field("len", &self.len())
            .finish()
    }
}

impl<M, C> Collector for Family<M, C>
where
    M: Metric,
    C: Send + Sync,
{
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        Cow::Borrowed(std::slice::from_ref(&self.desc))
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        // Release the lock before handing off, the sink may block.
        let snapshots: Vec<Snapshot> = self.metrics.read().values().map(M::snapshot).collect();
        for snapshot in snapshots {
            sink.emit(snapshot)?;
        }
        Ok(())
    }
}
