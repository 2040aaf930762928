//! Metric collector implementation.
//!
//! See [`Collector`] for details.

use crate::descriptor::Descriptor;
use crate::error::SinkClosed;
use crate::metrics::Metric;
use crate::sink::Sink;
use std::borrow::Cow;
use std::sync::Arc;

/// The [`Collector`] abstraction allows heterogeneous metric sources to expose
/// their current state on each scrape without the consumer knowing their
/// internal representation.
///
/// [`Collector::describe`] returns the super-set of all descriptors the
/// collector may ever emit. It must be cheap and return a fingerprint-equal set
/// on every call for the lifetime of the collector. A collector returning no
/// descriptors opts out of registration-time validation.
///
/// [`Collector::collect`] is called on each scrape. It emits zero or more
/// [`Snapshot`](crate::snapshot::Snapshot)s into the sink and returns once the
/// last one has been handed off. Every emitted snapshot carries one of the
/// described descriptors, and no two snapshots of one call share both
/// descriptor and label values.
///
/// Both methods may be called concurrently, from several threads, on the same
/// instance. Implementations synchronize their own state.
///
/// An example use-case is an exporter that retrieves a set of operating system
/// metrics ad-hoc on each scrape.
///
/// ```
/// # use openmetrics_collector::collector::Collector;
/// # use openmetrics_collector::descriptor::Descriptor;
/// # use openmetrics_collector::error::SinkClosed;
/// # use openmetrics_collector::sink::Sink;
/// # use openmetrics_collector::snapshot::{Snapshot, Value};
/// # use std::borrow::Cow;
/// #
/// #[derive(Debug)]
/// struct QueueCollector {
///     desc: Descriptor,
/// }
///
/// impl Collector for QueueCollector {
///     fn describe(&self) -> Cow<'_, [Descriptor]> {
///         Cow::Borrowed(std::slice::from_ref(&self.desc))
///     }
///
///     fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
///         for (queue, length) in [("default", 3.0), ("priority", 0.0)] {
///             let snapshot = Snapshot::new(
///                 self.desc.clone(),
///                 Value::Gauge(length),
///                 vec![queue.to_string()],
///             )
///             .expect("one label value per variable label");
///             sink.emit(snapshot)?;
///         }
///         Ok(())
///     }
/// }
///
/// let collector = QueueCollector {
///     desc: Descriptor::new("queue_length", "Jobs per queue.", &["queue"], &[]).unwrap(),
/// };
/// let mut sink = Vec::new();
/// collector.collect(&mut sink).unwrap();
/// assert_eq!(2, sink.len());
/// ```
pub trait Collector: std::fmt::Debug + Send + Sync {
    /// Returns every descriptor this collector may emit.
    fn describe(&self) -> Cow<'_, [Descriptor]>;

    /// Emits the current state into `sink`, returning after the last hand-off.
    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed>;
}

impl<C: Collector + ?Sized> Collector for Box<C> {
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        (**self).describe()
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        (**self).collect(sink)
    }
}

impl<C: Collector + ?Sized> Collector for Arc<C> {
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        (**self).describe()
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        (**self).collect(sink)
    }
}

/// Turns a single self-describing [`Metric`] into a [`Collector`].
///
/// The descriptor of the metric is captured once, when the wrapper is
/// created. [`Collector::describe`] returns exactly that one descriptor and
/// [`Collector::collect`] emits exactly one snapshot of the metric.
///
/// Most metrics are cheap handles around shared state, so keep a clone for
/// instrumentation and hand the wrapper to the registry.
///
/// ```
/// # use openmetrics_collector::collector::{Collector, SelfCollector};
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::counter::Counter;
/// # use openmetrics_collector::snapshot::Value;
/// let counter: Counter = Counter::new(Opts::new("jobs_total", "Jobs processed.")).unwrap();
/// let collector = SelfCollector::new(counter.clone());
///
/// counter.inc();
///
/// let mut sink = Vec::new();
/// collector.collect(&mut sink).unwrap();
/// assert_eq!(&Value::Counter(1.0), sink[0].value());
/// ```
#[derive(Debug)]
pub struct SelfCollector<M> {
    metric: M,
    descs: [Descriptor; 1],
}

impl<M: Metric> SelfCollector<M> {
    /// Wrap `metric`, caching its descriptor.
    pub fn new(metric: M) -> Self {
        let descs = [metric.desc().clone()];
        SelfCollector { metric, descs }
    }

    /// Returns the wrapped metric.
    pub fn metric(&self) -> &M {
        &self.metric
    }
}

impl<M: Metric + std::fmt::Debug> Collector for SelfCollector<M> {
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        Cow::Borrowed(&self.descs)
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        sink.emit(self.metric.snapshot())
    }
}
