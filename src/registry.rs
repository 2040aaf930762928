//! Metric registry implementation.
//!
//! See [`Registry`] for details.

use crate::collector::Collector;
use crate::descriptor::Descriptor;
use crate::error::{CollectError, RegistrationError, SinkClosed};
use crate::sink::Sink;
use crate::snapshot::{MetricType, Snapshot};
use crossbeam::channel::{self, Sender};
use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, warn};

/// Default number of snapshots in flight between the collecting workers and
/// the merging caller of [`Registry::gather`].
pub const DEFAULT_SINK_CAPACITY: usize = 1000;

/// A collector registry.
///
/// Collectors are validated when registered via [`Registry::register`]:
///
/// - no descriptor may share its fingerprint (name and constant label values)
///   with a descriptor already registered,
///
/// - descriptors sharing a name must agree on help text and label names,
///
/// - the exact same collector may not be registered twice.
///
/// A collector describing nothing is accepted as *unchecked*. Its snapshots
/// still go through the per-scrape checks of [`Registry::gather`], except the
/// one for undeclared descriptors.
///
/// ```
/// # use openmetrics_collector::collector::SelfCollector;
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::counter::Counter;
/// # use openmetrics_collector::metrics::gauge::Gauge;
/// # use openmetrics_collector::registry::Registry;
/// #
/// // Create a collector registry.
/// let mut registry = Registry::default();
///
/// let counter: Counter = Counter::new(Opts::new("my_counter", "This is my counter")).unwrap();
/// let gauge: Gauge = Gauge::new(Opts::new("my_gauge", "This is my gauge")).unwrap();
///
/// registry.register(SelfCollector::new(counter.clone())).unwrap();
/// registry.register(SelfCollector::new(gauge.clone())).unwrap();
///
/// counter.inc();
///
/// let gathered = registry.gather();
/// assert!(gathered.errors.is_empty());
/// assert_eq!(
///     vec!["my_counter", "my_gauge"],
///     gathered.families.iter().map(|f| f.name()).collect::<Vec<_>>(),
/// );
/// ```
#[derive(Debug)]
pub struct Registry {
    collectors: Vec<Registered>,
    desc_ids: HashSet<u64>,
    dim_hashes_by_name: HashMap<String, u64>,
    pedantic: bool,
    sink_capacity: usize,
    workers: usize,
}

#[derive(Debug)]
struct Registered {
    // XOR over the declared fingerprints. `None` for unchecked collectors.
    id: Option<u64>,
    declared: HashSet<u64>,
    collector: Box<dyn Collector>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            collectors: Vec::new(),
            desc_ids: HashSet::new(),
            dim_hashes_by_name: HashMap::new(),
            pedantic: false,
            sink_capacity: DEFAULT_SINK_CAPACITY,
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl Registry {
    /// Creates a [`Registry`] that additionally calls
    /// [`Collector::describe`] on every gather and reports collectors whose
    /// descriptor set changed since registration.
    pub fn pedantic() -> Self {
        Self {
            pedantic: true,
            ..Default::default()
        }
    }

    /// Bound the number of snapshots in flight during [`Registry::gather`].
    /// Collectors block in [`Sink::emit`] while the bound is reached.
    pub fn with_sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity;
        self
    }

    /// Number of threads collecting concurrently during
    /// [`Registry::gather`]. Defaults to the available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Register a [`Collector`].
    ///
    /// ```
    /// # use openmetrics_collector::collector::SelfCollector;
    /// # use openmetrics_collector::descriptor::Opts;
    /// # use openmetrics_collector::error::RegistrationError;
    /// # use openmetrics_collector::metrics::counter::Counter;
    /// # use openmetrics_collector::registry::Registry;
    /// #
    /// let mut registry = Registry::default();
    /// let counter: Counter = Counter::new(Opts::new("my_counter", "This is my counter")).unwrap();
    ///
    /// registry.register(SelfCollector::new(counter.clone())).unwrap();
    /// assert_eq!(
    ///     Err(RegistrationError::AlreadyRegistered),
    ///     registry.register(SelfCollector::new(counter)),
    /// );
    /// ```
    pub fn register(&mut self, collector: impl Collector + 'static) -> Result<(), RegistrationError> {
        let mut declared = HashSet::new();
        let mut id = 0;
        let mut new_dim_hashes_by_name = HashMap::new();
        let mut duplicate = None;

        for desc in collector.describe().iter() {
            if duplicate.is_none() && self.desc_ids.contains(&desc.fingerprint()) {
                duplicate = Some(RegistrationError::DuplicateDescriptor(desc.to_string()));
            }

            if declared.insert(desc.fingerprint()) {
                id ^= desc.fingerprint();
            }

            if let Some(dim_hash) = self.dim_hashes_by_name.get(desc.name()) {
                if *dim_hash != desc.dim_hash() {
                    return Err(RegistrationError::InconsistentDescriptor(desc.to_string()));
                }
            }
            match new_dim_hashes_by_name.entry(desc.name().to_string()) {
                Entry::Occupied(e) => {
                    if *e.get() != desc.dim_hash() {
                        return Err(RegistrationError::InconsistentDescriptor(desc.to_string()));
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(desc.dim_hash());
                }
            }
        }

        if declared.is_empty() {
            debug!("registered unchecked collector");
            self.collectors.push(Registered {
                id: None,
                declared,
                collector: Box::new(collector),
            });
            return Ok(());
        }

        if self.collectors.iter().any(|r| r.id == Some(id)) {
            return Err(RegistrationError::AlreadyRegistered);
        }
        if let Some(e) = duplicate {
            return Err(e);
        }

        self.desc_ids.extend(declared.iter().copied());
        self.dim_hashes_by_name.extend(new_dim_hashes_by_name);
        debug!(descriptors = declared.len(), "registered collector");
        self.collectors.push(Registered {
            id: Some(id),
            declared,
            collector: Box::new(collector),
        });
        Ok(())
    }

    /// Unregister the collector describing the same descriptor set as
    /// `collector`. Returns whether a collector was removed.
    ///
    /// Unchecked collectors cannot be unregistered. Names stay reserved for
    /// their help text and label names, so a collector registered later under
    /// a known name must stay consistent with the removed one.
    pub fn unregister(&mut self, collector: &dyn Collector) -> bool {
        let (id, declared) = declared_ids(collector);
        if declared.is_empty() {
            return false;
        }

        let Some(position) = self.collectors.iter().position(|r| r.id == Some(id)) else {
            return false;
        };
        let removed = self.collectors.remove(position);
        for fingerprint in &removed.declared {
            self.desc_ids.remove(fingerprint);
        }
        debug!(descriptors = removed.declared.len(), "unregistered collector");
        true
    }

    /// Collect from every registered collector and merge the result.
    ///
    /// Collectors run concurrently on up to [`Registry::with_workers`] scoped
    /// threads, all writing into one bounded sink, while the calling thread
    /// drains and merges. Snapshots violating the collection contract are
    /// dropped and reported in [`Gathered::errors`]; everything else is kept.
    pub fn gather(&self) -> Gathered {
        let mut merger = Merger::new(self);
        if self.collectors.is_empty() {
            return merger.finish();
        }

        if self.pedantic {
            for registered in self.collectors.iter().filter(|r| r.id.is_some()) {
                let (_, now) = declared_ids(&*registered.collector);
                if now != registered.declared {
                    merger.reject(CollectError::DescribeChanged {
                        registered: registered.declared.len(),
                        now: now.len(),
                    });
                }
            }
        }

        let workers = self.workers.min(self.collectors.len());
        let next = AtomicUsize::new(0);
        let (tx, rx) = channel::bounded(self.sink_capacity);

        thread::scope(|s| {
            for _ in 0..workers {
                let mut sink = TaggedSink {
                    index: 0,
                    tx: tx.clone(),
                };
                let next = &next;
                let collectors = &self.collectors;
                s.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(registered) = collectors.get(index) else {
                        break;
                    };
                    sink.index = index;
                    if registered.collector.collect(&mut sink).is_err() {
                        debug!(collector = ?registered.collector, "sink closed during collection");
                        break;
                    }
                });
            }
            drop(tx);

            for (index, snapshot) in rx {
                merger.merge(index, snapshot);
            }
        });

        let gathered = merger.finish();
        debug!(
            families = gathered.families.len(),
            errors = gathered.errors.len(),
            "gathered metrics"
        );
        gathered
    }
}

/// A registry reports the union of its collectors, allowing registries to
/// be nested. A registry holding an unchecked collector describes nothing,
/// so it is registered as unchecked itself.
impl Collector for Registry {
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        if self.collectors.iter().any(|r| r.id.is_none()) {
            return Cow::Borrowed(&[]);
        }
        Cow::Owned(
            self.collectors
                .iter()
                .flat_map(|r| r.collector.describe().into_owned())
                .collect(),
        )
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        for registered in &self.collectors {
            registered.collector.collect(sink)?;
        }
        Ok(())
    }
}

fn declared_ids(collector: &dyn Collector) -> (u64, HashSet<u64>) {
    let mut declared = HashSet::new();
    let mut id = 0;
    for desc in collector.describe().iter() {
        if declared.insert(desc.fingerprint()) {
            id ^= desc.fingerprint();
        }
    }
    (id, declared)
}

struct TaggedSink {
    index: usize,
    tx: Sender<(usize, Snapshot)>,
}

impl Sink for TaggedSink {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SinkClosed> {
        self.tx
            .send((self.index, snapshot))
            .map_err(|_| SinkClosed)
    }
}

/// Result of [`Registry::gather`].
#[derive(Debug, Default)]
pub struct Gathered {
    /// Metric families sorted by name, their snapshots sorted by label pairs.
    pub families: Vec<MetricFamily>,
    /// Contract violations in the order they were detected.
    pub errors: Vec<CollectError>,
}

/// All snapshots of one metric name collected in one cycle.
#[derive(Debug, Clone)]
pub struct MetricFamily {
    name: String,
    help: String,
    metric_type: MetricType,
    snapshots: Vec<Snapshot>,
}

impl MetricFamily {
    /// Name of the family.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text of the family.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Type shared by all snapshots of the family.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Snapshots sorted by label pairs.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
}

struct Merger<'a> {
    registry: &'a Registry,
    families: BTreeMap<String, (u64, MetricFamily)>,
    seen: HashSet<(String, Vec<(String, String)>)>,
    errors: Vec<CollectError>,
}

impl<'a> Merger<'a> {
    fn new(registry: &'a Registry) -> Self {
        Merger {
            registry,
            families: BTreeMap::new(),
            seen: HashSet::new(),
            errors: Vec::new(),
        }
    }

    fn merge(&mut self, index: usize, snapshot: Snapshot) {
        let desc = snapshot.desc().clone();
        let metric_type = snapshot.value().metric_type();

        let registered = &self.registry.collectors[index];
        if registered.id.is_some() && !registered.declared.contains(&desc.fingerprint()) {
            return self.reject(CollectError::UndeclaredDescriptor(desc.to_string()));
        }

        let registered_dim_hash = self.registry.dim_hashes_by_name.get(desc.name());
        let inconsistent = matches!(registered_dim_hash, Some(h) if *h != desc.dim_hash())
            || matches!(
                self.families.get(desc.name()),
                Some((dim_hash, family)) if *dim_hash != desc.dim_hash() || family.metric_type != metric_type
            );
        if inconsistent {
            return self.reject(CollectError::Inconsistent(desc.to_string()));
        }

        let labels: Vec<(String, String)> = snapshot
            .label_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if !self.seen.insert((desc.name().to_string(), labels.clone())) {
            return self.reject(CollectError::Duplicate {
                name: desc.name().to_string(),
                labels,
            });
        }

        let (_, family) = self
            .families
            .entry(desc.name().to_string())
            .or_insert_with(|| {
                (
                    desc.dim_hash(),
                    MetricFamily {
                        name: desc.name().to_string(),
                        help: desc.help().to_string(),
                        metric_type,
                        snapshots: Vec::new(),
                    },
                )
            });
        family.snapshots.push(snapshot);
    }

    fn reject(&mut self, error: CollectError) {
        warn!(%error, "dropping collected metric");
        self.errors.push(error);
    }

    fn finish(self) -> Gathered {
        let families = self
            .families
            .into_values()
            .map(|(_, mut family)| {
                family.snapshots.sort_by_cached_key(|s| {
                    s.label_pairs()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<Vec<_>>()
                });
                family
            })
            .collect();
        Gathered {
            families,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SelfCollector;
    use crate::descriptor::Opts;
    use crate::metrics::counter::Counter;
    use crate::metrics::family::Family;
    use crate::metrics::gauge::Gauge;
    use crate::snapshot::Value;
    use parking_lot::Mutex;
    use test_log::test;

    /// Emits a fixed list of snapshots, describing a fixed list of
    /// descriptors.
    #[derive(Debug)]
    struct Fixed {
        descs: Vec<Descriptor>,
        snapshots: Vec<Snapshot>,
    }

    impl Collector for Fixed {
        fn describe(&self) -> Cow<'_, [Descriptor]> {
            Cow::Borrowed(&self.descs)
        }

        fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
            for snapshot in &self.snapshots {
                sink.emit(snapshot.clone())?;
            }
            Ok(())
        }
    }

    fn gauge(desc: &Descriptor, v: f64, label_values: &[&str]) -> Snapshot {
        Snapshot::new(
            desc.clone(),
            Value::Gauge(v),
            label_values.iter().map(|v| v.to_string()).collect(),
        )
        .unwrap()
    }

    fn counter(name: &str) -> Counter {
        Counter::new(Opts::new(name, "help")).unwrap()
    }

    #[test]
    fn register_and_gather() {
        let mut registry = Registry::default();
        let requests = counter("requests_total");
        let in_flight: Gauge = Gauge::new(Opts::new("in_flight", "help")).unwrap();

        registry.register(SelfCollector::new(requests.clone())).unwrap();
        registry.register(SelfCollector::new(in_flight.clone())).unwrap();

        requests.inc_by(3);
        in_flight.set(2);

        let gathered = registry.gather();
        assert!(gathered.errors.is_empty());
        assert_eq!(2, gathered.families.len());

        let in_flight = &gathered.families[0];
        assert_eq!("in_flight", in_flight.name());
        assert_eq!(MetricType::Gauge, in_flight.metric_type());
        assert_eq!(&Value::Gauge(2.0), in_flight.snapshots()[0].value());

        let requests = &gathered.families[1];
        assert_eq!("requests_total", requests.name());
        assert_eq!("help", requests.help());
        assert_eq!(&Value::Counter(3.0), requests.snapshots()[0].value());
    }

    #[test]
    fn empty_registry() {
        let gathered = Registry::default().gather();
        assert!(gathered.families.is_empty());
        assert!(gathered.errors.is_empty());
    }

    #[test]
    fn duplicate_label_values_are_flagged() {
        let desc = Descriptor::new("vec", "help", &["instance"], &[]).unwrap();
        let mut registry = Registry::default();
        registry
            .register(Fixed {
                descs: vec![desc.clone()],
                snapshots: vec![
                    gauge(&desc, 1.0, &["a"]),
                    gauge(&desc, 2.0, &["b"]),
                    gauge(&desc, 3.0, &["c"]),
                    gauge(&desc, 4.0, &["a"]),
                ],
            })
            .unwrap();

        let gathered = registry.gather();

        assert_eq!(
            vec![CollectError::Duplicate {
                name: "vec".to_string(),
                labels: vec![("instance".to_string(), "a".to_string())],
            }],
            gathered.errors
        );
        let snapshots = gathered.families[0].snapshots();
        assert_eq!(3, snapshots.len());
        assert_eq!(
            vec![Some(1.0), Some(2.0), Some(3.0)],
            snapshots.iter().map(|s| s.value().as_f64()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn undeclared_descriptor_is_flagged() {
        let declared = Descriptor::new("declared", "help", &[], &[]).unwrap();
        let undeclared = Descriptor::new("undeclared", "help", &[], &[]).unwrap();
        let mut registry = Registry::default();
        registry
            .register(Fixed {
                descs: vec![declared.clone()],
                snapshots: vec![gauge(&declared, 1.0, &[]), gauge(&undeclared, 2.0, &[])],
            })
            .unwrap();

        let gathered = registry.gather();

        assert_eq!(
            vec![CollectError::UndeclaredDescriptor(undeclared.to_string())],
            gathered.errors
        );
        assert_eq!(1, gathered.families.len());
        assert_eq!("declared", gathered.families[0].name());
    }

    #[test]
    fn unchecked_collector() {
        let desc = Descriptor::new("dynamic", "help", &["shard"], &[]).unwrap();
        let mut registry = Registry::default();
        let unchecked = || Fixed {
            descs: vec![],
            snapshots: vec![gauge(&desc, 1.0, &["0"]), gauge(&desc, 1.0, &["1"])],
        };
        registry.register(unchecked()).unwrap();

        // Nothing to identify it by.
        assert!(!registry.unregister(&unchecked()));

        let gathered = registry.gather();
        assert!(gathered.errors.is_empty());
        assert_eq!(2, gathered.families[0].snapshots().len());
        assert!(registry.describe().is_empty());
    }

    #[test]
    fn duplicate_descriptor_is_rejected() {
        let mut registry = Registry::default();
        registry.register(SelfCollector::new(counter("requests_total"))).unwrap();

        let err = registry
            .register(SelfCollector::new(counter("requests_total")))
            .unwrap_err();
        // Same descriptor set, thus the same collector.
        assert_eq!(RegistrationError::AlreadyRegistered, err);

        let desc = Descriptor::new("requests_total", "help", &[], &[]).unwrap();
        let other = Descriptor::new("other", "help", &[], &[]).unwrap();
        let err = registry
            .register(Fixed {
                descs: vec![desc, other],
                snapshots: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateDescriptor(_)));
    }

    #[test]
    fn const_label_values_distinguish_descriptors() {
        let mut registry = Registry::default();
        for shard in ["0", "1"] {
            let counter: Counter =
                Counter::new(Opts::new("requests_total", "help").const_label("shard", shard))
                    .unwrap();
            registry.register(SelfCollector::new(counter)).unwrap();
        }

        let gathered = registry.gather();
        assert!(gathered.errors.is_empty());
        assert_eq!(1, gathered.families.len());
        assert_eq!(
            vec![vec![("shard", "0")], vec![("shard", "1")]],
            gathered.families[0]
                .snapshots()
                .iter()
                .map(|s| s.label_pairs())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn inconsistent_descriptor_is_rejected() {
        let mut registry = Registry::default();
        let counter: Counter =
            Counter::new(Opts::new("requests_total", "help").const_label("shard", "0")).unwrap();
        registry.register(SelfCollector::new(counter)).unwrap();

        // Different help text.
        let other: Counter =
            Counter::new(Opts::new("requests_total", "other help").const_label("shard", "1"))
                .unwrap();
        assert!(matches!(
            registry.register(SelfCollector::new(other)),
            Err(RegistrationError::InconsistentDescriptor(_))
        ));

        // Different label names.
        let other: Counter =
            Counter::new(Opts::new("requests_total", "help").const_label("zone", "eu")).unwrap();
        assert!(matches!(
            registry.register(SelfCollector::new(other)),
            Err(RegistrationError::InconsistentDescriptor(_))
        ));

        // Inconsistent within one collector.
        let a = Descriptor::new("jobs", "help", &[], &[("queue", "default")]).unwrap();
        let b = Descriptor::new("jobs", "other help", &[], &[("queue", "priority")]).unwrap();
        assert!(matches!(
            registry.register(Fixed {
                descs: vec![a, b],
                snapshots: vec![],
            }),
            Err(RegistrationError::InconsistentDescriptor(_))
        ));
        assert_eq!(1, registry.describe().len());
    }

    #[test]
    fn inconsistent_snapshots_are_flagged() {
        let desc = Descriptor::new("jobs", "help", &[], &[("queue", "a")]).unwrap();
        let other = Descriptor::new("jobs", "help", &[], &[("queue", "b")]).unwrap();
        let mut registry = Registry::default();
        registry
            .register(Fixed {
                descs: vec![desc.clone(), other.clone()],
                snapshots: vec![
                    gauge(&desc, 1.0, &[]),
                    Snapshot::new(other.clone(), Value::Counter(1.0), vec![]).unwrap(),
                ],
            })
            .unwrap();

        let gathered = registry.gather();
        assert_eq!(vec![CollectError::Inconsistent(other.to_string())], gathered.errors);
        assert_eq!(1, gathered.families[0].snapshots().len());
    }

    #[test]
    fn unregister() {
        let mut registry = Registry::default();
        let requests = counter("requests_total");
        registry.register(SelfCollector::new(requests.clone())).unwrap();
        registry.register(SelfCollector::new(counter("errors_total"))).unwrap();

        assert!(registry.unregister(&SelfCollector::new(requests.clone())));
        assert!(!registry.unregister(&SelfCollector::new(requests.clone())));

        let gathered = registry.gather();
        assert_eq!(1, gathered.families.len());
        assert_eq!("errors_total", gathered.families[0].name());

        // The fingerprint is free again.
        registry.register(SelfCollector::new(requests)).unwrap();
        assert_eq!(2, registry.gather().families.len());
    }

    #[test]
    fn family_snapshots_are_sorted() {
        let desc = Opts::new("http_requests_total", "help")
            .describe(&["method"])
            .unwrap();
        let family = Family::<Counter>::new(desc).unwrap();
        for method in ["PUT", "GET", "POST", "DELETE"] {
            family.get_or_create(&[method]).unwrap().inc();
        }

        let mut registry = Registry::default();
        registry.register(family.clone()).unwrap();

        let gathered = registry.gather();
        let methods: Vec<&str> = gathered.families[0]
            .snapshots()
            .iter()
            .map(|s| s.label_values()[0].as_str())
            .collect();
        assert_eq!(vec!["DELETE", "GET", "POST", "PUT"], methods);
    }

    #[derive(Debug)]
    struct Changing {
        descs: Mutex<Vec<Descriptor>>,
    }

    impl Collector for Changing {
        fn describe(&self) -> Cow<'_, [Descriptor]> {
            Cow::Owned(self.descs.lock().clone())
        }

        fn collect(&self, _sink: &mut dyn Sink) -> Result<(), SinkClosed> {
            Ok(())
        }
    }

    #[test]
    fn pedantic_flags_changed_describe() {
        let descs = Mutex::new(vec![Descriptor::new("a", "help", &[], &[]).unwrap()]);
        let collector = std::sync::Arc::new(Changing { descs });

        let mut registry = Registry::pedantic();
        registry.register(collector.clone()).unwrap();
        assert!(registry.gather().errors.is_empty());

        collector
            .descs
            .lock()
            .push(Descriptor::new("b", "help", &[], &[]).unwrap());

        assert_eq!(
            vec![CollectError::DescribeChanged {
                registered: 1,
                now: 2
            }],
            registry.gather().errors
        );
        // Not checked outside of pedantic mode.
        let mut registry = Registry::default();
        registry.register(collector.clone()).unwrap();
        collector.descs.lock().pop();
        assert!(registry.gather().errors.is_empty());
    }

    #[test]
    fn gather_with_many_collectors_and_tiny_sink() {
        let mut registry = Registry::default().with_workers(4).with_sink_capacity(1);
        let counters: Vec<Counter> = (0..32).map(|i| counter(&format!("counter_{i:02}"))).collect();
        for counter in &counters {
            counter.inc_by(7);
            registry.register(SelfCollector::new(counter.clone())).unwrap();
        }

        let gathered = registry.gather();
        assert!(gathered.errors.is_empty());
        assert_eq!(32, gathered.families.len());
        for (i, family) in gathered.families.iter().enumerate() {
            assert_eq!(format!("counter_{i:02}"), family.name());
            assert_eq!(&Value::Counter(7.0), family.snapshots()[0].value());
        }
    }

    #[test]
    fn nested_registry() {
        let mut inner = Registry::default();
        inner.register(SelfCollector::new(counter("inner_total"))).unwrap();
        assert_eq!(1, inner.describe().len());

        let mut outer = Registry::default();
        outer.register(SelfCollector::new(counter("outer_total"))).unwrap();
        outer.register(inner).unwrap();

        let gathered = outer.gather();
        assert!(gathered.errors.is_empty());
        assert_eq!(
            vec!["inner_total", "outer_total"],
            gathered.families.iter().map(|f| f.name()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn nested_registry_with_unchecked_collector() {
        let dynamic = Descriptor::new("dynamic", "help", &[], &[]).unwrap();
        let mut inner = Registry::default();
        inner.register(SelfCollector::new(counter("inner_total"))).unwrap();
        inner
            .register(Fixed {
                descs: vec![],
                snapshots: vec![gauge(&dynamic, 1.0, &[])],
            })
            .unwrap();
        assert!(inner.gather().errors.is_empty());
        assert!(inner.describe().is_empty());

        let mut outer = Registry::default();
        outer.register(inner).unwrap();

        let gathered = outer.gather();
        assert!(gathered.errors.is_empty());
        assert_eq!(
            vec!["dynamic", "inner_total"],
            gathered.families.iter().map(|f| f.name()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn label_moved_between_const_and_variable_is_inconsistent() {
        let a = Descriptor::new("x", "help", &["b"], &[("a", "1")]).unwrap();
        let b = Descriptor::new("x", "help", &["a"], &[("b", "2")]).unwrap();
        let snapshots = vec![gauge(&a, 1.0, &["2"]), gauge(&b, 9.0, &["1"])];
        assert_eq!(snapshots[0].label_pairs(), snapshots[1].label_pairs());

        let mut registry = Registry::default();
        assert!(matches!(
            registry.register(Fixed {
                descs: vec![a.clone(), b.clone()],
                snapshots: snapshots.clone(),
            }),
            Err(RegistrationError::InconsistentDescriptor(_))
        ));

        // Without declared descriptors the clash surfaces at gather time.
        registry
            .register(Fixed {
                descs: vec![],
                snapshots,
            })
            .unwrap();
        let gathered = registry.gather();
        assert_eq!(vec![CollectError::Inconsistent(b.to_string())], gathered.errors);
        assert_eq!(1, gathered.families[0].snapshots().len());
        assert_eq!(&Value::Gauge(1.0), gathered.families[0].snapshots()[0].value());
    }
}
