//! Helpers for testing [`Collector`] implementations.
//!
//! Only available with the `test-util` feature.

use crate::collector::Collector;
use crate::snapshot::Snapshot;

/// Collect once from `collector`, returning the snapshots in emission order.
///
/// # Panics
///
/// Panics if the collector reports the sink as closed, which an in-memory
/// sink never is.
pub fn collect(collector: &dyn Collector) -> Vec<Snapshot> {
    let mut sink = Vec::new();
    if let Err(e) = collector.collect(&mut sink) {
        panic!("{collector:?} failed to collect: {e}");
    }
    sink
}

/// Number of snapshots emitted by one collection. With `metric_names` empty
/// every snapshot counts, otherwise only the snapshots of the named families.
pub fn collect_and_count(collector: &dyn Collector, metric_names: &[&str]) -> usize {
    collect(collector)
        .iter()
        .filter(|s| metric_names.is_empty() || metric_names.contains(&s.desc().name()))
        .count()
}

/// The value of a collector emitting exactly one counter, gauge or untyped
/// snapshot.
///
/// ```
/// # use openmetrics_collector::collector::SelfCollector;
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::gauge::Gauge;
/// # use openmetrics_collector::testutil::to_f64;
/// let gauge: Gauge = Gauge::new(Opts::new("in_flight", "In-flight requests.")).unwrap();
/// gauge.set(3);
/// assert_eq!(3.0, to_f64(&SelfCollector::new(gauge)));
/// ```
///
/// # Panics
///
/// Panics if the collector emits more or less than one snapshot, or a
/// histogram or summary.
pub fn to_f64(collector: &dyn Collector) -> f64 {
    let snapshots = collect(collector);
    if snapshots.len() != 1 {
        panic!(
            "collected {} snapshots instead of exactly one",
            snapshots.len()
        );
    }
    match snapshots[0].value().as_f64() {
        Some(v) => v,
        None => panic!(
            "collected a {} instead of a scalar value",
            snapshots[0].value().metric_type().as_str()
        ),
    }
}
