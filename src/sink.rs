//! Hand-off of snapshots from a collector to its caller.
//!
//! See [`Sink`] for details.

use crate::error::SinkClosed;
use crate::snapshot::Snapshot;
use crossbeam::channel::{self, Receiver, Sender};

/// Receiving end of [`Collector::collect`](crate::collector::Collector::collect).
///
/// [`Sink::emit`] hands one snapshot over to the consumer and returns once the
/// consumer has taken ownership of it. Depending on the implementation this
/// may block, e.g. on a bounded channel whose consumer has not caught up yet.
pub trait Sink {
    /// Hand `snapshot` over to the consumer.
    ///
    /// Fails only once the consumer has gone away. Collectors should then stop
    /// emitting and return the error.
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SinkClosed>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SinkClosed> {
        (**self).emit(snapshot)
    }
}

/// Unbounded accumulation in emission order. Never blocks, never fails.
impl Sink for Vec<Snapshot> {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SinkClosed> {
        self.push(snapshot);
        Ok(())
    }
}

/// Create a bounded channel sink holding at most `capacity` snapshots in
/// flight.
///
/// [`ChannelSink::emit`] blocks while the channel is full, so the [`Drain`]
/// must be consumed concurrently with the collector writing to the sink. A
/// `capacity` of zero makes every hand-off a rendezvous.
///
/// ```
/// # use openmetrics_collector::collector::{Collector, SelfCollector};
/// # use openmetrics_collector::descriptor::Opts;
/// # use openmetrics_collector::metrics::counter::Counter;
/// # use openmetrics_collector::sink;
/// let counter: Counter = Counter::new(Opts::new("jobs_total", "Jobs.")).unwrap();
/// let collector = SelfCollector::new(counter);
///
/// let (mut sink, drain) = sink::bounded(1);
/// let collected = std::thread::scope(|s| {
///     let reader = s.spawn(move || drain.collect::<Vec<_>>());
///     collector.collect(&mut sink).unwrap();
///     drop(sink);
///     reader.join().unwrap()
/// });
/// assert_eq!(1, collected.len());
/// ```
pub fn bounded(capacity: usize) -> (ChannelSink, Drain) {
    let (tx, rx) = channel::bounded(capacity);
    (ChannelSink(tx), Drain(rx))
}

/// Sending half of [`bounded`].
///
/// Clone it to let several collectors write into the same [`Drain`]. The
/// drain ends once every clone is dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink(Sender<Snapshot>);

impl Sink for ChannelSink {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SinkClosed> {
        self.0.send(snapshot).map_err(|_| SinkClosed)
    }
}

/// Receiving half of [`bounded`], yielding snapshots in the order they were
/// emitted.
#[derive(Debug)]
pub struct Drain(Receiver<Snapshot>);

impl Iterator for Drain {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::snapshot::Value;

    fn snapshots(n: usize) -> Vec<Snapshot> {
        let desc = Descriptor::new("jobs", "help", &["id"], &[]).unwrap();
        (0..n)
            .map(|i| Snapshot::new(desc.clone(), Value::Gauge(i as f64), vec![i.to_string()]).unwrap())
            .collect()
    }

    #[test]
    fn vec_sink_keeps_order() {
        let mut sink = Vec::new();
        for snapshot in snapshots(3) {
            sink.emit(snapshot).unwrap();
        }
        assert_eq!(snapshots(3), sink);
    }

    #[test]
    fn bounded_sink_with_concurrent_drain() {
        let (mut sink, drain) = bounded(1);

        let received = std::thread::scope(|s| {
            let reader = s.spawn(move || drain.collect::<Vec<_>>());

            for snapshot in snapshots(5) {
                sink.emit(snapshot).unwrap();
            }
            drop(sink);

            reader.join().unwrap()
        });

        assert_eq!(snapshots(5), received);
    }

    #[test]
    fn emit_fails_once_drain_is_gone() {
        let (mut sink, drain) = bounded(1);
        drop(drain);

        let mut snapshots = snapshots(1);
        assert_eq!(Err(SinkClosed), sink.emit(snapshots.remove(0)));
    }
}
