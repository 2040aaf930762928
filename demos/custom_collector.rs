use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use openmetrics_collector::collector::{Collector, SelfCollector};
use openmetrics_collector::descriptor::{Descriptor, Opts};
use openmetrics_collector::error::SinkClosed;
use openmetrics_collector::metrics::counter::Counter;
use openmetrics_collector::registry::Registry;
use openmetrics_collector::sink::Sink;
use openmetrics_collector::snapshot::{Snapshot, Value};
use parking_lot::Mutex;

/// Showcasing a dynamic collector.
///
/// [`QueueCollector`] does not own any metric. It looks at the current state of
/// the job queues on each scrape and reports one snapshot per queue. The set of
/// queues changes at runtime, the descriptor does not.
#[derive(Debug)]
struct QueueCollector {
    queues: Arc<Mutex<BTreeMap<String, usize>>>,
    descs: [Descriptor; 1],
}

impl QueueCollector {
    fn new(queues: Arc<Mutex<BTreeMap<String, usize>>>) -> Self {
        let desc = Opts::new("queue_length", "Number of jobs waiting per queue")
            .namespace("demo")
            .describe(&["queue"])
            .unwrap();
        Self {
            queues,
            descs: [desc],
        }
    }
}

impl Collector for QueueCollector {
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        Cow::Borrowed(&self.descs)
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        // Copy out first, the sink may block until the consumer caught up.
        let lengths: Vec<(String, usize)> = self
            .queues
            .lock()
            .iter()
            .map(|(queue, length)| (queue.clone(), *length))
            .collect();

        for (queue, length) in lengths {
            let snapshot = Snapshot::new(
                self.descs[0].clone(),
                Value::Gauge(length as f64),
                vec![queue],
            )
            .expect("one label value per variable label");
            sink.emit(snapshot)?;
        }
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let queues = Arc::new(Mutex::new(BTreeMap::new()));
    let processed: Counter = Counter::new(
        Opts::new("jobs_processed_total", "Number of jobs processed").namespace("demo"),
    )
    .unwrap();

    let mut registry = Registry::default().with_sink_capacity(16);
    registry
        .register(QueueCollector::new(queues.clone()))
        .unwrap();
    registry
        .register(SelfCollector::new(processed.clone()))
        .unwrap();

    queues.lock().insert("default".to_string(), 3);
    queues.lock().insert("priority".to_string(), 1);
    processed.inc_by(42);

    let gathered = registry.gather();
    for family in &gathered.families {
        println!("# HELP {} {}", family.name(), family.help());
        println!("# TYPE {} {}", family.name(), family.metric_type().as_str());
        for snapshot in family.snapshots() {
            let labels: Vec<String> = snapshot
                .label_pairs()
                .iter()
                .map(|(name, value)| format!("{name}=\"{value}\""))
                .collect();
            println!(
                "{}{{{}}} {}",
                family.name(),
                labels.join(","),
                snapshot.value().as_f64().unwrap_or(f64::NAN)
            );
        }
    }
    for error in &gathered.errors {
        eprintln!("{error}");
    }
}
