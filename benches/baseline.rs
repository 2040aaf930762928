use criterion::{criterion_group, criterion_main, Criterion};
use openmetrics_collector::collector::{Collector, SelfCollector};
use openmetrics_collector::descriptor::{Descriptor, Opts};
use openmetrics_collector::metrics::counter::Counter;
use openmetrics_collector::metrics::family::Family;
use openmetrics_collector::metrics::Metric;

pub fn baseline(c: &mut Criterion) {
    c.bench_function("counter", |b| {
        let counter: Counter = Counter::new(Opts::new("counter", "help")).unwrap();

        b.iter(|| {
            counter.inc();
        })
    });

    c.bench_function("counter via family lookup", |b| {
        let family =
            Family::<Counter>::new(Descriptor::new("family", "help", &[], &[]).unwrap()).unwrap();

        b.iter(|| {
            family.get_or_create(&[]).unwrap().inc();
        })
    });

    c.bench_function("counter snapshot", |b| {
        let counter: Counter = Counter::new(Opts::new("counter", "help")).unwrap();

        b.iter(|| counter.snapshot())
    });

    c.bench_function("self collector collect", |b| {
        let collector =
            SelfCollector::new(Counter::<u64>::new(Opts::new("counter", "help")).unwrap());
        let mut sink = Vec::with_capacity(1);

        b.iter(|| {
            collector.collect(&mut sink).unwrap();
            sink.clear();
        })
    });

    c.bench_function("descriptor with labels", |b| {
        b.iter(|| {
            Descriptor::new(
                "http_requests_total",
                "help",
                &["method", "status"],
                &[("instance", "localhost:9090")],
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, baseline);
criterion_main!(benches);
