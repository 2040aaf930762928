//! A [`Collector`] exposing the standard `process_*` metrics of the current
//! process, read from `/proc/self` on every collection.

use std::borrow::Cow;

use openmetrics_collector::{
    collector::Collector,
    descriptor::{Descriptor, Opts},
    error::{DescriptorError, SinkClosed},
    sink::Sink,
};

mod linux;

/// Reports CPU time, memory, file descriptors, start time and network traffic
/// of the current process.
///
/// The descriptor set is fixed at construction. A value that cannot be read
/// at collection time is logged and left out of that collection.
///
/// ```
/// # use openmetrics_collector::registry::Registry;
/// # use process_collector::ProcessCollector;
/// let mut registry = Registry::default();
/// registry.register(ProcessCollector::new(Some("my_app")).unwrap()).unwrap();
/// ```
#[derive(Debug)]
pub struct ProcessCollector {
    descs: Descs,
    all: Vec<Descriptor>,
    page_size: u64,
}

#[derive(Debug)]
pub(crate) struct Descs {
    pub(crate) cpu_seconds_total: Descriptor,
    pub(crate) open_fds: Descriptor,
    pub(crate) max_fds: Descriptor,
    pub(crate) virtual_memory_bytes: Descriptor,
    pub(crate) virtual_memory_max_bytes: Descriptor,
    pub(crate) resident_memory_bytes: Descriptor,
    pub(crate) start_time_seconds: Descriptor,
    pub(crate) network_receive_bytes_total: Descriptor,
    pub(crate) network_transmit_bytes_total: Descriptor,
}

impl ProcessCollector {
    /// Create a collector whose metric names are prefixed with `namespace`.
    pub fn new(namespace: Option<&str>) -> Result<Self, DescriptorError> {
        let desc = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace.unwrap_or_default())
                .describe(&[])
        };

        let descs = Descs {
            cpu_seconds_total: desc(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
            )?,
            open_fds: desc("process_open_fds", "Number of open file descriptors.")?,
            max_fds: desc("process_max_fds", "Maximum number of open file descriptors.")?,
            virtual_memory_bytes: desc(
                "process_virtual_memory_bytes",
                "Virtual memory size in bytes.",
            )?,
            virtual_memory_max_bytes: desc(
                "process_virtual_memory_max_bytes",
                "Maximum amount of virtual memory available in bytes.",
            )?,
            resident_memory_bytes: desc(
                "process_resident_memory_bytes",
                "Resident memory size in bytes.",
            )?,
            start_time_seconds: desc(
                "process_start_time_seconds",
                "Start time of the process since unix epoch in seconds.",
            )?,
            network_receive_bytes_total: desc(
                "process_network_receive_bytes_total",
                "Number of bytes received by the process over the network.",
            )?,
            network_transmit_bytes_total: desc(
                "process_network_transmit_bytes_total",
                "Number of bytes sent by the process over the network.",
            )?,
        };
        let all = vec![
            descs.cpu_seconds_total.clone(),
            descs.open_fds.clone(),
            descs.max_fds.clone(),
            descs.virtual_memory_bytes.clone(),
            descs.virtual_memory_max_bytes.clone(),
            descs.resident_memory_bytes.clone(),
            descs.start_time_seconds.clone(),
            descs.network_receive_bytes_total.clone(),
            descs.network_transmit_bytes_total.clone(),
        ];

        Ok(Self {
            descs,
            all,
            page_size: procfs::page_size(),
        })
    }
}

impl Collector for ProcessCollector {
    fn describe(&self) -> Cow<'_, [Descriptor]> {
        Cow::Borrowed(&self.all)
    }

    fn collect(&self, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
        linux::collect(&self.descs, self.page_size, sink)
    }
}
