#![deny(dead_code)]
#![deny(missing_docs)]
#![deny(unused)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Collection contract of the [Open Metrics
//! specification](https://github.com/OpenObservability/OpenMetrics) client
//! side. Decouples metric sources ([`collector::Collector`]s) from the
//! consumer aggregating them ([`registry::Registry`]), so that heterogeneous
//! sources can be scraped uniformly and concurrently.
//!
//! Every metric family is identified by a [`descriptor::Descriptor`]. A
//! collector declares all descriptors it may ever emit up front and, on every
//! scrape, hands [`snapshot::Snapshot`]s of its current state to a
//! [`sink::Sink`]. The registry validates declarations at registration time
//! and flags duplicate or undeclared snapshots at gather time.
//!
//! # Examples
//!
//! ```
//! use openmetrics_collector::collector::SelfCollector;
//! use openmetrics_collector::descriptor::Opts;
//! use openmetrics_collector::metrics::counter::Counter;
//! use openmetrics_collector::metrics::family::Family;
//! use openmetrics_collector::registry::Registry;
//! use openmetrics_collector::snapshot::Value;
//!
//! // Create a collector registry.
//! let mut registry = Registry::default();
//!
//! // Create a sample counter metric family, representing the number of HTTP
//! // requests received, partitioned by method and path.
//! let http_requests = Family::<Counter>::new(
//!     Opts::new("http_requests_total", "Number of HTTP requests received")
//!         .namespace("app")
//!         .describe(&["method", "path"])
//!         .unwrap(),
//! )
//! .unwrap();
//!
//! // A family is a collector of its own. Single metrics are wrapped.
//! registry.register(http_requests.clone()).unwrap();
//!
//! let restarts: Counter = Counter::new(Opts::new("restarts_total", "Restarts")).unwrap();
//! registry.register(SelfCollector::new(restarts.clone())).unwrap();
//!
//! // Somewhere in your business logic record a single HTTP GET request.
//! http_requests.get_or_create(&["GET", "/metrics"]).unwrap().inc();
//!
//! // When a monitoring system scrapes the local node, gather all
//! // collectors concurrently and hand the families to an encoder.
//! let gathered = registry.gather();
//! assert!(gathered.errors.is_empty());
//!
//! let family = &gathered.families[0];
//! assert_eq!("app_http_requests_total", family.name());
//! assert_eq!(
//!     vec![("method", "GET"), ("path", "/metrics")],
//!     family.snapshots()[0].label_pairs(),
//! );
//! assert_eq!(&Value::Counter(1.0), family.snapshots()[0].value());
//! ```
//! See the `demos` directory for a dynamic collector.

pub mod collector;
pub mod descriptor;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod sink;
pub mod snapshot;
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testutil;
