//! Error types.
//!
//! Construction-time failures ([`DescriptorError`], [`CardinalityError`],
//! [`HistogramError`]) are returned to the caller building the descriptor or
//! metric. Registration failures ([`RegistrationError`]) are returned by
//! [`Registry::register`](crate::registry::Registry::register). Contract
//! violations detected while merging a scrape are reported as
//! [`CollectError`]s alongside the partial result, never raised mid-collection.

use thiserror::Error;

/// A [`Descriptor`](crate::descriptor::Descriptor) failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The metric name is empty or contains characters outside
    /// `[a-zA-Z_:][a-zA-Z0-9_:]*`.
    #[error("{0:?} is not a valid metric name")]
    InvalidName(String),

    /// A label name is empty or contains characters outside
    /// `[a-zA-Z_][a-zA-Z0-9_]*`.
    #[error("{0:?} is not a valid label name")]
    InvalidLabelName(String),

    /// Label names starting with `__` are reserved for internal use.
    #[error("label name {0:?} is reserved")]
    ReservedLabelName(String),

    /// The same label name is declared twice, either within one label set or
    /// across the constant and variable label sets.
    #[error("duplicate label name {0:?}")]
    DuplicateLabelName(String),
}

/// The number of label values does not match the number of variable labels
/// declared by the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{metric}: expected {expected} label values but got {got}")]
pub struct CardinalityError {
    /// Name of the metric family.
    pub metric: String,
    /// Number of variable labels declared by the descriptor.
    pub expected: usize,
    /// Number of label values supplied.
    pub got: usize,
}

/// A [`Histogram`](crate::metrics::histogram::Histogram) could not be created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistogramError {
    /// Upper bounds must be strictly increasing.
    #[error("histogram buckets must be in increasing order: {previous} >= {next}")]
    UnsortedBuckets {
        /// Bound at position `i`.
        previous: f64,
        /// Bound at position `i + 1`.
        next: f64,
    },

    /// `le` is used to encode bucket upper bounds.
    #[error("label name \"le\" is reserved for histogram buckets")]
    ReservedLabel,

    /// The descriptor itself was invalid.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Returned by [`Sink::emit`](crate::sink::Sink::emit) once the consumer
/// stopped draining, e.g. after an external timeout.
///
/// Collectors propagate it with `?` and stop emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("snapshot sink closed by the consumer")]
pub struct SinkClosed;

/// A collector was rejected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A collector describing the exact same descriptor set is already
    /// registered.
    #[error("an equivalent collector is already registered")]
    AlreadyRegistered,

    /// A descriptor with the same name and constant label values is already
    /// registered by another collector.
    #[error("descriptor {0} already exists with the same name and constant label values")]
    DuplicateDescriptor(String),

    /// A descriptor shares its name with a previously registered descriptor
    /// but differs in help text or label names.
    #[error("descriptor {0} is inconsistent with a previously registered descriptor of the same name")]
    InconsistentDescriptor(String),
}

/// Contract violation surfaced while merging one collection cycle.
///
/// The offending snapshot is dropped; snapshots from other collectors remain
/// part of the result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// The collector emitted a descriptor it did not return from
    /// [`Collector::describe`](crate::collector::Collector::describe).
    #[error("collected metric {0} was not declared by its collector")]
    UndeclaredDescriptor(String),

    /// Two snapshots with the same descriptor and label values were emitted
    /// within one cycle.
    #[error("collected metric {name} with labels {labels:?} was collected before with the same name and label values")]
    Duplicate {
        /// Name of the metric family.
        name: String,
        /// Sorted label pairs of the duplicate.
        labels: Vec<(String, String)>,
    },

    /// A snapshot disagrees with previously collected snapshots of the same
    /// name in type, help text or label names.
    #[error("collected metric {0} is inconsistent with previously collected metrics of the same name")]
    Inconsistent(String),

    /// Pedantic mode only: the descriptor set returned by `describe` changed
    /// since registration.
    #[error("collector describes {now} descriptors differing from the {registered} seen at registration")]
    DescribeChanged {
        /// Number of descriptors at registration.
        registered: usize,
        /// Number of descriptors now.
        now: usize,
    },
}
