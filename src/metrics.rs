//! Metric type implementations.

pub mod counter;
pub mod family;
pub mod func;
pub mod gauge;
pub mod histogram;

use crate::descriptor::Descriptor;
use crate::error::DescriptorError;
use crate::snapshot::Snapshot;

/// A single-valued metric aware of its own [`Descriptor`].
///
/// Wrap it in a [`SelfCollector`](crate::collector::SelfCollector) to use it
/// as a [`Collector`](crate::collector::Collector).
pub trait Metric: Send + Sync {
    /// The descriptor of the metric. Stable for the lifetime of the metric.
    fn desc(&self) -> &Descriptor;

    /// A fresh snapshot of the current value.
    fn snapshot(&self) -> Snapshot;
}

/// A fixed snapshot describes and reports itself.
impl Metric for Snapshot {
    fn desc(&self) -> &Descriptor {
        Snapshot::desc(self)
    }

    fn snapshot(&self) -> Snapshot {
        self.clone()
    }
}

/// A metric that can be constructed as the child of a
/// [`Family`](family::Family) for one tuple of label values.
pub trait Labeled: Sized {
    /// Construct the child for `label_values`.
    ///
    /// # Panics
    ///
    /// Panics if the number of label values does not match the number of
    /// variable labels of `desc`.
    fn labeled(desc: Descriptor, label_values: Vec<String>) -> Self;

    /// Rejects descriptors this metric type cannot be constructed with.
    /// Checked once by [`Family::new`](family::Family::new).
    fn check(_desc: &Descriptor) -> Result<(), DescriptorError> {
        Ok(())
    }
}
