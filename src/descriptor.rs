//! Metric family descriptors.
//!
//! See [`Descriptor`] for details.

use crate::error::DescriptorError;
use std::fmt;
use std::sync::Arc;

/// Separates the components fed into a hash. Never part of valid UTF-8.
const SEPARATOR: u8 = 0xff;
/// Separates the constant label section from the variable label section.
const SECTION: u8 = 0xfe;

/// Immutable description of an Open Metrics metric family.
///
/// A [`Descriptor`] carries the family name, its help text, the ordered list
/// of variable label names every snapshot of the family supplies values for,
/// and the constant labels attached to every snapshot. It is validated and
/// fingerprinted once at construction and never mutated afterwards.
///
/// Cloning a [`Descriptor`] is cheap: clones share the same allocation, which
/// is how every [`Snapshot`](crate::snapshot::Snapshot) references the
/// descriptor of its family.
///
/// ```
/// # use openmetrics_collector::descriptor::Descriptor;
/// let a = Descriptor::new(
///     "http_requests_total",
///     "Number of HTTP requests.",
///     &["method", "code"],
///     &[("service", "api")],
/// ).unwrap();
/// let b = Descriptor::new(
///     "http_requests_total",
///     "Number of HTTP requests.",
///     &["code", "method"],
///     &[("service", "api")],
/// ).unwrap();
///
/// // The variable label *set* is what identifies the family.
/// assert_eq!(a.fingerprint(), b.fingerprint());
/// ```
#[derive(Clone, Debug)]
pub struct Descriptor(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    name: String,
    help: String,
    // Sorted by label name.
    const_labels: Vec<(String, String)>,
    // In declaration order. Snapshots supply their values in this order.
    variable_labels: Vec<String>,
    fingerprint: u64,
    dim_hash: u64,
}

impl Descriptor {
    /// Create a new [`Descriptor`].
    ///
    /// Fails if the name is not a valid metric name, if any label name is
    /// invalid or reserved (prefixed with `__`), or if a label name appears
    /// twice across the constant and variable label sets.
    pub fn new<N: Into<String>, H: Into<String>>(
        name: N,
        help: H,
        variable_labels: &[&str],
        const_labels: &[(&str, &str)],
    ) -> Result<Self, DescriptorError> {
        Self::from_parts(
            name.into(),
            help.into(),
            variable_labels.iter().map(|l| l.to_string()).collect(),
            const_labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn from_parts(
        name: String,
        help: String,
        variable_labels: Vec<String>,
        mut const_labels: Vec<(String, String)>,
    ) -> Result<Self, DescriptorError> {
        if !is_valid_metric_name(&name) {
            return Err(DescriptorError::InvalidName(name));
        }

        const_labels.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut label_names: Vec<&str> =
            Vec::with_capacity(const_labels.len() + variable_labels.len());
        for label in const_labels
            .iter()
            .map(|(k, _)| k.as_str())
            .chain(variable_labels.iter().map(String::as_str))
        {
            check_label_name(label)?;
            label_names.push(label);
        }
        label_names.sort_unstable();
        if let Some(w) = label_names.windows(2).find(|w| w[0] == w[1]) {
            return Err(DescriptorError::DuplicateLabelName(w[0].to_string()));
        }

        let mut sorted_variable: Vec<&str> = variable_labels.iter().map(String::as_str).collect();
        sorted_variable.sort_unstable();

        let fingerprint = {
            let mut hasher = Hasher::default();
            hasher.write(&name);
            hasher.section();
            for (k, v) in &const_labels {
                hasher.write(k);
                hasher.write(v);
            }
            hasher.section();
            for label in &sorted_variable {
                hasher.write(label);
            }
            hasher.finish()
        };

        let dim_hash = {
            let mut hasher = Hasher::default();
            hasher.write(&help);
            hasher.section();
            for (k, _) in &const_labels {
                hasher.write(k);
            }
            hasher.section();
            for label in &sorted_variable {
                hasher.write(label);
            }
            hasher.finish()
        };

        Ok(Descriptor(Arc::new(Inner {
            name,
            help,
            const_labels,
            variable_labels,
            fingerprint,
            dim_hash,
        })))
    }

    /// Returns the fully-qualified name of the metric family.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the help text.
    pub fn help(&self) -> &str {
        &self.0.help
    }

    /// Returns the variable label names in declaration order.
    pub fn variable_labels(&self) -> &[String] {
        &self.0.variable_labels
    }

    /// Returns the constant labels, sorted by label name.
    pub fn const_labels(&self) -> &[(String, String)] {
        &self.0.const_labels
    }

    /// Identity of the descriptor, derived from the name, the constant label
    /// pairs and the *set* of variable label names.
    ///
    /// Two descriptors differing only in the declaration order of their
    /// variable labels share a fingerprint and are thus duplicates of each
    /// other.
    pub fn fingerprint(&self) -> u64 {
        self.0.fingerprint
    }

    /// Hash over the help text, the constant label names and the set of
    /// variable label names, each hashed as its own section. Descriptors
    /// sharing a name must share this value.
    pub fn dim_hash(&self) -> u64 {
        self.0.dim_hash
    }

    /// Whether both handles point at the same descriptor instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.fingerprint == other.0.fingerprint
                && self.0.dim_hash == other.0.dim_hash
                && self.0.variable_labels == other.0.variable_labels)
    }
}

impl Eq for Descriptor {}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Desc{{name={:?}, help={:?}, const_labels={{", self.name(), self.help())?;
        for (i, (k, v)) in self.const_labels().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v:?}")?;
        }
        f.write_str("}, variable_labels=[")?;
        for (i, l) in self.variable_labels().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(l)?;
        }
        f.write_str("]}")
    }
}

/// Content hasher producing 64-bit fingerprints.
///
/// Truncated blake3, so fingerprints are stable across processes and builds.
#[derive(Default)]
struct Hasher(blake3::Hasher);

impl Hasher {
    fn write(&mut self, s: &str) {
        self.0.update(s.as_bytes());
        self.0.update(&[SEPARATOR]);
    }

    fn section(&mut self) {
        self.0.update(&[SECTION]);
    }

    fn finish(&self) -> u64 {
        let digest = self.0.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

/// Options shared by all single-valued metric constructors.
///
/// The fully-qualified metric name is built from namespace, subsystem and
/// name, joined by `_`, skipping empty components.
///
/// ```
/// # use openmetrics_collector::descriptor::Opts;
/// let desc = Opts::new("requests_total", "Requests served.")
///     .namespace("shop")
///     .subsystem("http")
///     .const_label("region", "eu")
///     .describe(&["method"])
///     .unwrap();
///
/// assert_eq!("shop_http_requests_total", desc.name());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Opts {
    namespace: String,
    subsystem: String,
    name: String,
    help: String,
    const_labels: Vec<(String, String)>,
}

impl Opts {
    /// Create new [`Opts`] for a metric with the given name and help text.
    pub fn new<N: Into<String>, H: Into<String>>(name: N, help: H) -> Self {
        Opts {
            name: name.into(),
            help: help.into(),
            ..Default::default()
        }
    }

    /// Set the namespace, the first component of the fully-qualified name.
    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the subsystem, the second component of the fully-qualified name.
    pub fn subsystem<S: Into<String>>(mut self, subsystem: S) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Add a constant label.
    pub fn const_label<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.const_labels.push((name.into(), value.into()));
        self
    }

    /// Returns the fully-qualified metric name.
    pub fn fq_name(&self) -> String {
        build_fq_name(&self.namespace, &self.subsystem, &self.name)
    }

    /// Build the [`Descriptor`] for these options with the given variable
    /// labels.
    pub fn describe(&self, variable_labels: &[&str]) -> Result<Descriptor, DescriptorError> {
        Descriptor::from_parts(
            self.fq_name(),
            self.help.clone(),
            variable_labels.iter().map(|l| l.to_string()).collect(),
            self.const_labels.clone(),
        )
    }
}

/// Joins namespace, subsystem and name with `_`, skipping empty components.
///
/// An empty name yields an empty string, regardless of the other components.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

fn is_valid_metric_char(c: char, i: usize) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (c.is_ascii_digit() && i > 0)
}

pub(crate) fn is_valid_metric_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.chars()
        .enumerate()
        .all(|(i, c)| is_valid_metric_char(c, i))
}

pub(crate) fn is_valid_label_name(label_name: &str) -> bool {
    if label_name.is_empty() {
        return false;
    }
    label_name
        .chars()
        .enumerate()
        .all(|(i, b)| b.is_ascii_alphabetic() || b == '_' || (b.is_ascii_digit() && i > 0))
}

fn check_label_name(label_name: &str) -> Result<(), DescriptorError> {
    if !is_valid_label_name(label_name) {
        return Err(DescriptorError::InvalidLabelName(label_name.to_string()));
    }
    if label_name.starts_with("__") {
        return Err(DescriptorError::ReservedLabelName(label_name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    #[test]
    fn metric_name_is_valid() {
        struct Scenario {
            input: &'static str,
            expected: bool,
        }

        let scenarios = vec![
            Scenario {
                input: "Avalid_23name",
                expected: true,
            },
            Scenario {
                input: "_Avalid_23name",
                expected: true,
            },
            Scenario {
                input: "1valid_23name",
                expected: false,
            },
            Scenario {
                input: "Ava:lid_23name",
                expected: true,
            },
            Scenario {
                input: "a lid_23name",
                expected: false,
            },
            Scenario {
                input: ":leading_colon",
                expected: true,
            },
            Scenario {
                input: "",
                expected: false,
            },
            Scenario {
                input: "aÅz",
                expected: false,
            },
        ];

        for scenario in scenarios {
            assert_eq!(
                scenario.expected,
                is_valid_metric_name(scenario.input),
                "{}",
                scenario.input
            );
        }
    }

    #[test]
    fn label_name_is_valid() {
        for (input, expected) in [
            ("method", true),
            ("_method", true),
            ("method_2", true),
            ("2method", false),
            ("me:thod", false),
            ("", false),
        ] {
            assert_eq!(expected, is_valid_label_name(input), "{input}");
        }
    }

    #[test]
    fn construction_errors() {
        assert_eq!(
            Err(DescriptorError::InvalidName("".to_string())),
            Descriptor::new("", "help", &[], &[])
        );
        assert_eq!(
            Err(DescriptorError::InvalidName("9lives".to_string())),
            Descriptor::new("9lives", "help", &[], &[])
        );
        assert_eq!(
            Err(DescriptorError::InvalidLabelName("a-b".to_string())),
            Descriptor::new("name", "help", &["a-b"], &[])
        );
        assert_eq!(
            Err(DescriptorError::ReservedLabelName("__name__".to_string())),
            Descriptor::new("name", "help", &[], &[("__name__", "x")])
        );
        assert_eq!(
            Err(DescriptorError::DuplicateLabelName("code".to_string())),
            Descriptor::new("name", "help", &["code"], &[("code", "200")])
        );
        assert_eq!(
            Err(DescriptorError::DuplicateLabelName("code".to_string())),
            Descriptor::new("name", "help", &["code", "method", "code"], &[])
        );
    }

    #[test]
    fn accessors() {
        let desc = Descriptor::new(
            "http_requests_total",
            "help",
            &["method", "code"],
            &[("zone", "b"), ("app", "a")],
        )
        .unwrap();

        assert_eq!("http_requests_total", desc.name());
        assert_eq!("help", desc.help());
        assert_eq!(&["method".to_string(), "code".to_string()], desc.variable_labels());
        assert_eq!(
            &[
                ("app".to_string(), "a".to_string()),
                ("zone".to_string(), "b".to_string())
            ],
            desc.const_labels()
        );
        assert_eq!(
            "Desc{name=\"http_requests_total\", help=\"help\", const_labels={app=\"a\",zone=\"b\"}, variable_labels=[method,code]}",
            desc.to_string()
        );
    }

    #[test]
    fn identical_inputs_share_fingerprint() {
        let a = Descriptor::new("http_requests_total", "help", &["method"], &[("a", "1")]).unwrap();
        let b = Descriptor::new("http_requests_total", "other help", &["method"], &[("a", "1")])
            .unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        // Help text is part of the schema, not of the identity.
        assert_ne!(a.dim_hash(), b.dim_hash());
    }

    #[test]
    fn reordered_variable_labels_are_duplicates() {
        let a = Descriptor::new("http_requests_total", "help", &["method", "code"], &[]).unwrap();
        let b = Descriptor::new("http_requests_total", "help", &["code", "method"], &[]).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.dim_hash(), b.dim_hash());
        // Emission order still follows the declaration.
        assert_ne!(a.variable_labels(), b.variable_labels());
        assert_ne!(a, b);
    }

    #[test]
    fn label_moved_between_const_and_variable_changes_dim_hash() {
        let a = Descriptor::new("x", "help", &["b"], &[("a", "1")]).unwrap();
        let b = Descriptor::new("x", "help", &["a"], &[("b", "2")]).unwrap();

        assert_ne!(a.dim_hash(), b.dim_hash());
    }

    #[test]
    fn differing_labels_change_fingerprint() {
        let base = Descriptor::new("requests", "help", &["method"], &[("a", "1")]).unwrap();

        for other in [
            Descriptor::new("requests", "help", &["method", "code"], &[("a", "1")]).unwrap(),
            Descriptor::new("requests", "help", &["code"], &[("a", "1")]).unwrap(),
            Descriptor::new("requests", "help", &["method"], &[("a", "2")]).unwrap(),
            Descriptor::new("requests", "help", &["method"], &[("b", "1")]).unwrap(),
            Descriptor::new("requests", "help", &["method"], &[]).unwrap(),
            // Same label name, moved from the variable to the constant set.
            Descriptor::new("requests", "help", &["a"], &[("method", "1")]).unwrap(),
        ] {
            assert_ne!(base.fingerprint(), other.fingerprint(), "{other}");
        }
    }

    #[test]
    fn clones_share_instance() {
        let desc = Descriptor::new("up", "help", &[], &[]).unwrap();
        let clone = desc.clone();
        assert!(desc.ptr_eq(&clone));

        let rebuilt = Descriptor::new("up", "help", &[], &[]).unwrap();
        assert!(!desc.ptr_eq(&rebuilt));
        assert_eq!(desc, rebuilt);
    }

    #[test]
    fn opts() {
        let opts = Opts::new("requests_total", "Requests.")
            .namespace("shop")
            .const_label("region", "eu");
        assert_eq!("shop_requests_total", opts.fq_name());

        let desc = opts.describe(&["method"]).unwrap();
        assert_eq!("shop_requests_total", desc.name());
        assert_eq!(&[("region".to_string(), "eu".to_string())], desc.const_labels());

        assert_eq!(
            Err(DescriptorError::DuplicateLabelName("region".to_string())),
            opts.describe(&["region"])
        );
    }

    #[test]
    fn fq_name() {
        assert_eq!("a_b_c", build_fq_name("a", "b", "c"));
        assert_eq!("a_c", build_fq_name("a", "", "c"));
        assert_eq!("b_c", build_fq_name("", "b", "c"));
        assert_eq!("c", build_fq_name("", "", "c"));
        assert_eq!("", build_fq_name("a", "b", ""));
    }

    fn label_names(raw: Vec<u8>) -> Vec<String> {
        let mut names: Vec<String> = raw.into_iter().map(|b| format!("l{}", b % 16)).collect();
        names.sort();
        names.dedup();
        names
    }

    #[test]
    fn fingerprint_ignores_label_order() {
        fn prop(raw: Vec<u8>) -> TestResult {
            let names = label_names(raw);
            let forward: Vec<&str> = names.iter().map(String::as_str).collect();
            let backward: Vec<&str> = forward.iter().rev().copied().collect();

            let a = Descriptor::new("metric", "help", &forward, &[]).unwrap();
            let b = Descriptor::new("metric", "help", &backward, &[]).unwrap();
            TestResult::from_bool(a.fingerprint() == b.fingerprint())
        }

        QuickCheck::new().quickcheck(prop as fn(Vec<u8>) -> TestResult);
    }

    #[test]
    fn fingerprint_distinguishes_label_sets() {
        fn prop(a: Vec<u8>, b: Vec<u8>) -> TestResult {
            let a = label_names(a);
            let b = label_names(b);
            if a == b {
                return TestResult::discard();
            }
            let a: Vec<&str> = a.iter().map(String::as_str).collect();
            let b: Vec<&str> = b.iter().map(String::as_str).collect();

            let a = Descriptor::new("metric", "help", &a, &[]).unwrap();
            let b = Descriptor::new("metric", "help", &b, &[]).unwrap();
            TestResult::from_bool(a.fingerprint() != b.fingerprint())
        }

        QuickCheck::new().quickcheck(prop as fn(Vec<u8>, Vec<u8>) -> TestResult);
    }
}
