//! Target device descriptors and the predicates evaluated against them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Descriptor of the device class a query is dispatched to.
///
/// Detection lives outside this crate; callers build one `Hardware` per
/// device and share it across every query issued for that device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hardware {
    /// Architecture name, e.g. `gfx942`.
    pub architecture: String,
    /// Number of compute units available to a single kernel launch.
    pub compute_units: u32,
    /// Free-form capability tags (`xf32`, `f8`, `wmma`, ...).
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl Hardware {
    pub fn new(architecture: impl Into<String>, compute_units: u32) -> Self {
        Self {
            architecture: architecture.into(),
            compute_units,
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }
}

impl fmt::Display for Hardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} CUs)", self.architecture, self.compute_units)
    }
}

/// Applicability test of a candidate against a [`Hardware`] descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HardwarePredicate {
    /// Accepts every device.
    #[default]
    Any,
    /// Exact architecture name match.
    ArchIs(String),
    /// Device exposes at least this many compute units.
    MinComputeUnits(u32),
    /// Device carries the capability tag.
    HasCapability(String),
    And(Vec<HardwarePredicate>),
    Or(Vec<HardwarePredicate>),
}

impl HardwarePredicate {
    pub fn accepts(&self, hardware: &Hardware) -> bool {
        match self {
            HardwarePredicate::Any => true,
            HardwarePredicate::ArchIs(arch) => hardware.architecture == *arch,
            HardwarePredicate::MinComputeUnits(min) => hardware.compute_units >= *min,
            HardwarePredicate::HasCapability(tag) => hardware.has_capability(tag),
            HardwarePredicate::And(all) => all.iter().all(|p| p.accepts(hardware)),
            HardwarePredicate::Or(any) => any.iter().any(|p| p.accepts(hardware)),
        }
    }
}

impl fmt::Display for HardwarePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, op: &str, items: &[HardwarePredicate]) -> fmt::Result {
            write!(f, "{op}(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, ")")
        }

        match self {
            HardwarePredicate::Any => write!(f, "Any"),
            HardwarePredicate::ArchIs(arch) => write!(f, "Arch == {arch}"),
            HardwarePredicate::MinComputeUnits(min) => write!(f, "CUs >= {min}"),
            HardwarePredicate::HasCapability(tag) => write!(f, "Has {tag}"),
            HardwarePredicate::And(items) => join(f, "And", items),
            HardwarePredicate::Or(items) => join(f, "Or", items),
        }
    }
}
