//! In-memory construction of selection hierarchies from serde descriptions.
//!
//! A [`LibrarySpec`] mirrors the node types of a hierarchy: kernel leaves,
//! matching tables and hardware switches. Building validates every table and
//! binds the diagnostics and evaluation policy of a [`SelectionConfig`] to
//! each matching node.

use std::fmt;
use std::sync::Arc;

use library::{
    HardwarePredicate, HardwareSelectionLibrary, LibraryRef, ProblemPredicate,
    SingleSolutionLibrary,
};
use matching::{Distance, MatchingRow, MatchingTable, ProblemMatchingLibrary, PropertyRef, TableError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::SelectionConfig;
use crate::gemm::{DataType, GemmProblem, GemmProperty, KernelSolution};

pub type GemmLibraryRef = LibraryRef<GemmProblem, KernelSolution>;
pub type GemmMatchingLibrary = ProblemMatchingLibrary<GemmProblem, KernelSolution>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("{path}: {source}")]
    Table { path: String, source: TableError },

    #[error("{path}: invalid problem rule: {reason}")]
    InvalidRule { path: String, reason: String },
}

/// Problem-side applicability test attached to a kernel leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProblemRule {
    /// Property value is an exact multiple of `multiple`.
    SizeMultiple { property: GemmProperty, multiple: u64 },
    MinValue { property: GemmProperty, min: f64 },
    MaxValue { property: GemmProperty, max: f64 },
    ComputeType { data_type: DataType },
    AllOf { rules: Vec<ProblemRule> },
}

impl ProblemRule {
    pub fn accepts(&self, problem: &GemmProblem) -> bool {
        use matching::Property;

        match self {
            ProblemRule::SizeMultiple { property, multiple } => {
                let value = property.evaluate(problem);
                *multiple != 0 && value.fract() == 0.0 && (value as u64) % multiple == 0
            }
            ProblemRule::MinValue { property, min } => property.evaluate(problem) >= *min,
            ProblemRule::MaxValue { property, max } => property.evaluate(problem) <= *max,
            ProblemRule::ComputeType { data_type } => problem.compute_type == *data_type,
            ProblemRule::AllOf { rules } => rules.iter().all(|rule| rule.accepts(problem)),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            ProblemRule::SizeMultiple { multiple: 0, .. } => Err("multiple must be >= 1".into()),
            ProblemRule::MinValue { min: bound, .. } | ProblemRule::MaxValue { max: bound, .. }
                if !bound.is_finite() =>
            {
                Err("bound must be finite".into())
            }
            ProblemRule::AllOf { rules } => rules.iter().try_for_each(ProblemRule::validate),
            _ => Ok(()),
        }
    }

    fn into_predicate(self) -> ProblemPredicate<GemmProblem> {
        ProblemPredicate::new(self.to_string(), move |problem: &GemmProblem| self.accepts(problem))
    }
}

impl fmt::Display for ProblemRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use matching::Property;

        match self {
            ProblemRule::SizeMultiple { property, multiple } => {
                write!(f, "{} % {multiple} == 0", property.name())
            }
            ProblemRule::MinValue { property, min } => write!(f, "{} >= {min}", property.name()),
            ProblemRule::MaxValue { property, max } => write!(f, "{} <= {max}", property.name()),
            ProblemRule::ComputeType { data_type } => write!(f, "compute == {data_type}"),
            ProblemRule::AllOf { rules } => {
                let parts: Vec<String> = rules.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" && "))
            }
        }
    }
}

/// One node of a selection hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LibrarySpec {
    Kernel {
        kernel: KernelSolution,
        #[serde(default)]
        rule: Option<ProblemRule>,
    },
    Matching(TableSpec),
    Hardware { arms: Vec<HardwareArmSpec> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareArmSpec {
    pub predicate: HardwarePredicate,
    pub library: LibrarySpec,
}

/// Properties, metric and rows of one matching table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub properties: Vec<GemmProperty>,
    /// Falls back to the configured default metric when absent.
    #[serde(default)]
    pub distance: Option<Distance>,
    #[serde(default)]
    pub rows: Vec<RowSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSpec {
    pub key: Vec<f64>,
    #[serde(default)]
    pub logic_index: Option<usize>,
    pub library: LibrarySpec,
}

impl LibrarySpec {
    pub fn kernel(kernel: KernelSolution) -> Self {
        LibrarySpec::Kernel { kernel, rule: None }
    }

    pub fn build(&self, config: &SelectionConfig) -> Result<GemmLibraryRef, BuildError> {
        self.build_at("root", config)
    }

    fn build_at(&self, path: &str, config: &SelectionConfig) -> Result<GemmLibraryRef, BuildError> {
        match self {
            LibrarySpec::Kernel { kernel, rule } => {
                let mut leaf = SingleSolutionLibrary::new(Arc::new(kernel.clone()));
                if let Some(rule) = rule {
                    rule.validate().map_err(|reason| BuildError::InvalidRule {
                        path: path.to_string(),
                        reason,
                    })?;
                    leaf = leaf.with_problem_predicate(rule.clone().into_predicate());
                }
                Ok(Arc::new(leaf))
            }
            LibrarySpec::Matching(table) => Ok(Arc::new(table.build_at(path, config)?)),
            LibrarySpec::Hardware { arms } => {
                let rows = arms
                    .iter()
                    .enumerate()
                    .map(|(idx, arm)| {
                        let library = arm.library.build_at(&format!("{path}.arms[{idx}]"), config)?;
                        Ok((arm.predicate.clone(), library))
                    })
                    .collect::<Result<Vec<_>, BuildError>>()?;
                Ok(Arc::new(HardwareSelectionLibrary::new(rows)))
            }
        }
    }
}

impl TableSpec {
    pub fn build(&self, config: &SelectionConfig) -> Result<GemmMatchingLibrary, BuildError> {
        self.build_at("root", config)
    }

    fn build_at(&self, path: &str, config: &SelectionConfig) -> Result<GemmMatchingLibrary, BuildError> {
        let properties: Vec<PropertyRef<GemmProblem>> = self
            .properties
            .iter()
            .map(|p| Arc::new(*p) as PropertyRef<GemmProblem>)
            .collect();
        let distance = self
            .distance
            .clone()
            .unwrap_or_else(|| config.matching.distance.clone());

        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let library = row.library.build_at(&format!("{path}.rows[{idx}]"), config)?;
                let mut built = MatchingRow::new(row.key.clone(), library);
                if let Some(logic_index) = row.logic_index {
                    built = built.with_logic_index(logic_index);
                }
                Ok(built)
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let table = MatchingTable::new(properties, distance, rows).map_err(|source| {
            BuildError::Table {
                path: path.to_string(),
                source,
            }
        })?;
        debug!(path, table = %table.description(), "matching_table_built");

        Ok(ProblemMatchingLibrary::new(Arc::new(table))
            .with_diagnostics(config.diagnostics)
            .with_evaluation_policy(config.matching.evaluation_policy.policy()))
    }
}
