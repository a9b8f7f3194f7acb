//! Workspace umbrella crate for benchmark-driven GEMM kernel selection.
//!
//! This crate ties the selection contract (`library`) and the distance
//! matching layer (`matching`) to concrete GEMM problems and kernels, and
//! exposes a single [`KernelSelector`] entry point configured from a
//! [`SelectionConfig`].

pub mod builder;
pub mod config;
pub mod gemm;

pub use library::{
    Hardware, HardwarePredicate, HardwareSelectionLibrary, LibraryRef, ProblemPredicate,
    SearchType, SingleSolutionLibrary, Solution, SolutionLibrary, SolutionSet, SolutionVector,
};
pub use matching::{
    Candidate, Diagnostics, Distance, EvaluationPolicy, FnProperty, Match, MatchingRow,
    MatchingTable, NearestResolvable, PreferLogicIndex, ProblemMatchingLibrary, Property,
    PropertyRef, SelectionMetrics, SelectionOp, TableError, set_selection_metrics,
};

pub use crate::builder::{
    BuildError, GemmLibraryRef, GemmMatchingLibrary, HardwareArmSpec, LibrarySpec, ProblemRule,
    RowSpec, TableSpec,
};
pub use crate::config::{ConfigLoadError, MatchingConfig, PolicyKind, SelectionConfig};
pub use crate::gemm::{
    DataType, GemmProblem, GemmProperty, GranularityPolicy, KernelSolution, Transpose,
};

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

/// Kernel chosen for a problem.
#[derive(Debug, Clone)]
pub struct Selection {
    pub kernel: Arc<KernelSolution>,
    /// Distance of the matched benchmark row, when the hierarchy reports one.
    pub fitness: Option<f64>,
}

/// Entry point that owns a built hierarchy and its configuration.
///
/// Cheap to share: clone the `Arc` it is stored in, or clone the selector
/// itself (the hierarchy is reference counted).
#[derive(Clone)]
pub struct KernelSelector {
    root: GemmLibraryRef,
    config: SelectionConfig,
}

impl KernelSelector {
    pub fn new(root: GemmLibraryRef, config: SelectionConfig) -> Self {
        Self { root, config }
    }

    pub fn from_spec(spec: &LibrarySpec, config: SelectionConfig) -> Result<Self, BuildError> {
        let root = spec.build(&config)?;
        info!(root = %root.description(), "kernel_selector_ready");
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &GemmLibraryRef {
        &self.root
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn description(&self) -> String {
        self.root.description()
    }

    /// Best kernel for `problem` on `hardware`.
    pub fn select(&self, problem: &GemmProblem, hardware: &Hardware) -> Option<Selection> {
        let start = Instant::now();
        let mut fitness = f64::NAN;
        let kernel = self
            .root
            .find_best_solution(problem, hardware, Some(&mut fitness));
        self.finish(problem, hardware, kernel, fitness, start)
    }

    /// Best kernel for a batch; matching ranks on the first problem.
    pub fn select_grouped(&self, problems: &[GemmProblem], hardware: &Hardware) -> Option<Selection> {
        let start = Instant::now();
        let mut fitness = f64::NAN;
        let kernel = self
            .root
            .find_best_solution_grouped(problems, hardware, Some(&mut fitness));
        let representative = problems.first()?;
        self.finish(representative, hardware, kernel, fitness, start)
    }

    /// Up to `matching.default_top_k` distinct kernels, best first.
    pub fn candidates(&self, problem: &GemmProblem, hardware: &Hardware) -> SolutionVector<KernelSolution> {
        self.root
            .find_top_solutions(problem, hardware, self.config.matching.default_top_k)
    }

    pub fn enumerate(
        &self,
        problem: &GemmProblem,
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<KernelSolution> {
        self.root.find_all_solutions(problem, hardware, search)
    }

    fn finish(
        &self,
        problem: &GemmProblem,
        hardware: &Hardware,
        kernel: Option<Arc<KernelSolution>>,
        fitness: f64,
        start: Instant,
    ) -> Option<Selection> {
        let elapsed_micros = start.elapsed().as_micros() as u64;
        let Some(kernel) = kernel else {
            info!(
                problem = %problem,
                hardware = %hardware,
                elapsed_micros,
                "no_kernel_for_problem"
            );
            return None;
        };

        // NaN means no matching node wrote a fitness.
        let fitness = (!fitness.is_nan()).then_some(fitness);
        debug!(
            problem = %problem,
            hardware = %hardware,
            kernel = kernel.name(),
            fitness = ?fitness,
            elapsed_micros,
            "kernel_selected"
        );
        Some(Selection { kernel, fitness })
    }
}

impl std::fmt::Debug for KernelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSelector")
            .field("root", &self.root.description())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> LibrarySpec {
        LibrarySpec::Matching(TableSpec {
            properties: vec![GemmProperty::M, GemmProperty::N],
            distance: Some(Distance::Euclidean),
            rows: vec![
                RowSpec {
                    key: vec![256.0, 256.0],
                    logic_index: Some(0),
                    library: LibrarySpec::kernel(KernelSolution::new(0, "MT64x64x16", [64, 64], 16)),
                },
                RowSpec {
                    key: vec![4096.0, 4096.0],
                    logic_index: Some(1),
                    library: LibrarySpec::kernel(KernelSolution::new(
                        1,
                        "MT256x128x32",
                        [256, 128],
                        32,
                    )),
                },
            ],
        })
    }

    #[test]
    fn select_reports_kernel_and_fitness() {
        let selector = KernelSelector::from_spec(&spec(), SelectionConfig::default()).unwrap();
        let hw = Hardware::new("gfx942", 304);

        let selection = selector
            .select(&GemmProblem::new(256, 256, 512), &hw)
            .expect("match");
        assert_eq!(selection.kernel.index, 0);
        assert_eq!(selection.fitness, Some(0.0));

        let grouped = selector
            .select_grouped(&[GemmProblem::new(4000, 4000, 64), GemmProblem::new(8, 8, 8)], &hw)
            .expect("match");
        assert_eq!(grouped.kernel.index, 1);
        assert!(selector.select_grouped(&[], &hw).is_none());
    }

    #[test]
    fn leaf_root_reports_no_fitness() {
        let root = LibrarySpec::kernel(KernelSolution::new(5, "only", [32, 32], 8));
        let selector = KernelSelector::from_spec(&root, SelectionConfig::default()).unwrap();
        let selection = selector
            .select(&GemmProblem::new(1, 1, 1), &Hardware::new("gfx942", 304))
            .expect("leaf answers");
        assert_eq!(selection.fitness, None);
    }

    #[test]
    fn candidates_use_configured_top_k() {
        let mut config = SelectionConfig::default();
        config.matching.default_top_k = 2;
        let selector = KernelSelector::from_spec(&spec(), config).unwrap();
        let hw = Hardware::new("gfx942", 304);

        let ids: Vec<usize> = selector
            .candidates(&GemmProblem::new(3000, 3000, 64), &hw)
            .iter()
            .map(|k| k.index)
            .collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(
            selector
                .enumerate(&GemmProblem::new(1, 1, 1), &hw, SearchType::Exhaustive)
                .indices(),
            vec![0, 1]
        );
    }
}
