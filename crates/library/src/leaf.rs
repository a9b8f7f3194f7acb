//! Direct (non-matching) library nodes.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::contract::{LibraryRef, ProblemPredicate, SolutionLibrary};
use crate::hardware::{Hardware, HardwarePredicate};
use crate::solution::{SearchType, Solution, SolutionSet};

/// Leaf holding exactly one kernel.
///
/// The kernel is handed out only when its hardware predicate accepts the
/// device and the optional problem predicate accepts the problem.
pub struct SingleSolutionLibrary<P, S> {
    solution: Arc<S>,
    problem_predicate: Option<ProblemPredicate<P>>,
}

impl<P, S: Solution> SingleSolutionLibrary<P, S> {
    pub fn new(solution: Arc<S>) -> Self {
        Self {
            solution,
            problem_predicate: None,
        }
    }

    pub fn with_problem_predicate(mut self, predicate: ProblemPredicate<P>) -> Self {
        self.problem_predicate = Some(predicate);
        self
    }

    pub fn solution(&self) -> &Arc<S> {
        &self.solution
    }

    fn hardware_ok(&self, hardware: &Hardware) -> bool {
        self.solution.hardware_predicate().accepts(hardware)
    }

    fn problem_ok(&self, problem: &P) -> bool {
        self.problem_predicate
            .as_ref()
            .is_none_or(|predicate| predicate.accepts(problem))
    }

    fn resolve(&self, problem: &P, hardware: &Hardware) -> Option<Arc<S>> {
        if !self.hardware_ok(hardware) {
            debug!(
                kernel = self.solution.name(),
                hardware = %hardware,
                "kernel_not_applicable_to_hardware"
            );
            return None;
        }
        if !self.problem_ok(problem) {
            return None;
        }
        Some(Arc::clone(&self.solution))
    }

    fn resolve_grouped(&self, problems: &[P], hardware: &Hardware) -> Option<Arc<S>> {
        if problems.is_empty() || !self.hardware_ok(hardware) {
            return None;
        }
        if !problems.iter().all(|p| self.problem_ok(p)) {
            return None;
        }
        Some(Arc::clone(&self.solution))
    }

    fn enumerate(&self, accepted: bool, hardware: &Hardware, search: SearchType) -> SolutionSet<S> {
        let mut rv = SolutionSet::new();
        let include = match search {
            SearchType::Default => accepted,
            SearchType::Exhaustive => self.hardware_ok(hardware),
        };
        if include {
            rv.insert(Arc::clone(&self.solution));
        }
        rv
    }
}

impl<P, S> SolutionLibrary<P, S> for SingleSolutionLibrary<P, S>
where
    P: Send + Sync,
    S: Solution,
{
    fn type_name(&self) -> &'static str {
        "Single"
    }

    fn description(&self) -> String {
        match &self.problem_predicate {
            Some(predicate) => format!(
                "{}: {} [{}]",
                self.type_name(),
                self.solution.name(),
                predicate.name()
            ),
            None => format!("{}: {}", self.type_name(), self.solution.name()),
        }
    }

    fn solution_by_index(
        &self,
        problem: &P,
        hardware: &Hardware,
        index: usize,
    ) -> Option<Arc<S>> {
        if self.solution.index() != index {
            return None;
        }
        self.resolve(problem, hardware)
    }

    fn find_best_solution(
        &self,
        problem: &P,
        hardware: &Hardware,
        _fitness: Option<&mut f64>,
    ) -> Option<Arc<S>> {
        self.resolve(problem, hardware)
    }

    fn find_best_solution_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        _fitness: Option<&mut f64>,
    ) -> Option<Arc<S>> {
        self.resolve_grouped(problems, hardware)
    }

    fn find_all_solutions(
        &self,
        problem: &P,
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S> {
        let accepted = self.resolve(problem, hardware).is_some();
        self.enumerate(accepted, hardware, search)
    }

    fn find_all_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S> {
        let accepted = self.resolve_grouped(problems, hardware).is_some();
        self.enumerate(accepted, hardware, search)
    }
}

/// Ordered hardware dispatch: the first row whose predicate accepts the
/// device answers the query. Typically the root of a hierarchy, one row
/// per architecture, each pointing at a matching library.
pub struct HardwareSelectionLibrary<P, S> {
    rows: Vec<(HardwarePredicate, LibraryRef<P, S>)>,
    _problem: PhantomData<fn(&P)>,
}

impl<P, S: Solution> HardwareSelectionLibrary<P, S> {
    pub fn new(rows: Vec<(HardwarePredicate, LibraryRef<P, S>)>) -> Self {
        Self {
            rows,
            _problem: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn select(&self, hardware: &Hardware) -> Option<&LibraryRef<P, S>> {
        let selected = self
            .rows
            .iter()
            .find(|(predicate, _)| predicate.accepts(hardware))
            .map(|(_, library)| library);
        if selected.is_none() {
            debug!(hardware = %hardware, "no_library_for_hardware");
        }
        selected
    }
}

impl<P, S> SolutionLibrary<P, S> for HardwareSelectionLibrary<P, S>
where
    P: Send + Sync,
    S: Solution,
{
    fn type_name(&self) -> &'static str {
        "Hardware"
    }

    fn description(&self) -> String {
        let arms: Vec<String> = self
            .rows
            .iter()
            .map(|(predicate, _)| predicate.to_string())
            .collect();
        format!("{}: [{}]", self.type_name(), arms.join("; "))
    }

    fn solution_by_index(
        &self,
        problem: &P,
        hardware: &Hardware,
        index: usize,
    ) -> Option<Arc<S>> {
        self.select(hardware)?
            .solution_by_index(problem, hardware, index)
    }

    fn find_best_solution(
        &self,
        problem: &P,
        hardware: &Hardware,
        fitness: Option<&mut f64>,
    ) -> Option<Arc<S>> {
        self.select(hardware)?
            .find_best_solution(problem, hardware, fitness)
    }

    fn find_best_solution_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        fitness: Option<&mut f64>,
    ) -> Option<Arc<S>> {
        self.select(hardware)?
            .find_best_solution_grouped(problems, hardware, fitness)
    }

    fn find_all_solutions(
        &self,
        problem: &P,
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S> {
        match search {
            SearchType::Default => self
                .select(hardware)
                .map(|library| library.find_all_solutions(problem, hardware, search))
                .unwrap_or_default(),
            SearchType::Exhaustive => self
                .rows
                .iter()
                .filter(|(predicate, _)| predicate.accepts(hardware))
                .flat_map(|(_, library)| library.find_all_solutions(problem, hardware, search))
                .collect(),
        }
    }

    fn find_all_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S> {
        match search {
            SearchType::Default => self
                .select(hardware)
                .map(|library| library.find_all_solutions_grouped(problems, hardware, search))
                .unwrap_or_default(),
            SearchType::Exhaustive => self
                .rows
                .iter()
                .filter(|(predicate, _)| predicate.accepts(hardware))
                .flat_map(|(_, library)| {
                    library.find_all_solutions_grouped(problems, hardware, search)
                })
                .collect(),
        }
    }

    fn find_top_solutions(
        &self,
        problem: &P,
        hardware: &Hardware,
        k: usize,
    ) -> Vec<Arc<S>> {
        self.select(hardware)
            .map(|library| library.find_top_solutions(problem, hardware, k))
            .unwrap_or_default()
    }

    fn find_top_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        k: usize,
    ) -> Vec<Arc<S>> {
        self.select(hardware)
            .map(|library| library.find_top_solutions_grouped(problems, hardware, k))
            .unwrap_or_default()
    }
}
