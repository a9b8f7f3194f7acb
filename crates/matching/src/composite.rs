use std::sync::Arc;

use library::{
    Hardware, LibraryRef, SearchType, Solution, SolutionLibrary, SolutionSet, SolutionVector,
};
use tracing::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::evaluation::{Candidate, EvaluationPolicy, NearestResolvable};
use crate::metrics::{MetricsSpan, SelectionOp};
use crate::table::{isolate, MatchingRow, MatchingTable};


/// Table whose rows point at nested libraries.
pub type LibraryTable<P, S> = MatchingTable<P, LibraryRef<P, S>>;

/// Selects among benchmarked sizes by distance.
///
/// Benchmarks establish the best kernel at a set of reference problems; at
/// runtime the reference closest to the requested problem answers, falling
/// through to the next closest whenever a nested library cannot resolve.
pub struct ProblemMatchingLibrary<P, S> {
    table: Option<Arc<LibraryTable<P, S>>>,
    diagnostics: Diagnostics,
    evaluation: Arc<dyn EvaluationPolicy<P, S>>,
}

impl<P, S> ProblemMatchingLibrary<P, S>
where
    P: Send + Sync + 'static,
    S: Solution + 'static,
{
    pub fn new(table: Arc<LibraryTable<P, S>>) -> Self {
        Self {
            table: Some(table),
            diagnostics: Diagnostics::default(),
            evaluation: Arc::new(NearestResolvable),
        }
    }

    /// A node with no table: answers nothing, still describes itself.
    pub fn without_table() -> Self {
        Self {
            table: None,
            diagnostics: Diagnostics::default(),
            evaluation: Arc::new(NearestResolvable),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_evaluation_policy(mut self, policy: Arc<dyn EvaluationPolicy<P, S>>) -> Self {
        self.evaluation = policy;
        self
    }

    pub fn table(&self) -> Option<&Arc<LibraryTable<P, S>>> {
        self.table.as_ref()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    fn log_row(&self, position: usize, row: &MatchingRow<LibraryRef<P, S>>, distance: Option<f64>) {
        if self.diagnostics.print_property_evaluation {
            debug!(
                target: "matching",
                position,
                key = ?row.key,
                distance = ?distance,
                logic_index = ?row.library_logic_index,
                row = %row.value.description(),
                "matching_row"
            );
        }
    }

    /// Union nested enumerations over the rows `search` selects.
    fn collect_all<F>(&self, representative: &P, search: SearchType, mut nested: F) -> SolutionSet<S>
    where
        F: FnMut(&LibraryRef<P, S>) -> SolutionSet<S>,
    {
        let mut rv = SolutionSet::new();
        let Some(table) = &self.table else {
            return rv;
        };

        let mut visit = |position: usize, row: &MatchingRow<LibraryRef<P, S>>, distance| {
            self.log_row(position, row, distance);
            if let Some(found) = isolate(position, row, &mut |lib| Some(nested(lib))) {
                rv.extend(found);
            }
        };

        if search.is_default() {
            for ranked in table.ranked_rows(representative) {
                visit(ranked.position, ranked.row, Some(ranked.distance));
            }
        } else {
            for (position, row) in table.all_rows().enumerate() {
                visit(position, row, None);
            }
        }
        rv
    }

    /// Logs the logic index of each selected row, or the solution's own
    /// when the row carries none.
    fn log_logic_indices(&self, selected: &[Candidate<S>]) {
        if !self.diagnostics.print_library_logic_index {
            return;
        }
        if selected.is_empty() {
            info!(target: "matching", "no_solution_found");
        } else {
            let indices: Vec<Option<usize>> = selected
                .iter()
                .map(|c| c.library_logic_index.or_else(|| c.solution.library_logic_index()))
                .collect();
            info!(target: "matching", logic_indices = ?indices, "top_solutions_logic_index");
        }
    }
}

fn into_solutions<S>(selected: Vec<Candidate<S>>) -> SolutionVector<S> {
    selected.into_iter().map(|c| c.solution).collect()
}

impl<P, S> SolutionLibrary<P, S> for ProblemMatchingLibrary<P, S>
where
    P: Send + Sync + 'static,
    S: Solution + 'static,
{
    fn type_name(&self) -> &'static str {
        "Matching"
    }

    fn description(&self) -> String {
        match &self.table {
            Some(table) => format!("{}: {}", self.type_name(), table.description()),
            None => format!("{}, table: none", self.type_name()),
        }
    }

    fn solution_by_index(
        &self,
        problem: &P,
        hardware: &Hardware,
        index: usize,
    ) -> Option<Arc<S>> {
        let span = MetricsSpan::start(SelectionOp::SolutionByIndex);
        let found = self.table.as_ref().and_then(|table| {
            table
                .find_best_match(problem, |lib| lib.solution_by_index(problem, hardware, index))
                .solution
        });
        if let Some(span) = span {
            span.finish(usize::from(found.is_some()));
        }
        found
    }

    fn find_best_solution(
        &self,
        problem: &P,
        hardware: &Hardware,
        fitness: Option<&mut f64>,
    ) -> Option<Arc<S>> {
        let resolve = |lib: &LibraryRef<P, S>| lib.find_best_solution(problem, hardware, None);

        if self.diagnostics.enable_debug_selection {
            let span = MetricsSpan::start(SelectionOp::Evaluation);
            let found = self.table.as_ref().and_then(|table| {
                table.find_best_evaluation_solution(
                    problem,
                    hardware,
                    resolve,
                    self.evaluation.as_ref(),
                )
            });
            if let Some(span) = span {
                span.finish(usize::from(found.is_some()));
            }
            return found;
        }

        let span = MetricsSpan::start(SelectionOp::BestSolution);
        let (found, matched_fitness) = match &self.table {
            Some(table) => {
                let m = table.find_best_match(problem, resolve);
                (m.solution, m.fitness)
            }
            None => (None, f64::MAX),
        };
        if let Some(out) = fitness {
            *out = matched_fitness;
        }
        if let Some(span) = span {
            span.finish(usize::from(found.is_some()));
        }
        found
    }

    fn find_best_solution_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        fitness: Option<&mut f64>,
    ) -> Option<Arc<S>> {
        let Some(first) = problems.first() else {
            if let Some(out) = fitness {
                *out = f64::MAX;
            }
            return None;
        };
        let resolve =
            |lib: &LibraryRef<P, S>| lib.find_best_solution_grouped(problems, hardware, None);

        if self.diagnostics.enable_debug_selection {
            let span = MetricsSpan::start(SelectionOp::Evaluation);
            let found = self.table.as_ref().and_then(|table| {
                table.find_best_evaluation_solution(first, hardware, resolve, self.evaluation.as_ref())
            });
            if let Some(span) = span {
                span.finish(usize::from(found.is_some()));
            }
            return found;
        }

        let span = MetricsSpan::start(SelectionOp::BestSolutionGrouped);
        let (found, matched_fitness) = match &self.table {
            Some(table) => {
                let m = table.find_best_match(first, resolve);
                (m.solution, m.fitness)
            }
            None => (None, f64::MAX),
        };
        if let Some(out) = fitness {
            *out = matched_fitness;
        }
        if let Some(span) = span {
            span.finish(usize::from(found.is_some()));
        }
        found
    }

    fn find_all_solutions(
        &self,
        problem: &P,
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S> {
        let span = MetricsSpan::start(SelectionOp::AllSolutions);
        let rv = self.collect_all(problem, search, |lib| {
            lib.find_all_solutions(problem, hardware, search)
        });
        if let Some(span) = span {
            span.finish(rv.len());
        }
        rv
    }

    fn find_all_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S> {
        let Some(first) = problems.first() else {
            return SolutionSet::new();
        };
        let span = MetricsSpan::start(SelectionOp::AllSolutionsGrouped);
        // Rows are ranked on the first problem only; nested libraries see
        // the whole batch.
        let rv = self.collect_all(first, search, |lib| {
            lib.find_all_solutions_grouped(problems, hardware, search)
        });
        if let Some(span) = span {
            span.finish(rv.len());
        }
        rv
    }

    /// Each matched row contributes its nested library's single best
    /// solution, not a nested top-K.
    fn find_top_solutions(&self, problem: &P, hardware: &Hardware, k: usize) -> SolutionVector<S> {
        let span = MetricsSpan::start(SelectionOp::TopSolutions);
        let selected = match &self.table {
            Some(table) => table.find_top_match(
                problem,
                |lib| lib.find_best_solution(problem, hardware, None),
                k,
            ),
            None => Vec::new(),
        };
        self.log_logic_indices(&selected);
        let solutions = into_solutions(selected);
        if let Some(span) = span {
            span.finish(solutions.len());
        }
        solutions
    }

    /// Ranks on `problems[0]`; each matched row resolves through the nested
    /// best-solution-for-batch call.
    fn find_top_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        k: usize,
    ) -> SolutionVector<S> {
        let Some(first) = problems.first() else {
            return Vec::new();
        };
        let span = MetricsSpan::start(SelectionOp::TopSolutionsGrouped);
        let solutions = match &self.table {
            Some(table) => into_solutions(table.find_top_match(
                first,
                |lib| lib.find_best_solution_grouped(problems, hardware, None),
                k,
            )),
            None => Vec::new(),
        };
        if let Some(span) = span {
            span.finish(solutions.len());
        }
        solutions
    }
}
