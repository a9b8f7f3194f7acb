use std::fmt;
use std::sync::Arc;

use crate::hardware::Hardware;
use crate::solution::{SearchType, Solution, SolutionSet, SolutionVector};

/// Shared handle to any library node. Rows, tables and parent libraries
/// all hold nested libraries through this alias; nothing is deep-copied.
pub type LibraryRef<P, S> = Arc<dyn SolutionLibrary<P, S>>;

/// Contract every node of a selection hierarchy satisfies.
///
/// An unmatched query is `None` (or an empty collection), never an error.
/// Implementations are read-only after construction and must tolerate
/// concurrent calls from many threads.
pub trait SolutionLibrary<P, S: Solution>: Send + Sync {
    /// Short type tag used in descriptions (`"Single"`, `"Matching"`, ...).
    fn type_name(&self) -> &'static str;

    fn description(&self) -> String;

    /// Resolve the kernel with identity `index`, if this node can reach it
    /// for the given problem and hardware.
    fn solution_by_index(&self, problem: &P, hardware: &Hardware, index: usize)
        -> Option<Arc<S>>;

    /// Primary dispatch entry point. When `fitness` is provided and the node
    /// performs a distance match, the matched distance is written into it.
    fn find_best_solution(
        &self,
        problem: &P,
        hardware: &Hardware,
        fitness: Option<&mut f64>,
    ) -> Option<Arc<S>>;

    /// Best solution for a grouped (batched) call.
    fn find_best_solution_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        fitness: Option<&mut f64>,
    ) -> Option<Arc<S>>;

    fn find_all_solutions(
        &self,
        problem: &P,
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S>;

    fn find_all_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        search: SearchType,
    ) -> SolutionSet<S>;

    /// Up to `k` solutions, best first. Leaves expose at most their single
    /// best solution.
    fn find_top_solutions(&self, problem: &P, hardware: &Hardware, k: usize) -> SolutionVector<S> {
        if k == 0 {
            return Vec::new();
        }
        self.find_best_solution(problem, hardware, None)
            .into_iter()
            .collect()
    }

    fn find_top_solutions_grouped(
        &self,
        problems: &[P],
        hardware: &Hardware,
        k: usize,
    ) -> SolutionVector<S> {
        if k == 0 {
            return Vec::new();
        }
        self.find_best_solution_grouped(problems, hardware, None)
            .into_iter()
            .collect()
    }
}

/// Named test applied to a problem before a leaf hands out its kernel.
pub struct ProblemPredicate<P> {
    name: String,
    test: Arc<dyn Fn(&P) -> bool + Send + Sync>,
}

impl<P> ProblemPredicate<P> {
    pub fn new(name: impl Into<String>, test: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts(&self, problem: &P) -> bool {
        (self.test)(problem)
    }
}

impl<P> Clone for ProblemPredicate<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<P> fmt::Debug for ProblemPredicate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemPredicate")
            .field("name", &self.name)
            .finish()
    }
}
