//! Scoring policies for the exhaustive debug-selection path.
//!
//! Default dispatch stops at the first resolvable row. With debug selection
//! enabled, every row is resolved and each candidate is handed to an
//! [`EvaluationPolicy`]; the highest score wins, ties go to the closer row.

use std::sync::Arc;

use library::{Hardware, Solution};

/// A resolved solution together with the row it came from.
#[derive(Debug)]
pub struct Candidate<S> {
    pub solution: Arc<S>,
    /// Distance of the row the solution was resolved from.
    pub distance: f64,
    /// Insertion position of that row in the table.
    pub position: usize,
    pub library_logic_index: Option<usize>,
}

pub trait EvaluationPolicy<P, S>: Send + Sync {
    fn name(&self) -> &str;

    /// Higher is better. `None` rejects the candidate outright.
    fn score(&self, problem: &P, hardware: &Hardware, candidate: &Candidate<S>) -> Option<f64>;
}

/// Exhaustive counterpart of nearest-match dispatch: resolves everything,
/// keeps the closest. Useful to validate that short-circuit dispatch and a
/// full scan agree.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestResolvable;

impl<P, S: Solution> EvaluationPolicy<P, S> for NearestResolvable {
    fn name(&self) -> &str {
        "NearestResolvable"
    }

    fn score(&self, _problem: &P, _hardware: &Hardware, candidate: &Candidate<S>) -> Option<f64> {
        Some(-candidate.distance)
    }
}

/// Prefers the kernel whose benchmark entry came first in the library
/// logic. Candidates without a logic index are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLogicIndex;

impl<P, S: Solution> EvaluationPolicy<P, S> for PreferLogicIndex {
    fn name(&self) -> &str {
        "PreferLogicIndex"
    }

    fn score(&self, _problem: &P, _hardware: &Hardware, candidate: &Candidate<S>) -> Option<f64> {
        candidate
            .solution
            .library_logic_index()
            .or(candidate.library_logic_index)
            .map(|idx| -(idx as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use library::HardwarePredicate;

    struct Tagged {
        index: usize,
        logic: Option<usize>,
        hw: HardwarePredicate,
    }

    impl Solution for Tagged {
        fn index(&self) -> usize {
            self.index
        }

        fn name(&self) -> &str {
            "tagged"
        }

        fn library_logic_index(&self) -> Option<usize> {
            self.logic
        }

        fn hardware_predicate(&self) -> &HardwarePredicate {
            &self.hw
        }
    }

    fn candidate(logic: Option<usize>, row_logic: Option<usize>, distance: f64) -> Candidate<Tagged> {
        Candidate {
            solution: Arc::new(Tagged {
                index: 0,
                logic,
                hw: HardwarePredicate::Any,
            }),
            distance,
            position: 0,
            library_logic_index: row_logic,
        }
    }

    #[test]
    fn nearest_scores_closer_rows_higher() {
        let hw = Hardware::new("gfx942", 304);
        let near = NearestResolvable.score(&(), &hw, &candidate(None, None, 1.5));
        let far = NearestResolvable.score(&(), &hw, &candidate(None, None, 4.0));
        assert!(near > far);
        assert_eq!(near, Some(-1.5));
    }

    #[test]
    fn logic_index_prefers_solution_then_row() {
        let hw = Hardware::new("gfx942", 304);
        let policy = PreferLogicIndex;
        let own = policy.score(&(), &hw, &candidate(Some(2), Some(9), 0.0));
        let row = policy.score(&(), &hw, &candidate(None, Some(5), 0.0));
        assert_eq!(own, Some(-2.0));
        assert_eq!(row, Some(-5.0));
        assert!(own > row);
    }

    #[test]
    fn missing_logic_index_is_rejected() {
        let hw = Hardware::new("gfx942", 304);
        let score = EvaluationPolicy::<(), Tagged>::score(
            &PreferLogicIndex,
            &(),
            &hw,
            &candidate(None, None, 0.0),
        );
        assert_eq!(score, None);
        assert_eq!(EvaluationPolicy::<(), Tagged>::name(&PreferLogicIndex), "PreferLogicIndex");
    }
}
