// Metrics hooks for the `matching` crate.
//
// Callers install a global `SelectionMetrics` implementation via
// [`set_selection_metrics`]; every `ProblemMatchingLibrary` node then reports
// latency and result counts for each query it answers. Nested matching
// nodes report individually. This keeps instrumentation decoupled from any
// specific metrics backend.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

/// Entry point a query went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionOp {
    SolutionByIndex,
    BestSolution,
    BestSolutionGrouped,
    Evaluation,
    AllSolutions,
    AllSolutionsGrouped,
    TopSolutions,
    TopSolutionsGrouped,
}

impl SelectionOp {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionOp::SolutionByIndex => "solution_by_index",
            SelectionOp::BestSolution => "best_solution",
            SelectionOp::BestSolutionGrouped => "best_solution_grouped",
            SelectionOp::Evaluation => "evaluation",
            SelectionOp::AllSolutions => "all_solutions",
            SelectionOp::AllSolutionsGrouped => "all_solutions_grouped",
            SelectionOp::TopSolutions => "top_solutions",
            SelectionOp::TopSolutionsGrouped => "top_solutions_grouped",
        }
    }
}

impl fmt::Display for SelectionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics observer for selection queries.
pub trait SelectionMetrics: Send + Sync {
    /// `results` is the number of solutions returned (0 or 1 for
    /// single-result operations).
    fn record_selection(&self, op: SelectionOp, latency: Duration, results: usize);
}

/// Recorder slot. Readers check `installed` first, so queries take no
/// lock while no recorder is set.
struct RecorderSlot {
    installed: AtomicBool,
    recorder: RwLock<Option<Arc<dyn SelectionMetrics>>>,
}

impl RecorderSlot {
    fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
            recorder: RwLock::new(None),
        }
    }

    fn get(&self) -> Option<Arc<dyn SelectionMetrics>> {
        if !self.installed.load(Ordering::Acquire) {
            return None;
        }
        let guard = self
            .recorder
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    fn set(&self, recorder: Option<Arc<dyn SelectionMetrics>>) {
        let mut guard = self
            .recorder
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.installed.store(recorder.is_some(), Ordering::Release);
        *guard = recorder;
    }
}

fn metrics_slot() -> &'static RecorderSlot {
    static METRICS: OnceCell<RecorderSlot> = OnceCell::new();
    METRICS.get_or_init(RecorderSlot::new)
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn SelectionMetrics>> {
    metrics_slot().get()
}

/// Install or clear the global selection metrics recorder.
pub fn set_selection_metrics(recorder: Option<Arc<dyn SelectionMetrics>>) {
    metrics_slot().set(recorder);
}

/// Timer that reports to the installed recorder, if any.
pub(crate) struct MetricsSpan {
    recorder: Arc<dyn SelectionMetrics>,
    op: SelectionOp,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start(op: SelectionOp) -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            op,
            start: Instant::now(),
        })
    }

    pub(crate) fn finish(self, results: usize) {
        self.recorder
            .record_selection(self.op, self.start.elapsed(), results);
    }
}
