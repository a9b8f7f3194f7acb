//! # Kernel Matching (`matching`)
//!
//! ## Purpose
//!
//! `matching` picks a kernel for a problem nobody benchmarked. Offline
//! tuning records the winning kernel at a set of reference problems; this
//! crate stores those references as rows of a [`MatchingTable`] and, at
//! runtime, walks them nearest first until a nested library resolves.
//!
//! A [`ProblemMatchingLibrary`] is itself a `library::SolutionLibrary`, so it
//! nests freely under hardware switches or other matching nodes.
//!
//! ## Core Types
//!
//! - [`Property`] / [`FnProperty`]: one coordinate of the property space.
//! - [`Distance`]: metric between a query point and a row key:
//!   - `Euclidean`, `Manhattan` for raw coordinates.
//!   - `Ratio`, `Logarithmic` for sizes spanning orders of magnitude.
//!   - `Weighted` to scale the dimensions of any of the above.
//! - [`MatchingTable`]: validated rows plus properties and metric.
//! - [`RankedRows`]: lazy nearest-first traversal with stable ties.
//! - [`ProblemMatchingLibrary`]: selection node backed by a table of libraries.
//! - [`Diagnostics`]: per-node switches for debug selection and tracing.
//! - [`EvaluationPolicy`]: scoring used by the debug-selection path.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use library::{Hardware, HardwarePredicate, LibraryRef, SingleSolutionLibrary, Solution, SolutionLibrary};
//! use matching::{Distance, FnProperty, MatchingRow, MatchingTable, ProblemMatchingLibrary, PropertyRef};
//!
//! struct Kernel { index: usize, predicate: HardwarePredicate }
//!
//! impl Solution for Kernel {
//!     fn index(&self) -> usize { self.index }
//!     fn name(&self) -> &str { "kernel" }
//!     fn hardware_predicate(&self) -> &HardwarePredicate { &self.predicate }
//! }
//!
//! let leaf = |index| -> LibraryRef<u64, Kernel> {
//!     Arc::new(SingleSolutionLibrary::new(Arc::new(Kernel { index, predicate: HardwarePredicate::Any })))
//! };
//!
//! let props: Vec<PropertyRef<u64>> = vec![Arc::new(FnProperty::new("size", |n: &u64| *n as f64))];
//! let table = MatchingTable::new(
//!     props,
//!     Distance::Ratio,
//!     vec![
//!         MatchingRow::new(vec![256.0], leaf(0)),
//!         MatchingRow::new(vec![8192.0], leaf(1)),
//!     ],
//! )
//! .expect("valid table");
//!
//! let lib = ProblemMatchingLibrary::new(Arc::new(table));
//! let hw = Hardware::new("gfx942", 304);
//!
//! let mut fitness = 0.0;
//! let kernel = lib.find_best_solution(&6000, &hw, Some(&mut fitness)).expect("match");
//! assert_eq!(kernel.index(), 1);
//! assert!(fitness < 1.0);
//! ```
//!
//! ## Fault isolation
//!
//! A nested library that panics while resolving a row is logged at `warn`
//! under the `matching` target and treated as unresolvable; the walk moves
//! on to the next row.
//!
//! ## Observability
//!
//! Install a [`SelectionMetrics`] implementation via [`set_selection_metrics`]
//! to record per-query latency and result counts. Every matching node in a
//! hierarchy reports through the same recorder.

pub mod composite;
pub mod diagnostics;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod property;
pub mod table;

pub use crate::composite::{LibraryTable, ProblemMatchingLibrary};
pub use crate::diagnostics::Diagnostics;
pub use crate::distance::Distance;
pub use crate::error::TableError;
pub use crate::evaluation::{Candidate, EvaluationPolicy, NearestResolvable, PreferLogicIndex};
pub use crate::metrics::{set_selection_metrics, SelectionMetrics, SelectionOp};
pub use crate::property::{evaluate_all, FnProperty, Property, PropertyRef};
pub use crate::table::{Match, MatchingRow, MatchingTable, RankedRow, RankedRows};
