//! # Kernel Library (`library`)
//!
//! ## Purpose
//!
//! `library` defines the contract shared by every node of a kernel-selection
//! hierarchy. A node receives a problem description plus a [`Hardware`]
//! descriptor and resolves it into zero or more concrete kernels
//! ([`Solution`]s). Nodes compose: a matching node (see the `matching`
//! crate) delegates to nested nodes, which may themselves be matching
//! nodes, hardware switches, or leaves.
//!
//! ## Core Types
//!
//! - [`SolutionLibrary`]: the object-safe node contract.
//! - [`LibraryRef`]: shared handle to a node (`Arc<dyn SolutionLibrary>`).
//! - [`Solution`]: identity and hardware applicability of a kernel.
//! - [`SolutionSet`] / [`SolutionVector`]: deduplicated and ranked results.
//! - [`SearchType`]: matched-only or exhaustive enumeration.
//! - [`SingleSolutionLibrary`]: leaf exposing exactly one kernel.
//! - [`HardwareSelectionLibrary`]: first-accepting-row dispatch on hardware.
//!
//! ## Outcomes
//!
//! A query nothing can answer returns `None` or an empty collection. That is
//! the ordinary result of an unmatched problem, not an error.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use library::{Hardware, HardwarePredicate, SingleSolutionLibrary, Solution, SolutionLibrary};
//!
//! struct Kernel { predicate: HardwarePredicate }
//!
//! impl Solution for Kernel {
//!     fn index(&self) -> usize { 0 }
//!     fn name(&self) -> &str { "MT64x64x16" }
//!     fn hardware_predicate(&self) -> &HardwarePredicate { &self.predicate }
//! }
//!
//! let leaf: SingleSolutionLibrary<u64, Kernel> = SingleSolutionLibrary::new(Arc::new(Kernel {
//!     predicate: HardwarePredicate::ArchIs("gfx942".into()),
//! }));
//!
//! let hw = Hardware::new("gfx942", 304);
//! assert!(leaf.find_best_solution(&1024, &hw, None).is_some());
//! assert!(leaf.find_best_solution(&1024, &Hardware::new("gfx90a", 104), None).is_none());
//! ```

mod contract;
mod hardware;
mod leaf;
mod solution;

pub use crate::contract::{LibraryRef, ProblemPredicate, SolutionLibrary};
pub use crate::hardware::{Hardware, HardwarePredicate};
pub use crate::leaf::{HardwareSelectionLibrary, SingleSolutionLibrary};
pub use crate::solution::{SearchType, Solution, SolutionSet, SolutionVector};
