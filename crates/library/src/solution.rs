use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hardware::HardwarePredicate;

/// A concrete, runnable kernel identity.
///
/// The selection core never inspects kernel parameters; it only needs a
/// stable identity and the hardware applicability test.
pub trait Solution: Send + Sync {
    /// Stable identity of the kernel within its library.
    fn index(&self) -> usize;

    fn name(&self) -> &str;

    /// Position of the benchmark entry that produced this kernel, kept for
    /// diagnostics only.
    fn library_logic_index(&self) -> Option<usize> {
        None
    }

    fn hardware_predicate(&self) -> &HardwarePredicate;
}

/// Rank-preserving sequence of solutions.
pub type SolutionVector<S> = Vec<Arc<S>>;

/// Identity-deduplicated collection of solutions.
///
/// Keyed by [`Solution::index`] so iteration order is ascending index and
/// independent of allocation addresses.
pub struct SolutionSet<S> {
    inner: BTreeMap<usize, Arc<S>>,
}

impl<S: Solution> SolutionSet<S> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Returns `true` when the solution was not present yet.
    pub fn insert(&mut self, solution: Arc<S>) -> bool {
        match self.inner.entry(solution.index()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(solution);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.inner.contains_key(&index)
    }

    pub fn get(&self, index: usize) -> Option<&Arc<S>> {
        self.inner.get(&index)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<S>> {
        self.inner.values()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.inner.keys().copied().collect()
    }
}

impl<S: Solution> Default for SolutionSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for SolutionSet<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Solution> fmt::Debug for SolutionSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.inner.values().map(|s| s.name()))
            .finish()
    }
}

impl<S: Solution> Extend<Arc<S>> for SolutionSet<S> {
    fn extend<I: IntoIterator<Item = Arc<S>>>(&mut self, iter: I) {
        for solution in iter {
            self.insert(solution);
        }
    }
}

impl<S: Solution> FromIterator<Arc<S>> for SolutionSet<S> {
    fn from_iter<I: IntoIterator<Item = Arc<S>>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S> IntoIterator for SolutionSet<S> {
    type Item = Arc<S>;
    type IntoIter = btree_map::IntoValues<usize, Arc<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_values()
    }
}

/// How far a full enumeration reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Only candidates matched to the problem.
    #[default]
    Default,
    /// Every configured candidate, ignoring proximity and problem predicates.
    /// Hardware applicability still holds.
    Exhaustive,
}

impl SearchType {
    pub fn is_default(self) -> bool {
        matches!(self, SearchType::Default)
    }
}
