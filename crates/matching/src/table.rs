//! Benchmark rows ranked by proximity to a query problem.
//!
//! A [`MatchingTable`] is built once from benchmark data and only read
//! afterwards. Every query evaluates the table's properties to obtain a
//! point, measures each row key against it, and walks rows nearest first.
//! Equal distances keep insertion order, so selection is reproducible.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use library::{Hardware, Solution};
use tracing::{debug, warn};

use crate::distance::Distance;
use crate::error::TableError;
use crate::evaluation::{Candidate, EvaluationPolicy};
use crate::property::{evaluate_all, PropertyRef};

/// One benchmarked reference point.
#[derive(Debug, Clone)]
pub struct MatchingRow<E> {
    /// Coordinates in property space, one per table property.
    pub key: Vec<f64>,
    pub value: E,
    /// Stable identifier of the benchmark entry, diagnostics only.
    pub library_logic_index: Option<usize>,
}

impl<E> MatchingRow<E> {
    pub fn new(key: Vec<f64>, value: E) -> Self {
        Self {
            key,
            value,
            library_logic_index: None,
        }
    }

    pub fn with_logic_index(mut self, index: usize) -> Self {
        self.library_logic_index = Some(index);
        self
    }
}

/// A row together with its distance to the current query.
#[derive(Debug)]
pub struct RankedRow<'a, E> {
    pub row: &'a MatchingRow<E>,
    pub distance: f64,
    /// Insertion position of the row in the table.
    pub position: usize,
}

impl<E> Clone for RankedRow<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RankedRow<'_, E> {}

/// Outcome of a nearest-match walk.
#[derive(Debug, Clone)]
pub struct Match<T> {
    pub solution: Option<T>,
    /// Distance of the row that resolved, or `f64::MAX` when none did.
    pub fitness: f64,
    /// Insertion position of the resolving row.
    pub position: Option<usize>,
}

impl<T> Match<T> {
    fn none() -> Self {
        Self {
            solution: None,
            fitness: f64::MAX,
            position: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.solution.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    distance: f64,
    position: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Lazy nearest-first traversal of a table.
///
/// Distances are computed once when the ranking is created; the heap is
/// built in linear time and each step costs `O(log n)`, so walks that stop
/// early never pay for a full sort. Cloning restarts from the clone point.
pub struct RankedRows<'a, E> {
    rows: &'a [MatchingRow<E>],
    heap: BinaryHeap<Reverse<HeapEntry>>,
}

impl<E> Clone for RankedRows<'_, E> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            heap: self.heap.clone(),
        }
    }
}

impl<'a, E> Iterator for RankedRows<'a, E> {
    type Item = RankedRow<'a, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(entry) = self.heap.pop()?;
        Some(RankedRow {
            row: &self.rows[entry.position],
            distance: entry.distance,
            position: entry.position,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.heap.len(), Some(self.heap.len()))
    }
}

impl<E> ExactSizeIterator for RankedRows<'_, E> {}

/// Read-only collection of benchmark rows plus the metric used to rank them.
pub struct MatchingTable<P, E> {
    properties: Vec<PropertyRef<P>>,
    distance: Distance,
    rows: Vec<MatchingRow<E>>,
}

impl<P, E> MatchingTable<P, E> {
    /// Validate and assemble a table. Row order is the tie-break order.
    pub fn new(
        properties: Vec<PropertyRef<P>>,
        distance: Distance,
        rows: Vec<MatchingRow<E>>,
    ) -> Result<Self, TableError> {
        if properties.is_empty() {
            return Err(TableError::NoProperties);
        }
        distance.validate(properties.len())?;

        for (idx, row) in rows.iter().enumerate() {
            if row.key.len() != properties.len() {
                return Err(TableError::KeyLength {
                    row: idx,
                    expected: properties.len(),
                    got: row.key.len(),
                });
            }
            if let Some(position) = row.key.iter().position(|v| !v.is_finite()) {
                return Err(TableError::NonFiniteKey { row: idx, position });
            }
        }

        Ok(Self {
            properties,
            distance,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn distance(&self) -> &Distance {
        &self.distance
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name()).collect()
    }

    /// Query point of `problem` in this table's property space.
    pub fn key_for(&self, problem: &P) -> Vec<f64> {
        evaluate_all(&self.properties, problem)
    }

    /// Every row in insertion order, distances not computed.
    pub fn all_rows(&self) -> std::slice::Iter<'_, MatchingRow<E>> {
        self.rows.iter()
    }

    /// Rows nearest first; ties keep insertion order.
    pub fn ranked_rows(&self, problem: &P) -> RankedRows<'_, E> {
        let query = self.key_for(problem);
        let entries: Vec<Reverse<HeapEntry>> = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                Reverse(HeapEntry {
                    distance: self.distance.evaluate(&query, &row.key),
                    position,
                })
            })
            .collect();

        RankedRows {
            rows: &self.rows,
            heap: BinaryHeap::from(entries),
        }
    }

    /// First row, nearest first, whose value resolves to something.
    pub fn find_best_match<T, F>(&self, problem: &P, mut resolve: F) -> Match<T>
    where
        F: FnMut(&E) -> Option<T>,
    {
        for ranked in self.ranked_rows(problem) {
            if let Some(solution) = resolve_isolated(&ranked, &mut resolve) {
                return Match {
                    solution: Some(solution),
                    fitness: ranked.distance,
                    position: Some(ranked.position),
                };
            }
        }
        Match::none()
    }

    /// Up to `k` distinct solutions, nearest first, each with the row it
    /// came from. Rows that resolve to a solution already collected are
    /// skipped. `usize::MAX` asks for every resolvable row.
    pub fn find_top_match<S, F>(&self, problem: &P, mut resolve: F, k: usize) -> Vec<Candidate<S>>
    where
        S: Solution,
        F: FnMut(&E) -> Option<Arc<S>>,
    {
        let bound = k.min(self.rows.len());
        let mut out = Vec::with_capacity(bound);
        if bound == 0 {
            return out;
        }

        let mut seen = HashSet::with_capacity(bound);
        for ranked in self.ranked_rows(problem) {
            let Some(solution) = resolve_isolated(&ranked, &mut resolve) else {
                continue;
            };
            if !seen.insert(solution.index()) {
                continue;
            }
            out.push(Candidate {
                solution,
                distance: ranked.distance,
                position: ranked.position,
                library_logic_index: ranked.row.library_logic_index,
            });
            if out.len() == k {
                break;
            }
        }
        out
    }

    /// Exhaustive selection for debug mode: resolve every row and let
    /// `policy` choose. Never use for latency-sensitive dispatch.
    pub fn find_best_evaluation_solution<S, F>(
        &self,
        problem: &P,
        hardware: &Hardware,
        mut resolve: F,
        policy: &dyn EvaluationPolicy<P, S>,
    ) -> Option<Arc<S>>
    where
        S: Solution,
        F: FnMut(&E) -> Option<Arc<S>>,
    {
        let mut best: Option<(f64, Candidate<S>)> = None;

        for ranked in self.ranked_rows(problem) {
            let Some(solution) = resolve_isolated(&ranked, &mut resolve) else {
                continue;
            };
            let candidate = Candidate {
                solution,
                distance: ranked.distance,
                position: ranked.position,
                library_logic_index: ranked.row.library_logic_index,
            };
            let Some(score) = policy.score(problem, hardware, &candidate) else {
                continue;
            };
            debug!(
                target: "matching",
                policy = policy.name(),
                kernel = candidate.solution.name(),
                distance = candidate.distance,
                score,
                "evaluation_candidate"
            );
            // Rows arrive nearest first, so a strict comparison keeps the
            // closer candidate on equal scores.
            if best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, candidate));
            }
        }

        best.map(|(_, candidate)| candidate.solution)
    }

    pub fn description(&self) -> String {
        format!(
            "Table: properties [{}], distance {}, {} rows",
            self.property_names().join(", "),
            self.distance,
            self.rows.len()
        )
    }
}

impl<P, E> fmt::Debug for MatchingTable<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Run `resolve` for one row. A panic inside a nested library empties that
/// row only; the walk carries on with the next candidate.
pub(crate) fn resolve_isolated<E, T, F>(ranked: &RankedRow<'_, E>, resolve: &mut F) -> Option<T>
where
    F: FnMut(&E) -> Option<T>,
{
    isolate(ranked.position, ranked.row, resolve)
}

pub(crate) fn isolate<E, T, F>(position: usize, row: &MatchingRow<E>, resolve: &mut F) -> Option<T>
where
    F: FnMut(&E) -> Option<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| resolve(&row.value))) {
        Ok(result) => result,
        Err(_) => {
            warn!(
                target: "matching",
                position,
                logic_index = ?row.library_logic_index,
                "row_resolution_panicked"
            );
            None
        }
    }
}
