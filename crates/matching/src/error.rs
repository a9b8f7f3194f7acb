//! Construction-time errors for matching tables.
//!
//! Queries never fail: an unmatched problem is `None`. These errors only
//! surface while a table is assembled from benchmark data.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("table needs at least one property")]
    NoProperties,

    #[error("row {row} has {got} key values but the table has {expected} properties")]
    KeyLength {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("row {row} key value at position {position} is not finite")]
    NonFiniteKey { row: usize, position: usize },

    #[error("invalid distance: {0}")]
    InvalidDistance(String),
}
