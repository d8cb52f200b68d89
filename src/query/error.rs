//! Query error types
//!
//! Address errors detected at the pack boundary, turned into structured
//! results for the chat layer to word.

use thiserror::Error;

/// Errors that can occur while answering a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Segment index outside the pack
    #[error("Invalid segment {segment}")]
    InvalidSegment { segment: usize },

    /// Cell index outside its segment, or segment index outside the pack
    #[error("Invalid cell {cell} in segment {segment}")]
    InvalidCell { cell: usize, segment: usize },
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
