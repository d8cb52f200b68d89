//! Pack error types
//!
//! Errors raised at the Pack/Cell boundary.

use thiserror::Error;

/// Errors that can occur in the pack data model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackError {
    /// The (segment, cell) address does not exist in this pack
    #[error("Address out of bounds: segment {segment}, cell {cell}")]
    OutOfBounds { segment: usize, cell: usize },

    /// The segment index does not exist in this pack
    #[error("Segment out of bounds: {segment}")]
    SegmentOutOfBounds { segment: usize },

    /// A metric name that the data model does not define
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Segments must hold at least one cell
    #[error("A segment must contain at least one cell")]
    EmptySegment,

    /// Packs must hold at least one segment
    #[error("A pack must contain at least one segment")]
    EmptyTopology,
}

/// Result type alias for pack operations
pub type PackResult<T> = Result<T, PackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PackError::OutOfBounds { segment: 6, cell: 2 };
        assert_eq!(err.to_string(), "Address out of bounds: segment 6, cell 2");

        let err = PackError::SegmentOutOfBounds { segment: 8 };
        assert_eq!(err.to_string(), "Segment out of bounds: 8");

        let err = PackError::UnknownMetric("current".to_string());
        assert_eq!(err.to_string(), "Unknown metric: current");
    }
}
