//! Pack Queries
//!
//! Read path from chat commands to the pack:
//!
//! ```text
//! Query → RefreshPolicy (re-fetch if due) → Pack → Reported { value, as_of }
//! ```
//!
//! Addresses are 0-based here; the chat layer translates the 1-based
//! numbers users type.

pub mod error;
pub mod service;

pub use error::{QueryError, QueryResult};
pub use service::{CellValue, PackSummary, QueryService, Reported, SegmentValue};
