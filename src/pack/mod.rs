//! Battery Pack Data Model
//!
//! This module holds the in-memory snapshot of the pack:
//!
//! - **cell**: A temperature/voltage reading pair and abnormality checks
//! - **segment**: Fixed-length ordered group of cells
//! - **battery**: The pack itself, with bounds-checked addressing
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust
//! use bms_bot::pack::{Metric, Pack};
//!
//! let pack = Pack::new(&[18, 18, 18, 18, 18, 18]).unwrap();
//!
//! assert!(pack.is_address_valid(17, 5));
//! assert!(!pack.is_address_valid(18, 5));
//! assert_eq!(pack.averages_per_segment(Metric::Voltage).len(), 6);
//! ```

pub mod battery;
pub mod cell;
pub mod error;
pub mod segment;

pub use battery::{AbnormalCell, Pack};
pub use cell::{AbnormalLimits, Cell, Metric, Reading};
pub use error::{PackError, PackResult};
pub use segment::Segment;
