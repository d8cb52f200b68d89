//! # BMS Bot
//!
//! Battery pack telemetry over Telegram. Per-cell voltage and temperature
//! readings of a multi-segment pack are pulled from an external source
//! (Google Sheets or local CSV files), cached in memory, and served to chat
//! users with the time they were last refreshed.
//!
//! ## Modules
//!
//! - [`pack`]: Cell / segment / pack data model and abnormal-cell detection
//! - [`refresh`]: Rate-limited refresh policy
//! - [`query`]: Query service combining the pack and the refresh policy
//! - [`integrations`]: Reading sources
//! - [`bot`]: Chat commands and the polling loop
//! - [`telegram`]: Bot API client
//! - [`interactions`]: Append-only usage log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bms_bot::clock::SystemClock;
//! use bms_bot::integrations::CsvSource;
//! use bms_bot::pack::Pack;
//! use bms_bot::query::QueryService;
//! use bms_bot::refresh::RefreshPolicy;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pack = Pack::new(&[18, 18, 18, 18, 18, 18])?;
//!     let source = CsvSource::from_dir(Path::new("./readings"), pack.segment_count());
//!
//!     let service = QueryService::new(
//!         pack,
//!         RefreshPolicy::new(chrono::Duration::minutes(30)),
//!         Arc::new(source),
//!         Arc::new(SystemClock),
//!     );
//!
//!     let segment = service.segment_value(0).await?;
//!     println!("Segment 1: {:.2} mV as of {}", segment.value, segment.as_of);
//!
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod clock;
pub mod config;
pub mod integrations;
pub mod interactions;
pub mod logging;
pub mod pack;
pub mod query;
pub mod refresh;
pub mod telegram;

// Re-export top-level types for convenience
pub use pack::{AbnormalCell, AbnormalLimits, Cell, Metric, Pack, PackError, Reading, Segment};

pub use refresh::{FetchFailure, RefreshOutcome, RefreshPolicy};

pub use query::{QueryError, QueryService, Reported};

pub use integrations::{CsvSource, FetchError, ReadingSource, SegmentSnapshot, SheetsSource};

pub use bot::{BotRunner, CommandHandler, CommandTable};

pub use config::{Config, ConfigError};

pub use clock::{Clock, ManualClock, SystemClock};
