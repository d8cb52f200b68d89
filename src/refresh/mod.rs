//! Pack Refresh
//!
//! Staleness gate between the in-memory pack and the reading source.
//! A refresh only runs when the configured interval has elapsed since the
//! previous attempt; per-segment failures degrade to stale data instead of
//! aborting the refresh.

pub mod policy;

pub use policy::{FetchFailure, RefreshOutcome, RefreshPolicy};
