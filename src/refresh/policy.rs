//! Refresh Policy
//!
//! Decides when cached pack readings are stale enough to re-fetch, and
//! performs the fetch segment by segment.

use crate::integrations::ReadingSource;
use crate::pack::{Pack, Reading};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Rate limiter gating re-fetches from the reading source
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    last_refresh: DateTime<Utc>,
    interval: Duration,
}

/// A segment that could not be fetched during a refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub segment_index: usize,
    pub reason: String,
}

/// Result of a refresh that actually ran
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    /// When the refresh started; also the new `last_refresh`
    pub started_at: DateTime<Utc>,
    /// Segments whose cells now hold fresh values
    pub refreshed: Vec<usize>,
    /// Segments that kept their previous values
    pub failures: Vec<FetchFailure>,
}

impl RefreshOutcome {
    /// True when every segment was refreshed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl RefreshPolicy {
    /// Create a policy whose first check is always due
    pub fn new(interval: Duration) -> Self {
        Self {
            // DateTime<Utc>::default() is the Unix epoch
            last_refresh: DateTime::<Utc>::default(),
            interval,
        }
    }

    /// Create a policy from an interval in minutes. Returns `None` when the
    /// interval does not fit in a `Duration`.
    pub fn every_minutes(minutes: u64) -> Option<Self> {
        let minutes = i64::try_from(minutes).ok()?;
        Duration::try_minutes(minutes).map(Self::new)
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.last_refresh
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True iff at least `interval` has passed since the last refresh
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_refresh >= self.interval
    }

    /// Re-populate `pack` from `source` if a refresh is due.
    ///
    /// `last_refresh` moves to `now` before anything is fetched. A segment
    /// that fails to fetch keeps its previous values and is listed in the
    /// outcome; the remaining segments are still refreshed. Returns `None`
    /// when no refresh was due.
    pub async fn refresh(
        &mut self,
        pack: &mut Pack,
        source: &dyn ReadingSource,
        now: DateTime<Utc>,
    ) -> Option<RefreshOutcome> {
        if !self.is_due(now) {
            tracing::debug!(last_refresh = %self.last_refresh, "Refresh not due");
            return None;
        }

        self.last_refresh = now;

        let mut outcome = RefreshOutcome {
            started_at: now,
            refreshed: Vec::new(),
            failures: Vec::new(),
        };

        for segment_index in 0..pack.segment_count() {
            let Some(segment) = pack.segment_mut(segment_index) else {
                continue;
            };
            let cell_count = segment.len();

            match source.fetch_segment(segment_index, cell_count).await {
                Ok(snapshot) => {
                    if snapshot.readings.len() != cell_count {
                        tracing::warn!(
                            segment = segment_index,
                            expected = cell_count,
                            received = snapshot.readings.len(),
                            "Source returned a row of unexpected length"
                        );
                    }

                    for (cell_index, cell) in segment.cells_mut().iter_mut().enumerate() {
                        let reading = snapshot
                            .readings
                            .get(cell_index)
                            .copied()
                            .unwrap_or_else(Reading::missing);
                        cell.update(reading.temperature, reading.voltage);
                    }
                    outcome.refreshed.push(segment_index);
                }
                Err(e) => {
                    tracing::warn!(
                        segment = segment_index,
                        source = source.name(),
                        error = %e,
                        "Segment fetch failed, keeping previous values"
                    );
                    outcome.failures.push(FetchFailure {
                        segment_index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            refreshed = outcome.refreshed.len(),
            failed = outcome.failures.len(),
            "Pack refresh finished"
        );

        Some(outcome)
    }
}
