//! Reading Sources
//!
//! This module provides the external sources cell readings are pulled from:
//! - Google Sheets (one spreadsheet per segment)
//! - Local CSV files (same row layout, for offline use)
//!
//! Both sources share a row layout: the first column is the source timestamp
//! and the following columns are per-cell voltages in millivolts. The most
//! recent non-empty row is the current sample.

mod csv_source;
mod sheets;

pub use csv_source::{CsvSource, CsvSourceConfig};
pub use sheets::{SheetsConfig, SheetsSource};

use crate::pack::{Metric, Reading};
use async_trait::async_trait;

/// Common trait for all reading sources
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch the latest readings of every cell in a segment
    async fn fetch_segment(
        &self,
        segment_index: usize,
        cell_count: usize,
    ) -> Result<SegmentSnapshot, FetchError>;

    /// Latest average voltage of a segment and the source timestamp
    async fn fetch_segment_average(
        &self,
        segment_index: usize,
        cell_count: usize,
    ) -> Result<(f64, Option<String>), FetchError> {
        let snapshot = self.fetch_segment(segment_index, cell_count).await?;
        Ok((snapshot.average(Metric::Voltage), snapshot.source_timestamp))
    }

    /// Latest voltage of a single cell and the source timestamp
    async fn fetch_cell(
        &self,
        cell_index: usize,
        segment_index: usize,
        cell_count: usize,
    ) -> Result<(f64, Option<String>), FetchError> {
        let snapshot = self.fetch_segment(segment_index, cell_count).await?;
        let reading = snapshot
            .readings
            .get(cell_index)
            .copied()
            .unwrap_or_else(Reading::missing);
        Ok((reading.voltage, snapshot.source_timestamp))
    }
}

/// Latest readings of one segment as reported by a source
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSnapshot {
    /// One reading per cell, in cell order
    pub readings: Vec<Reading>,
    /// Timestamp of the sample as written by the source, if any
    pub source_timestamp: Option<String>,
}

impl SegmentSnapshot {
    /// Build a snapshot from the latest row of a segment sheet.
    ///
    /// Values that are missing or not numeric become NaN. The row is padded
    /// or truncated to `cell_count` readings. Temperatures are not part of
    /// the row layout and read 0.0.
    pub fn from_row<S: AsRef<str>>(row: &[S], cell_count: usize) -> Self {
        let source_timestamp = row
            .first()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty());

        let readings = (0..cell_count)
            .map(|i| {
                let voltage = row
                    .get(i + 1)
                    .and_then(|v| parse_number(v.as_ref()))
                    .unwrap_or(f64::NAN);
                Reading::new(0.0, voltage)
            })
            .collect();

        Self {
            readings,
            source_timestamp,
        }
    }

    /// Mean of a metric over the snapshot, non-finite values counting as 0.0
    pub fn average(&self, metric: Metric) -> f64 {
        if self.readings.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .readings
            .iter()
            .map(|r| r.get(metric))
            .filter(|v| v.is_finite())
            .sum();
        total / self.readings.len() as f64
    }
}

/// Parse a spreadsheet value, accepting a decimal comma
fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .ok()
        .filter(|v| v.is_finite())
}

/// Pick the last row that holds anything besides blanks
pub(crate) fn last_non_empty_row<S: AsRef<str>>(rows: &[Vec<S>]) -> Option<&Vec<S>> {
    rows.iter()
        .rev()
        .find(|row| row.iter().any(|v| !v.as_ref().trim().is_empty()))
}

/// Errors that can occur while fetching readings
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No readings available for segment {0}")]
    NoData(usize),

    #[error("No source configured for segment {0}")]
    SegmentNotConfigured(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Blocking read failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
