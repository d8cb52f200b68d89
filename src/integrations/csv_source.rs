//! CSV Source
//!
//! Reads segment samples from local CSV files laid out like the segment
//! spreadsheets: timestamp first, then one voltage column per cell.

use super::*;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Configuration for the CSV source
#[derive(Debug, Clone)]
pub struct CsvSourceConfig {
    /// One file per segment, in segment order
    pub segment_files: Vec<PathBuf>,
    /// Whether the first row is a header
    pub has_header: bool,
}

/// Local CSV reading source
pub struct CsvSource {
    config: CsvSourceConfig,
}

impl CsvSource {
    pub fn new(config: CsvSourceConfig) -> Self {
        Self { config }
    }

    /// Use `segment_{n}.csv` files (1-based `n`) found in `dir`
    pub fn from_dir(dir: &Path, segment_count: usize) -> Self {
        let segment_files = (1..=segment_count)
            .map(|n| dir.join(format!("segment_{}.csv", n)))
            .collect();

        Self::new(CsvSourceConfig {
            segment_files,
            has_header: true,
        })
    }
}

fn read_rows(path: &Path, has_header: bool) -> Result<Vec<Vec<String>>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(rows)
}

#[async_trait]
impl ReadingSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch_segment(
        &self,
        segment_index: usize,
        cell_count: usize,
    ) -> Result<SegmentSnapshot, FetchError> {
        let path = self
            .config
            .segment_files
            .get(segment_index)
            .ok_or(FetchError::SegmentNotConfigured(segment_index))?;

        tracing::debug!(segment = segment_index, path = ?path, "Reading segment CSV");

        // file reads block; keep them off the runtime threads
        let path = path.clone();
        let has_header = self.config.has_header;
        let rows = tokio::task::spawn_blocking(move || read_rows(&path, has_header)).await??;
        let row = last_non_empty_row(&rows).ok_or(FetchError::NoData(segment_index))?;

        Ok(SegmentSnapshot::from_row(row, cell_count))
    }
}
