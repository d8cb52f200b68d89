//! Battery pack model
//!
//! The pack owns its segments, which own their cells. Addresses are
//! 0-based `(segment_index, cell_index)` pairs and are always bounds-checked;
//! nothing here clamps an invalid address to a default value.

use super::cell::{AbnormalLimits, Cell, Metric};
use super::error::{PackError, PackResult};
use super::segment::Segment;
use serde::Serialize;

/// An abnormal cell found by [`Pack::list_abnormal_cells`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbnormalCell {
    pub segment_index: usize,
    pub cell_index: usize,
    pub voltage: f64,
    pub temperature: f64,
}

/// An ordered group of segments, possibly of differing sizes
#[derive(Debug, Clone, PartialEq)]
pub struct Pack {
    segments: Vec<Segment>,
    limits: AbnormalLimits,
}

impl Pack {
    /// Build a pack from the number of cells in each segment
    ///
    /// ```
    /// use bms_bot::pack::{Metric, Pack};
    ///
    /// let pack = Pack::new(&[17, 18, 18, 17]).unwrap();
    /// assert_eq!(pack.segment_count(), 4);
    /// assert_eq!(pack.cell_count(), 70);
    /// assert_eq!(pack.average(Metric::Voltage), 0.0);
    /// ```
    pub fn new(cells_per_segment: &[usize]) -> PackResult<Self> {
        Self::with_limits(cells_per_segment, AbnormalLimits::default())
    }

    /// Build a pack that flags abnormal cells with custom limits
    pub fn with_limits(cells_per_segment: &[usize], limits: AbnormalLimits) -> PackResult<Self> {
        if cells_per_segment.is_empty() {
            return Err(PackError::EmptyTopology);
        }

        let segments = cells_per_segment
            .iter()
            .map(|&n| Segment::new(n))
            .collect::<PackResult<Vec<_>>>()?;

        Ok(Self { segments, limits })
    }

    pub fn limits(&self) -> &AbnormalLimits {
        &self.limits
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total number of cells across all segments
    pub fn cell_count(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Number of cells in each segment, in segment order
    pub fn topology(&self) -> Vec<usize> {
        self.segments.iter().map(Segment::len).collect()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn segment_mut(&mut self, index: usize) -> Option<&mut Segment> {
        self.segments.get_mut(index)
    }

    /// True iff `(segment_index, cell_index)` addresses a cell of this pack
    pub fn is_address_valid(&self, cell_index: usize, segment_index: usize) -> bool {
        self.segments
            .get(segment_index)
            .map(|segment| cell_index < segment.len())
            .unwrap_or(false)
    }

    /// Segment at `index`
    pub fn segment(&self, index: usize) -> PackResult<&Segment> {
        self.segments
            .get(index)
            .ok_or(PackError::SegmentOutOfBounds { segment: index })
    }

    /// Cell at `(segment_index, cell_index)`
    pub fn cell(&self, segment_index: usize, cell_index: usize) -> PackResult<&Cell> {
        self.segments
            .get(segment_index)
            .and_then(|segment| segment.cell(cell_index))
            .ok_or(PackError::OutOfBounds {
                segment: segment_index,
                cell: cell_index,
            })
    }

    /// Sum over every cell in the pack
    pub fn total(&self, metric: Metric) -> f64 {
        self.segments.iter().map(|s| s.total(metric)).sum()
    }

    /// Mean over every cell in the pack
    pub fn average(&self, metric: Metric) -> f64 {
        self.total(metric) / self.cell_count() as f64
    }

    /// Average of each segment, in segment order
    pub fn averages_per_segment(&self, metric: Metric) -> Vec<f64> {
        self.segments.iter().map(|s| s.average(metric)).collect()
    }

    /// Matrix of voltages: one row per segment, one column per cell
    pub fn voltage_matrix(&self) -> Vec<Vec<f64>> {
        self.segments
            .iter()
            .map(|s| s.get(Metric::Voltage))
            .collect()
    }

    /// Scan every cell and return the ones outside the pack's limits
    pub fn list_abnormal_cells(&self) -> Vec<AbnormalCell> {
        let mut abnormal = Vec::new();

        for (segment_index, segment) in self.segments.iter().enumerate() {
            for (cell_index, cell) in segment.cells().iter().enumerate() {
                if cell.is_abnormal_within(&self.limits) {
                    abnormal.push(AbnormalCell {
                        segment_index,
                        cell_index,
                        voltage: cell.voltage(),
                        temperature: cell.temperature(),
                    });
                }
            }
        }

        abnormal
    }
}
