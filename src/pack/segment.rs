//! Battery segment model
//!
//! A segment is a fixed-length, ordered group of cells wired together.

use super::cell::{Cell, Metric};
use super::error::{PackError, PackResult};

/// An ordered group of cells. The length never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    cells: Vec<Cell>,
}

impl Segment {
    /// Create a segment of `number_of_cells` zeroed cells
    pub fn new(number_of_cells: usize) -> PackResult<Self> {
        if number_of_cells == 0 {
            return Err(PackError::EmptySegment);
        }

        Ok(Self {
            cells: vec![Cell::new(); number_of_cells],
        })
    }

    /// Number of cells in the segment (always > 0)
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false, segments cannot be built empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// One value per cell, in cell order
    pub fn get(&self, metric: Metric) -> Vec<f64> {
        self.cells.iter().map(|c| c.get(metric)).collect()
    }

    /// Sum of cell values. Non-finite readings contribute 0.0.
    pub fn total(&self, metric: Metric) -> f64 {
        self.cells
            .iter()
            .map(|c| c.get(metric))
            .filter(|v| v.is_finite())
            .sum()
    }

    /// Mean of cell values over every cell in the segment
    pub fn average(&self, metric: Metric) -> f64 {
        self.total(metric) / self.cells.len() as f64
    }
}
