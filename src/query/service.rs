//! Query Service
//!
//! Answers segment/cell queries against the pack. Every query first gives
//! the refresh policy a chance to re-fetch, then reads from the in-memory
//! pack while still holding the same lock, so a query never observes a
//! refresh in progress.

use super::error::{QueryError, QueryResult};
use crate::clock::Clock;
use crate::integrations::ReadingSource;
use crate::pack::{AbnormalCell, Metric, Pack};
use crate::refresh::{RefreshOutcome, RefreshPolicy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// A value together with the time the underlying data was refreshed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reported<T> {
    pub value: T,
    /// `last_refresh` of the policy at the moment of the read
    pub as_of: DateTime<Utc>,
    /// Set when the value is known to be stale or missing
    pub warning: Option<String>,
}

/// One element of [`QueryService::all_segment_values`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentValue {
    pub segment_index: usize,
    #[serde(flatten)]
    pub report: Reported<f64>,
}

/// One element of [`QueryService::all_cell_values`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellValue {
    pub segment_index: usize,
    pub cell_index: usize,
    #[serde(flatten)]
    pub report: Reported<f64>,
}

/// Pack-wide overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackSummary {
    pub segment_count: usize,
    pub cell_count: usize,
    pub average_voltage: f64,
    pub total_voltage: f64,
    pub max_temperature: f64,
    pub abnormal_cells: usize,
    /// Segments still serving values from before a failed fetch
    pub stale_segments: Vec<usize>,
}

/// Pack, refresh policy and staleness notes, guarded as one unit
struct PackMonitor {
    pack: Pack,
    policy: RefreshPolicy,
    /// Segment index -> reason of the fetch failure that left it stale
    stale: HashMap<usize, String>,
    last_outcome: Option<RefreshOutcome>,
}

impl PackMonitor {
    fn record(&mut self, outcome: RefreshOutcome) {
        for index in &outcome.refreshed {
            self.stale.remove(index);
        }
        for failure in &outcome.failures {
            self.stale
                .insert(failure.segment_index, failure.reason.clone());
        }
        self.last_outcome = Some(outcome);
    }

    fn report<T>(&self, value: T, warning: Option<String>) -> Reported<T> {
        Reported {
            value,
            as_of: self.policy.last_refresh(),
            warning,
        }
    }

    fn stale_warning(&self, segment_index: usize) -> Option<String> {
        self.stale
            .get(&segment_index)
            .map(|reason| format!("stale data, last fetch failed: {}", reason))
    }

    fn cell_warning(&self, segment_index: usize, value: f64) -> Option<String> {
        if !value.is_finite() {
            return Some("no reading available".to_string());
        }
        self.stale_warning(segment_index)
    }
}

/// Composes the pack and its refresh policy to answer queries
pub struct QueryService {
    state: Mutex<PackMonitor>,
    source: Arc<dyn ReadingSource>,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    /// Create a new query service
    pub fn new(
        pack: Pack,
        policy: RefreshPolicy,
        source: Arc<dyn ReadingSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(PackMonitor {
                pack,
                policy,
                stale: HashMap::new(),
                last_outcome: None,
            }),
            source,
            clock,
        }
    }

    /// Lock the pack and refresh it if the policy says so
    async fn refreshed(&self) -> MutexGuard<'_, PackMonitor> {
        let mut guard = self.state.lock().await;
        let now = self.clock.now();

        let monitor = &mut *guard;
        if let Some(outcome) = monitor
            .policy
            .refresh(&mut monitor.pack, self.source.as_ref(), now)
            .await
        {
            monitor.record(outcome);
        }

        guard
    }

    /// Average voltage of a segment
    pub async fn segment_value(&self, segment_index: usize) -> QueryResult<Reported<f64>> {
        let monitor = self.refreshed().await;

        let segment = monitor
            .pack
            .segment(segment_index)
            .map_err(|_| QueryError::InvalidSegment {
                segment: segment_index,
            })?;
        let value = segment.average(Metric::Voltage);

        Ok(monitor.report(value, monitor.stale_warning(segment_index)))
    }

    /// Voltage of a single cell
    pub async fn cell_value(
        &self,
        cell_index: usize,
        segment_index: usize,
    ) -> QueryResult<Reported<f64>> {
        let monitor = self.refreshed().await;

        let cell = monitor
            .pack
            .cell(segment_index, cell_index)
            .map_err(|_| QueryError::InvalidCell {
                cell: cell_index,
                segment: segment_index,
            })?;
        let value = cell.voltage();

        Ok(monitor.report(value, monitor.cell_warning(segment_index, value)))
    }

    /// Average voltage of every segment, in segment order
    pub async fn all_segment_values(&self) -> Vec<SegmentValue> {
        let monitor = self.refreshed().await;

        monitor
            .pack
            .averages_per_segment(Metric::Voltage)
            .into_iter()
            .enumerate()
            .map(|(segment_index, value)| SegmentValue {
                segment_index,
                report: monitor.report(value, monitor.stale_warning(segment_index)),
            })
            .collect()
    }

    /// Voltage of every cell, segment by segment
    pub async fn all_cell_values(&self) -> Vec<CellValue> {
        let monitor = self.refreshed().await;
        let mut values = Vec::with_capacity(monitor.pack.cell_count());

        for (segment_index, segment) in monitor.pack.segments().iter().enumerate() {
            for (cell_index, cell) in segment.cells().iter().enumerate() {
                let value = cell.voltage();
                values.push(CellValue {
                    segment_index,
                    cell_index,
                    report: monitor.report(value, monitor.cell_warning(segment_index, value)),
                });
            }
        }

        values
    }

    /// Cells currently outside the abnormal limits
    pub async fn abnormal_cells(&self) -> Reported<Vec<AbnormalCell>> {
        let monitor = self.refreshed().await;
        let abnormal = monitor.pack.list_abnormal_cells();

        let warning = if monitor.stale.is_empty() {
            None
        } else {
            Some(format!("{} segment(s) serving stale data", monitor.stale.len()))
        };

        monitor.report(abnormal, warning)
    }

    /// Overview of the whole pack
    pub async fn pack_summary(&self) -> Reported<PackSummary> {
        let monitor = self.refreshed().await;
        let pack = &monitor.pack;

        let max_temperature = pack
            .segments()
            .iter()
            .flat_map(|s| s.get(Metric::Temperature))
            .filter(|t| t.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);

        let mut stale_segments: Vec<usize> = monitor.stale.keys().copied().collect();
        stale_segments.sort_unstable();

        let summary = PackSummary {
            segment_count: pack.segment_count(),
            cell_count: pack.cell_count(),
            average_voltage: pack.average(Metric::Voltage),
            total_voltage: pack.total(Metric::Voltage),
            max_temperature: if max_temperature.is_finite() {
                max_temperature
            } else {
                0.0
            },
            abnormal_cells: pack.list_abnormal_cells().len(),
            stale_segments,
        };

        monitor.report(summary, None)
    }

    /// Per-cell voltages, one row per segment
    pub async fn voltage_matrix(&self) -> Reported<Vec<Vec<f64>>> {
        let monitor = self.refreshed().await;
        monitor.report(monitor.pack.voltage_matrix(), None)
    }

    /// Outcome of the most recent refresh that actually ran
    pub async fn last_outcome(&self) -> Option<RefreshOutcome> {
        self.state.lock().await.last_outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::integrations::{FetchError, SegmentSnapshot};
    use crate::pack::Reading;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Source whose per-segment voltages can be swapped between queries
    #[derive(Default)]
    struct FakeSource {
        voltages: StdMutex<HashMap<usize, Vec<f64>>>,
        temperatures: StdMutex<HashMap<usize, Vec<f64>>>,
        fetches: StdMutex<usize>,
    }

    impl FakeSource {
        fn set(&self, segment: usize, voltages: Vec<f64>) {
            self.voltages.lock().unwrap().insert(segment, voltages);
        }

        fn set_temperatures(&self, segment: usize, temperatures: Vec<f64>) {
            self.temperatures.lock().unwrap().insert(segment, temperatures);
        }

        fn fail(&self, segment: usize) {
            self.voltages.lock().unwrap().remove(&segment);
        }

        fn fetches(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReadingSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_segment(
            &self,
            segment_index: usize,
            _cell_count: usize,
        ) -> Result<SegmentSnapshot, FetchError> {
            *self.fetches.lock().unwrap() += 1;
            let voltages = self
                .voltages
                .lock()
                .unwrap()
                .get(&segment_index)
                .cloned()
                .ok_or_else(|| FetchError::Api {
                    status: 503,
                    message: "backend unavailable".to_string(),
                })?;
            let temperatures = self
                .temperatures
                .lock()
                .unwrap()
                .get(&segment_index)
                .cloned()
                .unwrap_or_default();

            Ok(SegmentSnapshot {
                readings: voltages
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| Reading::new(temperatures.get(i).copied().unwrap_or(0.0), v))
                    .collect(),
                source_timestamp: None,
            })
        }
    }

    /// Source that takes a while to answer and records overlapping fetches
    #[derive(Default)]
    struct SlowSource {
        fetches: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl ReadingSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch_segment(
            &self,
            _segment_index: usize,
            cell_count: usize,
        ) -> Result<SegmentSnapshot, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            tokio::time::sleep(std::time::Duration::from_millis(20)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SegmentSnapshot {
                readings: vec![Reading::new(25.0, 3900.0); cell_count],
                source_timestamp: None,
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).unwrap()
    }

    fn service(topology: &[usize]) -> (QueryService, Arc<FakeSource>, Arc<ManualClock>) {
        let source = Arc::new(FakeSource::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let service = QueryService::new(
            Pack::new(topology).unwrap(),
            RefreshPolicy::every_minutes(30).unwrap(),
            source.clone(),
            clock.clone(),
        );
        (service, source, clock)
    }

    #[tokio::test]
    async fn test_cached_between_refreshes() {
        let (service, source, clock) = service(&[2]);
        source.set(0, vec![3900.0, 4100.0]);

        let first = service.segment_value(0).await.unwrap();
        assert_eq!(first.value, 4000.0);
        assert_eq!(first.as_of, t0());
        assert_eq!(first.warning, None);
        assert_eq!(source.fetches(), 1);

        // not due yet: new source values are not picked up
        source.set(0, vec![3500.0, 3500.0]);
        clock.advance(Duration::minutes(10));
        let second = service.segment_value(0).await.unwrap();
        assert_eq!(second.value, 4000.0);
        assert_eq!(second.as_of, t0());
        assert_eq!(source.fetches(), 1);

        clock.advance(Duration::minutes(25));
        let third = service.segment_value(0).await.unwrap();
        assert_eq!(third.value, 3500.0);
        assert_eq!(third.as_of, t0() + Duration::minutes(35));
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_one_refresh() {
        let source = Arc::new(SlowSource::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let service = QueryService::new(
            Pack::new(&[2, 2, 2]).unwrap(),
            RefreshPolicy::every_minutes(30).unwrap(),
            source.clone(),
            clock,
        );

        let (a, b, c, d) = tokio::join!(
            service.segment_value(0),
            service.segment_value(1),
            service.segment_value(2),
            service.segment_value(0),
        );
        let results = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];

        // one refresh fetched each segment once; the other queries waited on it
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        for result in &results {
            assert_eq!(result.as_of, t0());
            assert_eq!(result.value, 3900.0);
        }
    }

    #[tokio::test]
    async fn test_invalid_addresses() {
        let (service, source, _) = service(&[2, 3]);
        source.set(0, vec![3900.0, 4100.0]);
        source.set(1, vec![3900.0, 4100.0, 4000.0]);

        assert_eq!(
            service.segment_value(2).await,
            Err(QueryError::InvalidSegment { segment: 2 })
        );
        assert_eq!(
            service.cell_value(2, 0).await,
            Err(QueryError::InvalidCell { cell: 2, segment: 0 })
        );
        assert_eq!(
            service.cell_value(0, 5).await,
            Err(QueryError::InvalidCell { cell: 0, segment: 5 })
        );

        let cell = service.cell_value(2, 1).await.unwrap();
        assert_eq!(cell.value, 4000.0);
    }

    #[tokio::test]
    async fn test_stale_segment_is_annotated() {
        let (service, source, clock) = service(&[2, 2]);
        source.set(0, vec![3700.0, 3700.0]);
        source.set(1, vec![3700.0, 3700.0]);
        service.all_segment_values().await;

        source.fail(0);
        source.set(1, vec![4000.0, 4000.0]);
        clock.advance(Duration::minutes(30));

        let values = service.all_segment_values().await;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].report.value, 3700.0);
        assert!(values[0]
            .report
            .warning
            .as_deref()
            .unwrap()
            .contains("backend unavailable"));
        assert_eq!(values[1].report.value, 4000.0);
        assert_eq!(values[1].report.warning, None);

        let outcome = service.last_outcome().await.unwrap();
        assert_eq!(outcome.refreshed, vec![1]);
        assert_eq!(outcome.failures.len(), 1);

        // a later successful fetch clears the annotation
        source.set(0, vec![3800.0, 3800.0]);
        clock.advance(Duration::minutes(30));
        let value = service.segment_value(0).await.unwrap();
        assert_eq!(value.value, 3800.0);
        assert_eq!(value.warning, None);
    }

    #[tokio::test]
    async fn test_all_cell_values_in_order() {
        let (service, source, _) = service(&[2, 1]);
        source.set(0, vec![3900.0, 4100.0]);
        source.set(1, vec![3950.0]);

        let values = service.all_cell_values().await;
        let addresses: Vec<(usize, usize, f64)> = values
            .iter()
            .map(|v| (v.segment_index, v.cell_index, v.report.value))
            .collect();

        assert_eq!(
            addresses,
            vec![(0, 0, 3900.0), (0, 1, 4100.0), (1, 0, 3950.0)]
        );
        assert!(values.iter().all(|v| v.report.as_of == t0()));
    }

    #[tokio::test]
    async fn test_first_failure_reports_missing_cells() {
        let (service, _source, _) = service(&[2]);

        // nothing fetched yet: values stay at their 0.0 defaults
        let values = service.all_cell_values().await;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].report.value, 0.0);
        assert!(values[0].report.warning.is_some());
    }

    #[tokio::test]
    async fn test_abnormal_cells_and_summary() {
        let (service, source, _) = service(&[2, 2]);
        source.set(0, vec![3900.0, 4350.0]);
        source.set(1, vec![3800.0, 3800.0]);
        source.set_temperatures(1, vec![25.0, 41.5]);

        let abnormal = service.abnormal_cells().await;
        assert_eq!(
            abnormal.value,
            vec![AbnormalCell {
                segment_index: 0,
                cell_index: 1,
                voltage: 4350.0,
                temperature: 0.0,
            }]
        );

        let summary = service.pack_summary().await.value;
        assert_eq!(summary.segment_count, 2);
        assert_eq!(summary.cell_count, 4);
        assert_eq!(summary.average_voltage, 3962.5);
        assert_eq!(summary.max_temperature, 41.5);
        assert_eq!(summary.abnormal_cells, 1);
        assert!(summary.stale_segments.is_empty());
    }
}
