//! Reply texts
//!
//! All user-facing wording lives here. Numbers shown to users are 1-based.

use crate::pack::{AbnormalCell, Metric};
use crate::query::{PackSummary, QueryError, Reported};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Sent before a query that may trigger a slow refresh
pub const COMPUTING_NOTICE: &str = "Please let me compute the query ... it may take a few moments";

/// Telegram rejects `sendMessage` texts longer than this
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// "as of 2017-03-01 at 12:30:00"
fn as_of(at: DateTime<Utc>) -> String {
    format!("as of {} at {}", at.format("%Y-%m-%d"), at.format("%H:%M:%S"))
}

fn millivolts(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2} {}", value, Metric::Voltage.unit())
    } else {
        "n/a".to_string()
    }
}

fn with_warning(mut text: String, warning: &Option<String>) -> String {
    if let Some(warning) = warning {
        text.push_str(&format!(" (warning: {})", warning));
    }
    text
}

pub fn segment_message(segment_number: usize, report: &Reported<f64>) -> String {
    with_warning(
        format!(
            "Latest average value of segment {} is {} {}",
            segment_number,
            millivolts(report.value),
            as_of(report.as_of)
        ),
        &report.warning,
    )
}

pub fn cell_message(cell_number: usize, segment_number: usize, report: &Reported<f64>) -> String {
    with_warning(
        format!(
            "Latest value of cell {} in segment {} is {} {}",
            cell_number,
            segment_number,
            millivolts(report.value),
            as_of(report.as_of)
        ),
        &report.warning,
    )
}

/// Wording for a rejected address, translated back to 1-based numbers
pub fn query_error_message(err: &QueryError) -> String {
    match err {
        QueryError::InvalidSegment { segment } => invalid_segment(&(segment + 1).to_string()),
        QueryError::InvalidCell { cell, segment } => {
            invalid_cell(&(cell + 1).to_string(), &(segment + 1).to_string())
        }
    }
}

pub fn invalid_segment(segment: &str) -> String {
    format!("Invalid segment {}", segment)
}

pub fn invalid_cell(cell: &str, segment: &str) -> String {
    format!("Invalid cell {} in segment {}", cell, segment)
}

/// Split `lines` into as few newline-joined texts as fit in `max_chars` each.
/// A single line longer than `max_chars` is sent on its own.
pub fn join_within(lines: &[String], max_chars: usize) -> Vec<String> {
    let mut texts = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in lines {
        let line_chars = line.chars().count();
        if !current.is_empty() && current_chars + 1 + line_chars > max_chars {
            texts.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.is_empty() {
        texts.push(current);
    }
    texts
}

/// Header message followed by one message per segment with abnormal cells
pub fn abnormal_cells_messages(report: &Reported<Vec<AbnormalCell>>) -> Vec<String> {
    if report.value.is_empty() {
        return vec![with_warning(
            format!("No abnormal cells {}", as_of(report.as_of)),
            &report.warning,
        )];
    }

    let header = format!(
        "{} abnormal cell(s) {}:",
        report.value.len(),
        as_of(report.as_of)
    );
    let mut messages = vec![with_warning(header, &report.warning)];

    let mut by_segment: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for cell in &report.value {
        by_segment
            .entry(cell.segment_index)
            .or_default()
            .push(format!(
                "Segment {}, cell {}: {}, {:.1} {}",
                cell.segment_index + 1,
                cell.cell_index + 1,
                millivolts(cell.voltage),
                cell.temperature,
                Metric::Temperature.unit()
            ));
    }
    for lines in by_segment.values() {
        messages.extend(join_within(lines, MAX_MESSAGE_CHARS));
    }

    messages
}

pub fn pack_summary_message(report: &Reported<PackSummary>) -> String {
    let summary = &report.value;
    let mut text = format!(
        "Pack {}: {} segments, {} cells\nAverage cell voltage {}\nTotal voltage {}\nMax temperature {:.1} °C\nAbnormal cells: {}",
        as_of(report.as_of),
        summary.segment_count,
        summary.cell_count,
        millivolts(summary.average_voltage),
        millivolts(summary.total_voltage),
        summary.max_temperature,
        summary.abnormal_cells
    );

    if !summary.stale_segments.is_empty() {
        let stale: Vec<String> = summary
            .stale_segments
            .iter()
            .map(|s| (s + 1).to_string())
            .collect();
        text.push_str(&format!("\nStale segments: {}", stale.join(", ")));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(value: f64, warning: Option<&str>) -> Reported<f64> {
        Reported {
            value,
            as_of: Utc.with_ymd_and_hms(2017, 3, 1, 12, 30, 5).unwrap(),
            warning: warning.map(str::to_string),
        }
    }

    #[test]
    fn test_segment_message() {
        assert_eq!(
            segment_message(3, &report(3912.456, None)),
            "Latest average value of segment 3 is 3912.46 mV as of 2017-03-01 at 12:30:05"
        );
    }

    #[test]
    fn test_cell_message_with_warning() {
        assert_eq!(
            cell_message(1, 2, &report(f64::NAN, Some("no reading available"))),
            "Latest value of cell 1 in segment 2 is n/a as of 2017-03-01 at 12:30:05 (warning: no reading available)"
        );
    }

    #[test]
    fn test_error_messages_are_one_based() {
        assert_eq!(
            query_error_message(&QueryError::InvalidSegment { segment: 6 }),
            "Invalid segment 7"
        );
        assert_eq!(
            query_error_message(&QueryError::InvalidCell { cell: 18, segment: 0 }),
            "Invalid cell 19 in segment 1"
        );
    }

    #[test]
    fn test_abnormal_cells_message() {
        let report = Reported {
            value: vec![AbnormalCell {
                segment_index: 0,
                cell_index: 4,
                voltage: 4350.0,
                temperature: 31.0,
            }],
            as_of: Utc.with_ymd_and_hms(2017, 3, 1, 12, 30, 5).unwrap(),
            warning: None,
        };

        assert_eq!(
            abnormal_cells_messages(&report),
            vec![
                "1 abnormal cell(s) as of 2017-03-01 at 12:30:05:",
                "Segment 1, cell 5: 4350.00 mV, 31.0 °C"
            ]
        );
    }

    #[test]
    fn test_no_abnormal_cells() {
        let report = Reported {
            value: Vec::new(),
            as_of: Utc.with_ymd_and_hms(2017, 3, 1, 12, 30, 5).unwrap(),
            warning: None,
        };
        assert_eq!(
            abnormal_cells_messages(&report),
            vec!["No abnormal cells as of 2017-03-01 at 12:30:05"]
        );
    }

    #[test]
    fn test_join_within() {
        let lines: Vec<String> = ["aaaa", "bbbb", "cc", "dddddddddd"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            join_within(&lines, 9),
            vec!["aaaa\nbbbb", "cc", "dddddddddd"]
        );
        assert_eq!(join_within(&lines, 100).len(), 1);
        assert!(join_within(&[], 10).is_empty());
    }
}
