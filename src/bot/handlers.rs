//! Built-in chat commands

use super::commands::{CommandContext, CommandHandler, CommandTable, Reply};
use super::format;
use super::keyboard::keyboard_layout;
use crate::query::QueryService;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parse a 1-based number typed by a user into a 0-based index
fn parse_index(arg: &str) -> Option<usize> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
}

/// `/start`: greeting plus a keyboard of segment shortcuts
pub struct StartCommand {
    segment_count: usize,
}

impl StartCommand {
    pub fn new(segment_count: usize) -> Self {
        Self { segment_count }
    }
}

#[async_trait]
impl CommandHandler for StartCommand {
    fn name(&self) -> &str {
        "start"
    }

    fn description(&self) -> &str {
        "Say hello"
    }

    async fn handle(&self, ctx: &CommandContext, _args: &[&str]) -> Vec<Reply> {
        let shortcuts: Vec<String> = (1..=self.segment_count)
            .map(|n| format!("/segment {}", n))
            .collect();

        vec![Reply::text(format!(
            "Hello {}! I'm here to provide you with information about the battery pack. Send /help to see what I can do.",
            ctx.user.first_name
        ))
        .with_keyboard(keyboard_layout(&shortcuts, 3))]
    }
}

/// `/help`: list of commands
pub struct HelpCommand {
    text: String,
}

impl HelpCommand {
    /// Build the help text from (name, description) pairs
    pub fn new(commands: &[(String, String)]) -> Self {
        let mut text = String::from("Available commands:");
        for (name, description) in commands {
            text.push_str(&format!("\n/{} - {}", name, description));
        }
        Self { text }
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Show this list"
    }

    async fn handle(&self, _ctx: &CommandContext, _args: &[&str]) -> Vec<Reply> {
        vec![Reply::text(self.text.clone())]
    }
}

/// `/segment [n]`: average voltage of one or every segment
pub struct SegmentCommand {
    service: Arc<QueryService>,
}

impl SegmentCommand {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CommandHandler for SegmentCommand {
    fn name(&self) -> &str {
        "segment"
    }

    fn description(&self) -> &str {
        "Average voltage of segment n, or of every segment"
    }

    async fn handle(&self, _ctx: &CommandContext, args: &[&str]) -> Vec<Reply> {
        let mut replies = vec![Reply::text(format::COMPUTING_NOTICE)];

        match args.first() {
            None => {
                for value in self.service.all_segment_values().await {
                    replies.push(Reply::text(format::segment_message(
                        value.segment_index + 1,
                        &value.report,
                    )));
                }
            }
            Some(arg) => {
                let text = match parse_index(arg) {
                    None => format::invalid_segment(arg),
                    Some(index) => match self.service.segment_value(index).await {
                        Ok(report) => format::segment_message(index + 1, &report),
                        Err(e) => format::query_error_message(&e),
                    },
                };
                replies.push(Reply::text(text));
            }
        }

        replies
    }
}

/// `/cell [c] [s]`: voltage of one cell, or of every cell
pub struct CellCommand {
    service: Arc<QueryService>,
}

impl CellCommand {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CommandHandler for CellCommand {
    fn name(&self) -> &str {
        "cell"
    }

    fn description(&self) -> &str {
        "Voltage of cell c in segment s, or of every cell"
    }

    async fn handle(&self, _ctx: &CommandContext, args: &[&str]) -> Vec<Reply> {
        match args {
            [] => {
                let mut replies = vec![Reply::text(format::COMPUTING_NOTICE)];

                // one message per segment keeps the chat readable
                let mut by_segment: BTreeMap<usize, Vec<String>> = BTreeMap::new();
                for value in self.service.all_cell_values().await {
                    by_segment
                        .entry(value.segment_index)
                        .or_default()
                        .push(format::cell_message(
                            value.cell_index + 1,
                            value.segment_index + 1,
                            &value.report,
                        ));
                }
                for lines in by_segment.values() {
                    replies.extend(
                        format::join_within(lines, format::MAX_MESSAGE_CHARS)
                            .into_iter()
                            .map(Reply::text),
                    );
                }

                replies
            }
            [_] => vec![Reply::text("Usage: /cell <cell> <segment>, or /cell for every cell")],
            [cell_arg, segment_arg, ..] => {
                let text = match (parse_index(cell_arg), parse_index(segment_arg)) {
                    (Some(cell), Some(segment)) => {
                        match self.service.cell_value(cell, segment).await {
                            Ok(report) => format::cell_message(cell + 1, segment + 1, &report),
                            Err(e) => format::query_error_message(&e),
                        }
                    }
                    _ => format::invalid_cell(cell_arg, segment_arg),
                };
                vec![Reply::text(format::COMPUTING_NOTICE), Reply::text(text)]
            }
        }
    }
}

/// `/alerts`: cells outside the abnormal limits
pub struct AlertsCommand {
    service: Arc<QueryService>,
}

impl AlertsCommand {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CommandHandler for AlertsCommand {
    fn name(&self) -> &str {
        "alerts"
    }

    fn description(&self) -> &str {
        "List cells with abnormal voltage or temperature"
    }

    async fn handle(&self, _ctx: &CommandContext, _args: &[&str]) -> Vec<Reply> {
        let report = self.service.abnormal_cells().await;
        format::abnormal_cells_messages(&report)
            .into_iter()
            .map(Reply::text)
            .collect()
    }
}

/// `/pack`: pack-wide summary
pub struct PackCommand {
    service: Arc<QueryService>,
}

impl PackCommand {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CommandHandler for PackCommand {
    fn name(&self) -> &str {
        "pack"
    }

    fn description(&self) -> &str {
        "Summary of the whole pack"
    }

    async fn handle(&self, _ctx: &CommandContext, _args: &[&str]) -> Vec<Reply> {
        let report = self.service.pack_summary().await;
        vec![Reply::text(format::pack_summary_message(&report))]
    }
}

/// Command table with every built-in command registered
pub fn standard_commands(service: Arc<QueryService>, segment_count: usize) -> CommandTable {
    let mut table = CommandTable::new();

    table.register(Box::new(StartCommand::new(segment_count)));
    table.register(Box::new(SegmentCommand::new(Arc::clone(&service))));
    table.register(Box::new(CellCommand::new(Arc::clone(&service))));
    table.register(Box::new(AlertsCommand::new(Arc::clone(&service))));
    table.register(Box::new(PackCommand::new(service)));

    let mut commands = table.describe();
    commands.push(("help".to_string(), "Show this list".to_string()));
    commands.sort();
    table.register(Box::new(HelpCommand::new(&commands)));

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::integrations::{FetchError, ReadingSource, SegmentSnapshot};
    use crate::interactions::Interlocutor;
    use crate::pack::{Pack, Reading};
    use crate::refresh::RefreshPolicy;
    use chrono::{TimeZone, Utc};

    /// Every segment reads 3900 / 4100 / ... alternating; segment 2 is down
    struct AlternatingSource;

    #[async_trait]
    impl ReadingSource for AlternatingSource {
        fn name(&self) -> &str {
            "alternating"
        }

        async fn fetch_segment(
            &self,
            segment_index: usize,
            cell_count: usize,
        ) -> Result<SegmentSnapshot, FetchError> {
            if segment_index == 2 {
                return Err(FetchError::NoData(segment_index));
            }
            Ok(SegmentSnapshot {
                readings: (0..cell_count)
                    .map(|i| Reading::new(25.0, if i % 2 == 0 { 3900.0 } else { 4100.0 }))
                    .collect(),
                source_timestamp: None,
            })
        }
    }

    fn table() -> CommandTable {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).unwrap(),
        ));
        let service = Arc::new(QueryService::new(
            Pack::new(&[2, 2, 2]).unwrap(),
            RefreshPolicy::every_minutes(30).unwrap(),
            Arc::new(AlternatingSource),
            clock,
        ));
        standard_commands(service, 3)
    }

    fn ctx() -> CommandContext {
        CommandContext {
            user: Interlocutor {
                user_id: 42,
                first_name: "Ada".to_string(),
                last_name: None,
                username: Some("ada".to_string()),
            },
            chat_id: 42,
        }
    }

    async fn texts(table: &CommandTable, command: &str) -> Vec<String> {
        table
            .dispatch(&ctx(), command)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect()
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("1"), Some(0));
        assert_eq!(parse_index("18"), Some(17));
        assert_eq!(parse_index("0"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("x"), None);
    }

    #[tokio::test]
    async fn test_start() {
        let table = table();
        let replies = table.dispatch(&ctx(), "/start").await.unwrap();

        assert!(replies[0].text.starts_with("Hello Ada!"));
        let keyboard = replies[0].keyboard.as_ref().unwrap();
        assert_eq!(keyboard[0], vec!["/segment 1", "/segment 2", "/segment 3"]);
    }

    #[tokio::test]
    async fn test_segment_single() {
        let table = table();
        let replies = texts(&table, "/segment 1").await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], format::COMPUTING_NOTICE);
        assert_eq!(
            replies[1],
            "Latest average value of segment 1 is 4000.00 mV as of 2017-03-01 at 12:00:00"
        );
    }

    #[tokio::test]
    async fn test_segment_invalid() {
        let table = table();
        assert_eq!(texts(&table, "/segment 4").await[1], "Invalid segment 4");
        assert_eq!(texts(&table, "/segment 0").await[1], "Invalid segment 0");
        assert_eq!(texts(&table, "/segment abc").await[1], "Invalid segment abc");
    }

    #[tokio::test]
    async fn test_segment_all_reports_stale_inline() {
        let table = table();
        let replies = texts(&table, "/segment").await;

        assert_eq!(replies.len(), 4);
        assert!(replies[1].contains("segment 1 is 4000.00 mV"));
        assert!(replies[3].contains("segment 3 is 0.00 mV"));
        assert!(replies[3].contains("warning: stale data"));
    }

    #[tokio::test]
    async fn test_cell_single_and_invalid() {
        let table = table();

        assert_eq!(
            texts(&table, "/cell 2 1").await[1],
            "Latest value of cell 2 in segment 1 is 4100.00 mV as of 2017-03-01 at 12:00:00"
        );
        assert_eq!(texts(&table, "/cell 3 1").await[1], "Invalid cell 3 in segment 1");
        assert_eq!(texts(&table, "/cell 1 9").await[1], "Invalid cell 1 in segment 9");
        assert_eq!(texts(&table, "/cell a 1").await[1], "Invalid cell a in segment 1");
        assert!(texts(&table, "/cell 1").await[0].starts_with("Usage"));
    }

    #[tokio::test]
    async fn test_cell_all_groups_by_segment() {
        let table = table();
        let replies = texts(&table, "/cell").await;

        // notice + one message per segment
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[1].lines().count(), 2);
        assert!(replies[2].starts_with("Latest value of cell 1 in segment 2"));
    }

    #[tokio::test]
    async fn test_alerts_and_pack() {
        let table = table();

        // segment 3 was never fetched, its cells still read 0 mV
        let alerts = texts(&table, "/alerts").await;
        assert!(alerts[0].starts_with("2 abnormal cell(s)"));
        assert_eq!(alerts.len(), 2);
        assert_eq!(
            alerts[1],
            "Segment 3, cell 1: 0.00 mV, 0.0 °C\nSegment 3, cell 2: 0.00 mV, 0.0 °C"
        );
        assert!(alerts[0].contains("1 segment(s) serving stale data"));

        let pack = texts(&table, "/pack").await;
        assert!(pack[0].contains("3 segments, 6 cells"));
        assert!(pack[0].contains("Abnormal cells: 2"));
        assert!(pack[0].contains("Stale segments: 3"));
    }

    /// Source that is down for every segment
    struct DownSource;

    #[async_trait]
    impl ReadingSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_segment(
            &self,
            segment_index: usize,
            _cell_count: usize,
        ) -> Result<SegmentSnapshot, FetchError> {
            Err(FetchError::NoData(segment_index))
        }
    }

    #[tokio::test]
    async fn test_alerts_fit_telegram_limit_when_source_down() {
        let topology = [17, 18, 18, 18, 18, 18, 18, 17];
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).unwrap(),
        ));
        let service = Arc::new(QueryService::new(
            Pack::new(&topology).unwrap(),
            RefreshPolicy::every_minutes(30).unwrap(),
            Arc::new(DownSource),
            clock,
        ));
        let table = standard_commands(service, topology.len());

        let alerts = texts(&table, "/alerts").await;

        assert!(alerts[0].starts_with("142 abnormal cell(s)"));
        // header + one message per segment
        assert_eq!(alerts.len(), 1 + topology.len());
        for text in &alerts {
            assert!(text.chars().count() <= format::MAX_MESSAGE_CHARS);
        }
        let cell_lines: usize = alerts[1..].iter().map(|t| t.lines().count()).sum();
        assert_eq!(cell_lines, 142);
    }

    #[tokio::test]
    async fn test_help_lists_every_command() {
        let table = table();
        let help = &texts(&table, "/help").await[0];

        for name in ["alerts", "cell", "help", "pack", "segment", "start"] {
            assert!(help.contains(&format!("/{} - ", name)), "missing {}", name);
        }
    }
}
