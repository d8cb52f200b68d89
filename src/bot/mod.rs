//! Chat Command Layer
//!
//! Boundary between Telegram and the query service. Users address segments
//! and cells with 1-based numbers; everything below this layer is 0-based.
//!
//! - **commands**: `CommandHandler` trait and the dispatch table
//! - **handlers**: `/start`, `/help`, `/segment`, `/cell`, `/alerts`, `/pack`
//! - **format**: reply wording
//! - **keyboard**: reply keyboard layout
//! - **runner**: Telegram long-polling loop

pub mod commands;
pub mod format;
pub mod handlers;
pub mod keyboard;
pub mod runner;

pub use commands::{CommandContext, CommandHandler, CommandTable, ParsedCommand, Reply};
pub use handlers::{
    standard_commands, AlertsCommand, CellCommand, HelpCommand, PackCommand, SegmentCommand,
    StartCommand,
};
pub use keyboard::keyboard_layout;
pub use runner::BotRunner;
