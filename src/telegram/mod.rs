//! Telegram Transport
//!
//! Minimal Bot API client: long polling for updates and sending replies.

pub mod client;
pub mod types;

pub use client::{TelegramClient, TelegramConfig, TelegramError};
pub use types::{Chat, Message, ReplyKeyboardMarkup, Update, User};
