//! Command dispatch
//!
//! Each chat command is a [`CommandHandler`] registered in a
//! [`CommandTable`] built once at startup.

use crate::interactions::Interlocutor;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Who issued the command and where
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user: Interlocutor,
    pub chat_id: i64,
}

/// A reply message, optionally with a keyboard of button labels
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Vec<Vec<String>>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
        self.keyboard = Some(rows);
        self
    }
}

/// A chat command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name without the leading slash
    fn name(&self) -> &str;

    /// One-line description shown by /help
    fn description(&self) -> &str;

    /// Answer the command. `args` are the whitespace-separated words after it.
    async fn handle(&self, ctx: &CommandContext, args: &[&str]) -> Vec<Reply>;
}

/// A command parsed out of a message
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand<'a> {
    pub name: String,
    pub args: Vec<&'a str>,
}

/// Registry of command handlers
pub struct CommandTable {
    handlers: BTreeMap<String, Box<dyn CommandHandler>>,
    bot_username: Option<String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            bot_username: None,
        }
    }

    /// Only answer `/cmd@name` mentions addressed to this bot
    pub fn set_bot_username(&mut self, username: impl Into<String>) {
        self.bot_username = Some(username.into());
    }

    /// Add a handler, replacing any handler with the same name
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        let name = handler.name().to_lowercase();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(command = %name, "Command handler replaced");
        }
    }

    /// (name, description) of every registered command, sorted by name
    pub fn describe(&self) -> Vec<(String, String)> {
        self.handlers
            .iter()
            .map(|(name, h)| (name.clone(), h.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Split `/name[@bot] arg...` into a command. Returns `None` for plain
    /// text and for commands addressed to another bot.
    pub fn parse<'a>(&self, text: &'a str) -> Option<ParsedCommand<'a>> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;

        let (name, mention) = match head.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (head, None),
        };

        if let (Some(mention), Some(ours)) = (mention, &self.bot_username) {
            if !mention.eq_ignore_ascii_case(ours) {
                return None;
            }
        }

        if name.is_empty() {
            return None;
        }

        Some(ParsedCommand {
            name: name.to_lowercase(),
            args: words.collect(),
        })
    }

    /// Run the command in `text`. Returns `None` when `text` is not a command
    /// for this bot.
    pub async fn dispatch(&self, ctx: &CommandContext, text: &str) -> Option<Vec<Reply>> {
        let command = self.parse(text)?;

        let replies = match self.handlers.get(&command.name) {
            Some(handler) => {
                tracing::debug!(command = %command.name, args = ?command.args, "Dispatching command");
                handler.handle(ctx, &command.args).await
            }
            None => vec![Reply::text(format!(
                "Unknown command /{}. Send /help for the list of commands.",
                command.name
            ))],
        };

        Some(replies)
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeat the arguments"
        }

        async fn handle(&self, _ctx: &CommandContext, args: &[&str]) -> Vec<Reply> {
            vec![Reply::text(args.join(" "))]
        }
    }

    fn ctx() -> CommandContext {
        CommandContext {
            user: Interlocutor {
                user_id: 1,
                first_name: "Ada".to_string(),
                last_name: None,
                username: None,
            },
            chat_id: 1,
        }
    }

    fn table() -> CommandTable {
        let mut table = CommandTable::new();
        table.set_bot_username("bms_bot");
        table.register(Box::new(Echo));
        table
    }

    #[test]
    fn test_parse() {
        let table = table();

        let parsed = table.parse("/cell  3 2").unwrap();
        assert_eq!(parsed.name, "cell");
        assert_eq!(parsed.args, vec!["3", "2"]);

        let parsed = table.parse("/Segment@bms_bot").unwrap();
        assert_eq!(parsed.name, "segment");
        assert!(parsed.args.is_empty());

        assert!(table.parse("/segment@other_bot 1").is_none());
        assert!(table.parse("hello there").is_none());
        assert!(table.parse("/").is_none());
        assert!(table.parse("").is_none());
    }

    #[tokio::test]
    async fn test_dispatch() {
        let table = table();

        let replies = table.dispatch(&ctx(), "/echo hello world").await.unwrap();
        assert_eq!(replies, vec![Reply::text("hello world")]);

        let replies = table.dispatch(&ctx(), "/nope").await.unwrap();
        assert!(replies[0].text.starts_with("Unknown command /nope"));

        assert!(table.dispatch(&ctx(), "just chatting").await.is_none());
    }

    #[test]
    fn test_describe() {
        let table = table();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.describe(),
            vec![("echo".to_string(), "Repeat the arguments".to_string())]
        );
    }
}
