//! Polling loop
//!
//! Pulls updates from Telegram and answers them one at a time, so queries
//! never overlap.

use super::commands::{CommandContext, CommandTable, Reply};
use crate::clock::Clock;
use crate::interactions::{InteractionLog, Interlocutor};
use crate::telegram::{Message, ReplyKeyboardMarkup, TelegramClient, TelegramError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Delay before polling again after a failed `getUpdates`
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Drives the command table from Telegram updates
pub struct BotRunner {
    client: TelegramClient,
    commands: CommandTable,
    interactions: Option<InteractionLog>,
    clock: Arc<dyn Clock>,
}

impl BotRunner {
    pub fn new(
        client: TelegramClient,
        commands: CommandTable,
        interactions: Option<InteractionLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            commands,
            interactions,
            clock,
        }
    }

    /// Poll until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), TelegramError>
    where
        F: Future<Output = ()>,
    {
        let me = self.client.get_me().await?;
        if let Some(username) = &me.username {
            self.commands.set_bot_username(username.clone());
        }
        tracing::info!(
            bot = me.username.as_deref().unwrap_or(&me.first_name),
            commands = self.commands.len(),
            "Bot started, polling for updates"
        );

        tokio::pin!(shutdown);
        let mut offset: Option<i64> = None;

        loop {
            let updates = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping bot");
                    break;
                }
                result = self.client.get_updates(offset) => result,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to fetch updates");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);

                if let Some(message) = update.message {
                    if let Err(e) = self.handle_message(&message).await {
                        tracing::error!(
                            update_id = update.update_id,
                            error = %e,
                            "Update caused error"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<(), TelegramError> {
        let (Some(text), Some(from)) = (&message.text, &message.from) else {
            return Ok(());
        };

        let user = Interlocutor::from(from);
        let ctx = CommandContext {
            user,
            chat_id: message.chat.id,
        };

        if self.commands.parse(text).is_none() {
            return Ok(());
        }
        self.record(&ctx.user, text).await;

        let Some(replies) = self.commands.dispatch(&ctx, text).await else {
            return Ok(());
        };

        for reply in replies {
            self.send(ctx.chat_id, reply).await?;
        }

        Ok(())
    }

    async fn record(&self, user: &Interlocutor, text: &str) {
        let Some(log) = &self.interactions else {
            return;
        };
        let now = self.clock.now();

        if let Err(e) = log.record_user(user, now).await {
            tracing::warn!(error = %e, "Failed to record user");
        }
        if let Err(e) = log.record_command(user, text, now).await {
            tracing::warn!(error = %e, "Failed to record command");
        }
    }

    async fn send(&self, chat_id: i64, reply: Reply) -> Result<(), TelegramError> {
        let keyboard = reply.keyboard.map(ReplyKeyboardMarkup::from_rows);
        self.client.send_message(chat_id, &reply.text, keyboard).await
    }
}
