//! Interaction Log
//!
//! Append-only record of who talks to the bot and what they ask:
//!
//! - `users.csv`: timestamp, user id, first name, last name, username
//!   (first interaction of each user in this process)
//! - `messages.csv`: timestamp, user, raw command text (every command)
//!
//! Each run writes into its own directory named after the start time.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors while writing the interaction log
#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Who sent a command
#[derive(Debug, Clone, PartialEq)]
pub struct Interlocutor {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Interlocutor {
    /// Name used in the messages log
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => username.clone(),
            None => self.first_name.clone(),
        }
    }
}

impl From<&crate::telegram::User> for Interlocutor {
    fn from(user: &crate::telegram::User) -> Self {
        Self {
            user_id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// CSV-backed interaction log
pub struct InteractionLog {
    dir: PathBuf,
    seen: Mutex<HashSet<i64>>,
    /// Held while appending to either file
    write_lock: Mutex<()>,
}

impl InteractionLog {
    /// Create the run directory `{root}/{YYYY-MM-DD-HH-MM}` and the log files
    pub fn open(root: &Path, started_at: DateTime<Utc>) -> Result<Self, InteractionError> {
        let dir = root.join(started_at.format("%Y-%m-%d-%H-%M").to_string());
        std::fs::create_dir_all(&dir)?;

        tracing::info!(dir = ?dir, "Interaction log ready");

        Ok(Self {
            dir,
            seen: Mutex::new(HashSet::new()),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn users_path(&self) -> PathBuf {
        self.dir.join("users.csv")
    }

    pub fn messages_path(&self) -> PathBuf {
        self.dir.join("messages.csv")
    }

    /// Record a user the first time they interact. Returns true if this was
    /// their first interaction.
    pub async fn record_user(
        &self,
        user: &Interlocutor,
        at: DateTime<Utc>,
    ) -> Result<bool, InteractionError> {
        let mut seen = self.seen.lock().await;
        if seen.contains(&user.user_id) {
            return Ok(false);
        }

        tracing::info!(
            user_id = user.user_id,
            first_name = %user.first_name,
            username = user.username.as_deref().unwrap_or(""),
            "New user"
        );

        {
            let _write = self.write_lock.lock().await;
            append_row(
                &self.users_path(),
                &[
                    at.to_rfc3339(),
                    user.user_id.to_string(),
                    user.first_name.clone(),
                    user.last_name.clone().unwrap_or_default(),
                    user.username.clone().unwrap_or_default(),
                ],
            )?;
        }

        // only once the row is on disk, so a failed write is retried
        seen.insert(user.user_id);
        Ok(true)
    }

    /// Record a command as typed by the user
    pub async fn record_command(
        &self,
        user: &Interlocutor,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), InteractionError> {
        let _write = self.write_lock.lock().await;

        tracing::info!(user = %user.display_name(), command = %text, "Command received");

        append_row(
            &self.messages_path(),
            &[at.to_rfc3339(), user.display_name(), text.to_string()],
        )
    }
}

fn append_row(path: &Path, values: &[String]) -> Result<(), InteractionError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer.write_record(values)?;
    writer.flush()?;
    Ok(())
}
