//! Telegram Bot API Client
//!
//! HTTP client for the handful of Bot API methods the bot needs.

use super::types::{ApiResponse, GetUpdates, ReplyKeyboardMarkup, SendMessage, Update, User};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

/// Configuration for the Telegram client
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// API root, e.g. "https://api.telegram.org"
    pub api_url: String,
    /// Bot token issued by BotFather
    pub token: String,
    /// Long polling timeout in seconds
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            token: String::new(),
            poll_timeout_secs: 30,
        }
    }
}

/// Errors returned by the Telegram client
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telegram API error ({code}): {description}")]
    Api { code: u16, description: String },

    #[error("Telegram API returned ok without a result")]
    EmptyResult,

    #[error("Bot token is not configured")]
    MissingToken,
}

impl TelegramClient {
    /// Create a new client
    pub fn new(config: TelegramConfig) -> Result<Self, TelegramError> {
        if config.token.trim().is_empty() {
            return Err(TelegramError::MissingToken);
        }

        // leave headroom over the long-poll timeout
        let timeout = std::time::Duration::from_secs(config.poll_timeout_secs + 10);
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.token.trim(),
            method
        )
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        let envelope: ApiResponse<T> = response.json().await?;
        into_result(envelope)
    }

    /// Identity of the bot, used as a token check at startup
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-poll for updates newer than `offset`
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: self.config.poll_timeout_secs,
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &body).await
    }

    /// Send a text message, optionally with a reply keyboard
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<ReplyKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let body = SendMessage {
            chat_id,
            text,
            reply_markup: keyboard,
        };
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }
}

fn into_result<T>(envelope: ApiResponse<T>) -> Result<T, TelegramError> {
    if !envelope.ok {
        return Err(TelegramError::Api {
            code: envelope.error_code.unwrap_or(0),
            description: envelope
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    envelope.result.ok_or(TelegramError::EmptyResult)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TelegramClient {
        TelegramClient::new(TelegramConfig {
            token: "123:abc".to_string(),
            ..TelegramConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_token() {
        let result = TelegramClient::new(TelegramConfig::default());
        assert!(matches!(result, Err(TelegramError::MissingToken)));
    }

    #[test]
    fn test_method_url() {
        assert_eq!(
            client().method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_into_result_error() {
        let envelope: ApiResponse<Vec<Update>> = ApiResponse {
            ok: false,
            result: None,
            description: Some("Conflict: terminated by other getUpdates request".into()),
            error_code: Some(409),
        };

        match into_result(envelope) {
            Err(TelegramError::Api { code, description }) => {
                assert_eq!(code, 409);
                assert!(description.starts_with("Conflict"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_into_result_ok() {
        let envelope = ApiResponse {
            ok: true,
            result: Some(5),
            description: None,
            error_code: None,
        };
        assert_eq!(into_result(envelope).unwrap(), 5);
    }
}
