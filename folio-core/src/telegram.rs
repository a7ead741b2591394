//! Telegram Bot API client.
//!
//! Covers the handful of methods Folio needs: long-polling `getUpdates`,
//! `sendMessage` (optionally as a reply, optionally with a reply keyboard),
//! `deleteMessage` for moderation and `getChat` for start-up checks.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

// ============================================================================
// Types
// ============================================================================

/// A chat is addressed either by numeric id or by `@channelusername`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl ChatId {
    /// Parse a configured chat reference: numeric strings become ids.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => ChatId::Id(id),
            Err(_) => ChatId::Username(raw.trim().to_string()),
        }
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId::Id(id)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{}", id),
            ChatId::Username(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    MarkdownV2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    /// Username if set, else first name.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.first_name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboard {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

impl ReplyKeyboard {
    /// One button per row.
    pub fn single_column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keyboard: labels
                .into_iter()
                .map(|l| vec![KeyboardButton { text: l.into() }])
                .collect(),
            resize_keyboard: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyKeyboard>,
}

impl OutgoingMessage {
    pub fn plain(chat_id: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: None,
            reply_to_message_id: None,
            reply_markup: None,
        }
    }

    /// Text must already be MarkdownV2-escaped.
    pub fn markdown(chat_id: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some(ParseMode::MarkdownV2),
            ..Self::plain(chat_id, text)
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.reply_markup = Some(keyboard);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
    pub chat: Chat,
}

// ============================================================================
// Messenger trait
// ============================================================================

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Long-poll for updates with `update_id >= offset`.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, TelegramError>;

    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, TelegramError>;

    async fn delete_message(&self, chat_id: &ChatId, message_id: i64) -> Result<(), TelegramError>;

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, TelegramError>;
}

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error ({code}): {description}")]
    Api { code: u16, description: String },

    #[error("Telegram response had ok=true but no result")]
    MissingResult,

    #[error("Missing bot token")]
    MissingToken,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

impl TelegramError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TelegramError::Http(_) => true,
            TelegramError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// TelegramClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct TelegramClientConfig {
    pub api_url: String,
    pub token: String,
    pub poll_timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl TelegramClientConfig {
    /// Build from the `[telegram]` section; the token comes from `TELEGRAM_BOT_TOKEN`.
    pub fn from_config(config: &crate::config::TelegramConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            poll_timeout_seconds: config.poll_timeout_seconds,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct DeleteMessageParams<'a> {
    chat_id: &'a ChatId,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct GetChatParams<'a> {
    chat_id: &'a ChatId,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    config: TelegramClientConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramClientConfig) -> Result<Self, TelegramError> {
        if config.token.is_empty() {
            return Err(TelegramError::MissingToken);
        }

        // Long polls hold the request open for poll_timeout_seconds.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_seconds + 30))
            .build()?;

        Ok(Self { client, config })
    }

    async fn call_once<P, T>(&self, api_method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!(
            "{}/bot{}/{}",
            self.config.api_url, self.config.token, api_method
        );
        let response = self.client.post(&url).json(params).send().await?;
        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;

        if !envelope.ok {
            let code = envelope.error_code.unwrap_or(status.as_u16());
            let description = envelope.description.unwrap_or_default();
            tracing::warn!(
                method = %api_method,
                code = code,
                description = %description,
                "Telegram API error"
            );
            return Err(TelegramError::Api { code, description });
        }

        envelope.result.ok_or(TelegramError::MissingResult)
    }

    async fn call<P, T>(&self, api_method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match RetryIf::spawn(
            retry_strategy,
            || self.call_once(api_method, params),
            TelegramError::is_retryable,
        )
        .await
        {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() => Err(TelegramError::RetryExhausted {
                attempts: self.config.max_retries,
            }),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        // No retry here: the polling loop itself calls again.
        self.call_once(
            "getUpdates",
            &GetUpdatesParams {
                offset,
                timeout: timeout_seconds,
                allowed_updates: ["message"],
            },
        )
        .await
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, TelegramError> {
        self.call("sendMessage", message).await
    }

    async fn delete_message(&self, chat_id: &ChatId, message_id: i64) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessageParams {
                    chat_id,
                    message_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, TelegramError> {
        self.call("getChat", &GetChatParams { chat_id }).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
