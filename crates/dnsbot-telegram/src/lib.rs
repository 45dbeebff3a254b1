// # Telegram Transport
//
// Implements both halves of the chat transport on the Telegram Bot API:
//
// - [`MessagingGateway`]: sendMessage, editMessageText, deleteMessage,
//   answerCallbackQuery
// - [`EventSource`]: getUpdates long polling, decoded into [`InboundEvent`]s
//
// Inline keyboards are rendered from the core's [`Keyboard`]; each button's
// `callback_data` is its action's wire payload.
//
// ## Polling
//
// `events()` spawns one polling task per call. The task tracks the update
// offset, backs off after failures and stops as soon as the returned stream
// is dropped.

use async_trait::async_trait;
use dnsbot_core::config::TelegramConfig;
use dnsbot_core::model::{ChatId, MessageId};
use dnsbot_core::traits::{EventSource, Keyboard, MessageOptions, MessagingGateway};
use dnsbot_core::{Error, InboundEvent, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Pause after a failed getUpdates call
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Largest callback payload Telegram accepts
const MAX_CALLBACK_DATA: usize = 64;

/// Failures reported by the Bot API layer
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("{method} request failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} rejected ({code}): {description}")]
    Api {
        method: &'static str,
        code: i64,
        description: String,
    },

    #[error("{method} returned no result")]
    MissingResult { method: &'static str },
}

impl TelegramError {
    /// Edits that change nothing are reported as errors by the API
    fn is_not_modified(&self) -> bool {
        matches!(self, TelegramError::Api { description, .. }
            if description.contains("message is not modified"))
    }
}

impl From<TelegramError> for Error {
    fn from(e: TelegramError) -> Self {
        Error::messaging(e.to_string())
    }
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramBot {
    token: String,
    base_url: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramBot {
    /// Create a client from configuration
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        config.validate()?;

        // Long polls hold the connection for up to poll_timeout_secs
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 30))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token: config.bot_token.clone(),
            base_url: DEFAULT_API_URL.to_string(),
            poll_timeout_secs: config.poll_timeout_secs,
            client,
        })
    }

    /// Point the client at another API server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<B, R>(&self, method: &'static str, body: &B) -> std::result::Result<R, TelegramError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // reqwest errors carry the URL, which embeds the token
        let transport = |e: reqwest::Error| TelegramError::Transport {
            method,
            source: e.without_url(),
        };

        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let reply: ApiResponse<R> = response.json().await.map_err(transport)?;
        reply.into_result(method)
    }

    /// Fetch the next batch of updates after `offset`
    async fn get_updates(&self, offset: i64) -> std::result::Result<Vec<Update>, TelegramError> {
        let request = GetUpdates {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }
}

impl fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramBot")
            .field("token", &"***")
            .field("base_url", &self.base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[async_trait]
impl MessagingGateway for TelegramBot {
    async fn send(&self, chat_id: ChatId, text: &str, options: &MessageOptions) -> Result<MessageId> {
        let request = SendMessage {
            chat_id: chat_id.0,
            text,
            reply_markup: options.keyboard.as_ref().map(InlineKeyboardMarkup::from),
        };
        let message: Message = self.call("sendMessage", &request).await?;
        Ok(MessageId(message.message_id))
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        options: &MessageOptions,
    ) -> Result<()> {
        let request = EditMessageText {
            chat_id: chat_id.0,
            message_id: message_id.0,
            text,
            reply_markup: options.keyboard.as_ref().map(InlineKeyboardMarkup::from),
        };
        match self.call::<_, serde_json::Value>("editMessageText", &request).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        let request = DeleteMessage {
            chat_id: chat_id.0,
            message_id: message_id.0,
        };
        let _: bool = self.call("deleteMessage", &request).await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let request = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text,
        };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }
}

impl EventSource for TelegramBot {
    fn events(&self) -> Pin<Box<dyn Stream<Item = InboundEvent> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot = self.clone();

        tokio::spawn(async move {
            tracing::info!(
                "Starting Telegram long polling (timeout={}s)",
                bot.poll_timeout_secs
            );

            let mut offset = 0;
            loop {
                let batch = tokio::select! {
                    _ = tx.closed() => break,
                    batch = bot.get_updates(offset) => batch,
                };

                let updates = match batch {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::warn!("Polling failed, retrying in {:?}: {}", POLL_BACKOFF, e);
                        tokio::time::sleep(POLL_BACKOFF).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(event) = update.into_event() else {
                        continue;
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }

            tracing::info!("Telegram polling stopped");
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &'static str) -> std::result::Result<T, TelegramError> {
        if !self.ok {
            return Err(TelegramError::Api {
                method,
                code: self.error_code,
                description: self.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        self.result.ok_or(TelegramError::MissingResult { method })
    }
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i32,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct DeleteMessage {
    chat_id: i64,
    message_id: i32,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

/// Buttons whose payload Telegram would refuse are left out; one of them
/// would make the whole message fail.
impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        let inline_keyboard = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|button| {
                        let callback_data = button.action.to_string();
                        if callback_data.len() > MAX_CALLBACK_DATA {
                            tracing::warn!(
                                "Dropping button {:?}, callback payload exceeds {} bytes: {}",
                                button.text,
                                MAX_CALLBACK_DATA,
                                callback_data
                            );
                            return None;
                        }
                        Some(InlineKeyboardButton {
                            text: button.text.clone(),
                            callback_data,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();
        Self { inline_keyboard }
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i32,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}

impl Update {
    /// Decode into a core event; updates the bot cannot act on yield `None`
    fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            // Without the originating message there is no chat to answer in
            let message = query.message?;
            return Some(InboundEvent::callback(
                ChatId(message.chat.id),
                query.id,
                Some(MessageId(message.message_id)),
                query.data.as_deref().unwrap_or_default(),
            ));
        }

        let message = self.message?;
        let text = message.text?;
        Some(InboundEvent::text(ChatId(message.chat.id), text))
    }
}
