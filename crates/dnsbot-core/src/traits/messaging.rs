// # Messaging Traits
//
// Defines the chat transport as seen by the core:
//
// - [`MessagingGateway`]: outbound (send, edit, delete, acknowledge)
// - [`EventSource`]: inbound (stream of decoded user events)
//
// ## Implementations
//
// - Telegram Bot API: `dnsbot-telegram` crate
//
// The core never assumes delivery succeeded. Every gateway failure is logged
// by the caller and swallowed; a message may already be gone by the time we
// try to edit or delete it.

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::conversation::{Action, InboundEvent};
use crate::model::{ChatId, MessageId};

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Label shown to the user
    pub text: String,
    /// Action delivered back when the button is pressed
    pub action: Action,
}

impl Button {
    pub fn new(text: impl Into<String>, action: Action) -> Self {
        Self {
            text: text.into(),
            action,
        }
    }
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    /// Button rows, top to bottom
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// Append a single-button row
    pub fn button(self, text: impl Into<String>, action: Action) -> Self {
        self.row(vec![Button::new(text, action)])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over every button's action, row by row
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.rows.iter().flatten().map(|b| &b.action)
    }
}

/// Rendering options for an outbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Inline keyboard, if any
    pub keyboard: Option<Keyboard>,
}

impl MessageOptions {
    /// Plain text, no keyboard
    pub fn plain() -> Self {
        Self::default()
    }

    /// Text with an inline keyboard
    pub fn with_keyboard(keyboard: Keyboard) -> Self {
        Self {
            keyboard: Some(keyboard),
        }
    }
}

/// Outbound side of the chat transport
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a new message, returning its handle
    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        options: &MessageOptions,
    ) -> Result<MessageId, crate::Error>;

    /// Replace the text (and keyboard) of an earlier message
    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        options: &MessageOptions,
    ) -> Result<(), crate::Error>;

    /// Delete an earlier message
    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), crate::Error>;

    /// Acknowledge a button press, optionally with a short toast
    async fn acknowledge(&self, callback_id: &str, text: Option<&str>)
    -> Result<(), crate::Error>;
}

/// Inbound side of the chat transport
pub trait EventSource: Send + Sync {
    /// Stream of decoded user events, in arrival order
    ///
    /// The stream runs until the transport shuts down. Dropping it must stop
    /// any polling the implementation started.
    fn events(&self) -> Pin<Box<dyn Stream<Item = InboundEvent> + Send + 'static>>;
}
