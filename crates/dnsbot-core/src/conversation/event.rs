//! Inbound events as seen by the conversation engine

use crate::conversation::Action;
use crate::model::{ChatId, MessageId};

/// Slash command that starts (or inspects) a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Help,
    SetDns,
    GetDns,
    GetDnsAll,
    DelDns,
    Ddns,
    DdnsStatus,
    StopDdns,
    Domains,
}

impl Command {
    /// Parse `/name` or `/name@botname`, ignoring any arguments
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "setdns" => Command::SetDns,
            "getdns" => Command::GetDns,
            "getdnsall" => Command::GetDnsAll,
            "deldns" => Command::DelDns,
            "ddns" => Command::Ddns,
            "ddnsstatus" => Command::DdnsStatus,
            "stopddns" => Command::StopDdns,
            "domains" => Command::Domains,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::SetDns => "setdns",
            Command::GetDns => "getdns",
            Command::GetDnsAll => "getdnsall",
            Command::DelDns => "deldns",
            Command::Ddns => "ddns",
            Command::DdnsStatus => "ddnsstatus",
            Command::StopDdns => "stopddns",
            Command::Domains => "domains",
        }
    }
}

/// What the user did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Free text that is not a known command
    Text(String),
    /// A slash command
    Command(Command),
    /// A button press
    Action {
        /// Transport handle used to acknowledge the press
        callback_id: String,
        /// Message the pressed button belongs to, if known
        message_id: Option<MessageId>,
        /// Decoded action, `None` if the payload was not recognized
        action: Option<Action>,
    },
}

/// One user event for one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Text message; slash commands are recognized here
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match Command::parse(&text) {
            Some(command) => EventKind::Command(command),
            None => EventKind::Text(text),
        };
        Self { chat_id, kind }
    }

    pub fn command(chat_id: ChatId, command: Command) -> Self {
        Self {
            chat_id,
            kind: EventKind::Command(command),
        }
    }

    /// Button press carrying a raw payload
    pub fn callback(
        chat_id: ChatId,
        callback_id: impl Into<String>,
        message_id: Option<MessageId>,
        data: &str,
    ) -> Self {
        Self {
            chat_id,
            kind: EventKind::Action {
                callback_id: callback_id.into(),
                message_id,
                action: Action::parse(data),
            },
        }
    }

    /// Button press carrying an already-decoded action
    pub fn action(
        chat_id: ChatId,
        callback_id: impl Into<String>,
        message_id: Option<MessageId>,
        action: Action,
    ) -> Self {
        Self {
            chat_id,
            kind: EventKind::Action {
                callback_id: callback_id.into(),
                message_id,
                action: Some(action),
            },
        }
    }
}
