//! Conversation state machine
//!
//! The [`ConversationEngine`] routes one [`InboundEvent`] at a time to the
//! handler registered for the session's current state and the event's kind.
//!
//! ## Dispatch
//!
//! ```text
//! Command ──► start workflow (replaces any session)
//! Text    ──► session? ── no ──► ignored
//!                 │
//!            state accepts text? ── no ──► ignored
//!                 │
//!                 ▼
//!           text handler for state
//! Action  ──► session-less stop menu
//!         ──► session? ── no ──► "session expired"
//!                 │
//!            accepted in state? ── no ──► "session expired" (untouched)
//!                 │
//!                 ▼
//!           action handler
//! ```
//!
//! Handlers are the only code that changes `Session::state`. Any handler that
//! suspends on a provider call re-reads the session afterwards and drops its
//! result if the session moved on in the meantime. One-shot workflows remove
//! the session before the provider call, so a second confirmation finds
//! nothing to confirm.
//!
//! Events for one chat must still be fed in order, one at a time; see
//! [`ChatQueue`](crate::dispatch::ChatQueue).

mod action;
mod ddns;
mod del_dns;
mod event;
mod get_dns;
pub(crate) mod menu;
mod set_dns;

pub use action::{Action, ActionKind, CancelTarget, DomainPurpose};
pub use event::{Command, EventKind, InboundEvent};

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::BotConfig;
use crate::error::Result;
use crate::model::{ChatId, MessageId};
use crate::scheduler::DdnsScheduler;
use crate::session::{Session, SessionState};
use crate::traits::{DnsProvider, MessageOptions, MessagingGateway, SessionStore};

/// What the engine did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran
    Handled,
    /// Nothing to do (free text outside a workflow, chat not allowed)
    Ignored,
    /// Stale action; acknowledged as "session expired", nothing changed
    Expired,
}

/// How a button press is acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ack {
    Done,
    Toast(String),
    Expired,
}

/// Engine settings taken from [`BotConfig`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Root domains offered in menus
    pub domains: Vec<String>,
    pub page_size: usize,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    pub preset_intervals: Vec<u64>,
    /// Empty allows every chat
    pub allowed_chats: HashSet<ChatId>,
}

impl EngineSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            domains: config.domains.clone(),
            page_size: config.session.page_size,
            min_interval_secs: config.ddns.min_interval_secs,
            max_interval_secs: config.ddns.max_interval_secs,
            preset_intervals: config.ddns.preset_intervals.clone(),
            allowed_chats: config.telegram.allowed_chats(),
        }
    }

    pub fn with_domains(mut self, domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn allows_chat(&self, chat_id: ChatId) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }

    pub fn allows_interval(&self, secs: u64) -> bool {
        (self.min_interval_secs..=self.max_interval_secs).contains(&secs)
    }

    pub fn knows_domain(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let ddns = crate::config::DdnsConfig::default();
        Self {
            domains: Vec::new(),
            page_size: crate::pagination::DEFAULT_PAGE_SIZE,
            min_interval_secs: ddns.min_interval_secs,
            max_interval_secs: ddns.max_interval_secs,
            preset_intervals: ddns.preset_intervals,
            allowed_chats: HashSet::new(),
        }
    }
}

/// The conversation state machine and the DNS workflows built on it
pub struct ConversationEngine {
    sessions: Arc<dyn SessionStore>,
    gateway: Arc<dyn MessagingGateway>,
    provider: Arc<dyn DnsProvider>,
    scheduler: DdnsScheduler,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl ConversationEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        gateway: Arc<dyn MessagingGateway>,
        provider: Arc<dyn DnsProvider>,
        scheduler: DdnsScheduler,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            sessions,
            gateway,
            provider,
            scheduler,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &DdnsScheduler {
        &self.scheduler
    }

    /// Handle one event, logging any error
    pub async fn handle(&self, event: InboundEvent) -> DispatchOutcome {
        let chat_id = event.chat_id;
        match self.dispatch(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to handle event for chat {}: {}", chat_id, e);
                DispatchOutcome::Handled
            }
        }
    }

    /// Handle one event
    ///
    /// # Errors
    ///
    /// Only session store failures propagate. Provider failures are reported
    /// to the user and gateway failures are logged.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchOutcome> {
        let chat_id = event.chat_id;
        if !self.settings.allows_chat(chat_id) {
            debug!("Dropping event from chat {} (not allowed)", chat_id);
            return Ok(DispatchOutcome::Ignored);
        }

        match event.kind {
            EventKind::Command(command) => {
                debug!("Chat {}: /{}", chat_id, command.name());
                self.on_command(chat_id, command).await?;
                Ok(DispatchOutcome::Handled)
            }
            EventKind::Text(text) => self.on_text(chat_id, &text).await,
            EventKind::Action {
                callback_id,
                message_id,
                action,
            } => {
                let result = match action {
                    Some(action) => self.on_action(chat_id, message_id, action).await,
                    None => {
                        debug!("Chat {}: unrecognized button payload", chat_id);
                        Ok(Ack::Expired)
                    }
                };

                match result {
                    Ok(ack) => Ok(self.acknowledge(&callback_id, ack).await),
                    Err(e) => {
                        self.ack(&callback_id, None).await;
                        Err(e)
                    }
                }
            }
        }
    }

    async fn on_command(&self, chat_id: ChatId, command: Command) -> Result<()> {
        match command {
            Command::Start | Command::Help => {
                self.reply(chat_id, menu::HELP, &MessageOptions::plain()).await;
                Ok(())
            }
            Command::Domains => {
                let text = if self.settings.domains.is_empty() {
                    "No domains are configured.".to_string()
                } else {
                    format!("Configured domains:\n{}", self.settings.domains.join("\n"))
                };
                self.reply(chat_id, &text, &MessageOptions::plain()).await;
                Ok(())
            }
            Command::SetDns => self.begin(chat_id, DomainPurpose::Set).await,
            Command::GetDns => self.begin(chat_id, DomainPurpose::Query).await,
            Command::GetDnsAll => self.begin(chat_id, DomainPurpose::All).await,
            Command::DelDns => self.begin(chat_id, DomainPurpose::Delete).await,
            Command::Ddns => self.begin(chat_id, DomainPurpose::Ddns).await,
            Command::DdnsStatus => {
                self.show_ddns_status(chat_id).await;
                Ok(())
            }
            Command::StopDdns => {
                self.show_stop_menu(chat_id).await;
                Ok(())
            }
        }
    }

    /// Start a workflow with the domain menu, replacing any session
    async fn begin(&self, chat_id: ChatId, purpose: DomainPurpose) -> Result<()> {
        if self.sessions.delete(chat_id).await? {
            debug!("Chat {}: replaced unfinished session", chat_id);
        }

        if self.settings.domains.is_empty() {
            self.reply(chat_id, "No domains are configured.", &MessageOptions::plain())
                .await;
            return Ok(());
        }

        let mut session = Session::new(chat_id, purpose.selecting_state(), self.clock.now());
        let (text, options) = menu::domain_menu(purpose, &self.settings.domains);
        let sent = self.reply(chat_id, &text, &options).await;
        session.track(sent);

        self.sessions.put(session).await
    }

    async fn on_text(&self, chat_id: ChatId, text: &str) -> Result<DispatchOutcome> {
        let Some(session) = self.sessions.get(chat_id).await? else {
            debug!("Chat {}: ignoring text outside a workflow", chat_id);
            return Ok(DispatchOutcome::Ignored);
        };
        if !session.state.accepts_text() {
            debug!("Chat {}: ignoring text in {:?}", chat_id, session.state);
            return Ok(DispatchOutcome::Ignored);
        }

        self.sessions.touch(chat_id).await?;
        let text = text.trim();

        match session.state {
            SessionState::WaitingSubdomainForSet => {
                self.on_subdomain(session, DomainPurpose::Set, text).await?
            }
            SessionState::WaitingSubdomainInput => {
                self.on_subdomain(session, DomainPurpose::Query, text).await?
            }
            SessionState::WaitingSubdomainForDelete => {
                self.on_subdomain(session, DomainPurpose::Delete, text).await?
            }
            SessionState::WaitingSubdomainForDdns => {
                self.on_subdomain(session, DomainPurpose::Ddns, text).await?
            }
            SessionState::WaitingIp => self.on_ip(session, text).await?,
            SessionState::WaitingDnsUpdateNewIp => self.on_new_ip(session, text).await?,
            SessionState::WaitingIntervalForDdns => self.on_interval_text(session, text).await?,
            _ => return Ok(DispatchOutcome::Ignored),
        }

        Ok(DispatchOutcome::Handled)
    }

    async fn on_action(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        action: Action,
    ) -> Result<Ack> {
        if !action.requires_session() {
            return Ok(self.on_stop_menu(chat_id, message_id, action).await);
        }

        let Some(session) = self.sessions.get(chat_id).await? else {
            debug!("Chat {}: {} without a session", chat_id, action);
            return Ok(Ack::Expired);
        };
        if !action.accepted_in(session.state) {
            debug!("Chat {}: {} is stale in {:?}", chat_id, action, session.state);
            return Ok(Ack::Expired);
        }

        self.sessions.touch(chat_id).await?;

        match action {
            Action::Cancel(target) => self.cancel(session, message_id, target).await,
            Action::SelectDomain {
                purpose: DomainPurpose::All,
                domain,
            } => self.list_zone(session, message_id, domain).await,
            Action::SelectDomain { purpose, domain } => {
                self.select_domain(session, message_id, purpose, domain).await
            }
            Action::UseRootDomain(purpose) => {
                let Some(root) = session.root_domain.clone() else {
                    return Ok(Ack::Expired);
                };
                self.accept_domain(session, message_id, purpose, root).await
            }
            Action::Proxy(proxied) => self.apply_set(session, message_id, proxied).await,
            Action::ConfirmDelete => self.confirm_delete_all(session, message_id).await,
            Action::PrevPage => self.turn_page(session, message_id, false).await,
            Action::NextPage => self.turn_page(session, message_id, true).await,
            Action::PageInfo => Ok(Ack::Toast(format!(
                "Page {} of {}",
                session.page.current_page + 1,
                session.page.total_pages.max(1)
            ))),
            Action::Done => self.finish_browsing(session, message_id).await,
            Action::SelectRecord(key) => self.select_record(session, message_id, key).await,
            Action::UpdateRecord => self.begin_update(session, message_id).await,
            Action::DeleteRecord => self.ask_delete_record(session, message_id).await,
            Action::ConfirmDeleteRecord => self.delete_selected(session, message_id).await,
            Action::BackToList | Action::CancelDeleteRecord | Action::CancelUpdateRecord => {
                self.back_to_list(session, message_id).await
            }
            Action::UpdateProxy(proxied) => self.apply_update(session, message_id, proxied).await,
            Action::DdnsInterval(secs) => self.on_interval(session, message_id, secs).await,
            Action::StopDdns(_) | Action::StopAllDdns | Action::CancelStopDdns => Ok(Ack::Expired),
        }
    }

    async fn cancel(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        target: CancelTarget,
    ) -> Result<Ack> {
        self.sessions.delete(session.chat_id).await?;
        info!("Chat {}: {:?} cancelled", session.chat_id, target.workflow());

        self.edit_or_reply(
            session.chat_id,
            message_id,
            "Operation cancelled.",
            &MessageOptions::plain(),
        )
        .await;
        Ok(Ack::Done)
    }

    async fn select_domain(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        purpose: DomainPurpose,
        domain: String,
    ) -> Result<Ack> {
        if !self.settings.knows_domain(&domain) {
            return Ok(Ack::Expired);
        }
        let Some(next) = purpose.subdomain_state() else {
            return Ok(Ack::Expired);
        };

        let (text, options) = menu::subdomain_prompt(purpose, &domain);
        session.root_domain = Some(domain);
        session.state = next;

        self.advance(session, message_id, &text, &options).await
    }

    async fn on_subdomain(
        &self,
        session: Session,
        purpose: DomainPurpose,
        text: &str,
    ) -> Result<()> {
        let Some(root) = session.root_domain.clone() else {
            return Ok(());
        };

        match menu::qualify_domain(text, &root) {
            Some(domain) => {
                self.accept_domain(session, None, purpose, domain).await?;
            }
            None => {
                let (prompt, options) = menu::subdomain_prompt(purpose, &root);
                let text = format!("\"{}\" is not a valid subdomain.\n\n{}", text, prompt);
                self.reprompt(session, &text, &options).await?;
            }
        }
        Ok(())
    }

    /// The fully-qualified name for a workflow is known
    async fn accept_domain(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        purpose: DomainPurpose,
        domain: String,
    ) -> Result<Ack> {
        match purpose {
            DomainPurpose::Set => self.ask_ip(session, message_id, domain).await,
            DomainPurpose::Query => self.query(session, message_id, domain).await,
            DomainPurpose::Delete => self.ask_confirm_delete(session, message_id, domain).await,
            DomainPurpose::Ddns => self.ask_interval(session, message_id, domain).await,
            DomainPurpose::All => Ok(Ack::Expired),
        }
    }

    /// Show the prompt for the session's new state and store the session
    async fn advance(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        text: &str,
        options: &MessageOptions,
    ) -> Result<Ack> {
        let shown = self
            .edit_or_reply(session.chat_id, message_id, text, options)
            .await;
        if shown != message_id {
            session.track(shown);
        }
        self.sessions.put(session).await?;
        Ok(Ack::Done)
    }

    /// Reject input and ask again, keeping the state
    async fn reprompt(
        &self,
        mut session: Session,
        text: &str,
        options: &MessageOptions,
    ) -> Result<()> {
        debug!("Chat {}: re-prompting in {:?}", session.chat_id, session.state);
        let sent = self.reply(session.chat_id, text, options).await;
        session.track(sent);
        self.sessions.put(session).await
    }

    /// Re-read the session after a suspension point
    ///
    /// Returns it only if it is still in `expected`.
    async fn reload(&self, chat_id: ChatId, expected: SessionState) -> Result<Option<Session>> {
        let session = self.sessions.get(chat_id).await?;
        match session {
            Some(session) if session.state == expected => Ok(Some(session)),
            Some(session) => {
                debug!(
                    "Chat {}: session moved from {:?} to {:?} meanwhile, discarding result",
                    chat_id, expected, session.state
                );
                Ok(None)
            }
            None => {
                debug!("Chat {}: session ended meanwhile, discarding result", chat_id);
                Ok(None)
            }
        }
    }

    async fn acknowledge(&self, callback_id: &str, ack: Ack) -> DispatchOutcome {
        match ack {
            Ack::Done => {
                self.ack(callback_id, None).await;
                DispatchOutcome::Handled
            }
            Ack::Toast(text) => {
                self.ack(callback_id, Some(&text)).await;
                DispatchOutcome::Handled
            }
            Ack::Expired => {
                self.ack(callback_id, Some(menu::SESSION_EXPIRED)).await;
                DispatchOutcome::Expired
            }
        }
    }

    async fn ack(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.gateway.acknowledge(callback_id, text).await {
            warn!("Failed to acknowledge button press: {}", e);
        }
    }

    /// Send a message; failures are logged and swallowed
    async fn reply(
        &self,
        chat_id: ChatId,
        text: &str,
        options: &MessageOptions,
    ) -> Option<MessageId> {
        match self.gateway.send(chat_id, text, options).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to send message to chat {}: {}", chat_id, e);
                None
            }
        }
    }

    /// Edit `message_id` in place, falling back to a new message
    ///
    /// Returns the handle of the message now showing `text`.
    async fn edit_or_reply(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        text: &str,
        options: &MessageOptions,
    ) -> Option<MessageId> {
        if let Some(message_id) = message_id {
            match self.gateway.edit(chat_id, message_id, text, options).await {
                Ok(()) => return Some(message_id),
                Err(e) => debug!("Could not edit message {} in chat {}: {}", message_id, chat_id, e),
            }
        }
        self.reply(chat_id, text, options).await
    }

    async fn discard(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.gateway.delete(chat_id, message_id).await {
            debug!("Could not delete message {} in chat {}: {}", message_id, chat_id, e);
        }
    }

    async fn show_ddns_status(&self, chat_id: ChatId) {
        let text = menu::ddns_status(&self.scheduler.list());
        self.reply(chat_id, &text, &MessageOptions::plain()).await;
    }

    async fn show_stop_menu(&self, chat_id: ChatId) {
        let tasks = self.scheduler.list();
        if tasks.is_empty() {
            self.reply(chat_id, "No DDNS tasks are running.", &MessageOptions::plain())
                .await;
            return;
        }
        let (text, options) = menu::stop_menu(&tasks);
        self.reply(chat_id, &text, &options).await;
    }
}
