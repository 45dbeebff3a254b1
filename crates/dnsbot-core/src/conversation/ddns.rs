//! `/ddns` setup and the session-less stop menu

use tracing::{info, warn};

use super::{Ack, Action, ConversationEngine, menu};
use crate::error::{Error, Result};
use crate::model::{ChatId, MessageId, RecordType};
use crate::scheduler::TaskSpec;
use crate::session::{Session, SessionState};
use crate::traits::MessageOptions;

impl ConversationEngine {
    pub(super) async fn ask_interval(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        domain: String,
    ) -> Result<Ack> {
        if self.scheduler.contains(&domain) {
            self.sessions.delete(session.chat_id).await?;
            self.edit_or_reply(
                session.chat_id,
                message_id,
                &already_running(&domain),
                &MessageOptions::plain(),
            )
            .await;
            return Ok(Ack::Done);
        }

        let (text, options) = menu::interval_prompt(
            &domain,
            &self.settings.preset_intervals,
            self.settings.min_interval_secs,
            self.settings.max_interval_secs,
        );
        session.domain = Some(domain);
        session.state = SessionState::WaitingIntervalForDdns;
        self.advance(session, message_id, &text, &options).await
    }

    pub(super) async fn on_interval_text(&self, session: Session, text: &str) -> Result<()> {
        match text.parse::<u64>() {
            Ok(secs) if self.settings.allows_interval(secs) => {
                self.start_ddns(session, None, secs).await?;
            }
            _ => {
                let text = format!(
                    "Enter a whole number of seconds between {} and {}.",
                    self.settings.min_interval_secs, self.settings.max_interval_secs
                );
                self.reprompt(session, &text, &MessageOptions::plain()).await?;
            }
        }
        Ok(())
    }

    pub(super) async fn on_interval(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        secs: u64,
    ) -> Result<Ack> {
        if !self.settings.allows_interval(secs) {
            return Ok(Ack::Toast(format!(
                "Interval must be between {} and {} seconds",
                self.settings.min_interval_secs, self.settings.max_interval_secs
            )));
        }
        self.start_ddns(session, message_id, secs).await
    }

    /// Resolve zone and record type, then register the task
    async fn start_ddns(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        secs: u64,
    ) -> Result<Ack> {
        let Some(domain) = session.domain.clone() else {
            return Ok(Ack::Expired);
        };
        let chat_id = session.chat_id;

        let resolved = self.resolve_task(&domain, secs, chat_id).await;

        if self
            .reload(chat_id, SessionState::WaitingIntervalForDdns)
            .await?
            .is_none()
        {
            return Ok(Ack::Expired);
        }
        if !self.sessions.delete(chat_id).await? {
            return Ok(Ack::Expired);
        }

        let text = match resolved {
            Ok(spec) => {
                let record_type = spec.record_type.clone();
                match self.scheduler.start(spec) {
                    Ok(handle) => {
                        info!(
                            "Chat {}: DDNS task {} started for {}",
                            chat_id, handle.id, handle.domain
                        );
                        format!(
                            "DDNS started for {} ({} record), checking every {}.",
                            handle.domain,
                            record_type,
                            menu::format_interval(secs)
                        )
                    }
                    Err(Error::DuplicateTask(domain)) => already_running(&domain),
                    Err(e) => format!("Failed to start DDNS for {}: {}", domain, e),
                }
            }
            Err(e) => {
                warn!("Chat {}: DDNS setup for {} failed: {}", chat_id, domain, e);
                format!("Failed to start DDNS for {}: {}", domain, e)
            }
        };

        self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
            .await;
        Ok(Ack::Done)
    }

    /// Zone id and record type are looked up once, here
    ///
    /// An existing A or AAAA record decides the type and proxy flag; a name
    /// with neither gets an A record.
    async fn resolve_task(&self, domain: &str, secs: u64, owner: ChatId) -> Result<TaskSpec> {
        let zone_id = self
            .provider
            .resolve_zone_id(domain)
            .await?
            .ok_or_else(|| Error::not_found(format!("zone for {}", domain)))?;

        let records = self.provider.list_records(domain, false).await?;
        let (record_type, proxied) = records
            .iter()
            .find(|r| r.record_type.is_address())
            .map(|r| (r.record_type.clone(), r.proxied))
            .unwrap_or((RecordType::A, false));

        Ok(TaskSpec::new(domain, secs, zone_id)
            .record_type(record_type)
            .proxied(proxied)
            .owner(owner))
    }

    pub(super) async fn on_stop_menu(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        action: Action,
    ) -> Ack {
        match action {
            Action::StopDdns(domain) => {
                if !self.scheduler.stop(&domain) {
                    return Ack::Toast(format!("No DDNS task for {}", domain));
                }
                info!("Chat {}: stopped DDNS for {}", chat_id, domain);
                let text = format!("Stopped DDNS for {}.", domain);
                self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
                    .await;
                Ack::Done
            }
            Action::StopAllDdns => {
                let count = self.scheduler.stop_all();
                info!("Chat {}: stopped {} DDNS task(s)", chat_id, count);
                let text = format!("Stopped {} DDNS task(s).", count);
                self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
                    .await;
                Ack::Done
            }
            Action::CancelStopDdns => {
                if let Some(message_id) = message_id {
                    self.discard(chat_id, message_id).await;
                }
                Ack::Done
            }
            _ => Ack::Expired,
        }
    }
}

fn already_running(domain: &str) -> String {
    format!(
        "DDNS is already running for {}. Stop it first with /stopddns.",
        domain
    )
}
