//! `/getdns` and `/getdnsall`: record lists, paging, and per-record update/delete
//!
//! Update and delete always act on `Session::selected_record`, the snapshot
//! entry captured when the record was picked. A list can hold several records
//! with the same name, so nothing here looks a record up by name again.

use std::net::IpAddr;

use tracing::{debug, info, warn};

use super::{Ack, ConversationEngine, menu};
use crate::error::Result;
use crate::model::{IpFamily, MessageId};
use crate::pagination::RecordKey;
use crate::session::{Session, SessionState};
use crate::traits::MessageOptions;

impl ConversationEngine {
    /// Fetch the records named exactly `domain`
    pub(super) async fn query(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        domain: String,
    ) -> Result<Ack> {
        let chat_id = session.chat_id;
        let state = session.state;

        let result = self.provider.list_records(&domain, false).await;

        let Some(mut session) = self.reload(chat_id, state).await? else {
            return Ok(Ack::Expired);
        };

        let records = match result {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => {
                if !self.sessions.delete(chat_id).await? {
                    return Ok(Ack::Expired);
                }
                let text = format!("No records found for {}.", domain);
                self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
                    .await;
                return Ok(Ack::Done);
            }
            Err(e) => {
                warn!("Chat {}: listing {} failed: {}", chat_id, domain, e);
                if !self.sessions.delete(chat_id).await? {
                    return Ok(Ack::Expired);
                }
                let text = format!("Failed to fetch records for {}: {}", domain, e);
                self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
                    .await;
                return Ok(Ack::Done);
            }
        };

        debug!("Chat {}: {} record(s) for {}", chat_id, records.len(), domain);
        session.domain = Some(domain);
        session.include_all_in_zone = false;
        session.load_records(records, self.settings.page_size);
        session.state = SessionState::ViewingDnsRecords;

        self.show_list(session, message_id).await
    }

    /// Fetch every record in the zone of `domain`
    ///
    /// The session survives an empty or failed lookup so another domain can
    /// be picked from the same menu.
    pub(super) async fn list_zone(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        domain: String,
    ) -> Result<Ack> {
        if !self.settings.knows_domain(&domain) {
            return Ok(Ack::Expired);
        }
        let chat_id = session.chat_id;
        let state = session.state;

        let result = self.provider.list_records(&domain, true).await;

        let Some(mut session) = self.reload(chat_id, state).await? else {
            return Ok(Ack::Expired);
        };

        let failure = match result {
            Ok(records) if !records.is_empty() => {
                debug!("Chat {}: {} record(s) in zone of {}", chat_id, records.len(), domain);
                session.root_domain = Some(domain.clone());
                session.domain = Some(domain);
                session.include_all_in_zone = true;
                session.load_records(records, self.settings.page_size);
                session.state = SessionState::ViewingDnsRecords;
                return self.show_list(session, message_id).await;
            }
            Ok(_) => format!("No records found in the zone of {}.", domain),
            Err(e) => {
                warn!("Chat {}: listing zone of {} failed: {}", chat_id, domain, e);
                format!("Failed to fetch records for {}: {}", domain, e)
            }
        };

        let sent = self
            .reply(chat_id, &failure, &MessageOptions::plain())
            .await;
        session.track(sent);
        self.sessions.put(session).await?;
        Ok(Ack::Done)
    }

    /// Render the current page and store the session
    async fn show_list(&self, mut session: Session, message_id: Option<MessageId>) -> Result<Ack> {
        let layout = session.render_page();
        let domain = session.domain.clone().unwrap_or_default();
        let title = if session.include_all_in_zone {
            format!("All records in the zone of {}", domain)
        } else {
            format!("Records for {}", domain)
        };

        let (text, options) = menu::record_list(&title, &session.dns_records, &layout);
        self.advance(session, message_id, &text, &options).await
    }

    /// Move one page; a move past either end changes nothing
    pub(super) async fn turn_page(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        forward: bool,
    ) -> Result<Ack> {
        let in_list = session.state == SessionState::ViewingDnsRecords;
        let moved = if forward {
            session.page.next_page()
        } else {
            session.page.prev_page()
        };

        if !moved && in_list {
            return Ok(Ack::Done);
        }
        if !in_list {
            session.return_to_list();
        }
        self.show_list(session, message_id).await
    }

    pub(super) async fn finish_browsing(
        &self,
        session: Session,
        message_id: Option<MessageId>,
    ) -> Result<Ack> {
        let chat_id = session.chat_id;
        if !self.sessions.delete(chat_id).await? {
            return Ok(Ack::Expired);
        }

        if let Some(current) = message_id {
            self.discard(chat_id, current).await;
        }
        for tracked in session
            .tracked_message_ids
            .iter()
            .filter(|id| Some(**id) != message_id)
        {
            self.discard(chat_id, *tracked).await;
        }

        self.reply(chat_id, "Finished.", &MessageOptions::plain())
            .await;
        Ok(Ack::Done)
    }

    pub(super) async fn select_record(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        key: RecordKey,
    ) -> Result<Ack> {
        let Some(record) = session.resolve_selector(key).cloned() else {
            debug!("Chat {}: selector {} is not on the current page", session.chat_id, key);
            return Ok(Ack::Expired);
        };

        let (text, options) = menu::record_detail(&record);
        session.selected_record = Some(record);
        session.delete_confirmation_pending = false;
        session.ip_address = None;
        session.state = SessionState::ManagingDnsRecord;
        self.advance(session, message_id, &text, &options).await
    }

    pub(super) async fn back_to_list(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
    ) -> Result<Ack> {
        session.return_to_list();
        self.show_list(session, message_id).await
    }

    pub(super) async fn begin_update(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
    ) -> Result<Ack> {
        let Some(record) = session.selected_record.clone() else {
            return Ok(Ack::Expired);
        };
        if !record.record_type.is_address() {
            return Ok(Ack::Toast(
                "Only A and AAAA records can be updated".to_string(),
            ));
        }

        let (text, options) = menu::new_ip_prompt(&record);
        session.ip_address = None;
        session.delete_confirmation_pending = false;
        session.state = SessionState::WaitingDnsUpdateNewIp;
        self.advance(session, message_id, &text, &options).await
    }

    pub(super) async fn on_new_ip(&self, mut session: Session, text: &str) -> Result<()> {
        let Some(record) = session.selected_record.clone() else {
            return Ok(());
        };
        let (prompt, options) = menu::new_ip_prompt(&record);

        let ip: IpAddr = match text.parse() {
            Ok(ip) => ip,
            Err(_) => {
                let text = format!("\"{}\" is not a valid IP address.\n\n{}", text, prompt);
                return self.reprompt(session, &text, &options).await;
            }
        };

        if record.record_type.family() != Some(IpFamily::of(&ip)) {
            let text = format!(
                "{} records hold {} addresses, {} is not one.\n\n{}",
                record.record_type,
                record
                    .record_type
                    .family()
                    .map(|f| f.to_string())
                    .unwrap_or_default(),
                ip,
                prompt
            );
            return self.reprompt(session, &text, &options).await;
        }

        session.ip_address = Some(ip);
        session.state = SessionState::WaitingNewProxy;

        let (text, options) = menu::proxy_prompt(&record.name, true);
        self.advance(session, None, &text, &options).await?;
        Ok(())
    }

    /// Overwrite the selected record; the session ends whatever the result
    pub(super) async fn apply_update(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        proxied: bool,
    ) -> Result<Ack> {
        let (Some(record), Some(ip)) = (session.selected_record.clone(), session.ip_address) else {
            return Ok(Ack::Expired);
        };
        let chat_id = session.chat_id;

        // Only the handler that removes the session may go on to the provider
        if !self.sessions.delete(chat_id).await? {
            return Ok(Ack::Expired);
        }

        let result = self
            .provider
            .update_record(
                &record.zone_id,
                &record.id,
                &record.name,
                ip,
                record.record_type.clone(),
                proxied,
            )
            .await;

        let text = match result {
            Ok(()) => {
                info!("Chat {}: updated {} {} to {}", chat_id, record.record_type, record.name, ip);
                format!(
                    "Updated {} {}: {} -> {} ({})",
                    record.record_type,
                    record.name,
                    record.content,
                    ip,
                    if proxied { "proxied" } else { "DNS only" }
                )
            }
            Err(e) => {
                warn!("Chat {}: updating {} failed: {}", chat_id, record.name, e);
                format!("Failed to update {}: {}", record.name, e)
            }
        };

        self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
            .await;
        Ok(Ack::Done)
    }

    pub(super) async fn ask_delete_record(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
    ) -> Result<Ack> {
        let Some(record) = session.selected_record.clone() else {
            return Ok(Ack::Expired);
        };

        let (text, options) = menu::confirm_delete_record(&record);
        session.delete_confirmation_pending = true;
        self.advance(session, message_id, &text, &options).await
    }

    /// Delete the selected record; only valid right after the confirmation prompt
    pub(super) async fn delete_selected(
        &self,
        session: Session,
        message_id: Option<MessageId>,
    ) -> Result<Ack> {
        if !session.delete_confirmation_pending {
            return Ok(Ack::Expired);
        }
        let Some(record) = session.selected_record.clone() else {
            return Ok(Ack::Expired);
        };
        let chat_id = session.chat_id;

        // Only the handler that removes the session may go on to the provider
        if !self.sessions.delete(chat_id).await? {
            return Ok(Ack::Expired);
        }

        let text = match self.provider.delete_record(&record.zone_id, &record.id).await {
            Ok(()) => {
                info!("Chat {}: deleted {} {}", chat_id, record.record_type, record.name);
                format!(
                    "Deleted {} record {} ({}).",
                    record.record_type, record.name, record.content
                )
            }
            Err(e) => {
                warn!("Chat {}: deleting {} failed: {}", chat_id, record.name, e);
                format!("Failed to delete {}: {}", record.name, e)
            }
        };

        self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
            .await;
        Ok(Ack::Done)
    }
}
