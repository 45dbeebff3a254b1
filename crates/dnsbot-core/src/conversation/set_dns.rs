//! `/setdns`: domain → subdomain → IP → proxy → upsert

use std::net::IpAddr;

use tracing::{info, warn};

use super::{Ack, ConversationEngine, menu};
use crate::error::Result;
use crate::model::{MessageId, RecordType};
use crate::session::{Session, SessionState};
use crate::traits::MessageOptions;

impl ConversationEngine {
    pub(super) async fn ask_ip(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        domain: String,
    ) -> Result<Ack> {
        let (text, options) = menu::ip_prompt(&domain);
        session.domain = Some(domain);
        session.state = SessionState::WaitingIp;
        self.advance(session, message_id, &text, &options).await
    }

    pub(super) async fn on_ip(&self, mut session: Session, text: &str) -> Result<()> {
        let Some(domain) = session.domain.clone() else {
            return Ok(());
        };

        let ip: IpAddr = match text.parse() {
            Ok(ip) => ip,
            Err(_) => {
                let (prompt, options) = menu::ip_prompt(&domain);
                let text = format!("\"{}\" is not a valid IPv4 or IPv6 address.\n\n{}", text, prompt);
                return self.reprompt(session, &text, &options).await;
            }
        };

        session.ip_address = Some(ip);
        session.record_type = Some(RecordType::for_ip(&ip));
        session.state = SessionState::WaitingProxy;

        let (text, options) = menu::proxy_prompt(&domain, false);
        self.advance(session, None, &text, &options).await?;
        Ok(())
    }

    /// Last step: one upsert, then the session is gone whatever the result
    pub(super) async fn apply_set(
        &self,
        session: Session,
        message_id: Option<MessageId>,
        proxied: bool,
    ) -> Result<Ack> {
        let (Some(domain), Some(ip)) = (session.domain.clone(), session.ip_address) else {
            return Ok(Ack::Expired);
        };
        let record_type = session
            .record_type
            .clone()
            .unwrap_or_else(|| RecordType::for_ip(&ip));
        let chat_id = session.chat_id;

        // Only the handler that removes the session may go on to the provider
        if !self.sessions.delete(chat_id).await? {
            return Ok(Ack::Expired);
        }

        let text = match self
            .provider
            .upsert_record(&domain, ip, record_type, proxied)
            .await
        {
            Ok(outcome) => {
                info!("Chat {}: {}", chat_id, outcome.describe(&domain));
                format!(
                    "{} ({})",
                    outcome.describe(&domain),
                    if proxied { "proxied" } else { "DNS only" }
                )
            }
            Err(e) => {
                warn!("Chat {}: setting {} failed: {}", chat_id, domain, e);
                format!("Failed to set {}: {}", domain, e)
            }
        };

        self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
            .await;
        Ok(Ack::Done)
    }
}
