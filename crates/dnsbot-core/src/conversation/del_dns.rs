//! `/deldns`: domain → subdomain → confirm → delete every record for the name

use tracing::{info, warn};

use super::{Ack, ConversationEngine, menu};
use crate::error::Result;
use crate::model::MessageId;
use crate::session::{Session, SessionState};
use crate::traits::MessageOptions;

impl ConversationEngine {
    pub(super) async fn ask_confirm_delete(
        &self,
        mut session: Session,
        message_id: Option<MessageId>,
        domain: String,
    ) -> Result<Ack> {
        let (text, options) = menu::confirm_delete_all(&domain);
        session.domain = Some(domain);
        session.state = SessionState::WaitingConfirmDelete;
        self.advance(session, message_id, &text, &options).await
    }

    pub(super) async fn confirm_delete_all(
        &self,
        session: Session,
        message_id: Option<MessageId>,
    ) -> Result<Ack> {
        let Some(domain) = session.domain.clone() else {
            return Ok(Ack::Expired);
        };
        let chat_id = session.chat_id;

        // Only the handler that removes the session may go on to the provider
        if !self.sessions.delete(chat_id).await? {
            return Ok(Ack::Expired);
        }

        let text = match self.provider.delete_all_records_for_domain(&domain).await {
            Ok(0) => format!("No records found for {}.", domain),
            Ok(count) => {
                info!("Chat {}: deleted {} record(s) for {}", chat_id, count, domain);
                format!("Deleted {} record(s) for {}.", count, domain)
            }
            Err(e) => {
                warn!("Chat {}: deleting {} failed: {}", chat_id, domain, e);
                format!("Failed to delete records for {}: {}", domain, e)
            }
        };

        self.edit_or_reply(chat_id, message_id, &text, &MessageOptions::plain())
            .await;
        Ok(Ack::Done)
    }
}
