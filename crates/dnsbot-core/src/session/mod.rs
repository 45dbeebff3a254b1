//! Per-chat conversation sessions
//!
//! - [`Session`]: the state carried across one multi-step workflow
//! - [`SessionState`]: the fixed set of states the conversation engine dispatches on
//! - [`MemorySessionStore`]: in-memory [`SessionStore`](crate::traits::SessionStore)
//! - [`spawn_reaper`]: periodic idle eviction

mod memory;

pub use memory::MemorySessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::{ChatId, DnsRecordSnapshot, MessageId, RecordType};
use crate::pagination::{PageCursor, PageLayout, RecordKey};
use crate::traits::SessionStore;

/// The workflow a state belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workflow {
    /// Create or update one record (`/setdns`)
    SetDns,
    /// Look up and manage records (`/getdns`, `/getdnsall`)
    GetDns,
    /// Delete every record for a name (`/deldns`)
    DelDns,
    /// Configure a recurring DDNS task (`/ddns`)
    Ddns,
}

/// Conversation state
///
/// Handlers are the only code that moves a session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    SelectingDomainForSet,
    WaitingSubdomainForSet,
    WaitingIp,
    WaitingProxy,

    SelectingDomainForDelete,
    WaitingSubdomainForDelete,
    WaitingConfirmDelete,

    SelectingDomainForQuery,
    WaitingSubdomainInput,
    SelectingDomainForAllDns,
    ViewingDnsRecords,
    ManagingDnsRecord,
    WaitingDnsUpdateNewIp,
    WaitingNewProxy,

    SelectingDomainForDdns,
    WaitingSubdomainForDdns,
    WaitingIntervalForDdns,
}

impl SessionState {
    /// Workflow this state is an interior state of
    pub fn workflow(self) -> Workflow {
        use SessionState::*;
        match self {
            SelectingDomainForSet | WaitingSubdomainForSet | WaitingIp | WaitingProxy => {
                Workflow::SetDns
            }
            SelectingDomainForDelete | WaitingSubdomainForDelete | WaitingConfirmDelete => {
                Workflow::DelDns
            }
            SelectingDomainForQuery
            | WaitingSubdomainInput
            | SelectingDomainForAllDns
            | ViewingDnsRecords
            | ManagingDnsRecord
            | WaitingDnsUpdateNewIp
            | WaitingNewProxy => Workflow::GetDns,
            SelectingDomainForDdns | WaitingSubdomainForDdns | WaitingIntervalForDdns => {
                Workflow::Ddns
            }
        }
    }

    /// Whether free text is meaningful in this state
    pub fn accepts_text(self) -> bool {
        use SessionState::*;
        matches!(
            self,
            WaitingSubdomainForSet
                | WaitingIp
                | WaitingSubdomainForDelete
                | WaitingSubdomainInput
                | WaitingDnsUpdateNewIp
                | WaitingSubdomainForDdns
                | WaitingIntervalForDdns
        )
    }

    /// Whether a record list is on screen (records fetched, cursor valid)
    pub fn has_record_list(self) -> bool {
        matches!(
            self,
            SessionState::ViewingDnsRecords
                | SessionState::ManagingDnsRecord
                | SessionState::WaitingDnsUpdateNewIp
                | SessionState::WaitingNewProxy
        )
    }
}

/// Conversation state for one chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub chat_id: ChatId,
    pub state: SessionState,

    /// Fully-qualified name being worked on
    pub domain: Option<String>,
    /// Root domain picked from the menu
    pub root_domain: Option<String>,
    /// Validated address collected from the user
    pub ip_address: Option<IpAddr>,
    pub record_type: Option<RecordType>,
    pub proxied: Option<bool>,

    /// Records fetched at query time; immutable until re-fetched
    pub dns_records: Vec<DnsRecordSnapshot>,
    /// Whether `dns_records` covers the whole zone
    pub include_all_in_zone: bool,
    pub page: PageCursor,
    /// Selector key → index into `dns_records`, for the page last rendered
    pub page_record_indices: HashMap<RecordKey, usize>,
    /// Verbatim copy of the snapshot entry picked from the list
    pub selected_record: Option<DnsRecordSnapshot>,
    /// Set once the delete confirmation for `selected_record` is on screen
    pub delete_confirmation_pending: bool,

    /// Messages sent during this session, for bulk cleanup
    pub tracked_message_ids: Vec<MessageId>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Fresh session entering `state`
    pub fn new(chat_id: ChatId, state: SessionState, now: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            state,
            domain: None,
            root_domain: None,
            ip_address: None,
            record_type: None,
            proxied: None,
            dns_records: Vec::new(),
            include_all_in_zone: false,
            page: PageCursor::default(),
            page_record_indices: HashMap::new(),
            selected_record: None,
            delete_confirmation_pending: false,
            tracked_message_ids: Vec::new(),
            last_activity: now,
        }
    }

    pub fn workflow(&self) -> Workflow {
        self.state.workflow()
    }

    /// Replace the record snapshot and reset the cursor to the first page
    pub fn load_records(&mut self, records: Vec<DnsRecordSnapshot>, page_size: usize) {
        self.page = PageCursor::new(records.len(), page_size);
        self.dns_records = records;
        self.page_record_indices.clear();
        self.selected_record = None;
        self.delete_confirmation_pending = false;
    }

    /// Lay out the current page and regenerate the selector map for it
    pub fn render_page(&mut self) -> PageLayout {
        let layout = self.page.layout(self.dns_records.len());
        self.page_record_indices = layout.selector_map();
        layout
    }

    /// Resolve a selector key against the page last rendered
    pub fn resolve_selector(&self, key: RecordKey) -> Option<&DnsRecordSnapshot> {
        self.page_record_indices
            .get(&key)
            .and_then(|&index| self.dns_records.get(index))
    }

    /// Leave record management and go back to the list
    pub fn return_to_list(&mut self) {
        self.state = SessionState::ViewingDnsRecords;
        self.selected_record = None;
        self.ip_address = None;
        self.delete_confirmation_pending = false;
    }

    pub fn track(&mut self, message_id: Option<MessageId>) {
        if let Some(id) = message_id {
            self.tracked_message_ids.push(id);
        }
    }
}

/// Spawn the idle reaper
///
/// Every `every`, evicts sessions idle for longer than `max_idle`. The task
/// runs until the returned handle is aborted.
pub fn spawn_reaper(
    store: Arc<dyn SessionStore>,
    every: Duration,
    max_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting session reaper (every={:?}, max_idle={:?})",
            every, max_idle
        );

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.evict_idle(max_idle).await {
                Ok(evicted) if evicted.is_empty() => debug!("No idle sessions"),
                Ok(evicted) => info!("Evicted {} idle session(s): {:?}", evicted.len(), evicted),
                Err(e) => warn!("Idle session eviction failed: {}", e),
            }
        }
    })
}
