//! Menu actions
//!
//! Every button the bot renders carries an [`Action`]. On the wire an action is
//! a short ASCII payload (`proxy_yes`, `select_domain_set_example.com`,
//! `dns_r_p1r3`, ...); [`Action::parse`] and the `Display` impl are the only
//! places that know the encoding.

use std::fmt;

use crate::pagination::RecordKey;
use crate::session::{SessionState, Workflow};

/// What a domain picked from a menu will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainPurpose {
    /// `/setdns`
    Set,
    /// `/getdns`
    Query,
    /// `/getdnsall`
    All,
    /// `/deldns`
    Delete,
    /// `/ddns`
    Ddns,
}

impl DomainPurpose {
    fn tag(self) -> &'static str {
        match self {
            DomainPurpose::Set => "set",
            DomainPurpose::Query => "query",
            DomainPurpose::All => "all",
            DomainPurpose::Delete => "del",
            DomainPurpose::Ddns => "ddns",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "set" => Some(DomainPurpose::Set),
            "query" => Some(DomainPurpose::Query),
            "all" => Some(DomainPurpose::All),
            "del" => Some(DomainPurpose::Delete),
            "ddns" => Some(DomainPurpose::Ddns),
            _ => None,
        }
    }

    /// State in which a domain for this purpose is being picked
    pub fn selecting_state(self) -> SessionState {
        match self {
            DomainPurpose::Set => SessionState::SelectingDomainForSet,
            DomainPurpose::Query => SessionState::SelectingDomainForQuery,
            DomainPurpose::All => SessionState::SelectingDomainForAllDns,
            DomainPurpose::Delete => SessionState::SelectingDomainForDelete,
            DomainPurpose::Ddns => SessionState::SelectingDomainForDdns,
        }
    }

    /// State in which a subdomain for this purpose is being typed
    pub fn subdomain_state(self) -> Option<SessionState> {
        match self {
            DomainPurpose::Set => Some(SessionState::WaitingSubdomainForSet),
            DomainPurpose::Query => Some(SessionState::WaitingSubdomainInput),
            DomainPurpose::Delete => Some(SessionState::WaitingSubdomainForDelete),
            DomainPurpose::Ddns => Some(SessionState::WaitingSubdomainForDdns),
            DomainPurpose::All => None,
        }
    }
}

/// Which cancel button was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelTarget {
    /// `cancel_setdns`
    SetDns,
    /// `cancel_getdns`
    GetDns,
    /// `cancel_deldns`
    DelDns,
    /// `cancel_delete` (from the delete confirmation)
    Delete,
    /// `cancel_ddns`
    Ddns,
}

impl CancelTarget {
    /// Workflow this cancel button aborts
    pub fn workflow(self) -> Workflow {
        match self {
            CancelTarget::SetDns => Workflow::SetDns,
            CancelTarget::GetDns => Workflow::GetDns,
            CancelTarget::DelDns | CancelTarget::Delete => Workflow::DelDns,
            CancelTarget::Ddns => Workflow::Ddns,
        }
    }
}

/// Whether an action is a fixed name or carries parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Named,
    Parameterized,
}

/// A menu action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Abort a workflow and drop the session
    Cancel(CancelTarget),
    /// Pick a root domain from the menu
    SelectDomain {
        purpose: DomainPurpose,
        domain: String,
    },
    /// Use the picked root domain itself instead of typing a subdomain
    UseRootDomain(DomainPurpose),
    /// Answer the proxy question of `/setdns`
    Proxy(bool),
    /// Confirm `/deldns`
    ConfirmDelete,
    PrevPage,
    NextPage,
    PageInfo,
    /// Finish browsing and clean up every message of the session
    Done,
    /// Pick a record from the page on screen
    SelectRecord(RecordKey),
    UpdateRecord,
    DeleteRecord,
    BackToList,
    ConfirmDeleteRecord,
    CancelDeleteRecord,
    CancelUpdateRecord,
    /// Answer the proxy question of a record update
    UpdateProxy(bool),
    /// Pick a preset DDNS interval (seconds)
    DdnsInterval(u64),
    /// Stop the DDNS task for a domain
    StopDdns(String),
    StopAllDdns,
    CancelStopDdns,
}

impl Action {
    /// Decode a wire payload
    ///
    /// Unknown payloads decode to `None`; the caller treats them as stale.
    pub fn parse(data: &str) -> Option<Action> {
        let action = match data {
            "cancel_setdns" => Action::Cancel(CancelTarget::SetDns),
            "cancel_getdns" => Action::Cancel(CancelTarget::GetDns),
            "cancel_deldns" => Action::Cancel(CancelTarget::DelDns),
            "cancel_delete" => Action::Cancel(CancelTarget::Delete),
            "cancel_ddns" => Action::Cancel(CancelTarget::Ddns),
            "set_root_domain" => Action::UseRootDomain(DomainPurpose::Set),
            "query_root_domain" => Action::UseRootDomain(DomainPurpose::Query),
            "del_root_domain" => Action::UseRootDomain(DomainPurpose::Delete),
            "set_root_domain_ddns" => Action::UseRootDomain(DomainPurpose::Ddns),
            "proxy_yes" => Action::Proxy(true),
            "proxy_no" => Action::Proxy(false),
            "confirm_delete" => Action::ConfirmDelete,
            "dns_prev_page" => Action::PrevPage,
            "dns_next_page" => Action::NextPage,
            "dns_page_info" => Action::PageInfo,
            "dns_done" => Action::Done,
            "dns_update_record" => Action::UpdateRecord,
            "dns_delete_record" => Action::DeleteRecord,
            "dns_back_to_list" => Action::BackToList,
            "confirm_delete_record" => Action::ConfirmDeleteRecord,
            "cancel_delete_record" => Action::CancelDeleteRecord,
            "cancel_update_dns" => Action::CancelUpdateRecord,
            "dns_update_proxy_yes" => Action::UpdateProxy(true),
            "dns_update_proxy_no" => Action::UpdateProxy(false),
            "stop_all_ddns" => Action::StopAllDdns,
            "cancel_stop_ddns" => Action::CancelStopDdns,
            _ => return Self::parse_parameterized(data),
        };
        Some(action)
    }

    fn parse_parameterized(data: &str) -> Option<Action> {
        if let Some(rest) = data.strip_prefix("select_domain_") {
            let (tag, domain) = rest.split_once('_')?;
            if domain.is_empty() {
                return None;
            }
            return Some(Action::SelectDomain {
                purpose: DomainPurpose::from_tag(tag)?,
                domain: domain.to_string(),
            });
        }

        if let Some(key) = data.strip_prefix("dns_r_") {
            return key.parse().ok().map(Action::SelectRecord);
        }

        if let Some(secs) = data.strip_prefix("ddns_interval_") {
            return secs.parse().ok().map(Action::DdnsInterval);
        }

        if let Some(domain) = data.strip_prefix("stop_ddns_") {
            if domain.is_empty() {
                return None;
            }
            return Some(Action::StopDdns(domain.to_string()));
        }

        None
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SelectDomain { .. }
            | Action::SelectRecord(_)
            | Action::DdnsInterval(_)
            | Action::StopDdns(_) => ActionKind::Parameterized,
            _ => ActionKind::Named,
        }
    }

    /// Whether the action operates on a conversation session
    ///
    /// The DDNS stop menu is answered without one.
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Action::StopDdns(_) | Action::StopAllDdns | Action::CancelStopDdns
        )
    }

    /// Transition table: whether this action is valid for a session in `state`
    ///
    /// Anything not listed here is stale and must leave the session untouched.
    pub fn accepted_in(&self, state: SessionState) -> bool {
        use SessionState::*;
        match self {
            Action::Cancel(target) => state.workflow() == target.workflow(),
            Action::SelectDomain { purpose, .. } => match purpose {
                DomainPurpose::All => matches!(
                    state,
                    SelectingDomainForAllDns | ViewingDnsRecords | ManagingDnsRecord
                ),
                other => state == other.selecting_state(),
            },
            Action::UseRootDomain(purpose) => purpose.subdomain_state() == Some(state),
            Action::Proxy(_) => state == WaitingProxy,
            Action::ConfirmDelete => state == WaitingConfirmDelete,
            Action::PrevPage | Action::NextPage | Action::PageInfo | Action::SelectRecord(_) => {
                matches!(state, ViewingDnsRecords | ManagingDnsRecord)
            }
            Action::Done => state.workflow() == Workflow::GetDns,
            Action::UpdateRecord
            | Action::DeleteRecord
            | Action::ConfirmDeleteRecord
            | Action::CancelDeleteRecord => state == ManagingDnsRecord,
            Action::BackToList => matches!(
                state,
                ManagingDnsRecord | WaitingDnsUpdateNewIp | WaitingNewProxy
            ),
            Action::CancelUpdateRecord => {
                matches!(state, WaitingDnsUpdateNewIp | WaitingNewProxy)
            }
            Action::UpdateProxy(_) => state == WaitingNewProxy,
            Action::DdnsInterval(_) => state == WaitingIntervalForDdns,
            Action::StopDdns(_) | Action::StopAllDdns | Action::CancelStopDdns => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Cancel(CancelTarget::SetDns) => f.write_str("cancel_setdns"),
            Action::Cancel(CancelTarget::GetDns) => f.write_str("cancel_getdns"),
            Action::Cancel(CancelTarget::DelDns) => f.write_str("cancel_deldns"),
            Action::Cancel(CancelTarget::Delete) => f.write_str("cancel_delete"),
            Action::Cancel(CancelTarget::Ddns) => f.write_str("cancel_ddns"),
            Action::SelectDomain { purpose, domain } => {
                write!(f, "select_domain_{}_{}", purpose.tag(), domain)
            }
            Action::UseRootDomain(DomainPurpose::Set) => f.write_str("set_root_domain"),
            Action::UseRootDomain(DomainPurpose::Query) => f.write_str("query_root_domain"),
            Action::UseRootDomain(DomainPurpose::Delete) => f.write_str("del_root_domain"),
            Action::UseRootDomain(DomainPurpose::Ddns) => f.write_str("set_root_domain_ddns"),
            // No root shortcut exists for the zone-wide listing
            Action::UseRootDomain(DomainPurpose::All) => f.write_str("all_root_domain"),
            Action::Proxy(true) => f.write_str("proxy_yes"),
            Action::Proxy(false) => f.write_str("proxy_no"),
            Action::ConfirmDelete => f.write_str("confirm_delete"),
            Action::PrevPage => f.write_str("dns_prev_page"),
            Action::NextPage => f.write_str("dns_next_page"),
            Action::PageInfo => f.write_str("dns_page_info"),
            Action::Done => f.write_str("dns_done"),
            Action::SelectRecord(key) => write!(f, "dns_r_{}", key),
            Action::UpdateRecord => f.write_str("dns_update_record"),
            Action::DeleteRecord => f.write_str("dns_delete_record"),
            Action::BackToList => f.write_str("dns_back_to_list"),
            Action::ConfirmDeleteRecord => f.write_str("confirm_delete_record"),
            Action::CancelDeleteRecord => f.write_str("cancel_delete_record"),
            Action::CancelUpdateRecord => f.write_str("cancel_update_dns"),
            Action::UpdateProxy(true) => f.write_str("dns_update_proxy_yes"),
            Action::UpdateProxy(false) => f.write_str("dns_update_proxy_no"),
            Action::DdnsInterval(secs) => write!(f, "ddns_interval_{}", secs),
            Action::StopDdns(domain) => write!(f, "stop_ddns_{}", domain),
            Action::StopAllDdns => f.write_str("stop_all_ddns"),
            Action::CancelStopDdns => f.write_str("cancel_stop_ddns"),
        }
    }
}
