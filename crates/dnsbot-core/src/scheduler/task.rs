//! DDNS task records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::model::{ChatId, RecordType};

/// Everything needed to start a DDNS task
///
/// `record_type` and `zone_id` are resolved once, by the caller, before the
/// task is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub domain: String,
    pub interval_secs: u64,
    pub record_type: RecordType,
    pub zone_id: String,
    pub proxied: bool,
    /// Chat to notify when the record changes
    pub owner: Option<ChatId>,
}

impl TaskSpec {
    pub fn new(domain: impl Into<String>, interval_secs: u64, zone_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            interval_secs,
            record_type: RecordType::A,
            zone_id: zone_id.into(),
            proxied: false,
            owner: None,
        }
    }

    pub fn record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub fn proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    pub fn owner(mut self, owner: ChatId) -> Self {
        self.owner = Some(owner);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Stopped,
}

/// A registered DDNS task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdnsTask {
    /// Registration id; a restarted task for the same domain gets a new one
    pub id: u64,
    pub domain: String,
    pub interval_secs: u64,
    pub record_type: RecordType,
    /// Zone found when the task was set up, shown by `/ddnsstatus`
    ///
    /// Ticks upsert by name and let the provider find the zone again, so a
    /// record moved to another zone keeps being updated.
    pub zone_id: String,
    pub proxied: bool,
    pub owner: Option<ChatId>,
    /// Last address successfully written to the provider
    pub last_applied_ip: Option<IpAddr>,
    /// A tick is running for this task right now
    pub tick_in_flight: bool,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// When the last tick finished (success or failure)
    pub last_checked: Option<DateTime<Utc>>,
}

impl DdnsTask {
    pub(crate) fn from_spec(id: u64, spec: TaskSpec, now: DateTime<Utc>) -> Self {
        Self {
            id,
            domain: spec.domain,
            interval_secs: spec.interval_secs,
            record_type: spec.record_type,
            zone_id: spec.zone_id,
            proxied: spec.proxied,
            owner: spec.owner,
            last_applied_ip: None,
            tick_in_flight: false,
            status: TaskStatus::Running,
            created_at: now,
            last_checked: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }
}

/// Handle returned by [`DdnsScheduler::start`](super::DdnsScheduler::start)
///
/// Identifies one registration. Stopping goes through the scheduler by domain;
/// the id tells a restarted task apart from the one this handle was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub id: u64,
    pub domain: String,
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick for the same task was still running
    Skipped,
    /// Current address equals the last applied one; no provider call made
    Unchanged(IpAddr),
    /// The provider was asked to point the record at `current`
    Updated {
        previous: Option<IpAddr>,
        current: IpAddr,
    },
    /// Lookup or provider call failed; `last_applied_ip` untouched
    Failed(String),
    /// The task was stopped (or replaced) before the tick finished; result discarded
    Cancelled,
}
