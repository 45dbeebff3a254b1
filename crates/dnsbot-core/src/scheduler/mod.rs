//! DDNS scheduler
//!
//! Owns the registry `domain -> DdnsTask` and one timer per task. Each timer
//! elapse spawns a tick that resolves the current public address, compares it
//! with the last address the task wrote, and upserts the record when it moved.
//!
//! ## Tick flow
//!
//! ```text
//!  timer ──► tick ──► in flight? ── yes ──► skip
//!                        │
//!                        no
//!                        ▼
//!              IpResolver::current_ip
//!                        │
//!           same as last_applied_ip? ── yes ──► done (no provider call)
//!                        │
//!                        no
//!                        ▼
//!            DnsProvider::upsert_record
//!                        │
//!        task still registered? ── no ──► discard
//!                        │
//!                       yes
//!                        ▼
//!        record last_applied_ip, notify owner
//! ```
//!
//! ## Concurrency
//!
//! The registry sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Ticks run detached from the timer so a slow lookup cannot delay
//! the timer itself; overlap is caught by the `tick_in_flight` flag instead.
//! The flag is cleared by a guard, so a tick future that is dropped mid-flight
//! still frees its task.
//! Stopping a task aborts its timer; a tick already running finishes its
//! external calls but finds the registration gone and drops its result.

mod task;

pub use task::{DdnsTask, TaskHandle, TaskSpec, TaskStatus, TickOutcome};

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::model::{ChatId, IpFamily, RecordType};
use crate::traits::{DnsProvider, IpResolver, MessageOptions, MessagingGateway, UpsertOutcome};

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A task was registered
    TaskStarted { domain: String, interval_secs: u64 },

    /// A tick found the previous one still running
    TickSkipped { domain: String },

    /// Current address matches what was last written
    IpUnchanged { domain: String, ip: IpAddr },

    /// The record now points at `current`
    RecordUpdated {
        domain: String,
        previous: Option<IpAddr>,
        current: IpAddr,
    },

    /// Lookup or provider call failed; will retry next tick
    TickFailed { domain: String, error: String },

    /// A task was removed
    TaskStopped { domain: String },
}

struct Entry {
    task: DdnsTask,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    provider: Arc<dyn DnsProvider>,
    resolver: Arc<dyn IpResolver>,
    notifier: Option<Arc<dyn MessagingGateway>>,
    clock: Arc<dyn Clock>,
    min_interval_secs: u64,
    max_interval_secs: u64,
    tasks: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

/// Registry of recurring per-domain DDNS tasks
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct DdnsScheduler {
    inner: Arc<Inner>,
}

impl DdnsScheduler {
    /// Create a scheduler
    ///
    /// # Parameters
    ///
    /// - `provider`: applies record updates
    /// - `resolver`: answers "what is our address now"
    /// - `notifier`: used to tell a task's owner chat about changes (optional)
    /// - `clock`: stamps `created_at` / `last_checked`
    /// - `config`: interval bounds and event channel capacity
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver)
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        resolver: Arc<dyn IpResolver>,
        notifier: Option<Arc<dyn MessagingGateway>>,
        clock: Arc<dyn Clock>,
        config: &DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        let inner = Inner {
            provider,
            resolver,
            notifier,
            clock,
            min_interval_secs: config.min_interval_secs,
            max_interval_secs: config.max_interval_secs,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            event_tx,
        };

        Ok((
            Self {
                inner: Arc::new(inner),
            },
            event_rx,
        ))
    }

    /// Register a task and schedule its first tick one interval from now
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateTask`] if a task for the domain is already running;
    ///   the running task is left untouched
    /// - [`Error::InvalidInput`] for an out-of-range interval or a record type
    ///   that does not hold an address
    pub fn start(&self, spec: TaskSpec) -> Result<TaskHandle> {
        let inner = &self.inner;

        if spec.interval_secs < inner.min_interval_secs
            || spec.interval_secs > inner.max_interval_secs
        {
            return Err(Error::invalid_input(format!(
                "Interval must be between {} and {} seconds, got {}",
                inner.min_interval_secs, inner.max_interval_secs, spec.interval_secs
            )));
        }
        if !spec.record_type.is_address() {
            return Err(Error::invalid_input(format!(
                "DDNS needs an A or AAAA record, got {}",
                spec.record_type
            )));
        }

        let mut tasks = inner.tasks();
        if tasks.get(&spec.domain).is_some_and(|e| e.task.is_running()) {
            return Err(Error::DuplicateTask(spec.domain));
        }

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let domain = spec.domain.clone();
        let interval_secs = spec.interval_secs;
        let task = DdnsTask::from_spec(id, spec, inner.clock.now());

        let timer = tokio::spawn(timer_loop(
            Arc::downgrade(&self.inner),
            domain.clone(),
            id,
            Duration::from_secs(interval_secs),
        ));

        tasks.insert(
            domain.clone(),
            Entry {
                task,
                timer: Some(timer),
            },
        );
        drop(tasks);

        info!("Started DDNS task for {} (every {}s)", domain, interval_secs);
        inner.emit_event(SchedulerEvent::TaskStarted {
            domain: domain.clone(),
            interval_secs,
        });

        Ok(TaskHandle { id, domain })
    }

    /// Stop and remove the task for `domain`
    ///
    /// # Returns
    ///
    /// Whether a task existed
    pub fn stop(&self, domain: &str) -> bool {
        let removed = self.inner.tasks().remove(domain);
        match removed {
            Some(entry) => {
                self.inner.retire(entry);
                true
            }
            None => false,
        }
    }

    /// Stop every task
    ///
    /// # Returns
    ///
    /// The number of tasks stopped
    pub fn stop_all(&self) -> usize {
        let drained: Vec<Entry> = self.inner.tasks().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            self.inner.retire(entry);
        }
        count
    }

    /// Snapshot of all registered tasks, ordered by domain
    pub fn list(&self) -> Vec<DdnsTask> {
        let mut tasks: Vec<DdnsTask> = self
            .inner
            .tasks()
            .values()
            .map(|e| e.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.domain.cmp(&b.domain));
        tasks
    }

    /// Snapshot of one task
    pub fn get(&self, domain: &str) -> Option<DdnsTask> {
        self.inner.tasks().get(domain).map(|e| e.task.clone())
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.inner.tasks().contains_key(domain)
    }

    pub fn len(&self) -> usize {
        self.inner.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one tick for `domain` now, outside the timer
    ///
    /// Obeys the same in-flight guard as timer ticks.
    pub async fn run_tick(&self, domain: &str) -> TickOutcome {
        self.inner.tick(domain, None).await
    }
}

impl std::fmt::Debug for DdnsScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdnsScheduler")
            .field("tasks", &self.len())
            .finish_non_exhaustive()
    }
}

async fn timer_loop(inner: Weak<Inner>, domain: String, id: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };

        let domain = domain.clone();
        tokio::spawn(async move {
            inner.tick(&domain, Some(id)).await;
        });
    }
}

/// Fields a tick needs, copied out of the registry
struct TickInput {
    id: u64,
    family: IpFamily,
    record_type: RecordType,
    proxied: bool,
    owner: Option<ChatId>,
    last_applied_ip: Option<IpAddr>,
}

enum Reconciled {
    Unchanged(IpAddr),
    Applied {
        previous: Option<IpAddr>,
        current: IpAddr,
        changed: bool,
    },
}

/// Holds `tick_in_flight` for one registration until dropped
struct TickClaim<'a> {
    inner: &'a Inner,
    domain: &'a str,
    id: u64,
}

impl Drop for TickClaim<'_> {
    fn drop(&mut self) {
        let mut tasks = self.inner.tasks();
        if let Some(entry) = tasks.get_mut(self.domain).filter(|e| e.task.id == self.id) {
            entry.task.tick_in_flight = false;
        }
    }
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retire(&self, mut entry: Entry) {
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        entry.task.status = TaskStatus::Stopped;

        info!("Stopped DDNS task for {}", entry.task.domain);
        self.emit_event(SchedulerEvent::TaskStopped {
            domain: entry.task.domain,
        });
    }

    /// Claim the task for one tick
    ///
    /// `expected_id` pins the tick to a registration; timer ticks of a stopped
    /// task must not run against its replacement.
    fn begin_tick(
        &self,
        domain: &str,
        expected_id: Option<u64>,
    ) -> std::result::Result<TickInput, TickOutcome> {
        let mut tasks = self.tasks();
        let entry = tasks.get_mut(domain).ok_or(TickOutcome::Cancelled)?;

        if expected_id.is_some_and(|id| id != entry.task.id) || !entry.task.is_running() {
            return Err(TickOutcome::Cancelled);
        }
        if entry.task.tick_in_flight {
            return Err(TickOutcome::Skipped);
        }

        let family = entry
            .task
            .record_type
            .family()
            .ok_or_else(|| TickOutcome::Failed("record type holds no address".to_string()))?;

        entry.task.tick_in_flight = true;
        Ok(TickInput {
            id: entry.task.id,
            family,
            record_type: entry.task.record_type.clone(),
            proxied: entry.task.proxied,
            owner: entry.task.owner,
            last_applied_ip: entry.task.last_applied_ip,
        })
    }

    async fn tick(&self, domain: &str, expected_id: Option<u64>) -> TickOutcome {
        let input = match self.begin_tick(domain, expected_id) {
            Ok(input) => input,
            Err(TickOutcome::Skipped) => {
                debug!("Tick for {} skipped, previous tick still running", domain);
                self.emit_event(SchedulerEvent::TickSkipped {
                    domain: domain.to_string(),
                });
                return TickOutcome::Skipped;
            }
            Err(outcome) => return outcome,
        };
        // Released on every exit, including a caller dropping this future
        let claim = TickClaim {
            inner: self,
            domain,
            id: input.id,
        };

        let result = self.reconcile(domain, &input).await;

        // Write back only if the registration we claimed is still the live one
        {
            let mut tasks = self.tasks();
            let Some(entry) = tasks.get_mut(domain).filter(|e| e.task.id == input.id) else {
                debug!("DDNS task for {} was stopped mid-tick, discarding result", domain);
                return TickOutcome::Cancelled;
            };

            entry.task.last_checked = Some(self.clock.now());
            if let Ok(Reconciled::Applied { current, .. }) = &result {
                entry.task.last_applied_ip = Some(*current);
            }
        }
        drop(claim);

        match result {
            Ok(Reconciled::Unchanged(ip)) => {
                debug!("{} still at {}, nothing to do", domain, ip);
                self.emit_event(SchedulerEvent::IpUnchanged {
                    domain: domain.to_string(),
                    ip,
                });
                TickOutcome::Unchanged(ip)
            }
            Ok(Reconciled::Applied {
                previous,
                current,
                changed,
            }) => {
                info!("DDNS record {} now points to {}", domain, current);
                self.emit_event(SchedulerEvent::RecordUpdated {
                    domain: domain.to_string(),
                    previous,
                    current,
                });
                if changed {
                    self.notify(input.owner, domain, previous, current).await;
                }
                TickOutcome::Updated { previous, current }
            }
            Err(e) => {
                warn!("DDNS tick for {} failed: {}", domain, e);
                self.emit_event(SchedulerEvent::TickFailed {
                    domain: domain.to_string(),
                    error: e.to_string(),
                });
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    async fn reconcile(&self, domain: &str, input: &TickInput) -> Result<Reconciled> {
        let current = self.resolver.current_ip(input.family).await?;
        if IpFamily::of(&current) != input.family {
            return Err(Error::ip_resolver(format!(
                "{} answered {} for an {} lookup",
                self.resolver.resolver_name(),
                current,
                input.family
            )));
        }

        if input.last_applied_ip == Some(current) {
            return Ok(Reconciled::Unchanged(current));
        }

        let outcome = self
            .provider
            .upsert_record(domain, current, input.record_type.clone(), input.proxied)
            .await?;

        let (previous, changed) = match outcome {
            UpsertOutcome::Updated { previous_ip, .. } => {
                (previous_ip.or(input.last_applied_ip), true)
            }
            UpsertOutcome::Created { .. } => (input.last_applied_ip, true),
            UpsertOutcome::Unchanged { .. } => (input.last_applied_ip, false),
        };

        Ok(Reconciled::Applied {
            previous,
            current,
            changed,
        })
    }

    async fn notify(
        &self,
        owner: Option<ChatId>,
        domain: &str,
        previous: Option<IpAddr>,
        current: IpAddr,
    ) {
        let (Some(chat_id), Some(notifier)) = (owner, &self.notifier) else {
            return;
        };

        let text = match previous {
            Some(previous) => format!("DDNS: {} changed from {} to {}", domain, previous, current),
            None => format!("DDNS: {} now points to {}", domain, current),
        };

        if let Err(e) = notifier.send(chat_id, &text, &MessageOptions::plain()).await {
            warn!("Could not notify chat {} about {}: {}", chat_id, domain, e);
        }
    }

    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Scheduler event channel full, dropping {:?}. Consider increasing event_channel_capacity.",
                    event
                );
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in tasks.values_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
    }
}
