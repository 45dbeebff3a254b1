//! Test doubles and common utilities for contract tests
//!
//! Every external collaborator is replaced by a double that records what it
//! was asked to do, so tests assert on calls rather than on real side effects.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsbot_core::config::DdnsConfig;
use dnsbot_core::conversation::{Action, ConversationEngine, EngineSettings, InboundEvent};
use dnsbot_core::error::{Error, Result};
use dnsbot_core::model::{ChatId, DnsRecordSnapshot, IpFamily, MessageId, RecordType};
use dnsbot_core::scheduler::{DdnsScheduler, SchedulerEvent};
use dnsbot_core::session::MemorySessionStore;
use dnsbot_core::traits::{
    DnsProvider, IpResolver, MessageOptions, MessagingGateway, SessionStore, UpsertOutcome,
};
use dnsbot_core::{Clock, ManualClock};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

pub const CHAT: ChatId = ChatId(42);

/// A message the bot sent
#[derive(Debug, Clone)]
pub struct Sent {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub options: MessageOptions,
}

/// A message the bot edited
#[derive(Debug, Clone)]
pub struct Edited {
    pub message_id: MessageId,
    pub text: String,
    pub options: MessageOptions,
}

/// Gateway that records every call
#[derive(Default)]
pub struct RecordingGateway {
    next_id: AtomicI32,
    sent: Mutex<Vec<Sent>>,
    edited: Mutex<Vec<Edited>>,
    deleted: Mutex<Vec<MessageId>>,
    acks: Mutex<Vec<(String, Option<String>)>>,
    screens: Mutex<Vec<Screen>>,
    fail_sends: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `send` fail (recipient gone)
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edited(&self) -> Vec<Edited> {
        self.edited.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn acks(&self) -> Vec<(String, Option<String>)> {
        self.acks.lock().unwrap().clone()
    }

    /// Text of the newest sent or edited message
    pub fn last_text(&self) -> String {
        self.last_screen().0
    }

    /// Actions on the keyboard of the newest sent or edited message
    pub fn last_actions(&self) -> Vec<Action> {
        self.last_screen()
            .1
            .keyboard
            .map(|k| k.actions().cloned().collect())
            .unwrap_or_default()
    }

    fn last_screen(&self) -> (String, MessageOptions) {
        // Edits and sends interleave; the counter tells which came last
        let sent = self.sent.lock().unwrap();
        let edited = self.edited.lock().unwrap();
        let log = self.screens.lock().unwrap();
        match log.last() {
            Some(Screen::Sent(i)) => (sent[*i].text.clone(), sent[*i].options.clone()),
            Some(Screen::Edited(i)) => (edited[*i].text.clone(), edited[*i].options.clone()),
            None => (String::new(), MessageOptions::plain()),
        }
    }

    pub fn last_ack(&self) -> Option<(String, Option<String>)> {
        self.acks.lock().unwrap().last().cloned()
    }

    pub fn expired_acks(&self) -> usize {
        self.acks
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, text)| text.as_deref().is_some_and(|t| t.contains("expired")))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
enum Screen {
    Sent(usize),
    Edited(usize),
}

impl RecordingGateway {
    fn screens_push(&self, screen: Screen) {
        self.screens.lock().unwrap().push(screen);
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send(&self, chat_id: ChatId, text: &str, options: &MessageOptions) -> Result<MessageId> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::messaging("Forbidden: bot was blocked by the user"));
        }
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 100);
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            chat_id,
            message_id,
            text: text.to_string(),
            options: options.clone(),
        });
        let index = sent.len() - 1;
        drop(sent);
        self.screens_push(Screen::Sent(index));
        Ok(message_id)
    }

    async fn edit(
        &self,
        _chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        options: &MessageOptions,
    ) -> Result<()> {
        let mut edited = self.edited.lock().unwrap();
        edited.push(Edited {
            message_id,
            text: text.to_string(),
            options: options.clone(),
        });
        let index = edited.len() - 1;
        drop(edited);
        self.screens_push(Screen::Edited(index));
        Ok(())
    }

    async fn delete(&self, _chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.deleted.lock().unwrap().push(message_id);
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.acks
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}

/// One upsert the provider was asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    pub domain: String,
    pub ip: IpAddr,
    pub record_type: RecordType,
    pub proxied: bool,
}

/// Provider double with canned listings and recorded mutations
pub struct ScriptedProvider {
    records: Mutex<Vec<DnsRecordSnapshot>>,
    zone_id: Mutex<Option<String>>,
    failure: Mutex<Option<(String, Option<u16>)>>,
    delay: Mutex<Duration>,
    upserts: Mutex<Vec<Upsert>>,
    updates: Mutex<Vec<(String, String, IpAddr, bool)>>,
    deletes: Mutex<Vec<(String, String)>>,
    delete_all_calls: AtomicUsize,
    list_calls: AtomicUsize,
    applied: Mutex<Option<IpAddr>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            zone_id: Mutex::new(Some("zone-1".to_string())),
            failure: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            upserts: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            delete_all_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            applied: Mutex::new(None),
        }
    }

    pub fn with_records(records: Vec<DnsRecordSnapshot>) -> Self {
        let provider = Self::new();
        *provider.records.lock().unwrap() = records;
        provider
    }

    pub fn set_zone(&self, zone_id: Option<&str>) {
        *self.zone_id.lock().unwrap() = zone_id.map(str::to_string);
    }

    /// Make every call fail with a provider error
    pub fn fail_with(&self, message: &str, status: Option<u16>) {
        *self.failure.lock().unwrap() = Some((message.to_string(), status));
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Make every mutation take `delay`
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn upserts(&self) -> Vec<Upsert> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, String, IpAddr, bool)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn delete_all_calls(&self) -> usize {
        self.delete_all_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        match self.failure.lock().unwrap().clone() {
            Some((message, Some(status))) => Err(Error::provider_status("mock", message, status)),
            Some((message, None)) => Err(Error::provider("mock", message)),
            None => Ok(()),
        }
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DnsProvider for ScriptedProvider {
    async fn resolve_zone_id(&self, _domain: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.zone_id.lock().unwrap().clone())
    }

    async fn list_records(
        &self,
        domain: &str,
        include_all_in_zone: bool,
    ) -> Result<Vec<DnsRecordSnapshot>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| include_all_in_zone || r.name == domain)
            .cloned()
            .collect())
    }

    async fn upsert_record(
        &self,
        domain: &str,
        ip: IpAddr,
        record_type: RecordType,
        proxied: bool,
    ) -> Result<UpsertOutcome> {
        self.upserts.lock().unwrap().push(Upsert {
            domain: domain.to_string(),
            ip,
            record_type,
            proxied,
        });
        self.pause().await;
        self.check()?;

        let previous = self.applied.lock().unwrap().replace(ip);
        Ok(match previous {
            None => UpsertOutcome::Created { new_ip: ip },
            Some(old) if old == ip => UpsertOutcome::Unchanged { current_ip: ip },
            Some(old) => UpsertOutcome::Updated {
                previous_ip: Some(old),
                new_ip: ip,
            },
        })
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        _name: &str,
        ip: IpAddr,
        _record_type: RecordType,
        proxied: bool,
    ) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((zone_id.to_string(), record_id.to_string(), ip, proxied));
        self.pause().await;
        self.check()
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((zone_id.to_string(), record_id.to_string()));
        self.pause().await;
        self.check()
    }

    async fn delete_all_records_for_domain(&self, domain: &str) -> Result<usize> {
        self.delete_all_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(records.iter().filter(|r| r.name == domain).count())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Resolver double answering from a script
///
/// Answers are consumed in order; the last one repeats. A closed gate makes
/// every lookup wait until [`ScriptedResolver::release`] is called.
pub struct ScriptedResolver {
    answers: Mutex<VecDeque<std::result::Result<IpAddr, String>>>,
    last: Mutex<Option<std::result::Result<IpAddr, String>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new(answers: Vec<std::result::Result<IpAddr, String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(ip: &str) -> Self {
        Self::new(vec![Ok(ip.parse().unwrap())])
    }

    pub fn push(&self, answer: std::result::Result<IpAddr, String>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    /// Hold every lookup until released
    pub fn close_gate(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held lookups through
    pub fn release(&self, n: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpResolver for ScriptedResolver {
    async fn current_ip(&self, _family: IpFamily) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let answer = {
            let mut answers = self.answers.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = answers.pop_front() {
                *last = Some(next);
            }
            last.clone()
        };

        match answer {
            Some(Ok(ip)) => Ok(ip),
            Some(Err(message)) => Err(Error::ip_resolver(message)),
            None => Err(Error::ip_resolver("no answer scripted")),
        }
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn a_record(id: &str, name: &str, ip: &str) -> DnsRecordSnapshot {
    DnsRecordSnapshot {
        id: id.to_string(),
        zone_id: "zone-1".to_string(),
        name: name.to_string(),
        record_type: RecordType::A,
        content: ip.to_string(),
        proxied: false,
    }
}

/// `count` A records named host<i>.example.com
pub fn numbered_records(count: usize) -> Vec<DnsRecordSnapshot> {
    (0..count)
        .map(|i| a_record(&format!("rec-{i}"), &format!("host{i}.example.com"), &format!("10.0.0.{i}")))
        .collect()
}

/// Engine wired to doubles
/// Session store that yields before every read and touch
///
/// Two handlers for the same chat interleave at each of these points, so both
/// can see the same session before either writes it back.
pub struct YieldingStore(pub Arc<MemorySessionStore>);

#[async_trait]
impl SessionStore for YieldingStore {
    async fn get(&self, chat_id: ChatId) -> Result<Option<dnsbot_core::session::Session>> {
        tokio::task::yield_now().await;
        self.0.get(chat_id).await
    }

    async fn put(&self, session: dnsbot_core::session::Session) -> Result<()> {
        self.0.put(session).await
    }

    async fn delete(&self, chat_id: ChatId) -> Result<bool> {
        self.0.delete(chat_id).await
    }

    async fn touch(&self, chat_id: ChatId) -> Result<bool> {
        tokio::task::yield_now().await;
        self.0.touch(chat_id).await
    }

    async fn evict_idle(&self, max_idle: Duration) -> Result<Vec<ChatId>> {
        self.0.evict_idle(max_idle).await
    }

    async fn len(&self) -> Result<usize> {
        self.0.len().await
    }
}

pub struct Harness {
    pub engine: Arc<ConversationEngine>,
    pub gateway: Arc<RecordingGateway>,
    pub provider: Arc<ScriptedProvider>,
    pub resolver: Arc<ScriptedResolver>,
    pub sessions: Arc<MemorySessionStore>,
    pub scheduler: DdnsScheduler,
    pub clock: ManualClock,
    pub events: mpsc::Receiver<SchedulerEvent>,
    callbacks: AtomicUsize,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::with_resolver(provider, ScriptedResolver::fixed("1.2.3.4"))
    }

    pub fn with_resolver(provider: ScriptedProvider, resolver: ScriptedResolver) -> Self {
        let settings = EngineSettings::default().with_domains(["example.com", "example.org"]);
        Self::build(provider, resolver, settings)
    }

    pub fn build(
        provider: ScriptedProvider,
        resolver: ScriptedResolver,
        settings: EngineSettings,
    ) -> Self {
        Self::assemble(provider, resolver, settings, false)
    }

    /// Like [`Harness::new`], but every session read yields to the runtime
    /// first, as a networked store would
    pub fn yielding(provider: ScriptedProvider) -> Self {
        let settings = EngineSettings::default().with_domains(["example.com", "example.org"]);
        Self::assemble(provider, ScriptedResolver::fixed("1.2.3.4"), settings, true)
    }

    fn assemble(
        provider: ScriptedProvider,
        resolver: ScriptedResolver,
        settings: EngineSettings,
        yield_on_read: bool,
    ) -> Self {
        let gateway = Arc::new(RecordingGateway::new());
        let provider = Arc::new(provider);
        let resolver = Arc::new(resolver);
        let clock = ManualClock::default();
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let sessions = Arc::new(MemorySessionStore::with_clock(Arc::clone(&clock_arc)));
        let store: Arc<dyn SessionStore> = if yield_on_read {
            Arc::new(YieldingStore(sessions.clone()))
        } else {
            sessions.clone()
        };

        let (scheduler, events) = DdnsScheduler::new(
            provider.clone(),
            resolver.clone(),
            Some(gateway.clone()),
            Arc::clone(&clock_arc),
            &DdnsConfig::default(),
        )
        .expect("default config is valid");

        let engine = Arc::new(ConversationEngine::new(
            store,
            gateway.clone(),
            provider.clone(),
            scheduler.clone(),
            clock_arc,
            settings,
        ));

        Self {
            engine,
            gateway,
            provider,
            resolver,
            sessions,
            scheduler,
            clock,
            events,
            callbacks: AtomicUsize::new(0),
        }
    }

    /// A free-text message (or command) from [`CHAT`]
    pub fn text(&self, text: &str) -> InboundEvent {
        InboundEvent::text(CHAT, text)
    }

    /// A button press from [`CHAT`] on the newest message
    pub fn press(&self, action: Action) -> InboundEvent {
        let n = self.callbacks.fetch_add(1, Ordering::SeqCst);
        let message_id = self.gateway.sent().last().map(|s| s.message_id);
        InboundEvent::action(CHAT, format!("cb-{n}"), message_id, action)
    }

    pub async fn session(&self) -> Option<dnsbot_core::session::Session> {
        self.sessions.get(CHAT).await.unwrap()
    }

    /// Drain the scheduler events emitted so far
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
