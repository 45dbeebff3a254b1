//! Architectural Contract Test: DDNS Scheduler
//!
//! This test verifies that:
//! 1. A tick writes only when the public address moved since the last write
//! 2. At most one task runs per domain; a second start is rejected
//! 3. Overlapping ticks are skipped, not queued; a dropped tick frees its task
//! 4. A tick that outlives its task drops its result
//! 5. Failed lookups and failed notifications never stop a task
//! 6. Timers fire once per interval, starting one interval after start

mod common;

use common::*;
use dnsbot_core::conversation::DomainPurpose;
use dnsbot_core::model::{DnsRecordSnapshot, RecordType};
use dnsbot_core::scheduler::{TaskSpec, TickOutcome};
use dnsbot_core::{Action, Error, SchedulerEvent, SessionState};
use std::net::IpAddr;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const HOME: &str = "home.example.com";

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn home_task() -> TaskSpec {
    TaskSpec::new(HOME, 60, "zone-1").owner(CHAT)
}

/// Wait until the resolver has been entered `n` times
async fn until_resolving(resolver: &ScriptedResolver, n: usize) {
    while resolver.calls() < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_tick_writes_only_on_change() {
    let resolver = ScriptedResolver::new(vec![
        Ok(ip("1.2.3.4")),
        Ok(ip("1.2.3.4")),
        Ok(ip("5.6.7.8")),
    ]);
    let mut h = Harness::with_resolver(ScriptedProvider::new(), resolver);
    h.scheduler.start(home_task()).unwrap();

    let first = h.scheduler.run_tick(HOME).await;
    assert_eq!(
        first,
        TickOutcome::Updated {
            previous: None,
            current: ip("1.2.3.4")
        }
    );
    assert_eq!(h.scheduler.get(HOME).unwrap().last_applied_ip, Some(ip("1.2.3.4")));

    let second = h.scheduler.run_tick(HOME).await;
    assert_eq!(second, TickOutcome::Unchanged(ip("1.2.3.4")));
    assert_eq!(h.provider.upserts().len(), 1, "Same address must not be written again");

    let third = h.scheduler.run_tick(HOME).await;
    assert_eq!(
        third,
        TickOutcome::Updated {
            previous: Some(ip("1.2.3.4")),
            current: ip("5.6.7.8")
        }
    );

    let upserts = h.provider.upserts();
    assert_eq!(upserts.len(), 2);
    assert_eq!(upserts[1].ip, ip("5.6.7.8"));
    assert_eq!(upserts[1].record_type, RecordType::A);

    let task = h.scheduler.get(HOME).unwrap();
    assert_eq!(task.last_applied_ip, Some(ip("5.6.7.8")));
    assert!(task.last_checked.is_some());
    assert!(!task.tick_in_flight);

    let notes: Vec<String> = h.gateway.sent().into_iter().map(|s| s.text).collect();
    assert_eq!(notes.len(), 2, "Owner is told about each change, got: {:?}", notes);
    assert!(notes[1].contains("changed from 1.2.3.4 to 5.6.7.8"));

    let events = h.drain_events();
    assert!(matches!(events[0], SchedulerEvent::TaskStarted { interval_secs: 60, .. }));
    assert!(events.contains(&SchedulerEvent::IpUnchanged {
        domain: HOME.to_string(),
        ip: ip("1.2.3.4")
    }));
}

#[tokio::test]
async fn test_duplicate_start_is_rejected() {
    let h = Harness::new(ScriptedProvider::new());
    let original = assert_ok!(h.scheduler.start(home_task()));

    let err = assert_err!(h.scheduler.start(TaskSpec::new(HOME, 300, "zone-1")));

    assert!(
        matches!(err, Error::DuplicateTask(ref d) if d == HOME),
        "Second start should be rejected, got: {:?}",
        err
    );
    let task = h.scheduler.get(HOME).unwrap();
    assert_eq!(task.id, original.id, "Running task must be left untouched");
    assert_eq!(task.interval_secs, 60);
    assert_eq!(h.scheduler.len(), 1);
}

#[tokio::test]
async fn test_start_validates_interval_and_record_type() {
    let h = Harness::new(ScriptedProvider::new());

    let too_short = assert_err!(h.scheduler.start(TaskSpec::new(HOME, 5, "zone-1")));
    assert!(matches!(too_short, Error::InvalidInput(_)));

    let txt = assert_err!(h.scheduler.start(
        TaskSpec::new(HOME, 60, "zone-1").record_type(RecordType::Other("TXT".to_string())),
    ));
    assert!(matches!(txt, Error::InvalidInput(_)));
    assert!(h.scheduler.is_empty());
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() {
    let resolver = ScriptedResolver::fixed("1.2.3.4");
    resolver.close_gate();
    let h = Harness::with_resolver(ScriptedProvider::new(), resolver);
    h.scheduler.start(home_task()).unwrap();

    let scheduler = h.scheduler.clone();
    let running = tokio::spawn(async move { scheduler.run_tick(HOME).await });
    until_resolving(&h.resolver, 1).await;
    assert!(h.scheduler.get(HOME).unwrap().tick_in_flight);

    let overlapping = h.scheduler.run_tick(HOME).await;
    assert_eq!(overlapping, TickOutcome::Skipped);
    assert_eq!(h.resolver.calls(), 1, "Skipped tick must not resolve");

    h.resolver.release(1);
    let finished = running.await.unwrap();
    assert!(matches!(finished, TickOutcome::Updated { .. }));
    assert_eq!(h.provider.upserts().len(), 1);
    assert!(!h.scheduler.get(HOME).unwrap().tick_in_flight);
}

#[tokio::test]
async fn test_abandoned_tick_releases_task() {
    let resolver = ScriptedResolver::fixed("1.2.3.4");
    resolver.close_gate();
    let h = Harness::with_resolver(ScriptedProvider::new(), resolver);
    h.scheduler.start(home_task()).unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), h.scheduler.run_tick(HOME)).await;
    assert_err!(abandoned);
    assert_eq!(h.resolver.calls(), 1);
    assert!(
        !h.scheduler.get(HOME).unwrap().tick_in_flight,
        "A dropped tick must not keep the task claimed"
    );

    h.resolver.release(1);
    let next = h.scheduler.run_tick(HOME).await;
    assert!(
        matches!(next, TickOutcome::Updated { .. }),
        "Expected the next tick to run, got {:?}",
        next
    );
    assert_eq!(h.provider.upserts().len(), 1);
}

#[tokio::test]
async fn test_stop_mid_tick_discards_result() {
    let resolver = ScriptedResolver::fixed("1.2.3.4");
    resolver.close_gate();
    let mut h = Harness::with_resolver(ScriptedProvider::new(), resolver);
    h.scheduler.start(home_task()).unwrap();

    let scheduler = h.scheduler.clone();
    let running = tokio::spawn(async move { scheduler.run_tick(HOME).await });
    until_resolving(&h.resolver, 1).await;

    assert!(h.scheduler.stop(HOME));
    // A fresh registration for the same domain must not inherit the stale result
    let restarted = h.scheduler.start(home_task()).unwrap();

    h.resolver.release(1);
    let outcome = running.await.unwrap();

    assert_eq!(outcome, TickOutcome::Cancelled);
    let task = h.scheduler.get(HOME).unwrap();
    assert_eq!(task.id, restarted.id);
    assert_eq!(task.last_applied_ip, None);
    assert!(!task.tick_in_flight);
    assert!(h.gateway.sent().is_empty(), "No notification for a discarded tick");
    assert!(
        !h.drain_events()
            .iter()
            .any(|e| matches!(e, SchedulerEvent::RecordUpdated { .. })),
        "No update event for a discarded tick"
    );
}

#[tokio::test]
async fn test_stop_unknown_domain_is_noop() {
    let h = Harness::new(ScriptedProvider::new());
    assert!(!h.scheduler.stop("nothing.example.com"));
    assert_eq!(h.scheduler.run_tick("nothing.example.com").await, TickOutcome::Cancelled);
}

#[tokio::test]
async fn test_failures_retry_on_next_tick() {
    let resolver = ScriptedResolver::new(vec![Err("lookup timed out".to_string())]);
    let h = Harness::with_resolver(ScriptedProvider::new(), resolver);
    h.scheduler.start(home_task()).unwrap();

    let outcome = h.scheduler.run_tick(HOME).await;
    assert!(matches!(outcome, TickOutcome::Failed(ref e) if e.contains("lookup timed out")));
    assert_eq!(h.scheduler.get(HOME).unwrap().last_applied_ip, None);
    assert!(h.provider.upserts().is_empty());

    h.resolver.push(Ok(ip("1.2.3.4")));
    h.provider.fail_with("upstream error", Some(502));
    let outcome = h.scheduler.run_tick(HOME).await;
    assert!(matches!(outcome, TickOutcome::Failed(_)));
    assert_eq!(
        h.scheduler.get(HOME).unwrap().last_applied_ip,
        None,
        "Failed write must not be recorded"
    );

    h.provider.recover();
    let outcome = h.scheduler.run_tick(HOME).await;
    assert!(matches!(outcome, TickOutcome::Updated { .. }));
    assert_eq!(h.scheduler.get(HOME).unwrap().last_applied_ip, Some(ip("1.2.3.4")));
    assert!(h.scheduler.get(HOME).unwrap().is_running());
}

#[tokio::test]
async fn test_wrong_family_answer_fails_tick() {
    let h = Harness::with_resolver(ScriptedProvider::new(), ScriptedResolver::fixed("2001:db8::1"));
    h.scheduler.start(home_task()).unwrap();

    let outcome = h.scheduler.run_tick(HOME).await;

    assert!(matches!(outcome, TickOutcome::Failed(_)));
    assert!(h.provider.upserts().is_empty());
}

#[tokio::test]
async fn test_notification_failure_is_not_fatal() {
    let h = Harness::new(ScriptedProvider::new());
    h.gateway.fail_sends(true);
    h.scheduler.start(home_task()).unwrap();

    let outcome = h.scheduler.run_tick(HOME).await;

    assert!(matches!(outcome, TickOutcome::Updated { .. }));
    let task = h.scheduler.get(HOME).unwrap();
    assert!(task.is_running());
    assert_eq!(task.last_applied_ip, Some(ip("1.2.3.4")));
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_once_per_interval() {
    let h = Harness::new(ScriptedProvider::new());
    h.scheduler.start(home_task()).unwrap();

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.resolver.calls(), 0, "No tick before the first interval");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.resolver.calls(), 1);
    assert_eq!(h.provider.upserts().len(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.resolver.calls(), 2);
    assert_eq!(h.provider.upserts().len(), 1, "Unchanged address is not rewritten");

    assert!(h.scheduler.stop(HOME));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.resolver.calls(), 2, "Stopped task must not tick again");
}

#[tokio::test]
async fn test_stop_all_clears_registry() {
    let h = Harness::new(ScriptedProvider::new());
    h.scheduler.start(home_task()).unwrap();
    h.scheduler
        .start(TaskSpec::new("office.example.com", 120, "zone-1"))
        .unwrap();

    assert_eq!(h.scheduler.stop_all(), 2);
    assert!(h.scheduler.is_empty());
    assert!(h.scheduler.list().is_empty());
}

async fn ddns_to_interval_prompt(h: &Harness, subdomain: &str) {
    h.engine.handle(h.text("/ddns")).await;
    h.engine
        .handle(h.press(Action::SelectDomain {
            purpose: DomainPurpose::Ddns,
            domain: "example.com".to_string(),
        }))
        .await;
    h.engine.handle(h.text(subdomain)).await;
}

#[tokio::test]
async fn test_ddns_workflow_starts_task_from_existing_record() {
    let h = Harness::new(ScriptedProvider::with_records(vec![DnsRecordSnapshot {
        id: "v6".to_string(),
        zone_id: "zone-1".to_string(),
        name: HOME.to_string(),
        record_type: RecordType::Aaaa,
        content: "2001:db8::1".to_string(),
        proxied: true,
    }]));

    ddns_to_interval_prompt(&h, "home").await;
    assert_eq!(
        h.session().await.map(|s| s.state),
        Some(SessionState::WaitingIntervalForDdns)
    );

    h.engine.handle(h.press(Action::DdnsInterval(300))).await;

    let task = h.scheduler.get(HOME).expect("task should be running");
    assert_eq!(task.interval_secs, 300);
    assert_eq!(task.record_type, RecordType::Aaaa);
    assert!(task.proxied);
    assert_eq!(task.zone_id, "zone-1");
    assert_eq!(task.owner, Some(CHAT));
    assert!(h.session().await.is_none());
    assert!(h.gateway.last_text().starts_with("DDNS started for home.example.com"));
}

#[tokio::test]
async fn test_status_shows_zone_resolved_at_setup() {
    let provider = ScriptedProvider::new();
    provider.set_zone(Some("zone-7f3a"));
    let h = Harness::new(provider);

    ddns_to_interval_prompt(&h, "home").await;
    h.engine.handle(h.press(Action::DdnsInterval(300))).await;
    assert_eq!(h.scheduler.get(HOME).unwrap().zone_id, "zone-7f3a");

    h.engine.handle(h.text("/ddnsstatus")).await;

    assert!(
        h.gateway.last_text().contains("zone: zone-7f3a"),
        "Status should name the zone, got: {}",
        h.gateway.last_text()
    );
}

#[tokio::test]
async fn test_ddns_typed_interval_out_of_range_reprompts() {
    let h = Harness::new(ScriptedProvider::new());
    ddns_to_interval_prompt(&h, "home").await;

    h.engine.handle(h.text("5")).await;

    assert_eq!(
        h.session().await.map(|s| s.state),
        Some(SessionState::WaitingIntervalForDdns)
    );
    assert!(h.scheduler.is_empty());

    h.engine.handle(h.text("90")).await;
    assert_eq!(h.scheduler.get(HOME).map(|t| t.interval_secs), Some(90));
}

#[tokio::test]
async fn test_ddns_for_running_domain_is_refused() {
    let h = Harness::new(ScriptedProvider::new());
    let original = h.scheduler.start(home_task()).unwrap();

    ddns_to_interval_prompt(&h, "home").await;

    assert!(h.session().await.is_none());
    assert!(h.gateway.last_text().contains("already running"));
    assert_eq!(h.scheduler.get(HOME).unwrap().id, original.id);
}

#[tokio::test]
async fn test_ddns_without_zone_reports_failure() {
    let provider = ScriptedProvider::new();
    provider.set_zone(None);
    let h = Harness::new(provider);

    ddns_to_interval_prompt(&h, "home").await;
    h.engine.handle(h.press(Action::DdnsInterval(60))).await;

    assert!(h.scheduler.is_empty());
    assert!(h.session().await.is_none());
    assert!(h.gateway.last_text().starts_with("Failed to start DDNS"));
}

#[tokio::test]
async fn test_stop_menu_works_without_session() {
    let h = Harness::new(ScriptedProvider::new());
    h.scheduler.start(home_task()).unwrap();

    h.engine.handle(h.text("/stopddns")).await;
    assert!(
        h.gateway
            .last_actions()
            .contains(&Action::StopDdns(HOME.to_string()))
    );
    assert!(h.session().await.is_none());

    h.engine.handle(h.press(Action::StopDdns(HOME.to_string()))).await;

    assert!(h.scheduler.is_empty());
    assert_eq!(h.gateway.last_text(), "Stopped DDNS for home.example.com.");

    // Pressing again finds nothing to stop
    h.engine.handle(h.press(Action::StopDdns(HOME.to_string()))).await;
    let (_, toast) = h.gateway.last_ack().unwrap();
    assert_eq!(toast.as_deref(), Some("No DDNS task for home.example.com"));
}

#[tokio::test]
async fn test_status_lists_running_tasks() {
    let h = Harness::new(ScriptedProvider::new());
    h.engine.handle(h.text("/ddnsstatus")).await;
    assert_eq!(h.gateway.last_text(), "No DDNS tasks are running.");

    h.scheduler.start(home_task()).unwrap();
    h.scheduler.run_tick(HOME).await;
    h.engine.handle(h.text("/ddnsstatus")).await;

    let text = h.gateway.last_text();
    assert!(text.contains("home.example.com (A) every 1 min"));
    assert!(text.contains("zone: zone-1"));
    assert!(text.contains("last IP: 1.2.3.4"));
}
