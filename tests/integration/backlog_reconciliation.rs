//! Wall-clock backlog reconciliation through the public scheduler API.

use crate::helpers::Rig;
use piggy::money::Cents;
use piggy::scheduler::{EventCompletion, EventTicket, SchedulerPhase, WakeReason};
use piggy::store::MemoryStore;
use piggy::PiggyError;

#[test]
fn thirteen_seconds_late_credits_one_silently_and_shows_one() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.clock.set(13_000);
    scheduler.recompute();

    assert_eq!(scheduler.balance().to_string(), "0.50");
    assert_eq!(scheduler.anchor(), 6_000);
    assert_eq!(rig.events.started().len(), 1);
    assert_eq!(scheduler.phase(), SchedulerPhase::Armed);

    rig.finish_event(&mut scheduler);
    assert_eq!(scheduler.balance().to_string(), "1.00");
    assert_eq!(scheduler.anchor(), 12_000);

    let wake = scheduler.pending_wake().expect("next boundary");
    assert_eq!(wake.reason, WakeReason::Boundary);
    assert_eq!(wake.at, 18_000);
}

#[test]
fn long_absence_shows_exactly_one_event() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    // One hour away: 600 periods due.
    rig.clock.set(3_600_000);
    scheduler.recompute();
    scheduler.catch_up();
    scheduler.recompute();

    assert_eq!(rig.events.started().len(), 1);
    assert_eq!(scheduler.balance(), Cents::new(50 * 599));

    rig.finish_event(&mut scheduler);
    assert_eq!(scheduler.balance(), Cents::new(50 * 600));
    assert_eq!(scheduler.anchor(), 3_600_000);
    assert_eq!(
        scheduler.pending_wake().map(|w| w.at),
        Some(3_606_000)
    );
}

#[test]
fn repeated_triggers_never_double_credit() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.clock.set(6_000);
    for _ in 0..5 {
        scheduler.recompute();
        scheduler.catch_up();
        scheduler.readiness_changed(true);
        scheduler.activity_changed(true);
    }
    assert_eq!(rig.events.started().len(), 1);
    assert_eq!(scheduler.balance(), Cents::ZERO);

    let ticket = scheduler.in_flight().unwrap();
    assert_eq!(
        scheduler.complete_event(ticket).unwrap(),
        EventCompletion::Credited
    );
    assert_eq!(
        scheduler.complete_event(ticket).unwrap(),
        EventCompletion::Stale
    );
    assert_eq!(scheduler.balance(), Cents::new(50));
}

#[test]
fn unknown_ticket_is_a_contract_violation() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    let err = scheduler
        .complete_event(EventTicket::from_raw(7))
        .unwrap_err();
    assert!(matches!(err, PiggyError::Contract(_)));
    assert_eq!(scheduler.balance(), Cents::ZERO);
}

#[test]
fn inactive_host_defers_then_reconciles() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.activity.set(false);
    rig.clock.set(30_000);
    scheduler.recompute();
    assert!(rig.events.started().is_empty());
    let wake = scheduler.pending_wake().unwrap();
    assert_eq!(wake.reason, WakeReason::InactiveRetry);
    assert_eq!(wake.at, 35_000);

    rig.clock.set(32_000);
    rig.activity.set(true);
    scheduler.activity_changed(true);
    // 32s / 6s = 5 due: four silent, one shown.
    assert_eq!(scheduler.balance(), Cents::new(200));
    assert_eq!(rig.events.started().len(), 1);
}

#[test]
fn change_of_period_applies_to_next_decision_only() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.clock.set(4_000);
    scheduler.recompute();
    scheduler.set_period_secs(2.0).unwrap();
    // Two periods of 2s are due from anchor 0.
    assert_eq!(scheduler.balance(), Cents::new(50));
    assert_eq!(rig.events.started().len(), 1);
    assert!(scheduler.set_period_secs(0.0).is_err());
    assert_eq!(scheduler.period().as_millis(), 2_000);
}
