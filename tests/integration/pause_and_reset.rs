//! Pause, resume and reset through the public scheduler API.

use crate::helpers::Rig;
use piggy::money::Cents;
use piggy::scheduler::{EventCompletion, SchedulerPhase, WakeReason};
use piggy::store::{ANCHOR_KEY, BALANCE_KEY, MemoryStore};

#[test]
fn paused_time_is_forfeited() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.clock.set(5_000);
    scheduler.pause();
    assert_eq!(store.entry(ANCHOR_KEY).as_deref(), Some("5000"));

    rig.clock.set(600_000);
    scheduler.recompute();
    scheduler.resume();

    assert_eq!(scheduler.balance(), Cents::ZERO);
    assert!(rig.events.started().is_empty());
    assert_eq!(scheduler.pending_wake().map(|w| w.at), Some(606_000));
}

#[test]
fn completion_racing_a_pause_credits_nothing() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.clock.set(6_000);
    scheduler.recompute();
    let ticket = scheduler.in_flight().unwrap();

    scheduler.toggle_running();
    assert_eq!(rig.events.cancelled(), vec![ticket]);
    assert_eq!(
        scheduler.complete_event(ticket).unwrap(),
        EventCompletion::Stale
    );
    assert_eq!(scheduler.balance(), Cents::ZERO);
}

#[test]
fn reset_zeroes_and_waits_for_readiness() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    rig.clock.set(25_000);
    scheduler.recompute();
    assert_eq!(scheduler.balance(), Cents::new(150));

    rig.readiness.set(false);
    scheduler.reset();
    assert_eq!(store.entry(BALANCE_KEY).as_deref(), Some("0.00"));
    assert_eq!(scheduler.phase(), SchedulerPhase::Restarting);
    let poll = scheduler.pending_wake().unwrap();
    assert_eq!(poll.reason, WakeReason::ResetPoll);

    // Readiness arrives much later; the wait never becomes backlog.
    rig.clock.set(90_000);
    rig.readiness.set(true);
    assert!(scheduler.fire_wake(poll.id));

    assert!(scheduler.is_running());
    assert_eq!(scheduler.anchor(), 90_000);
    assert_eq!(scheduler.balance(), Cents::ZERO);
    assert_eq!(scheduler.pending_wake().map(|w| w.at), Some(96_000));
}

#[test]
fn stale_wake_after_pause_is_ignored() {
    let rig = Rig::new(0);
    let store = MemoryStore::new();
    let mut scheduler = rig.scheduler(&store);

    scheduler.recompute();
    let wake = scheduler.pending_wake().unwrap();
    scheduler.pause();

    rig.clock.set(6_000);
    assert!(!scheduler.fire_wake(wake.id));
    assert!(rig.events.started().is_empty());
    assert_eq!(scheduler.phase(), SchedulerPhase::Paused);
}
