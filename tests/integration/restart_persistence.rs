//! Balance and anchor survive a process restart through the JSON file store.

use crate::helpers::{Rig, config};
use piggy::money::Cents;
use piggy::store::{BALANCE_KEY, JsonFileStore, StateStore};

#[test]
fn backlog_accrued_while_closed_is_credited_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let rig = Rig::new(1_000_000);

    {
        let mut scheduler =
            rig.scheduler_with_store(&config(0.5, 6.0), Box::new(JsonFileStore::new(&path)));
        rig.clock.set(1_006_000);
        scheduler.recompute();
        rig.finish_event(&mut scheduler);
        assert_eq!(scheduler.balance(), Cents::new(50));
    }

    // Closed for one minute.
    rig.clock.set(1_066_000);
    let mut scheduler =
        rig.scheduler_with_store(&config(0.5, 6.0), Box::new(JsonFileStore::new(&path)));
    assert_eq!(scheduler.balance(), Cents::new(50));
    assert_eq!(scheduler.anchor(), 1_006_000);

    scheduler.recompute();
    // Ten periods due: nine silent, one shown.
    assert_eq!(scheduler.balance(), Cents::new(500));
    assert_eq!(rig.events.started().len(), 2);

    let reopened = JsonFileStore::new(&path);
    assert_eq!(reopened.get(BALANCE_KEY).unwrap().as_deref(), Some("5.00"));
}

#[test]
fn missing_state_file_starts_from_zero_anchored_now() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::new(42_000);
    let scheduler = rig.scheduler_with_store(
        &config(1.0, 60.0),
        Box::new(JsonFileStore::new(dir.path().join("absent.json"))),
    );
    assert_eq!(scheduler.balance(), Cents::ZERO);
    assert_eq!(scheduler.anchor(), 42_000);
}

#[test]
fn corrupt_state_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    let rig = Rig::new(7_000);
    let mut scheduler =
        rig.scheduler_with_store(&config(0.5, 6.0), Box::new(JsonFileStore::new(&path)));
    assert_eq!(scheduler.balance(), Cents::ZERO);
    assert_eq!(scheduler.anchor(), 7_000);

    rig.clock.set(13_000);
    scheduler.recompute();
    rig.finish_event(&mut scheduler);
    let reopened = JsonFileStore::new(&path);
    assert_eq!(reopened.get(BALANCE_KEY).unwrap().as_deref(), Some("0.50"));
}
