//! Behavioural tests for the visit manager
//!
//! These cover the observable contract: capacity, duplicate handling,
//! eviction order, deletion, clearing and snapshot reloads.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration};
use recent_visits::{
    AddOutcome, ManagerConfig, ManualClock, StorageError, Visit, VisitManager,
};
use tempfile::TempDir;

fn snapshot_path(dir: &TempDir) -> PathBuf {
    dir.path().join("rv.dat")
}

fn shared_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    ))
}

fn open(dir: &TempDir, max_visits: usize, clock: &Arc<ManualClock>) -> VisitManager<Arc<ManualClock>> {
    let config = ManagerConfig::new(snapshot_path(dir), max_visits);
    VisitManager::open_with_clock(config, Arc::clone(clock)).unwrap()
}

fn ids(visits: &[Visit]) -> Vec<u32> {
    visits.iter().map(|v| v.visit_id).collect()
}

fn pairs(manager: &VisitManager<Arc<ManualClock>>) -> Vec<(u32, u32, String, String)> {
    let mut out: Vec<_> = manager
        .user_ids()
        .flat_map(|user| {
            manager
                .recent_visits_snapshot(user)
                .into_iter()
                .map(move |v| (user, v.visit_id, v.url, v.text))
        })
        .collect();
    out.sort();
    out
}

// ============================================================================
// Capacity and eviction
// ============================================================================

#[test]
fn test_eviction_keeps_most_recent_in_order() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 3, &clock);

    for id in 301..=305 {
        assert!(
            manager
                .add_visit(3, id, &format!("https://example.net/{id}"), &format!("Net {id}"))
                .unwrap()
                .is_inserted()
        );
        assert!(manager.visit_count(3) <= 3);
    }

    assert_eq!(ids(manager.recent_visits(3)), vec![305, 304, 303]);
}

#[test]
fn test_eviction_follows_timestamp_not_insertion_order() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 2, &clock);

    clock.set(DateTime::from_timestamp(2_000, 0).unwrap());
    manager.add_visit(1, 1, "https://a", "A").unwrap();
    // Second visit carries an older timestamp.
    clock.set(DateTime::from_timestamp(1_000, 0).unwrap());
    manager.add_visit(1, 2, "https://b", "B").unwrap();
    clock.set(DateTime::from_timestamp(3_000, 0).unwrap());

    let outcome = manager.add_visit(1, 3, "https://c", "C").unwrap();
    assert_eq!(outcome, AddOutcome::Inserted { evicted: Some(2) });
    assert_eq!(ids(manager.recent_visits(1)), vec![3, 1]);
}

#[test]
fn test_capacity_is_per_user() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 2, &clock);

    for user in 1..=3 {
        for id in 0..5 {
            manager.add_visit(user, id, "u", "t").unwrap();
        }
    }

    assert_eq!(manager.user_count(), 3);
    for user in 1..=3 {
        assert_eq!(ids(manager.recent_visits(user)), vec![4, 3]);
    }
}

#[test]
fn test_duplicate_add_is_successful_noop() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 3, &clock);

    manager.add_visit(1, 1, "https://first", "First").unwrap();
    let before = fs::read(snapshot_path(&dir)).unwrap();
    let outcome = manager.add_visit(1, 1, "https://second", "Second").unwrap();

    assert_eq!(outcome, AddOutcome::Duplicate);
    assert_eq!(manager.visit_count(1), 1);
    let visit = &manager.recent_visits(1)[0];
    assert_eq!(visit.url, "https://first");
    assert_eq!(visit.text, "First");
    assert_eq!(fs::read(snapshot_path(&dir)).unwrap(), before);
}

#[test]
fn test_same_visit_id_for_different_users() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 3, &clock);

    manager.add_visit(1, 5, "https://one", "One").unwrap();
    let outcome = manager.add_visit(2, 5, "https://two", "Two").unwrap();
    assert!(outcome.is_inserted());
    assert_eq!(manager.recent_visits(2)[0].url, "https://two");
}

// ============================================================================
// Query ordering
// ============================================================================

#[test]
fn test_query_orders_by_seconds_then_nanos() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 10, &clock);

    let times = [(50, 10), (70, 0), (50, 20), (10, 999_999_999), (70, 5)];
    for (id, (secs, nanos)) in times.iter().enumerate() {
        clock.set(DateTime::from_timestamp(*secs, *nanos).unwrap());
        manager.add_visit(1, id as u32, "u", "t").unwrap();
    }

    let recent = manager.recent_visits(1);
    assert_eq!(ids(recent), vec![4, 1, 2, 0, 3]);
    for pair in recent.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }
}

#[test]
fn test_timestamps_come_from_clock() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 3, &clock);

    let expected = clock.peek();
    manager.add_visit(1, 1, "u", "t").unwrap();
    let visit = &manager.recent_visits(1)[0];
    assert_eq!(visit.timestamp.to_datetime(), Some(expected));
    assert_eq!(clock.peek() - expected, Duration::milliseconds(1));
}

// ============================================================================
// Delete and clear
// ============================================================================

#[test]
fn test_delete_present_absent_and_mixed() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 5, &clock);

    for id in 601..=605 {
        manager.add_visit(6, id, "u", "t").unwrap();
    }

    // Only absent ids: nothing happens.
    let before = fs::read(snapshot_path(&dir)).unwrap();
    assert!(!manager.delete_visits(6, &[900, 901]).unwrap());
    assert_eq!(manager.visit_count(6), 5);
    assert_eq!(fs::read(snapshot_path(&dir)).unwrap(), before);

    // Present id.
    assert!(manager.delete_visits(6, &[603]).unwrap());
    assert_eq!(ids(manager.recent_visits(6)), vec![605, 604, 602, 601]);

    // Mixed.
    assert!(manager.delete_visits(6, &[999, 601, 605]).unwrap());
    assert_eq!(ids(manager.recent_visits(6)), vec![604, 602]);
}

#[test]
fn test_clear_keeps_user_known() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 5, &clock);

    for id in 501..=503 {
        manager.add_visit(5, id, "u", "t").unwrap();
    }
    manager.clear(5).unwrap();

    assert!(manager.recent_visits(5).is_empty());
    assert!(manager.is_known_user(5));
    assert!(manager.add_visit(5, 504, "u", "t").unwrap().is_inserted());
    assert_eq!(ids(manager.recent_visits(5)), vec![504]);
}

#[test]
fn test_unknown_user_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 5, &clock);

    assert!(manager.recent_visits(999).is_empty());
    assert!(!manager.delete_visits(999, &[1, 2]).unwrap());
    manager.clear(999).unwrap();
    assert_eq!(manager.user_count(), 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_reload_round_trip() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();

    let saved = {
        let mut manager = open(&dir, 5, &clock);
        manager.add_visit(4, 401, "https://example.com/persist1", "Persist 1").unwrap();
        manager.add_visit(4, 402, "https://example.com/persist2", "Persist 2").unwrap();
        manager.add_visit(7, 701, "https://example.com/ünïcödé", "").unwrap();
        let saved = pairs(&manager);
        manager.close();
        saved
    };

    let mut manager = open(&dir, 5, &clock);
    assert_eq!(pairs(&manager), saved);
    assert_eq!(ids(manager.recent_visits(4)), vec![402, 401]);

    manager.add_visit(4, 403, "https://example.com/persist3", "Persist 3").unwrap();
    assert_eq!(ids(manager.recent_visits(4)), vec![403, 402, 401]);
}

#[test]
fn test_reload_preserves_timestamps_and_cleared_users() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();

    let before = {
        let mut manager = open(&dir, 5, &clock);
        manager.add_visit(1, 1, "u", "t").unwrap();
        manager.add_visit(2, 2, "u", "t").unwrap();
        manager.clear(2).unwrap();
        manager.recent_visits_snapshot(1)
    };

    let manager = open(&dir, 5, &clock);
    assert_eq!(manager.recent_visits_snapshot(1), before);
    assert!(manager.is_known_user(2));
    assert_eq!(manager.visit_count(2), 0);
}

#[test]
fn test_file_header_records_capacity() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 7, &clock);
    manager.add_visit(1, 1, "u", "t").unwrap();

    let data = fs::read(snapshot_path(&dir)).unwrap();
    assert_eq!(&data[..8], &7u64.to_le_bytes());
    assert_eq!(&data[8..16], &1u64.to_le_bytes());
}

#[test]
fn test_reload_uses_caller_capacity() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    {
        let mut manager = open(&dir, 2, &clock);
        manager.add_visit(1, 1, "u", "t").unwrap();
        manager.add_visit(1, 2, "u", "t").unwrap();
    }

    // Reopened with a larger cap, the record can now grow past the old one.
    let mut manager = open(&dir, 4, &clock);
    assert_eq!(manager.max_visits(), 4);
    manager.add_visit(1, 3, "u", "t").unwrap();
    manager.add_visit(1, 4, "u", "t").unwrap();
    assert_eq!(manager.visit_count(1), 4);
}

/// Loading keeps the first `max_visits` visits in file order, which is not
/// necessarily the most recent set. Live eviction would have kept visit 2.
#[test]
fn test_reload_truncation_diverges_from_recency_eviction() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    {
        let mut manager = open(&dir, 2, &clock);
        clock.set(DateTime::from_timestamp(100, 0).unwrap());
        manager.add_visit(1, 1, "https://old", "Old").unwrap();
        clock.set(DateTime::from_timestamp(200, 0).unwrap());
        manager.add_visit(1, 2, "https://new", "New").unwrap();
    }

    let mut manager = open(&dir, 1, &clock);
    assert_eq!(ids(manager.recent_visits(1)), vec![1]);

    // The same sequence applied live under a cap of one keeps the newer visit.
    let live_dir = TempDir::new().unwrap();
    let mut live = open(&live_dir, 1, &clock);
    clock.set(DateTime::from_timestamp(100, 0).unwrap());
    live.add_visit(1, 1, "https://old", "Old").unwrap();
    clock.set(DateTime::from_timestamp(200, 0).unwrap());
    live.add_visit(1, 2, "https://new", "New").unwrap();
    assert_eq!(ids(live.recent_visits(1)), vec![2]);
}

/// A query reorders storage in place, so the order written by the next
/// mutation differs from insertion order.
#[test]
fn test_reload_truncation_after_query_reorders_storage() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    {
        let mut manager = open(&dir, 3, &clock);
        for id in 1..=3 {
            manager.add_visit(1, id, "u", "t").unwrap();
        }
        assert_eq!(ids(manager.recent_visits(1)), vec![3, 2, 1]);
        // Evicts 1 from the tail, storage becomes [3, 2, 4].
        manager.add_visit(1, 4, "u", "t").unwrap();
    }

    let mut manager = open(&dir, 2, &clock);
    assert_eq!(ids(manager.recent_visits(1)), vec![3, 2]);
}

#[test]
fn test_leap_second_visit_survives_reload() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    {
        let mut manager = open(&dir, 3, &clock);
        manager.add_visit(1, 1, "https://a", "A").unwrap();
        manager.add_visit(2, 2, "https://b", "B").unwrap();
    }

    let leap_clock = Arc::new(ManualClock::with_step(
        DateTime::from_timestamp(1_483_228_799, 1_500_000_000).unwrap(),
        Duration::zero(),
    ));
    {
        let mut manager = open(&dir, 3, &leap_clock);
        manager.add_visit(3, 3, "https://leap", "Leap").unwrap();
        let stamped = manager.recent_visits(3)[0].timestamp;
        assert_eq!(stamped.nanos, 999_999_999);
    }

    let manager = open(&dir, 3, &clock);
    assert_eq!(manager.user_count(), 3);
    for user in 1..=3 {
        assert_eq!(manager.visit_count(user), 1);
    }
}

#[test]
fn test_corrupt_snapshot_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    fs::write(snapshot_path(&dir), b"definitely not a snapshot").unwrap();

    let mut manager = open(&dir, 3, &clock);
    assert_eq!(manager.user_count(), 0);
    assert_eq!(manager.max_visits(), 3);

    // The corrupt file is only replaced by the next mutation.
    assert_eq!(
        fs::read(snapshot_path(&dir)).unwrap(),
        b"definitely not a snapshot"
    );
    manager.add_visit(1, 1, "u", "t").unwrap();

    let reloaded = open(&dir, 3, &clock);
    assert_eq!(reloaded.visit_count(1), 1);
}

#[test]
fn test_truncated_snapshot_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    {
        let mut manager = open(&dir, 3, &clock);
        manager.add_visit(1, 1, "https://example.com", "Example").unwrap();
        manager.add_visit(2, 2, "https://example.org", "Org").unwrap();
    }
    let data = fs::read(snapshot_path(&dir)).unwrap();
    fs::write(snapshot_path(&dir), &data[..data.len() - 3]).unwrap();

    let manager = open(&dir, 3, &clock);
    assert_eq!(manager.user_count(), 0);
}

#[test]
fn test_close_leaves_file() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 3, &clock);
    manager.add_visit(1, 1, "u", "t").unwrap();
    manager.close();
    assert!(snapshot_path(&dir).exists());
}

#[test]
fn test_in_place_writes_round_trip() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let config = ManagerConfig::builder(snapshot_path(&dir))
        .max_visits(3)
        .atomic_writes(false)
        .sync_writes(true)
        .build()
        .unwrap();
    {
        let mut manager = VisitManager::open_with_clock(config.clone(), Arc::clone(&clock)).unwrap();
        manager.add_visit(1, 1, "u", "t").unwrap();
        manager.add_visit(1, 2, "u", "t").unwrap();
        manager.delete_visits(1, &[1]).unwrap();
    }

    let manager = VisitManager::open_with_clock(config, clock).unwrap();
    assert_eq!(manager.recent_visits_snapshot(1).len(), 1);
    assert!(!dir.path().join("rv.dat.tmp").exists());
}

#[test]
fn test_invalid_input_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let clock = shared_clock();
    let mut manager = open(&dir, 3, &clock);
    manager.add_visit(1, 1, "u", "t").unwrap();

    let err = manager.add_visit(1, 2, "u", "bad\0text").unwrap_err();
    assert!(matches!(err, StorageError::InvalidInput(_)));
    assert_eq!(manager.visit_count(1), 1);
}
