mod common;

use common::*;

use kiosk_cache::{Acquire, AssetError, ConsumerId, ErrorKind, HandleLedger, LoadState, RegisterError, Waiter};

use std::sync::Arc;

use parking_lot::Mutex;

#[test]
fn test_three_labels_receive_font_in_registration_order() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  let font2 = key("font2");

  for consumer in [7, 3, 5] {
    assert_eq!(cache.acquire(&font2, recording_waiter(consumer, &log)), Acquire::Waiting);
  }
  assert_eq!(fetcher.started(), 1);
  assert_eq!(cache.waiter_count(&font2), 3);

  fetcher.succeed("font2", &ledger);
  cache.tick();

  let expected: Vec<_> = [7, 3, 5].into_iter().map(|c| delivered(c, "font2")).collect();
  assert_eq!(*log.lock(), expected);
  assert_eq!(cache.waiter_count(&font2), 0);
  assert_eq!(cache.metrics().waiters_notified, 3);
}

#[test]
fn test_failure_is_reported_once_to_every_waiter() {
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  let font2 = key("font2");

  for consumer in 1..=3 {
    cache.acquire(&font2, recording_waiter(consumer, &log));
  }
  fetcher.fail("font2", AssetError::not_found("fonts/title"));
  cache.tick();
  // A second tick has nothing left to deliver.
  assert_eq!(cache.tick(), 0);

  let log = log.lock();
  assert_eq!(log.len(), 3);
  assert!(log.iter().all(|(_, r)| *r == Err(ErrorKind::NotFound)));
  assert_eq!(cache.waiter_count(&font2), 0);
  assert_eq!(cache.state(&font2), LoadState::Failed);
}

#[test]
fn test_duplicate_registration_is_ignored() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  let font = key("font1");

  assert_eq!(cache.acquire(&font, recording_waiter(1, &log)), Acquire::Waiting);
  assert_eq!(cache.acquire(&font, recording_waiter(1, &log)), Acquire::Duplicate);
  let err = cache.register_waiter(&font, recording_waiter(1, &log)).unwrap_err();
  assert!(matches!(err, RegisterError::Duplicate { .. }));

  fetcher.succeed("font1", &ledger);
  cache.tick();
  assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_register_waiter_on_absent_key_waits_for_a_later_load() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  let font = key("font3");

  cache.register_waiter(&font, recording_waiter(9, &log)).unwrap();
  assert_eq!(fetcher.started(), 0, "registering alone does not start a load");

  cache.begin_load(&font);
  fetcher.succeed("font3", &ledger);
  cache.tick();
  assert_eq!(*log.lock(), vec![delivered(9, "font3")]);
}

#[test]
fn test_acquire_after_register_waiter_starts_the_load() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  let font = key("font4");

  // 1. Parked up front, nothing fetching yet.
  cache.register_waiter(&font, recording_waiter(2, &log)).unwrap();
  assert_eq!(fetcher.started(), 0);

  // 2. The same consumer acquiring is a duplicate, but the load still starts.
  assert_eq!(cache.acquire(&font, recording_waiter(2, &log)), Acquire::Duplicate);
  assert_eq!(fetcher.started(), 1);
  assert_eq!(cache.state(&font), LoadState::Loading);
  assert_eq!(cache.waiter_count(&font), 1);

  // 3. The parked waiter is notified exactly once.
  fetcher.succeed("font4", &ledger);
  cache.tick();
  assert_eq!(*log.lock(), vec![delivered(2, "font4")]);
}

#[test]
fn test_register_waiter_rejected_once_resolved() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  load_ready(&mut cache, &fetcher, &ledger, "font1");

  let err = cache.register_waiter(&key("font1"), recording_waiter(1, &log)).unwrap_err();
  assert_eq!(
    err,
    RegisterError::NotPending {
      key: key("font1"),
      state: LoadState::Ready
    }
  );
}

#[test]
fn test_acquire_on_ready_key_delivers_synchronously() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();
  load_ready(&mut cache, &fetcher, &ledger, "font1");

  assert_eq!(cache.acquire(&key("font1"), recording_waiter(4, &log)), Acquire::Delivered);
  assert_eq!(*log.lock(), vec![delivered(4, "font1")]);
}

#[test]
fn test_acquire_on_failed_key_drops_waiter_unnotified() {
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let log = Notifications::default();

  cache.request(&key("font1"));
  fetcher.fail("font1", AssetError::decode_failed("not a font"));
  cache.tick();

  match cache.acquire(&key("font1"), recording_waiter(1, &log)) {
    Acquire::Failed(error) => assert_eq!(error.kind(), ErrorKind::DecodeFailed),
    other => panic!("expected failure, got {:?}", other),
  }
  assert!(log.lock().is_empty());
}

#[test]
fn test_waiter_receives_the_cached_payload() {
  let ledger = HandleLedger::new();
  let fetcher = ManualFetcher::default();
  let mut cache = build_manual_cache(&fetcher);
  let received = Arc::new(Mutex::new(None));

  let slot = Arc::clone(&received);
  cache.acquire(
    &key("font1"),
    Waiter::new(ConsumerId::new(1), move |_, resolution| {
      *slot.lock() = resolution.ok();
    }),
  );
  fetcher.succeed("font1", &ledger);
  cache.tick();

  let delivered = received.lock().clone().unwrap();
  let cached = cache.peek(&key("font1")).unwrap();
  assert!(Arc::ptr_eq(&delivered, &cached));
}
